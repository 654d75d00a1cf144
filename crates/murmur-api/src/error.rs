use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use murmur_types::error::CoreError;

/// Bridges CoreError to the REST failure contract: 401 for validation,
/// conflict and authorization failures (the contract this API inherited),
/// 404 for absent entities, 500 for the rest.
pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(CoreError::Internal(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Validation(_)
            | CoreError::AlreadyLiked
            | CoreError::NotLiked
            | CoreError::AlreadyFollowing
            | CoreError::NotFollowing
            | CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Internal(e) => {
                error!("internal error: {:#}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: CoreError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn statuses_follow_the_contract() {
        assert_eq!(status_of(CoreError::AlreadyLiked), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(CoreError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(CoreError::Validation("empty".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(CoreError::NotFound("post")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(CoreError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
