use thiserror::Error;

/// Failure kinds surfaced by core operations. Delivery failure is not among
/// them: an unreachable recipient is a normal branch that falls back to
/// persisted-unread state, never an error to the sender.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input, rejected before any mutation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Entity absent; no state change
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller's view is stale: already a member of the likes set
    #[error("post already liked")]
    AlreadyLiked,

    /// The caller's view is stale: not a member of the likes set
    #[error("post not liked before")]
    NotLiked,

    #[error("user already followed")]
    AlreadyFollowing,

    #[error("user not followed before")]
    NotFollowing,

    /// Non-owner, non-root attempting a privileged mutation
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
