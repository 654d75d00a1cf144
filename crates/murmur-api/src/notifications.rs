use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use murmur_types::api::{Claims, NotificationResponse};
use murmur_types::models::User;

use crate::error::ApiResult;

/// The feed with actors denormalized, most recent first.
pub async fn get_notifications(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = state.db.notifications_for(&claims.sub.to_string())?;

    let mut actor_ids: Vec<String> = rows.iter().map(|n| n.actor_id.clone()).collect();
    actor_ids.sort();
    actor_ids.dedup();
    let actors: HashMap<String, User> = state
        .db
        .get_users_by_ids(&actor_ids)?
        .into_iter()
        .map(|row| (row.id.clone(), row.into_user()))
        .collect();

    let feed: Vec<NotificationResponse> = rows
        .into_iter()
        .filter_map(|row| {
            let Some(actor) = actors.get(&row.actor_id).cloned() else {
                warn!("notification {} has no actor row, skipping", row.id);
                return None;
            };
            let n = row.into_notification();
            Some(NotificationResponse {
                id: n.id,
                kind: n.kind,
                actor,
                post_id: n.post_id,
                comment_id: n.comment_id,
                text: n.text,
                created_at: n.created_at,
            })
        })
        .collect();

    Ok(Json(feed))
}

/// Flip the feed-wide unread badge off once the user opens the feed.
pub async fn mark_read(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .set_unread_notification(&claims.sub.to_string(), false)?;
    Ok(StatusCode::OK)
}
