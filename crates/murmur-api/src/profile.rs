use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use murmur_gateway::fanout;
use murmur_types::api::{Claims, FollowStatsResponse};
use murmur_types::error::CoreError;
use murmur_types::models::{NotificationKind, User};

use crate::error::ApiResult;

pub async fn follow_user(
    State(state): State<crate::AppState>,
    Path(user_to_follow): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    if user_to_follow == claims.sub {
        return Err(CoreError::Validation("cannot follow yourself".into()).into());
    }
    if !state.db.user_exists(&user_to_follow.to_string())? {
        return Err(CoreError::NotFound("user").into());
    }

    // One atomic edge write covers both directions of the relationship.
    if !state.db.add_follow(
        &claims.sub.to_string(),
        &user_to_follow.to_string(),
        &Utc::now().to_rfc3339(),
    )? {
        return Err(CoreError::AlreadyFollowing.into());
    }

    fanout::notify(
        &state.db,
        &state.dispatcher,
        NotificationKind::NewFollower,
        claims.sub,
        user_to_follow,
        None,
        None,
        None,
    )
    .await?;

    Ok(StatusCode::OK)
}

pub async fn unfollow_user(
    State(state): State<crate::AppState>,
    Path(user_to_unfollow): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    if !state.db.user_exists(&user_to_unfollow.to_string())? {
        return Err(CoreError::NotFound("user").into());
    }

    if !state
        .db
        .remove_follow(&claims.sub.to_string(), &user_to_unfollow.to_string())?
    {
        return Err(CoreError::NotFollowing.into());
    }

    fanout::withdraw_follower(&state.db, user_to_unfollow, claims.sub)?;

    Ok(StatusCode::OK)
}

pub async fn get_followers(
    State(state): State<crate::AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let followers: Vec<User> = state
        .db
        .followers_of(&user_id.to_string())?
        .into_iter()
        .map(|row| row.into_user())
        .collect();
    Ok(Json(followers))
}

pub async fn get_following(
    State(state): State<crate::AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let following: Vec<User> = state
        .db
        .following_of(&user_id.to_string())?
        .into_iter()
        .map(|row| row.into_user())
        .collect();
    Ok(Json(following))
}

/// Follower/following counts for a profile page, looked up by username.
pub async fn get_follow_stats(
    State(state): State<crate::AppState>,
    Path(username): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_username(&username.to_lowercase())?
        .ok_or(CoreError::NotFound("user"))?;

    let (followers_length, following_length) = state.db.follow_counts(&user.id)?;
    Ok(Json(FollowStatsResponse {
        followers_length,
        following_length,
    }))
}
