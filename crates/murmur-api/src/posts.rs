use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::{PostRow, parse_timestamp, parse_uuid};
use murmur_gateway::engagement;
use murmur_types::api::{Claims, CommentRequest, CommentResponse, CreatePostRequest, PostResponse};
use murmur_types::error::CoreError;
use murmur_types::models::User;

use crate::error::{ApiError, ApiResult};

/// Feed page size, matching the client's infinite-scroll step.
const FEED_PAGE_SIZE: u32 = 4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default = "default_page")]
    pub page_number: u32,
}

fn default_page() -> u32 {
    1
}

pub async fn create_post(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.text.trim().is_empty() {
        return Err(CoreError::Validation("text must be at least 1 character".into()).into());
    }

    let post_id = Uuid::new_v4();
    let created_at = chrono::Utc::now();
    state.db.insert_post(
        &post_id.to_string(),
        &claims.sub.to_string(),
        req.text.trim(),
        req.location.as_deref(),
        req.pic_url.as_deref(),
        &created_at.to_rfc3339(),
    )?;

    let row = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;
    let response = build_post_response(&state.db, row)?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_post(
    State(state): State<crate::AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let row = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;
    Ok(Json(build_post_response(&state.db, row)?))
}

/// One feed page: the caller's own posts plus everyone they follow,
/// newest first.
pub async fn get_feed(
    State(state): State<crate::AppState>,
    Query(query): Query<FeedQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let offset = FEED_PAGE_SIZE * query.page_number.saturating_sub(1);
    let user_id = claims.sub.to_string();

    // Run the page query and its joins off the async runtime
    let state_blocking = state.clone();
    let responses = tokio::task::spawn_blocking(move || {
        let rows = state_blocking.db.feed_posts(&user_id, FEED_PAGE_SIZE, offset)?;
        rows.into_iter()
            .map(|row| build_post_response(&state_blocking.db, row))
            .collect::<ApiResult<Vec<_>>>()
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError(CoreError::Internal(anyhow::anyhow!(e)))
    })??;

    Ok(Json(responses))
}

pub async fn delete_post(
    State(state): State<crate::AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    engagement::delete_post(&state.db, post_id, claims.sub, claims.role)?;
    Ok(StatusCode::OK)
}

// -- Likes (REST mirror of the gateway likePost path) --

pub async fn like_post(
    State(state): State<crate::AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    engagement::like_post(&state.db, &state.dispatcher, post_id, claims.sub).await?;
    Ok(StatusCode::OK)
}

pub async fn unlike_post(
    State(state): State<crate::AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    engagement::unlike_post(&state.db, &state.dispatcher, post_id, claims.sub).await?;
    Ok(StatusCode::OK)
}

/// Likers as full profiles, most recent first.
pub async fn get_likes(
    State(state): State<crate::AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    if state.db.get_post(&post_id.to_string())?.is_none() {
        return Err(CoreError::NotFound("post").into());
    }

    let like_ids = state.db.like_user_ids(&post_id.to_string())?;
    let users = user_map(&state.db, &like_ids)?;
    let likers: Vec<User> = like_ids
        .iter()
        .filter_map(|id| users.get(id).cloned())
        .collect();
    Ok(Json(likers))
}

// -- Comments --

pub async fn create_comment(
    State(state): State<crate::AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment =
        engagement::comment_on_post(&state.db, &state.dispatcher, post_id, claims.sub, &req.text)
            .await?;

    let author = state
        .db
        .get_user(&claims.sub.to_string())?
        .ok_or(CoreError::NotFound("user"))?
        .into_user();

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            author,
            text: comment.text,
            created_at: comment.created_at,
        }),
    ))
}

pub async fn delete_comment(
    State(state): State<crate::AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    engagement::remove_comment(&state.db, post_id, comment_id, claims.sub, claims.role)?;
    Ok(StatusCode::OK)
}

// -- Response assembly --

fn user_map(db: &Database, ids: &[String]) -> ApiResult<HashMap<String, User>> {
    let mut unique: Vec<String> = ids.to_vec();
    unique.sort();
    unique.dedup();
    let users = db.get_users_by_ids(&unique)?;
    Ok(users
        .into_iter()
        .map(|row| (row.id.clone(), row.into_user()))
        .collect())
}

fn build_post_response(db: &Database, row: PostRow) -> ApiResult<PostResponse> {
    let author = db
        .get_user(&row.author_id)?
        .ok_or(CoreError::NotFound("user"))?
        .into_user();

    let like_ids = db.like_user_ids(&row.id)?;
    let likes: Vec<Uuid> = like_ids.iter().map(|s| parse_uuid(s, "user id")).collect();

    let comment_rows = db.comments_for_post(&row.id)?;
    let comment_author_ids: Vec<String> =
        comment_rows.iter().map(|c| c.author_id.clone()).collect();
    let authors = user_map(db, &comment_author_ids)?;

    let comments = comment_rows
        .into_iter()
        .filter_map(|c| match authors.get(&c.author_id) {
            Some(author) => Some(CommentResponse {
                id: parse_uuid(&c.id, "comment id"),
                author: author.clone(),
                text: c.text,
                created_at: parse_timestamp(&c.created_at),
            }),
            None => {
                warn!("comment {} has no author row, skipping", c.id);
                None
            }
        })
        .collect();

    Ok(PostResponse {
        id: parse_uuid(&row.id, "post id"),
        author,
        text: row.text,
        location: row.location,
        pic_url: row.pic_url,
        created_at: parse_timestamp(&row.created_at),
        likes,
        comments,
    })
}
