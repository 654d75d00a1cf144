use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NotificationKind, Role, User};

// -- JWT Claims --

/// Claims shared by the REST middleware and anything else that needs to know
/// who is calling. Tokens are issued by the external auth service; murmur
/// only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub text: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pic_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub text: String,
}

/// A post with its author and engagement denormalized for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub author: User,
    pub text: String,
    pub location: Option<String>,
    pub pic_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub author: User,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// -- Profile --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowStatsResponse {
    pub followers_length: usize,
    pub following_length: usize,
}

// -- Notifications --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub actor: User,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}
