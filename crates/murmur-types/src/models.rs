use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two-tier authorization: regular users own what they create, root may
/// moderate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Root,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Root => "root",
        }
    }

    /// Anything that isn't the root marker is a regular user.
    pub fn parse(s: &str) -> Role {
        if s == "root" { Role::Root } else { Role::User }
    }
}

/// Profile data the core reads but does not own — the auth/profile service
/// maintains these rows; murmur only flips the two unread badges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub profile_pic_url: String,
    pub role: Role,
    pub unread_message: bool,
    pub unread_notification: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub location: Option<String>,
    pub pic_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// One direct message. Stored once for both participants; `deleted_by` rows
/// in the store hide it per viewer without touching the counterpart's copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: Uuid,
    pub recipient: Uuid,
    pub msg: String,
    pub read_by_recipient: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    NewLike,
    NewComment,
    NewFollower,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewLike => "newLike",
            NotificationKind::NewComment => "newComment",
            NotificationKind::NewFollower => "newFollower",
        }
    }

    pub fn parse(s: &str) -> Option<NotificationKind> {
        match s {
            "newLike" => Some(NotificationKind::NewLike),
            "newComment" => Some(NotificationKind::NewComment),
            "newFollower" => Some(NotificationKind::NewFollower),
            _ => None,
        }
    }
}

/// One entry in a user's notification feed, most-recent-first. `text` carries
/// the comment snippet for newComment entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}
