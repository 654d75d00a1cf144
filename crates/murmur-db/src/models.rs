//! Database row types — these map directly to SQLite rows.
//! Distinct from the murmur-types API models to keep the DB layer
//! independent; `into_*` converters bridge the two at the boundary.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use murmur_types::models::{
    Comment, Message, Notification, NotificationKind, Post, Role, User,
};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_pic_url: String,
    pub role: String,
    pub unread_message: bool,
    pub unread_notification: bool,
}

pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub location: Option<String>,
    pub pic_url: Option<String>,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub read_by_recipient: bool,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub actor_id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub text: Option<String>,
    pub created_at: String,
}

/// Timestamps are written as RFC 3339 but older rows may carry SQLite's
/// bare `datetime('now')` format; fall back before giving up.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

pub fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, s, e);
        Uuid::default()
    })
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: parse_uuid(&self.id, "user id"),
            username: self.username,
            name: self.name,
            profile_pic_url: self.profile_pic_url,
            role: Role::parse(&self.role),
            unread_message: self.unread_message,
            unread_notification: self.unread_notification,
        }
    }
}

impl PostRow {
    pub fn into_post(self) -> Post {
        Post {
            id: parse_uuid(&self.id, "post id"),
            author_id: parse_uuid(&self.author_id, "author id"),
            text: self.text,
            location: self.location,
            pic_url: self.pic_url,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

impl CommentRow {
    pub fn into_comment(self) -> Comment {
        Comment {
            id: parse_uuid(&self.id, "comment id"),
            post_id: parse_uuid(&self.post_id, "post id"),
            author_id: parse_uuid(&self.author_id, "author id"),
            text: self.text,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            id: parse_uuid(&self.id, "message id"),
            sender: parse_uuid(&self.sender_id, "sender id"),
            recipient: parse_uuid(&self.recipient_id, "recipient id"),
            msg: self.body,
            read_by_recipient: self.read_by_recipient,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: parse_uuid(&self.id, "notification id"),
            kind: NotificationKind::parse(&self.kind).unwrap_or_else(|| {
                warn!("Corrupt notification kind '{}'", self.kind);
                NotificationKind::NewLike
            }),
            actor_id: parse_uuid(&self.actor_id, "actor id"),
            post_id: self.post_id.as_deref().map(|s| parse_uuid(s, "post id")),
            comment_id: self
                .comment_id
                .as_deref()
                .map(|s| parse_uuid(s, "comment id")),
            text: self.text,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}
