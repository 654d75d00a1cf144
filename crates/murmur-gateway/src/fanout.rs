//! Notification Store + fan-out: append to the target's feed, then try to
//! push a live `newNotificationReceived` carrying denormalized actor data so
//! the client can render without a follow-up fetch.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use murmur_db::Database;
use murmur_types::error::{CoreError, CoreResult};
use murmur_types::events::GatewayEvent;
use murmur_types::models::NotificationKind;

use crate::dispatcher::Dispatcher;

/// Append a notification and attempt live delivery. The feed-wide unread
/// badge is always raised; it clears when the target marks the feed read.
///
/// Duplicate policy: newLike and newFollower entries are upserted — any
/// existing entry with the same (target, kind, actor, post) key is dropped
/// before the fresh append, so a rapid like/unlike/like toggle leaves exactly
/// one entry. Comments are keyed by comment id and never collapse.
pub async fn notify(
    db: &Database,
    dispatcher: &Dispatcher,
    kind: NotificationKind,
    actor_id: Uuid,
    target_id: Uuid,
    post_id: Option<Uuid>,
    comment_id: Option<Uuid>,
    text: Option<String>,
) -> CoreResult<()> {
    let actor = db
        .get_user(&actor_id.to_string())?
        .ok_or(CoreError::NotFound("user"))?;

    let target = target_id.to_string();
    let post = post_id.map(|p| p.to_string());

    if matches!(kind, NotificationKind::NewLike | NotificationKind::NewFollower) {
        db.delete_matching_notifications(
            &target,
            kind.as_str(),
            &actor_id.to_string(),
            post.as_deref(),
        )?;
    }

    db.insert_notification(
        &Uuid::new_v4().to_string(),
        &target,
        kind.as_str(),
        &actor_id.to_string(),
        post.as_deref(),
        comment_id.map(|c| c.to_string()).as_deref(),
        text.as_deref(),
        &Utc::now().to_rfc3339(),
    )?;
    db.set_unread_notification(&target, true)?;

    let delivered = dispatcher
        .deliver(
            target_id,
            GatewayEvent::NewNotificationReceived {
                name: actor.name,
                profile_pic_url: actor.profile_pic_url,
                username: actor.username,
                post_id,
            },
        )
        .await;

    debug!(
        "{:?} notification {} -> {} (live={})",
        kind, actor_id, target_id, delivered
    );
    Ok(())
}

/// Withdraw the newLike entry for an unliked post.
pub fn withdraw_like(db: &Database, target_id: Uuid, actor_id: Uuid, post_id: Uuid) -> CoreResult<()> {
    db.delete_matching_notifications(
        &target_id.to_string(),
        NotificationKind::NewLike.as_str(),
        &actor_id.to_string(),
        Some(&post_id.to_string()),
    )?;
    Ok(())
}

/// Withdraw the newFollower entry after an unfollow.
pub fn withdraw_follower(db: &Database, target_id: Uuid, actor_id: Uuid) -> CoreResult<()> {
    db.delete_matching_notifications(
        &target_id.to_string(),
        NotificationKind::NewFollower.as_str(),
        &actor_id.to_string(),
        None,
    )?;
    Ok(())
}

/// Withdraw the newComment entry for one specific deleted comment.
pub fn withdraw_comment(
    db: &Database,
    target_id: Uuid,
    actor_id: Uuid,
    post_id: Uuid,
    comment_id: Uuid,
) -> CoreResult<()> {
    db.delete_comment_notification(
        &target_id.to_string(),
        &actor_id.to_string(),
        &post_id.to_string(),
        &comment_id.to_string(),
    )?;
    Ok(())
}
