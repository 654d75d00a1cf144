//! Engagement Mutator: like/unlike and comment/uncomment with author
//! notification triggers. All mutations are single keyed statements, so two
//! simultaneous actors can never clobber each other's edits.

use chrono::Utc;
use uuid::Uuid;

use murmur_db::Database;
use murmur_types::error::{CoreError, CoreResult};
use murmur_types::models::{Comment, NotificationKind, Role};
use murmur_types::policy::can_modify;

use crate::dispatcher::Dispatcher;
use crate::fanout;

/// How much of a comment rides along inside its notification.
const COMMENT_SNIPPET_LEN: usize = 100;

pub async fn like_post(
    db: &Database,
    dispatcher: &Dispatcher,
    post_id: Uuid,
    user_id: Uuid,
) -> CoreResult<()> {
    let post = db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;

    if !db.add_like(
        &post_id.to_string(),
        &user_id.to_string(),
        &Utc::now().to_rfc3339(),
    )? {
        return Err(CoreError::AlreadyLiked);
    }

    let author_id = murmur_db::models::parse_uuid(&post.author_id, "author id");
    if author_id != user_id {
        fanout::notify(
            db,
            dispatcher,
            NotificationKind::NewLike,
            user_id,
            author_id,
            Some(post_id),
            None,
            None,
        )
        .await?;
    }
    Ok(())
}

pub async fn unlike_post(
    db: &Database,
    _dispatcher: &Dispatcher,
    post_id: Uuid,
    user_id: Uuid,
) -> CoreResult<()> {
    let post = db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;

    if !db.remove_like(&post_id.to_string(), &user_id.to_string())? {
        return Err(CoreError::NotLiked);
    }

    let author_id = murmur_db::models::parse_uuid(&post.author_id, "author id");
    if author_id != user_id {
        fanout::withdraw_like(db, author_id, user_id, post_id)?;
    }
    Ok(())
}

pub async fn comment_on_post(
    db: &Database,
    dispatcher: &Dispatcher,
    post_id: Uuid,
    user_id: Uuid,
    text: &str,
) -> CoreResult<Comment> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::Validation("comment text is empty".into()));
    }

    let post = db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;

    let comment = Comment {
        id: Uuid::new_v4(),
        post_id,
        author_id: user_id,
        text: text.to_string(),
        created_at: Utc::now(),
    };
    db.insert_comment(
        &comment.id.to_string(),
        &post_id.to_string(),
        &user_id.to_string(),
        text,
        &comment.created_at.to_rfc3339(),
    )?;

    let author_id = murmur_db::models::parse_uuid(&post.author_id, "author id");
    if author_id != user_id {
        let snippet: String = text.chars().take(COMMENT_SNIPPET_LEN).collect();
        fanout::notify(
            db,
            dispatcher,
            NotificationKind::NewComment,
            user_id,
            author_id,
            Some(post_id),
            Some(comment.id),
            Some(snippet),
        )
        .await?;
    }
    Ok(comment)
}

/// Only the comment's author, the post's author, or root may remove a
/// comment. A second concurrent removal observes `NotFound`.
pub fn remove_comment(
    db: &Database,
    post_id: Uuid,
    comment_id: Uuid,
    actor_id: Uuid,
    actor_role: Role,
) -> CoreResult<()> {
    let post = db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;
    let comment = db
        .get_comment(&comment_id.to_string())?
        .ok_or(CoreError::NotFound("comment"))?;
    if comment.post_id != post_id.to_string() {
        return Err(CoreError::NotFound("comment"));
    }

    let comment_author = murmur_db::models::parse_uuid(&comment.author_id, "author id");
    let post_author = murmur_db::models::parse_uuid(&post.author_id, "author id");
    let allowed = can_modify(actor_id, comment_author, actor_role)
        || can_modify(actor_id, post_author, actor_role);
    if !allowed {
        return Err(CoreError::Unauthorized);
    }

    if !db.delete_comment(&comment_id.to_string())? {
        return Err(CoreError::NotFound("comment"));
    }

    if post_author != comment_author {
        fanout::withdraw_comment(db, post_author, comment_author, post_id, comment_id)?;
    }
    Ok(())
}

/// Only the post's author or root may delete a post. Engagement and the
/// post's notifications go with it.
pub fn delete_post(
    db: &Database,
    post_id: Uuid,
    actor_id: Uuid,
    actor_role: Role,
) -> CoreResult<()> {
    let post = db
        .get_post(&post_id.to_string())?
        .ok_or(CoreError::NotFound("post"))?;

    let author_id = murmur_db::models::parse_uuid(&post.author_id, "author id");
    if !can_modify(actor_id, author_id, actor_role) {
        return Err(CoreError::Unauthorized);
    }

    if !db.delete_post(&post_id.to_string())? {
        return Err(CoreError::NotFound("post"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::events::GatewayEvent;
    use tokio::sync::mpsc;

    struct Fixture {
        db: Database,
        dispatcher: Dispatcher,
        liker: Uuid,
        author: Uuid,
        post: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let liker = Uuid::new_v4();
        let author = Uuid::new_v4();
        let post = Uuid::new_v4();
        db.create_user(&liker.to_string(), "jane", "Jane", "/img/jane.png", "user")
            .unwrap();
        db.create_user(&author.to_string(), "amit", "Amit", "", "user")
            .unwrap();
        db.insert_post(
            &post.to_string(),
            &author.to_string(),
            "post",
            None,
            None,
            "2026-01-01T00:00:00+00:00",
        )
        .unwrap();
        Fixture {
            db,
            dispatcher: Dispatcher::new(),
            liker,
            author,
            post,
        }
    }

    #[tokio::test]
    async fn like_unlike_round_trip_leaves_likes_unchanged() {
        let f = fixture();
        let before = f.db.like_user_ids(&f.post.to_string()).unwrap();

        like_post(&f.db, &f.dispatcher, f.post, f.liker).await.unwrap();
        unlike_post(&f.db, &f.dispatcher, f.post, f.liker).await.unwrap();

        assert_eq!(f.db.like_user_ids(&f.post.to_string()).unwrap(), before);
        // the withdrawn like leaves no notification behind either
        assert!(f.db.notifications_for(&f.author.to_string()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_like_is_a_conflict_with_single_membership() {
        let f = fixture();
        like_post(&f.db, &f.dispatcher, f.post, f.liker).await.unwrap();

        let err = like_post(&f.db, &f.dispatcher, f.post, f.liker)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyLiked));
        assert_eq!(
            f.db.like_user_ids(&f.post.to_string()).unwrap(),
            vec![f.liker.to_string()]
        );
    }

    #[tokio::test]
    async fn unlike_without_like_is_a_conflict() {
        let f = fixture();
        let err = unlike_post(&f.db, &f.dispatcher, f.post, f.liker)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotLiked));
    }

    #[tokio::test]
    async fn liking_while_author_is_connected_pushes_a_notification() {
        let f = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        f.dispatcher
            .register(f.author, "amit".into(), "".into(), tx)
            .await;

        like_post(&f.db, &f.dispatcher, f.post, f.liker).await.unwrap();

        let event = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|e| matches!(e, GatewayEvent::NewNotificationReceived { .. }))
            .expect("author saw the live push");
        match event {
            GatewayEvent::NewNotificationReceived {
                username, post_id, ..
            } => {
                assert_eq!(username, "jane");
                assert_eq!(post_id, Some(f.post));
            }
            _ => unreachable!(),
        }

        let feed = f.db.notifications_for(&f.author.to_string()).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].kind, "newLike");
        assert_eq!(feed[0].actor_id, f.liker.to_string());
    }

    #[tokio::test]
    async fn self_like_never_notifies() {
        let f = fixture();
        like_post(&f.db, &f.dispatcher, f.post, f.author).await.unwrap();
        assert!(f.db.notifications_for(&f.author.to_string()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_deletion_needs_ownership_or_root() {
        let f = fixture();
        let commenter = Uuid::new_v4();
        f.db.create_user(&commenter.to_string(), "carol", "Carol", "", "user")
            .unwrap();
        let comment = comment_on_post(&f.db, &f.dispatcher, f.post, commenter, "nice")
            .await
            .unwrap();

        // a stranger without root gets Unauthorized and the comment survives
        let err = remove_comment(&f.db, f.post, comment.id, f.liker, Role::User).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
        assert!(f.db.get_comment(&comment.id.to_string()).unwrap().is_some());

        // root may remove anyone's comment
        remove_comment(&f.db, f.post, comment.id, f.liker, Role::Root).unwrap();
        assert!(f.db.get_comment(&comment.id.to_string()).unwrap().is_none());

        // a repeat attempt on the removed entity is NotFound, nothing else
        let err = remove_comment(&f.db, f.post, comment.id, f.liker, Role::Root).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn post_author_may_remove_comments_on_their_post() {
        let f = fixture();
        let comment = comment_on_post(&f.db, &f.dispatcher, f.post, f.liker, "nice")
            .await
            .unwrap();
        remove_comment(&f.db, f.post, comment.id, f.author, Role::User).unwrap();
        assert!(f.db.get_comment(&comment.id.to_string()).unwrap().is_none());
        // the author's own feed entry for that comment is withdrawn
        assert!(f.db.notifications_for(&f.author.to_string()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_comment_is_rejected() {
        let f = fixture();
        let err = comment_on_post(&f.db, &f.dispatcher, f.post, f.liker, "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn post_deletion_is_owner_or_root() {
        let f = fixture();
        let err = delete_post(&f.db, f.post, f.liker, Role::User).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));

        delete_post(&f.db, f.post, f.author, Role::User).unwrap();
        assert!(f.db.get_post(&f.post.to_string()).unwrap().is_none());
    }
}
