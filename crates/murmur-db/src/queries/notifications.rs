use anyhow::Result;
use rusqlite::Row;

use crate::Database;
use crate::models::NotificationRow;

fn map_notification(row: &Row) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        actor_id: row.get(3)?,
        post_id: row.get(4)?,
        comment_id: row.get(5)?,
        text: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: &str,
        actor_id: &str,
        post_id: Option<&str>,
        comment_id: Option<&str>,
        text: Option<&str>,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                     (id, user_id, kind, actor_id, post_id, comment_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                (id, user_id, kind, actor_id, post_id, comment_id, text, created_at),
            )?;
            Ok(())
        })
    }

    /// Remove entries matching (target, kind, actor, post). Used both for
    /// dedupe-before-append and for withdrawal on unlike/unfollow.
    pub fn delete_matching_notifications(
        &self,
        user_id: &str,
        kind: &str,
        actor_id: &str,
        post_id: Option<&str>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = match post_id {
                Some(pid) => conn.execute(
                    "DELETE FROM notifications
                     WHERE user_id = ?1 AND kind = ?2 AND actor_id = ?3 AND post_id = ?4",
                    (user_id, kind, actor_id, pid),
                )?,
                None => conn.execute(
                    "DELETE FROM notifications
                     WHERE user_id = ?1 AND kind = ?2 AND actor_id = ?3 AND post_id IS NULL",
                    (user_id, kind, actor_id),
                )?,
            };
            Ok(affected)
        })
    }

    /// Comment withdrawals are keyed by the specific comment, so deleting one
    /// comment leaves notifications for the actor's other comments intact.
    pub fn delete_comment_notification(
        &self,
        user_id: &str,
        actor_id: &str,
        post_id: &str,
        comment_id: &str,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM notifications
                 WHERE user_id = ?1 AND kind = 'newComment'
                   AND actor_id = ?2 AND post_id = ?3 AND comment_id = ?4",
                (user_id, actor_id, post_id, comment_id),
            )?;
            Ok(affected)
        })
    }

    /// The feed, most recent first.
    pub fn notifications_for(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, actor_id, post_id, comment_id, text, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
