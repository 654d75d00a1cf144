use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{CommentRow, PostRow};

fn map_post(row: &Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        text: row.get(2)?,
        location: row.get(3)?,
        pic_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_comment(row: &Row) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Database {
    // -- Posts --

    pub fn insert_post(
        &self,
        id: &str,
        author_id: &str,
        text: &str,
        location: Option<&str>,
        pic_url: Option<&str>,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, text, location, pic_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, author_id, text, location, pic_url, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, text, location, pic_url, created_at
                 FROM posts WHERE id = ?1",
            )?;
            stmt.query_row([id], map_post).optional()
        })
    }

    /// Returns false if the post was already gone.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
    }

    /// One feed page: the user's own posts plus those of everyone they
    /// follow, newest first.
    pub fn feed_posts(&self, user_id: &str, limit: u32, offset: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, text, location, pic_url, created_at
                 FROM posts
                 WHERE author_id = ?1
                    OR author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Likes --

    /// Atomic set-add keyed by (post_id, user_id).
    /// Returns false when the user was already in the likes set.
    pub fn add_like(&self, post_id: &str, user_id: &str, created_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (post_id, user_id, created_at),
            )?;
            Ok(affected > 0)
        })
    }

    /// Atomic set-remove. Returns false when the user had not liked the post.
    pub fn remove_like(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                (post_id, user_id),
            )?;
            Ok(affected > 0)
        })
    }

    /// Liker ids, most recent first.
    pub fn like_user_ids(&self, post_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        text: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, post_id, author_id, text, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, author_id, text, created_at
                 FROM comments WHERE id = ?1",
            )?;
            stmt.query_row([id], map_comment).optional()
        })
    }

    /// Returns false when the comment was already gone — a second concurrent
    /// removal observes this, not an error.
    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
    }

    /// Comments on a post, most recent first.
    pub fn comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, author_id, text, created_at
                 FROM comments WHERE post_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([post_id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn seed(db: &Database) {
        db.create_user("u1", "jane", "Jane", "", "user").unwrap();
        db.create_user("u2", "amit", "Amit", "", "user").unwrap();
        db.insert_post("p1", "u2", "hello world", None, None, "2026-01-01T00:00:00+00:00")
            .unwrap();
    }

    #[test]
    fn like_then_unlike_restores_the_set() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        let before = db.like_user_ids("p1").unwrap();
        assert!(db.add_like("p1", "u1", "2026-01-01T00:00:01+00:00").unwrap());
        assert!(db.remove_like("p1", "u1").unwrap());
        assert_eq!(db.like_user_ids("p1").unwrap(), before);
    }

    #[test]
    fn double_like_is_rejected_and_membership_stays_single() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        assert!(db.add_like("p1", "u1", "2026-01-01T00:00:01+00:00").unwrap());
        assert!(!db.add_like("p1", "u1", "2026-01-01T00:00:02+00:00").unwrap());

        let likes = db.like_user_ids("p1").unwrap();
        assert_eq!(likes, vec!["u1".to_string()]);
    }

    #[test]
    fn unlike_without_like_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        assert!(!db.remove_like("p1", "u1").unwrap());
    }

    #[test]
    fn likes_are_recency_ordered() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.add_like("p1", "u1", "2026-01-01T00:00:01+00:00").unwrap();
        db.add_like("p1", "u2", "2026-01-01T00:00:02+00:00").unwrap();
        assert_eq!(db.like_user_ids("p1").unwrap(), vec!["u2", "u1"]);
    }

    #[test]
    fn deleting_a_post_cascades_engagement() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.add_like("p1", "u1", "2026-01-01T00:00:01+00:00").unwrap();
        db.insert_comment("c1", "p1", "u1", "nice", "2026-01-01T00:00:02+00:00")
            .unwrap();

        assert!(db.delete_post("p1").unwrap());
        assert!(db.get_comment("c1").unwrap().is_none());
        assert!(db.like_user_ids("p1").unwrap().is_empty());
        // second delete finds nothing
        assert!(!db.delete_post("p1").unwrap());
    }

    #[test]
    fn feed_covers_self_and_following_only() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.create_user("u3", "sam", "Sam", "", "user").unwrap();
        db.insert_post("p2", "u1", "mine", None, None, "2026-01-02T00:00:00+00:00")
            .unwrap();
        db.insert_post("p3", "u3", "unrelated", None, None, "2026-01-03T00:00:00+00:00")
            .unwrap();
        db.add_follow("u1", "u2", "2026-01-01T00:00:00+00:00").unwrap();

        let feed = db.feed_posts("u1", 10, 0).unwrap();
        let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }
}
