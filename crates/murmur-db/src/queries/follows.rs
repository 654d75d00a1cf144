use anyhow::Result;

use crate::Database;
use crate::models::UserRow;

impl Database {
    /// Atomic edge insert. Returns false when the edge already exists.
    pub fn add_follow(&self, follower_id: &str, followee_id: &str, created_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
                 VALUES (?1, ?2, ?3)",
                (follower_id, followee_id, created_at),
            )?;
            Ok(affected > 0)
        })
    }

    /// Returns false when no such edge existed.
    pub fn remove_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id, followee_id),
            )?;
            Ok(affected > 0)
        })
    }

    pub fn is_following(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id, followee_id),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Everyone following `user_id`, most recent edge first.
    pub fn followers_of(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.follow_side(
            "SELECT u.id, u.username, u.name, u.profile_pic_url, u.role,
                    u.unread_message, u.unread_notification
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.followee_id = ?1
             ORDER BY f.created_at DESC",
            user_id,
        )
    }

    /// Everyone `user_id` follows, most recent edge first.
    pub fn following_of(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.follow_side(
            "SELECT u.id, u.username, u.name, u.profile_pic_url, u.role,
                    u.unread_message, u.unread_notification
             FROM follows f JOIN users u ON u.id = f.followee_id
             WHERE f.follower_id = ?1
             ORDER BY f.created_at DESC",
            user_id,
        )
    }

    /// (followers, following) counts for profile stats.
    pub fn follow_counts(&self, user_id: &str) -> Result<(usize, usize)> {
        self.with_conn(|conn| {
            let followers: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            let following: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok((followers as usize, following as usize))
        })
    }

    fn follow_side(&self, sql: &str, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        name: row.get(2)?,
                        profile_pic_url: row.get(3)?,
                        role: row.get(4)?,
                        unread_message: row.get(5)?,
                        unread_notification: row.get(6)?,
                    })
                })?
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
    }

    #[test]
    fn follow_holds_from_both_directions_simultaneously() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        assert!(db.add_follow("u1", "u2", "2026-01-01T00:00:00+00:00").unwrap());

        let following: Vec<String> = db
            .following_of("u1")
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        let followers: Vec<String> = db
            .followers_of("u2")
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(following, vec!["u2"]);
        assert_eq!(followers, vec!["u1"]);
        assert_eq!(db.follow_counts("u2").unwrap(), (1, 0));
    }

    #[test]
    fn unfollow_clears_both_directions() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        db.add_follow("u1", "u2", "2026-01-01T00:00:00+00:00").unwrap();
        assert!(db.remove_follow("u1", "u2").unwrap());

        assert!(db.following_of("u1").unwrap().is_empty());
        assert!(db.followers_of("u2").unwrap().is_empty());
        // a second unfollow observes the missing edge
        assert!(!db.remove_follow("u1", "u2").unwrap());
    }

    #[test]
    fn duplicate_follow_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        assert!(db.add_follow("u1", "u2", "2026-01-01T00:00:00+00:00").unwrap());
        assert!(!db.add_follow("u1", "u2", "2026-01-01T00:00:01+00:00").unwrap());
        assert_eq!(db.followers_of("u2").unwrap().len(), 1);
    }
}
