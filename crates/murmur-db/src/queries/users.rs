use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::UserRow;

const USER_COLUMNS: &str =
    "id, username, name, profile_pic_url, role, unread_message, unread_notification";

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        profile_pic_url: row.get(3)?,
        role: row.get(4)?,
        unread_message: row.get(5)?,
        unread_notification: row.get(6)?,
    })
}

impl Database {
    /// Seeding hook — user rows are normally written by the external
    /// auth/profile service.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        name: &str,
        profile_pic_url: &str,
        role: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, name, profile_pic_url, role)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, name, profile_pic_url, role),
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;
            stmt.query_row([id], map_user).optional()
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE username = ?1",
                USER_COLUMNS
            ))?;
            stmt.query_row([username], map_user).optional()
        })
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                [id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Batch-fetch users for denormalizing authors into responses.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {} FROM users WHERE id IN ({})",
                USER_COLUMNS,
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

            let rows = stmt
                .query_map(params.as_slice(), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Recipient-wide "has unread messages" badge.
    pub fn set_unread_message(&self, user_id: &str, unread: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET unread_message = ?1 WHERE id = ?2",
                (unread, user_id),
            )?;
            Ok(())
        })
    }

    /// Feed-wide "has unread notifications" badge.
    pub fn set_unread_notification(&self, user_id: &str, unread: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET unread_notification = ?1 WHERE id = ?2",
                (unread, user_id),
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    #[test]
    fn badges_flip_independently() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "jane", "Jane", "", "user").unwrap();

        db.set_unread_message("u1", true).unwrap();
        let user = db.get_user("u1").unwrap().unwrap();
        assert!(user.unread_message);
        assert!(!user.unread_notification);

        db.set_unread_notification("u1", true).unwrap();
        db.set_unread_message("u1", false).unwrap();
        let user = db.get_user("u1").unwrap().unwrap();
        assert!(!user.unread_message);
        assert!(user.unread_notification);
    }

    #[test]
    fn missing_user_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_user("nope").unwrap().is_none());
        assert!(!db.user_exists("nope").unwrap());
    }
}
