use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::MessageRow;

fn map_message(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        body: row.get(3)?,
        read_by_recipient: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        body: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, sender_id, recipient_id, body, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, body, read_by_recipient, created_at
                 FROM messages WHERE id = ?1",
            )?;
            stmt.query_row([id], map_message).optional()
        })
    }

    /// Whether any message was ever exchanged between the pair, soft deletes
    /// included — the conversation itself outlives per-viewer deletion.
    pub fn conversation_exists(&self, user_a: &str, user_b: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE (sender_id = ?1 AND recipient_id = ?2)
                    OR (sender_id = ?2 AND recipient_id = ?1)",
                (user_a, user_b),
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// The conversation as `viewer` sees it: both directions, append order,
    /// minus everything the viewer soft-deleted.
    pub fn conversation_for(&self, viewer: &str, other: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.sender_id, m.recipient_id, m.body, m.read_by_recipient, m.created_at
                 FROM messages m
                 WHERE ((m.sender_id = ?1 AND m.recipient_id = ?2)
                     OR (m.sender_id = ?2 AND m.recipient_id = ?1))
                   AND NOT EXISTS (
                       SELECT 1 FROM message_deletions d
                       WHERE d.message_id = m.id AND d.user_id = ?1
                   )
                 ORDER BY m.created_at ASC",
            )?;

            let rows = stmt
                .query_map((viewer, other), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip read_by_recipient on everything `other` sent to `viewer`.
    pub fn mark_conversation_read(&self, viewer: &str, other: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET read_by_recipient = 1
                 WHERE sender_id = ?1 AND recipient_id = ?2",
                (other, viewer),
            )?;
            Ok(())
        })
    }

    /// Soft-delete for one viewer. Idempotent; returns false when the row
    /// was already hidden.
    pub fn add_message_deletion(&self, message_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "INSERT OR IGNORE INTO message_deletions (message_id, user_id)
                 VALUES (?1, ?2)",
                (message_id, user_id),
            )?;
            Ok(affected > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn seed(db: &Database) {
        db.create_user("a", "alice", "Alice", "", "user").unwrap();
        db.create_user("b", "bob", "Bob", "", "user").unwrap();
        db.insert_message("m1", "a", "b", "hi", "2026-01-01T00:00:01+00:00")
            .unwrap();
        db.insert_message("m2", "b", "a", "hey", "2026-01-01T00:00:02+00:00")
            .unwrap();
    }

    #[test]
    fn soft_delete_hides_for_one_viewer_only() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        assert!(db.add_message_deletion("m1", "a").unwrap());

        let for_a: Vec<String> = db
            .conversation_for("a", "b")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        let for_b: Vec<String> = db
            .conversation_for("b", "a")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();

        assert_eq!(for_a, vec!["m2"]);
        assert_eq!(for_b, vec!["m1", "m2"]);
    }

    #[test]
    fn conversation_is_append_ordered_across_directions() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        let ids: Vec<String> = db
            .conversation_for("a", "b")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn mark_read_only_touches_incoming_side() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        db.mark_conversation_read("a", "b").unwrap();

        let m1 = db.get_message("m1").unwrap().unwrap();
        let m2 = db.get_message("m2").unwrap().unwrap();
        assert!(!m1.read_by_recipient, "a's outgoing message untouched");
        assert!(m2.read_by_recipient, "b -> a message marked read");
    }

    #[test]
    fn conversation_survives_total_soft_delete() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.add_message_deletion("m1", "a").unwrap();
        db.add_message_deletion("m2", "a").unwrap();

        assert!(db.conversation_for("a", "b").unwrap().is_empty());
        assert!(db.conversation_exists("a", "b").unwrap());
    }
}
