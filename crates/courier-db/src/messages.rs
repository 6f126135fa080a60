use rusqlite::{Connection, OptionalExtension, params};

use crate::models::MessageRow;
use crate::{Database, Result, now_timestamp};

const MESSAGE_COLUMNS: &str = "id, content, sender_id, receiver_id, is_edited, created_at, updated_at";

impl Database {
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, content, sender_id, receiver_id, is_edited, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                params![id, content, sender_id, receiver_id, now],
            )?;

            Ok(MessageRow {
                id: id.to_string(),
                content: content.to_string(),
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                is_edited: false,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Messages exchanged between two users in either direction, newest first.
    pub fn list_messages_between(
        &self,
        user_a: &str,
        user_b: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_a, user_b, limit, offset as i64], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The newest message exchanged with each counterpart of `user_id`,
    /// newest first. Equal timestamps go to the later insert.
    pub fn latest_message_per_counterpart(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {cols} FROM (
                    SELECT {cols}, rowid AS seq,
                           ROW_NUMBER() OVER (
                               PARTITION BY CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END
                               ORDER BY created_at DESC, rowid DESC
                           ) AS pos
                    FROM messages
                    WHERE sender_id = ?1 OR receiver_id = ?1
                 )
                 WHERE pos = 1
                 ORDER BY created_at DESC, seq DESC",
                cols = MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], row_to_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replace the content of a message owned by `sender_id`, marking it
    /// edited. Returns `None` when no row matched id and sender.
    pub fn update_message_content(
        &self,
        id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Option<MessageRow>> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET content = ?1, is_edited = 1, updated_at = ?2
                 WHERE id = ?3 AND sender_id = ?4",
                params![content, now, id, sender_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_message(conn, id)
        })
    }

    /// Hard delete of a message owned by `sender_id`. Returns whether a row
    /// was removed.
    pub fn delete_message(&self, id: &str, sender_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND sender_id = ?2",
                params![id, sender_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    let row = conn.query_row(&sql, [id], row_to_message).optional()?;
    Ok(row)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        content: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        is_edited: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
