use crate::Database;
use crate::models::{MessageRow, ReplyRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Messages --

    /// Insert a message and return its generated id.
    pub fn insert_message(&self, user_id: &str, content: &str, created_at: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (user_id, content, created_at) VALUES (?1, ?2, ?3)",
                (user_id, content, created_at),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Page of a user's messages, newest first.
    pub fn messages_for_user(&self, user_id: &str, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages_for_user(conn, user_id, limit, offset))
    }

    /// The user who sent a message, if the message exists.
    pub fn message_owner(&self, message_id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let owner = conn
                .query_row(
                    "SELECT user_id FROM messages WHERE id = ?1",
                    [message_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(owner)
        })
    }

    /// Newest message id with exactly this (content, user_id) pair.
    ///
    /// Duplicate content from the same user resolves to the most recent
    /// message (MAX id). This is the documented best-effort tie-break for
    /// thread correlation, not a guaranteed-correct resolution.
    pub fn latest_message_id(&self, content: &str, user_id: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let max_id: Option<i64> = conn.query_row(
                "SELECT MAX(id) FROM messages WHERE content = ?1 AND user_id = ?2",
                (content, user_id),
                |row| row.get(0),
            )?;
            Ok(max_id)
        })
    }

    // -- Replies --

    pub fn insert_reply(&self, message_id: i64, reply_content: &str, reply_at: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO replies (message_id, reply_content, reply_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![message_id, reply_content, reply_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Batch-fetch replies for a set of message ids, ordered by reply time.
    pub fn replies_for_messages(&self, message_ids: &[i64]) -> Result<Vec<ReplyRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, message_id, reply_content, reply_at FROM replies WHERE message_id IN ({}) ORDER BY reply_at ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReplyRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        reply_content: row.get(2)?,
                        reply_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Members --

    pub fn add_member(&self, telegram_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO members (telegram_id) VALUES (?1)",
                [telegram_id],
            )?;
            Ok(())
        })
    }

    pub fn member_exists(&self, telegram_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT telegram_id FROM members WHERE telegram_id = ?1",
                    [telegram_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn query_messages_for_user(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, created_at FROM messages
         WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![user_id, limit, offset], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
