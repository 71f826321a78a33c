use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_user
            ON messages(user_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_content
            ON messages(content, user_id);

        CREATE TABLE IF NOT EXISTS replies (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id      INTEGER NOT NULL REFERENCES messages(id),
            reply_content   TEXT NOT NULL,
            reply_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_replies_message
            ON replies(message_id);

        -- Membership directory consulted by /verify. Ids are stored with
        -- their '@' prefix.
        CREATE TABLE IF NOT EXISTS members (
            telegram_id TEXT PRIMARY KEY
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
