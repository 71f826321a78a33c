/// Database row types — these map directly to SQLite rows.
/// Distinct from courier-types API models to keep the DB layer independent.

pub struct MessageRow {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub created_at: String,
}

pub struct ReplyRow {
    pub id: i64,
    pub message_id: i64,
    pub reply_content: String,
    pub reply_at: String,
}
