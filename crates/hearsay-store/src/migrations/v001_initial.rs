//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `chats`, and `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    display_name TEXT,
    avatar       TEXT,                        -- URL or data URI
    created_at   TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    participants TEXT NOT NULL,               -- JSON array of user UUIDs
    last_message TEXT,                        -- snippet; NULL until first message
    seen_by      TEXT NOT NULL,               -- JSON array of user UUIDs
    created_at   TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    chat_id    TEXT NOT NULL,                 -- FK -> chats(id)
    user_id    TEXT NOT NULL,                 -- author UUID
    text       TEXT NOT NULL,                 -- body, or the deletion sentinel
    created_at TEXT NOT NULL,                 -- ISO-8601

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
