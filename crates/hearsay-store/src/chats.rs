//! CRUD operations for [`ChatRecord`] rows.
//!
//! `participants` and `seen_by` are stored as JSON arrays; membership
//! queries go through SQLite's `json_each`.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use hearsay_shared::types::{ChatId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatRecord;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a new two-party chat.
    ///
    /// The creator starts in `seen_by`; the counterpart has not viewed the
    /// chat yet. `last_message` stays NULL until the first message lands.
    pub fn create_chat(&self, creator: &UserId, counterpart: &UserId) -> Result<ChatRecord> {
        let chat = ChatRecord {
            id: ChatId::new(),
            participants: vec![creator.clone(), counterpart.clone()],
            last_message: None,
            seen_by: vec![creator.clone()],
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO chats (id, participants, last_message, seen_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chat.id.to_string(),
                serde_json::to_string(&chat.participants)?,
                chat.last_message,
                serde_json::to_string(&chat.seen_by)?,
                chat.created_at.to_rfc3339(),
            ],
        )?;

        Ok(chat)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chat by id.
    pub fn get_chat(&self, id: &ChatId) -> Result<ChatRecord> {
        self.conn()
            .query_row(
                "SELECT id, participants, last_message, seen_by, created_at
                 FROM chats
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_chat,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List every chat `user` participates in, newest first.
    pub fn list_chats_for_user(&self, user: &UserId) -> Result<Vec<ChatRecord>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.id, c.participants, c.last_message, c.seen_by, c.created_at
             FROM chats c
             WHERE EXISTS (
                 SELECT 1 FROM json_each(c.participants)
                 WHERE json_each.value = ?1
             )
             ORDER BY c.created_at DESC",
        )?;

        let rows = stmt.query_map(params![user.to_string()], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Record that `user` has viewed the latest state of a chat.
    ///
    /// Idempotent; `seen_by` keeps set semantics. Returns the updated
    /// record.
    pub fn mark_chat_seen(&self, chat_id: &ChatId, user: &UserId) -> Result<ChatRecord> {
        let mut chat = self.get_chat(chat_id)?;

        if !chat.seen_by.contains(user) {
            chat.seen_by.push(user.clone());
            self.conn().execute(
                "UPDATE chats SET seen_by = ?1 WHERE id = ?2",
                params![
                    serde_json::to_string(&chat.seen_by)?,
                    chat_id.to_string()
                ],
            )?;
        }

        Ok(chat)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ChatRecord`].
pub(crate) fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRecord> {
    let id_str: String = row.get(0)?;
    let participants_json: String = row.get(1)?;
    let last_message: Option<String> = row.get(2)?;
    let seen_by_json: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let participants: Vec<UserId> = serde_json::from_str(&participants_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let seen_by: Vec<UserId> = serde_json::from_str(&seen_by_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatRecord {
        id: ChatId(id),
        participants,
        last_message,
        seen_by,
        created_at,
    })
}
