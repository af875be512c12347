//! The message log: append, fetch, and soft deletion.
//!
//! Mutations that span multiple rows (a message insert plus the parent
//! chat's summary fields) run inside a single transaction so a crash can
//! never leave the chat summary disagreeing with the log.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use hearsay_shared::constants::{CHAT_STARTED_TEXT, DELETED_MESSAGE_TEXT};
use hearsay_shared::types::{ChatHistory, ChatId, Message, MessageId, UserId};

use crate::chats::row_to_chat;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatRecord;

impl Database {
    /// Append a message to a chat.
    ///
    /// The id and timestamp are assigned here, not by the caller. On
    /// success the parent chat's `last_message` becomes the new text and
    /// `seen_by` collapses to the author alone.
    ///
    /// A missing chat and a caller outside `participants` are both
    /// [`StoreError::NotFound`]; non-participants cannot tell whether a
    /// chat exists.
    pub fn append_message(
        &mut self,
        chat_id: &ChatId,
        author: &UserId,
        text: &str,
    ) -> Result<Message> {
        let tx = self.conn_mut().transaction()?;

        let chat = chat_in_tx(&tx, chat_id)?;
        if !chat.has_participant(author) {
            return Err(StoreError::NotFound);
        }

        let message = Message {
            id: MessageId::new(),
            chat_id: chat_id.clone(),
            user_id: author.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO messages (id, chat_id, user_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.chat_id.to_string(),
                message.user_id.to_string(),
                message.text,
                message.created_at.to_rfc3339(),
            ],
        )?;

        // A fresh message resets visibility to its author alone.
        tx.execute(
            "UPDATE chats SET last_message = ?1, seen_by = ?2 WHERE id = ?3",
            params![
                message.text,
                serde_json::to_string(&[author.clone()])?,
                chat_id.to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(message)
    }

    /// Fetch a chat's full history, oldest message first.
    ///
    /// Opening a chat counts as viewing it, so the caller is added to
    /// `seen_by` as a side effect.
    pub fn fetch_chat(&self, chat_id: &ChatId, caller: &UserId) -> Result<ChatHistory> {
        let chat = self.get_chat(chat_id)?;
        if !chat.has_participant(caller) {
            return Err(StoreError::NotFound);
        }

        self.mark_chat_seen(chat_id, caller)?;

        let mut stmt = self.conn().prepare(
            "SELECT id, chat_id, user_id, text, created_at
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![chat_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }

        Ok(ChatHistory {
            id: chat.id,
            messages,
            participants: chat.participants,
        })
    }

    /// Soft-delete a batch of the caller's own messages.
    ///
    /// Every target is validated before anything is touched: an unknown id
    /// (or one from a different chat) fails the whole batch with
    /// [`StoreError::NotFound`], another author's message with
    /// [`StoreError::Forbidden`]. Deleted messages keep their row and
    /// position; only the text is rewritten to the sentinel.
    ///
    /// Returns the chat's new effective last message: the newest surviving
    /// text, or the placeholder snippet once nothing survives.
    pub fn soft_delete_messages(
        &mut self,
        chat_id: &ChatId,
        caller: &UserId,
        message_ids: &[MessageId],
    ) -> Result<String> {
        let tx = self.conn_mut().transaction()?;

        let chat = chat_in_tx(&tx, chat_id)?;
        if !chat.has_participant(caller) {
            return Err(StoreError::NotFound);
        }

        for id in message_ids {
            let message = tx
                .query_row(
                    "SELECT id, chat_id, user_id, text, created_at
                     FROM messages
                     WHERE id = ?1",
                    params![id.to_string()],
                    row_to_message,
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                    other => StoreError::Sqlite(other),
                })?;

            if message.chat_id != *chat_id {
                return Err(StoreError::NotFound);
            }
            if message.user_id != *caller {
                return Err(StoreError::Forbidden);
            }
        }

        for id in message_ids {
            tx.execute(
                "UPDATE messages SET text = ?1 WHERE id = ?2",
                params![DELETED_MESSAGE_TEXT, id.to_string()],
            )?;
        }

        // Newest surviving message wins; a fully-deleted chat falls back
        // to the placeholder snippet.
        let survivor: Option<String> = tx
            .query_row(
                "SELECT text FROM messages
                 WHERE chat_id = ?1 AND text != ?2
                 ORDER BY created_at DESC
                 LIMIT 1",
                params![chat_id.to_string(), DELETED_MESSAGE_TEXT],
                |row| row.get(0),
            )
            .optional()?;

        let new_last = survivor.unwrap_or_else(|| CHAT_STARTED_TEXT.to_string());

        tx.execute(
            "UPDATE chats SET last_message = ?1 WHERE id = ?2",
            params![new_last, chat_id.to_string()],
        )?;

        tx.commit()?;
        Ok(new_last)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn chat_in_tx(tx: &Transaction<'_>, chat_id: &ChatId) -> Result<ChatRecord> {
    tx.query_row(
        "SELECT id, participants, last_message, seen_by, created_at
         FROM chats
         WHERE id = ?1",
        params![chat_id.to_string()],
        row_to_chat,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    })
}

/// Map a `rusqlite::Row` to a [`Message`].
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let chat_id_str: String = row.get(1)?;
    let user_id_str: String = row.get(2)?;
    let text: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let chat_id = uuid::Uuid::parse_str(&chat_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let user_id = uuid::Uuid::parse_str(&user_id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: MessageId(id),
        chat_id: ChatId(chat_id),
        user_id: UserId(user_id),
        text,
        created_at,
    })
}
