//! Durable message log access.
//!
//! Every mutating action in a session round-trips through a [`MessageLog`]
//! before any local state changes or any socket event goes out; the log is
//! the source of truth, the rest is cache. Two implementations: the server's
//! HTTP API for the hosted setup, and an embedded database for local use.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use hearsay_shared::types::{ChatHistory, ChatId, ChatSummary, Message, MessageId, UserId};
use hearsay_store::{ChatRecord, Database};

use crate::error::{ClientError, Result};

#[async_trait]
pub trait MessageLog: Send + Sync {
    /// All chats the user participates in, newest first.
    async fn list_chats(&self) -> Result<Vec<ChatSummary>>;

    /// Starts a chat with another user and returns the caller's view of it.
    async fn create_chat(&self, receiver: &UserId) -> Result<ChatSummary>;

    /// Full history of one chat. Marks the chat seen by the caller as a side
    /// effect. Fails with `NotFound` for non-participants.
    async fn fetch_chat(&self, chat_id: &ChatId) -> Result<ChatHistory>;

    /// Persists a message and returns it with its assigned identifier and
    /// timestamp.
    async fn append_message(&self, chat_id: &ChatId, text: &str) -> Result<Message>;

    /// Soft-deletes a batch of the caller's own messages, all or nothing.
    /// Returns the chat's new effective last message.
    async fn soft_delete_messages(
        &self,
        chat_id: &ChatId,
        message_ids: &[MessageId],
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Remote log over the server's HTTP API
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatBody<'a> {
    receiver_id: &'a UserId,
}

#[derive(Serialize)]
struct PostMessageBody<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SoftDeleteBody<'a> {
    chat_id: &'a ChatId,
    message_ids: &'a [MessageId],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SoftDeleteReply {
    new_last_message: String,
}

/// Message log backed by the server's HTTP API. The caller identity rides
/// along as the `x-user-id` header on every request.
pub struct RemoteLog {
    base_url: String,
    user: UserId,
    http: reqwest::Client,
}

impl RemoteLog {
    pub fn new(base_url: &str, user: UserId) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            user,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("x-user-id", self.user.to_string())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
            _ => Ok(response.error_for_status()?),
        }
    }
}

#[async_trait]
impl MessageLog for RemoteLog {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let response = self.request(reqwest::Method::GET, "/chats").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_chat(&self, receiver: &UserId) -> Result<ChatSummary> {
        let response = self
            .request(reqwest::Method::POST, "/chats")
            .json(&CreateChatBody {
                receiver_id: receiver,
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch_chat(&self, chat_id: &ChatId) -> Result<ChatHistory> {
        let response = self
            .request(reqwest::Method::GET, &format!("/chats/{chat_id}"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn append_message(&self, chat_id: &ChatId, text: &str) -> Result<Message> {
        let response = self
            .request(reqwest::Method::POST, &format!("/messages/{chat_id}"))
            .json(&PostMessageBody { text })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn soft_delete_messages(
        &self,
        chat_id: &ChatId,
        message_ids: &[MessageId],
    ) -> Result<String> {
        let response = self
            .request(reqwest::Method::PUT, "/messages/soft-delete")
            .json(&SoftDeleteBody {
                chat_id,
                message_ids,
            })
            .send()
            .await?;
        let reply: SoftDeleteReply = Self::check(response).await?.json().await?;
        Ok(reply.new_last_message)
    }
}

// ---------------------------------------------------------------------------
// Local log over an embedded database
// ---------------------------------------------------------------------------

/// Message log backed by a local database, for running without a server.
/// Chat summaries are projected the same way the server projects them, so a
/// session cannot tell the two apart.
pub struct LocalLog {
    db: Arc<Mutex<Database>>,
    user: UserId,
}

impl LocalLog {
    pub fn new(db: Arc<Mutex<Database>>, user: UserId) -> Self {
        Self { db, user }
    }
}

fn summarize(db: &Database, chat: ChatRecord, viewer: &UserId) -> ChatSummary {
    let receiver = chat
        .counterpart_of(viewer)
        .and_then(|other| db.get_user(other).ok())
        .map(|record| record.profile());

    ChatSummary {
        id: chat.id,
        participants: chat.participants,
        receiver,
        last_message: chat.last_message,
        seen_by: chat.seen_by,
        unread_count: 0,
    }
}

#[async_trait]
impl MessageLog for LocalLog {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let db = self.db.lock().await;
        let chats = db.list_chats_for_user(&self.user)?;
        Ok(chats
            .into_iter()
            .map(|chat| summarize(&db, chat, &self.user))
            .collect())
    }

    async fn create_chat(&self, receiver: &UserId) -> Result<ChatSummary> {
        let db = self.db.lock().await;
        let chat = db.create_chat(&self.user, receiver)?;
        Ok(summarize(&db, chat, &self.user))
    }

    async fn fetch_chat(&self, chat_id: &ChatId) -> Result<ChatHistory> {
        let db = self.db.lock().await;
        Ok(db.fetch_chat(chat_id, &self.user)?)
    }

    async fn append_message(&self, chat_id: &ChatId, text: &str) -> Result<Message> {
        let mut db = self.db.lock().await;
        Ok(db.append_message(chat_id, &self.user, text)?)
    }

    async fn soft_delete_messages(
        &self,
        chat_id: &ChatId,
        message_ids: &[MessageId],
    ) -> Result<String> {
        let mut db = self.db.lock().await;
        Ok(db.soft_delete_messages(chat_id, &self.user, message_ids)?)
    }
}
