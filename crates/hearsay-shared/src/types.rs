use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity. Issued by the account layer; opaque here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single chat message.
///
/// The same shape is used for the durable record and for delivery payloads.
/// Soft deletion rewrites `text` to
/// [`DELETED_MESSAGE_TEXT`](crate::constants::DELETED_MESSAGE_TEXT) in place;
/// id, chat, author and timestamp always survive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    /// The chat this message belongs to.
    pub chat_id: ChatId,
    /// Identity of the author.
    pub user_id: UserId,
    /// Message body, or the deletion sentinel once soft-deleted.
    pub text: String,
    /// When the message was created (server clock).
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message has been soft-deleted. Deletion is carried in
    /// the text itself, not in a separate flag.
    pub fn is_deleted(&self) -> bool {
        self.text == crate::constants::DELETED_MESSAGE_TEXT
    }
}

/// Minimal public profile, used for counterpart display info in chat lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// One row of the chat list as a client sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: ChatId,
    /// Participant identities, in creation order.
    pub participants: Vec<UserId>,
    /// Display info for the other party, resolved per viewer.
    pub receiver: Option<UserProfile>,
    /// Snippet of the most recent message, if any.
    pub last_message: Option<String>,
    /// Identities that have viewed the latest state. Set semantics.
    pub seen_by: Vec<UserId>,
    /// Unseen-message count. Client-local, never persisted; payloads that
    /// omit it deserialize to zero.
    #[serde(default)]
    pub unread_count: u32,
}

/// Full message history for one chat, as returned by a chat fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub id: ChatId,
    pub messages: Vec<Message>,
    pub participants: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_flag_follows_sentinel_text() {
        let mut m = Message {
            id: MessageId::new(),
            chat_id: ChatId::new(),
            user_id: UserId::new(),
            text: "hello".to_string(),
            created_at: Utc::now(),
        };
        assert!(!m.is_deleted());
        m.text = crate::constants::DELETED_MESSAGE_TEXT.to_string();
        assert!(m.is_deleted());
    }

    #[test]
    fn unread_count_defaults_to_zero() {
        let json = format!(
            r#"{{"id":"{}","participants":[],"receiver":null,"lastMessage":null,"seenBy":[]}}"#,
            Uuid::new_v4()
        );
        let summary: ChatSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary.unread_count, 0);
    }
}
