//! Domain model structs persisted in the local SQLite database.
//!
//! Message rows deserialize straight into the shared wire
//! [`Message`](hearsay_shared::types::Message) type; the record and the
//! delivery payload are identical by contract, so there is no separate row
//! struct for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hearsay_shared::types::{ChatId, UserId, UserProfile};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Optional human-readable display name.
    pub display_name: Option<String>,
    /// Optional avatar URL or data URI.
    pub avatar: Option<String>,
    /// Timestamp when this user was first seen / created locally.
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Project the record into the public profile shape used on the wire.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation between two (or more) participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRecord {
    /// Unique chat identifier.
    pub id: ChatId,
    /// Participant identities, in creation order.
    pub participants: Vec<UserId>,
    /// Snippet of the most recent message; `None` until the first message.
    pub last_message: Option<String>,
    /// Identities that have viewed the latest state of this chat.
    pub seen_by: Vec<UserId>,
    /// When the chat was created.
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    /// Whether `user` participates in this chat.
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// The counterpart of `viewer` in a two-party chat, if any.
    pub fn counterpart_of(&self, viewer: &UserId) -> Option<&UserId> {
        self.participants.iter().find(|p| *p != viewer)
    }
}
