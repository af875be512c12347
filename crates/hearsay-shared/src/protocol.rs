use serde::{Deserialize, Serialize};

use crate::types::{ChatId, ChatSummary, Message, MessageId, UserId};

/// Events a client may send over its socket.
///
/// JSON text frames, adjacently tagged: `{"event": "...", "data": ...}`.
/// Unknown tags are a decode error at the boundary, never a silent drop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to a user identity. First registration wins:
    /// a later identify for an already-registered user is ignored.
    Identify(UserId),

    /// Subscribe this connection to a chat's broadcast fanout.
    JoinRoom(ChatId),

    /// Unsubscribe this connection from a chat's broadcast fanout.
    LeaveRoom(ChatId),

    /// A message was persisted by the sender; relay it to the room and
    /// nudge the receiver's chat list.
    #[serde(rename_all = "camelCase")]
    MessageSent {
        receiver_id: UserId,
        data: Message,
    },

    /// Messages were soft-deleted by the sender; notify the receiver
    /// directly. Deliberately not broadcast to the room.
    #[serde(rename_all = "camelCase")]
    DeleteMessages {
        receiver_id: UserId,
        chat_id: ChatId,
        message_ids: Vec<MessageId>,
        new_last_message: String,
    },

    /// Explicit logout. Releases the presence entry without waiting for
    /// the transport to notice the close.
    SessionEnd,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// New message, fanned out to every other connection in the chat room.
    GetMessage(Message),

    /// New message, delivered directly to the receiver's connection so the
    /// chat list updates even with the chat closed.
    UpdateChatList(Message),

    /// Soft deletion notice, delivered directly to the receiver only.
    #[serde(rename_all = "camelCase")]
    MessagesSoftDeleted {
        chat_id: ChatId,
        message_ids: Vec<MessageId>,
        new_last_message: String,
    },

    /// A chat was just created with the recipient as a participant.
    NewChat(ChatSummary),
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
