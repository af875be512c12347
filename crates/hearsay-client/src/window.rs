//! The open chat window.

use std::collections::HashSet;

use hearsay_shared::constants::DELETED_MESSAGE_TEXT;
use hearsay_shared::types::{ChatHistory, ChatId, Message, MessageId, UserId, UserProfile};

/// Full message view of the chat the user is currently looking at.
///
/// At most one window exists per session, tracked separately from the chat
/// list so list reconciliation can stay summary-only. The window owns the
/// message order and the delete selection, nothing else.
#[derive(Debug)]
pub struct ChatWindow {
    chat_id: ChatId,
    viewer: UserId,
    counterpart_id: UserId,
    counterpart: Option<UserProfile>,
    messages: Vec<Message>,
    selection: HashSet<MessageId>,
}

impl ChatWindow {
    /// Builds a window from fetched history. The counterpart identity comes
    /// from the participant list; the display profile from the chat list
    /// entry, when one is known.
    pub fn new(viewer: UserId, history: ChatHistory, counterpart: Option<UserProfile>) -> Self {
        let counterpart_id = history
            .participants
            .iter()
            .find(|p| **p != viewer)
            .cloned()
            .or_else(|| counterpart.as_ref().map(|p| p.id.clone()))
            .unwrap_or_else(|| viewer.clone());

        Self {
            chat_id: history.id,
            viewer,
            counterpart_id,
            counterpart,
            messages: history.messages,
            selection: HashSet::new(),
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn counterpart_id(&self) -> &UserId {
        &self.counterpart_id
    }

    pub fn counterpart(&self) -> Option<&UserProfile> {
        self.counterpart.as_ref()
    }

    /// Messages in chat order, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Appends a live message. The same message can arrive on both delivery
    /// channels; duplicates are dropped by identifier.
    pub fn append(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            return;
        }
        self.messages.push(message);
    }

    /// Toggles a message in the delete selection. Only the viewer's own
    /// not-yet-deleted messages are selectable; anything else is ignored.
    pub fn toggle_select(&mut self, message_id: &MessageId) {
        let Some(message) = self.messages.iter().find(|m| &m.id == message_id) else {
            return;
        };
        if message.user_id != self.viewer || message.is_deleted() {
            return;
        }
        if !self.selection.remove(message_id) {
            self.selection.insert(message_id.clone());
        }
    }

    pub fn selected(&self) -> Vec<MessageId> {
        self.selection.iter().cloned().collect()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Rewrites the listed messages to the deletion sentinel, in place.
    /// Count and position never change; a deleted message stays visible as
    /// its sentinel. Affected identifiers fall out of the selection.
    pub fn apply_soft_delete(&mut self, message_ids: &[MessageId]) {
        for message in self.messages.iter_mut() {
            if message_ids.contains(&message.id) {
                message.text = DELETED_MESSAGE_TEXT.to_owned();
            }
        }
        self.selection.retain(|id| !message_ids.contains(id));
    }
}
