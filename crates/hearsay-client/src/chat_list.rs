//! Chat list reconciliation.
//!
//! The list is a lossy cache over the server's chat summaries: HTTP fetches
//! replace it wholesale, pushed socket events patch it in place. Pushes from
//! the room-broadcast and direct channels carry no relative ordering, so the
//! reducers here only ever converge state (rewrite, union, recompute) rather
//! than assume an arrival order.

use hearsay_shared::types::{ChatId, ChatSummary, UserId};

/// The local user's chat list plus the global unread badge.
///
/// Most-recent-first is the only ordering rule: whichever chat changed last
/// sits at the front, with no secondary key. The badge is a display counter,
/// not a source of truth; it is recomputed or nudged by the reducers below
/// and restarts from scratch on every full reload.
#[derive(Debug)]
pub struct ChatListStore {
    user: UserId,
    chats: Vec<ChatSummary>,
    open_chat_id: Option<ChatId>,
    badge: u32,
}

impl ChatListStore {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            chats: Vec::new(),
            open_chat_id: None,
            badge: 0,
        }
    }

    /// Replaces the whole list with a fresh fetch.
    ///
    /// The badge restarts from the fetched state: every chat the local user
    /// has not seen contributes its `unread_count`, or one when the count is
    /// zero (the chat is unseen but nothing tracked how many messages are
    /// pending).
    pub fn load_chats(&mut self, chats: Vec<ChatSummary>) {
        self.badge = chats
            .iter()
            .filter(|c| !c.seen_by.contains(&self.user))
            .map(|c| if c.unread_count > 0 { c.unread_count } else { 1 })
            .sum();
        self.chats = chats;
    }

    /// Inserts a pushed chat at the front and bumps the badge by one.
    /// A chat already in the list is dropped wholesale, badge included.
    pub fn add_chat(&mut self, chat: ChatSummary) {
        if self.chats.iter().any(|c| c.id == chat.id) {
            return;
        }
        self.chats.insert(0, chat);
        self.badge += 1;
    }

    /// Rewrites a chat's last message and moves it to the front.
    ///
    /// `is_sender` decides who has seen the new state: exactly the local
    /// user, or nobody at all. Either way the previous `seen_by` set is
    /// discarded, which is the right call for a two-party chat. Unknown
    /// chats are ignored; brand-new chats arrive through `add_chat`, never
    /// through here. Unread counts and the badge are untouched.
    pub fn update_chat(&mut self, chat_id: &ChatId, last_message: &str, is_sender: bool) {
        let Some(pos) = self.chats.iter().position(|c| &c.id == chat_id) else {
            return;
        };
        let mut chat = self.chats.remove(pos);
        chat.last_message = Some(last_message.to_owned());
        chat.seen_by = if is_sender {
            vec![self.user.clone()]
        } else {
            Vec::new()
        };
        self.chats.insert(0, chat);
    }

    /// Raises the unread count for one chat and the global badge.
    ///
    /// The local user is stripped from `seen_by` so a stale "seen" state
    /// cannot mask the new activity. The badge still rises when the chat is
    /// not in the list yet; its summary is expected to arrive separately.
    pub fn handle_new_notification(&mut self, chat_id: &ChatId) {
        if let Some(chat) = self.chats.iter_mut().find(|c| &c.id == chat_id) {
            chat.unread_count += 1;
            let user = self.user.clone();
            chat.seen_by.retain(|u| u != &user);
        }
        self.badge += 1;
    }

    /// Marks a chat as read by the local user.
    ///
    /// `seen_by` gains the local identity (other viewers are kept, unlike
    /// `update_chat`), the per-chat count resets, and the badge is
    /// recomputed as the sum of the remaining per-chat counts. A chat that
    /// is already read, or absent, is left alone.
    pub fn mark_as_read(&mut self, chat_id: &ChatId) {
        let user = self.user.clone();
        let Some(chat) = self.chats.iter_mut().find(|c| &c.id == chat_id) else {
            return;
        };
        let was_unread = !chat.seen_by.contains(&user) || chat.unread_count > 0;
        if !was_unread {
            return;
        }
        if !chat.seen_by.contains(&user) {
            chat.seen_by.push(user);
        }
        chat.unread_count = 0;
        self.badge = self.chats.iter().map(|c| c.unread_count).sum();
    }

    /// Records which chat the user is currently viewing. The socket layer
    /// consults this to suppress unread bumps for the visible chat.
    pub fn set_open_chat(&mut self, chat_id: ChatId) {
        self.open_chat_id = Some(chat_id);
    }

    pub fn clear_open_chat(&mut self) {
        self.open_chat_id = None;
    }

    pub fn open_chat_id(&self) -> Option<&ChatId> {
        self.open_chat_id.as_ref()
    }

    pub fn get(&self, chat_id: &ChatId) -> Option<&ChatSummary> {
        self.chats.iter().find(|c| &c.id == chat_id)
    }

    /// Chats in display order, most recently active first.
    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    pub fn badge(&self) -> u32 {
        self.badge
    }
}
