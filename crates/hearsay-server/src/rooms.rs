//! Room membership: which connections receive a chat's broadcasts.
//!
//! Membership is connection-local and transient. It says nothing about who
//! participates in a chat durably; it only scopes the `getMessage` fanout
//! to connections currently looking at (or subscribed to) that chat.

use std::collections::{HashMap, HashSet};

use hearsay_shared::types::ChatId;

use crate::presence::ConnectionId;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<ChatId, HashSet<ConnectionId>>,
    // Reverse index so a closing connection can leave everything cheaply.
    joined: HashMap<ConnectionId, HashSet<ChatId>>,
}

impl RoomRegistry {
    /// Subscribe a connection to a room. Creates the room on first join;
    /// joining twice is a no-op.
    pub fn join(&mut self, conn: ConnectionId, chat: ChatId) {
        self.rooms.entry(chat.clone()).or_default().insert(conn);
        self.joined.entry(conn).or_default().insert(chat);
    }

    /// Unsubscribe a connection from a room. Empty rooms are removed.
    pub fn leave(&mut self, conn: ConnectionId, chat: &ChatId) {
        if let Some(members) = self.rooms.get_mut(chat) {
            members.remove(&conn);
            if members.is_empty() {
                self.rooms.remove(chat);
            }
        }
        if let Some(chats) = self.joined.get_mut(&conn) {
            chats.remove(chat);
            if chats.is_empty() {
                self.joined.remove(&conn);
            }
        }
    }

    /// Remove a connection from every room it joined.
    pub fn leave_all(&mut self, conn: ConnectionId) {
        let Some(chats) = self.joined.remove(&conn) else {
            return;
        };
        for chat in chats {
            if let Some(members) = self.rooms.get_mut(&chat) {
                members.remove(&conn);
                if members.is_empty() {
                    self.rooms.remove(&chat);
                }
            }
        }
    }

    /// Snapshot of a room's current members.
    pub fn members(&self, chat: &ChatId) -> Vec<ConnectionId> {
        self.rooms
            .get(chat)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave() {
        let mut rooms = RoomRegistry::default();
        let chat = ChatId::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        rooms.join(c1, chat.clone());
        rooms.join(c2, chat.clone());
        rooms.join(c2, chat.clone());

        let mut members = rooms.members(&chat);
        members.sort_by_key(|c| c.0);
        let mut expected = vec![c1, c2];
        expected.sort_by_key(|c| c.0);
        assert_eq!(members, expected);

        rooms.leave(c1, &chat);
        assert_eq!(rooms.members(&chat), vec![c2]);
    }

    #[test]
    fn empty_rooms_are_removed() {
        let mut rooms = RoomRegistry::default();
        let chat = ChatId::new();
        let c1 = ConnectionId::new();

        rooms.join(c1, chat.clone());
        assert_eq!(rooms.room_count(), 1);

        rooms.leave(c1, &chat);
        assert_eq!(rooms.room_count(), 0);
        assert!(rooms.members(&chat).is_empty());
    }

    #[test]
    fn leave_all_clears_both_indexes() {
        let mut rooms = RoomRegistry::default();
        let a = ChatId::new();
        let b = ChatId::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        rooms.join(c1, a.clone());
        rooms.join(c1, b.clone());
        rooms.join(c2, a.clone());

        rooms.leave_all(c1);

        assert_eq!(rooms.members(&a), vec![c2]);
        assert!(rooms.members(&b).is_empty());
        assert_eq!(rooms.room_count(), 1);
    }

    #[test]
    fn leaving_a_room_never_joined_is_harmless() {
        let mut rooms = RoomRegistry::default();
        let chat = ChatId::new();
        let c1 = ConnectionId::new();

        rooms.leave(c1, &chat);
        rooms.leave_all(c1);
        assert_eq!(rooms.room_count(), 0);
    }
}
