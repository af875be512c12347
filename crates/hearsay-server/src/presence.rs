//! The presence registry: which user is reachable over which connection.
//!
//! Direct notifications (`updateChatList`, `messagesSoftDeleted`, `newChat`)
//! are only ever sent to the connection registered here. A user with no
//! entry is simply skipped; delivery then relies on the durable store.

use std::collections::HashMap;

use uuid::Uuid;

use hearsay_shared::types::UserId;

/// Identifier for one live socket connection, assigned at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live user -> connection map with first-registration-wins semantics.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    by_user: HashMap<UserId, ConnectionId>,
}

impl PresenceRegistry {
    /// Register `user` on `conn`. Returns `false` when the user already
    /// holds an entry: the existing registration stays authoritative and
    /// the newcomer (second device, duplicate tab) never receives direct
    /// notifications.
    pub fn register(&mut self, user: UserId, conn: ConnectionId) -> bool {
        match self.by_user.entry(user) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(conn);
                true
            }
        }
    }

    /// Release whatever entry `conn` holds, returning the user it was
    /// registered for. A connection that lost the registration race holds
    /// nothing, so its departure leaves the winner untouched.
    pub fn release(&mut self, conn: ConnectionId) -> Option<UserId> {
        let user = self
            .by_user
            .iter()
            .find(|(_, c)| **c == conn)
            .map(|(u, _)| u.clone())?;
        self.by_user.remove(&user);
        Some(user)
    }

    /// Look up the connection a user is reachable on, if any.
    pub fn lookup(&self, user: &UserId) -> Option<ConnectionId> {
        self.by_user.get(user).copied()
    }

    pub fn online_count(&self) -> usize {
        self.by_user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_wins() {
        let mut presence = PresenceRegistry::default();
        let alice = UserId::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        assert!(presence.register(alice.clone(), first));
        assert!(!presence.register(alice.clone(), second));
        assert_eq!(presence.lookup(&alice), Some(first));
    }

    #[test]
    fn losing_connection_cannot_evict_the_winner() {
        let mut presence = PresenceRegistry::default();
        let alice = UserId::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        presence.register(alice.clone(), first);
        presence.register(alice.clone(), second);

        // The duplicate tab closes; the original entry must survive.
        assert_eq!(presence.release(second), None);
        assert_eq!(presence.lookup(&alice), Some(first));

        // Only the winner's departure frees the slot.
        assert_eq!(presence.release(first), Some(alice.clone()));
        assert_eq!(presence.lookup(&alice), None);
    }

    #[test]
    fn slot_is_reusable_after_release() {
        let mut presence = PresenceRegistry::default();
        let alice = UserId::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        presence.register(alice.clone(), first);
        presence.release(first);

        assert!(presence.register(alice.clone(), second));
        assert_eq!(presence.lookup(&alice), Some(second));
    }

    #[test]
    fn independent_users_do_not_interfere() {
        let mut presence = PresenceRegistry::default();
        let alice = UserId::new();
        let bob = UserId::new();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        assert!(presence.register(alice.clone(), c1));
        assert!(presence.register(bob.clone(), c2));
        assert_eq!(presence.online_count(), 2);

        presence.release(c1);
        assert_eq!(presence.lookup(&alice), None);
        assert_eq!(presence.lookup(&bob), Some(c2));
    }
}
