//! The delivery hub: turns client events into server event fanout.
//!
//! New messages travel two channels at once. The room broadcast
//! (`getMessage`) reaches every other connection subscribed to the chat,
//! and a direct `updateChatList` reaches the receiver's registered
//! connection so their chat list moves even while the chat is closed.
//! Soft deletion is direct-only; there is no room broadcast for it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use hearsay_shared::protocol::{ClientEvent, ServerEvent};
use hearsay_shared::types::{ChatSummary, Message, UserId};

use crate::presence::{ConnectionId, PresenceRegistry};
use crate::rooms::RoomRegistry;

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    presence: PresenceRegistry,
    rooms: RoomRegistry,
}

/// Shared fanout state for all live socket connections.
#[derive(Clone, Default)]
pub struct Hub {
    state: Arc<RwLock<HubState>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection and its outbound channel.
    pub async fn attach(&self, conn: ConnectionId, tx: mpsc::UnboundedSender<ServerEvent>) {
        let mut state = self.state.write().await;
        state.connections.insert(conn, tx);
        debug!(
            conn = %conn,
            connections = state.connections.len(),
            "connection attached"
        );
    }

    /// Tear down a closed connection: its presence entry, room
    /// subscriptions and outbound channel all go.
    pub async fn detach(&self, conn: ConnectionId) {
        let mut state = self.state.write().await;
        state.connections.remove(&conn);
        state.rooms.leave_all(conn);
        if let Some(user) = state.presence.release(conn) {
            info!(conn = %conn, user = %user, "user went offline");
        }
        debug!(
            conn = %conn,
            connections = state.connections.len(),
            "connection detached"
        );
    }

    /// Apply one decoded client event arriving on `conn`.
    pub async fn handle_event(&self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Identify(user) => {
                let mut state = self.state.write().await;
                if state.presence.register(user.clone(), conn) {
                    info!(
                        user = %user,
                        conn = %conn,
                        online = state.presence.online_count(),
                        "user identified"
                    );
                } else {
                    debug!(user = %user, conn = %conn, "duplicate identify ignored");
                }
            }
            ClientEvent::JoinRoom(chat) => {
                let mut state = self.state.write().await;
                state.rooms.join(conn, chat.clone());
                debug!(conn = %conn, chat = %chat, "joined room");
            }
            ClientEvent::LeaveRoom(chat) => {
                let mut state = self.state.write().await;
                state.rooms.leave(conn, &chat);
                debug!(conn = %conn, chat = %chat, "left room");
            }
            ClientEvent::MessageSent { receiver_id, data } => {
                self.dispatch_message(conn, receiver_id, data).await;
            }
            ClientEvent::DeleteMessages {
                receiver_id,
                chat_id,
                message_ids,
                new_last_message,
            } => {
                // No room broadcast here: deletion reaches the counterpart
                // only through the direct chat-list channel.
                let state = self.state.read().await;
                send_direct(
                    &state,
                    &receiver_id,
                    ServerEvent::MessagesSoftDeleted {
                        chat_id,
                        message_ids,
                        new_last_message,
                    },
                );
            }
            ClientEvent::SessionEnd => {
                // Logout is a full teardown. Dropping the outbound sender
                // ends the writer task, which closes the socket; the
                // close-path detach then finds nothing left to release.
                let mut state = self.state.write().await;
                state.connections.remove(&conn);
                state.rooms.leave_all(conn);
                if let Some(user) = state.presence.release(conn) {
                    info!(user = %user, conn = %conn, "session ended");
                }
            }
        }
    }

    async fn dispatch_message(&self, sender: ConnectionId, receiver: UserId, data: Message) {
        let state = self.state.read().await;

        // Channel one: broadcast to everyone else in the chat's room.
        for member in state.rooms.members(&data.chat_id) {
            if member == sender {
                continue;
            }
            if let Some(tx) = state.connections.get(&member) {
                if tx.send(ServerEvent::GetMessage(data.clone())).is_err() {
                    debug!(conn = %member, "dropping broadcast for closed connection");
                }
            }
        }

        // Channel two: direct nudge to the receiver's chat list.
        send_direct(&state, &receiver, ServerEvent::UpdateChatList(data));
    }

    /// Push `newChat` to a recipient's connection, if they are online.
    pub async fn notify_new_chat(&self, recipient: &UserId, summary: ChatSummary) {
        let state = self.state.read().await;
        send_direct(&state, recipient, ServerEvent::NewChat(summary));
    }
}

/// Deliver a direct event to the recipient's registered connection.
/// Offline recipients are skipped; the durable store catches them up.
fn send_direct(state: &HubState, user: &UserId, event: ServerEvent) {
    let Some(conn) = state.presence.lookup(user) else {
        debug!(user = %user, "recipient offline, skipping direct event");
        return;
    };
    if let Some(tx) = state.connections.get(&conn) {
        if tx.send(event).is_err() {
            debug!(conn = %conn, "dropping direct event for closed connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hearsay_shared::types::{ChatId, MessageId};

    fn message(chat: &ChatId, author: &UserId, text: &str) -> Message {
        Message {
            id: MessageId::new(),
            chat_id: chat.clone(),
            user_id: author.clone(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    async fn attach_client(hub: &Hub) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.attach(conn, tx).await;
        (conn, rx)
    }

    #[tokio::test]
    async fn message_reaches_room_and_chat_list() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let chat = ChatId::new();

        let (ac, mut arx) = attach_client(&hub).await;
        let (bc, mut brx) = attach_client(&hub).await;

        hub.handle_event(ac, ClientEvent::Identify(alice.clone())).await;
        hub.handle_event(bc, ClientEvent::Identify(bob.clone())).await;
        hub.handle_event(ac, ClientEvent::JoinRoom(chat.clone())).await;
        hub.handle_event(bc, ClientEvent::JoinRoom(chat.clone())).await;

        let msg = message(&chat, &alice, "hello");
        hub.handle_event(
            ac,
            ClientEvent::MessageSent {
                receiver_id: bob.clone(),
                data: msg.clone(),
            },
        )
        .await;

        // Bob hears it twice: once via the room, once directly.
        assert_eq!(brx.try_recv().unwrap(), ServerEvent::GetMessage(msg.clone()));
        assert_eq!(brx.try_recv().unwrap(), ServerEvent::UpdateChatList(msg));
        // The sender hears nothing back.
        assert!(arx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_receiver_still_broadcast_to_room() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let carol = UserId::new();
        let chat = ChatId::new();

        let (ac, _arx) = attach_client(&hub).await;
        let (cc, mut crx) = attach_client(&hub).await;

        hub.handle_event(ac, ClientEvent::Identify(alice.clone())).await;
        hub.handle_event(cc, ClientEvent::Identify(carol)).await;
        hub.handle_event(ac, ClientEvent::JoinRoom(chat.clone())).await;
        hub.handle_event(cc, ClientEvent::JoinRoom(chat.clone())).await;

        // Bob never connected. Dispatch must not fail, and the room
        // fanout still happens.
        let msg = message(&chat, &alice, "anyone here?");
        hub.handle_event(
            ac,
            ClientEvent::MessageSent {
                receiver_id: bob,
                data: msg.clone(),
            },
        )
        .await;

        assert_eq!(crx.try_recv().unwrap(), ServerEvent::GetMessage(msg));
        assert!(crx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deletion_is_never_broadcast() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let carol = UserId::new();
        let chat = ChatId::new();

        let (ac, _arx) = attach_client(&hub).await;
        let (bc, mut brx) = attach_client(&hub).await;
        let (cc, mut crx) = attach_client(&hub).await;

        hub.handle_event(ac, ClientEvent::Identify(alice)).await;
        hub.handle_event(bc, ClientEvent::Identify(bob.clone())).await;
        hub.handle_event(cc, ClientEvent::Identify(carol)).await;
        for conn in [ac, bc, cc] {
            hub.handle_event(conn, ClientEvent::JoinRoom(chat.clone())).await;
        }

        let ids = vec![MessageId::new()];
        hub.handle_event(
            ac,
            ClientEvent::DeleteMessages {
                receiver_id: bob,
                chat_id: chat.clone(),
                message_ids: ids.clone(),
                new_last_message: "Chat started".to_string(),
            },
        )
        .await;

        // Only the named receiver learns of the deletion.
        assert_eq!(
            brx.try_recv().unwrap(),
            ServerEvent::MessagesSoftDeleted {
                chat_id: chat,
                message_ids: ids,
                new_last_message: "Chat started".to_string(),
            }
        );
        assert!(crx.try_recv().is_err());
    }

    #[tokio::test]
    async fn direct_events_go_to_the_first_registration() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let chat = ChatId::new();

        let (first, mut first_rx) = attach_client(&hub).await;
        let (second, mut second_rx) = attach_client(&hub).await;
        let (bc, _brx) = attach_client(&hub).await;

        hub.handle_event(first, ClientEvent::Identify(alice.clone())).await;
        hub.handle_event(second, ClientEvent::Identify(alice.clone())).await;
        hub.handle_event(bc, ClientEvent::Identify(bob.clone())).await;

        let msg = message(&chat, &bob, "which tab?");
        hub.handle_event(
            bc,
            ClientEvent::MessageSent {
                receiver_id: alice,
                data: msg.clone(),
            },
        )
        .await;

        assert_eq!(first_rx.try_recv().unwrap(), ServerEvent::UpdateChatList(msg));
        assert!(second_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn session_end_tears_down_the_connection() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let chat = ChatId::new();

        let (ac, mut arx) = attach_client(&hub).await;
        let (bc, _brx) = attach_client(&hub).await;

        hub.handle_event(ac, ClientEvent::Identify(alice.clone())).await;
        hub.handle_event(bc, ClientEvent::Identify(bob.clone())).await;
        hub.handle_event(ac, ClientEvent::JoinRoom(chat.clone())).await;
        hub.handle_event(bc, ClientEvent::JoinRoom(chat.clone())).await;

        hub.handle_event(ac, ClientEvent::SessionEnd).await;

        // Neither the room broadcast nor the direct nudge reaches a
        // logged-out connection.
        let msg = message(&chat, &bob, "still there?");
        hub.handle_event(
            bc,
            ClientEvent::MessageSent {
                receiver_id: alice.clone(),
                data: msg,
            },
        )
        .await;
        assert!(arx.try_recv().is_err());

        // A fresh connection can claim the freed presence slot.
        let (ac2, mut arx2) = attach_client(&hub).await;
        hub.handle_event(ac2, ClientEvent::Identify(alice.clone())).await;

        let msg = message(&chat, &bob, "welcome back");
        hub.handle_event(
            bc,
            ClientEvent::MessageSent {
                receiver_id: alice,
                data: msg.clone(),
            },
        )
        .await;
        assert_eq!(arx2.try_recv().unwrap(), ServerEvent::UpdateChatList(msg));
    }

    #[tokio::test]
    async fn detach_cleans_up_everything() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let chat = ChatId::new();

        let (ac, arx) = attach_client(&hub).await;
        let (bc, _brx) = attach_client(&hub).await;

        hub.handle_event(ac, ClientEvent::Identify(alice.clone())).await;
        hub.handle_event(bc, ClientEvent::Identify(bob.clone())).await;
        hub.handle_event(ac, ClientEvent::JoinRoom(chat.clone())).await;
        drop(arx);
        hub.detach(ac).await;

        // Alice can come back on a new connection.
        let (ac2, mut arx2) = attach_client(&hub).await;
        hub.handle_event(ac2, ClientEvent::Identify(alice.clone())).await;

        let msg = message(&chat, &bob, "welcome back");
        hub.handle_event(
            bc,
            ClientEvent::MessageSent {
                receiver_id: alice,
                data: msg.clone(),
            },
        )
        .await;

        assert_eq!(arx2.try_recv().unwrap(), ServerEvent::UpdateChatList(msg));
    }

    #[tokio::test]
    async fn new_chat_push_requires_presence() {
        let hub = Hub::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let (bc, mut brx) = attach_client(&hub).await;
        hub.handle_event(bc, ClientEvent::Identify(bob.clone())).await;

        let summary = ChatSummary {
            id: ChatId::new(),
            participants: vec![alice.clone(), bob.clone()],
            receiver: None,
            last_message: None,
            seen_by: vec![alice.clone()],
            unread_count: 0,
        };

        hub.notify_new_chat(&bob, summary.clone()).await;
        assert_eq!(brx.try_recv().unwrap(), ServerEvent::NewChat(summary.clone()));

        // Alice is offline; the push is skipped silently.
        hub.notify_new_chat(&alice, summary).await;
        assert!(brx.try_recv().is_err());
    }
}
