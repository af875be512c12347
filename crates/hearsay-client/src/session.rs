//! A logged-in chat session.
//!
//! Composes the message log, the reconciled chat list and the open window,
//! plus the realtime channel that keeps them in sync. Every mutating action
//! persists through the log first; only on success does local state change
//! and a socket event go out, so the cache never gets ahead of the log.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use hearsay_shared::protocol::{ClientEvent, ServerEvent};
use hearsay_shared::types::{ChatId, MessageId, UserId};

use crate::chat_list::ChatListStore;
use crate::error::{ClientError, Result};
use crate::log::MessageLog;
use crate::window::ChatWindow;

pub struct ChatSession {
    user: UserId,
    log: Box<dyn MessageLog>,
    chat_list: ChatListStore,
    window: Option<ChatWindow>,
    outbound: Option<mpsc::UnboundedSender<ClientEvent>>,
}

impl ChatSession {
    pub fn new(user: UserId, log: Box<dyn MessageLog>) -> Self {
        let chat_list = ChatListStore::new(user.clone());
        Self {
            user,
            log,
            chat_list,
            window: None,
            outbound: None,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn chat_list(&self) -> &ChatListStore {
        &self.chat_list
    }

    pub fn window(&self) -> Option<&ChatWindow> {
        self.window.as_ref()
    }

    /// Dials the server's socket endpoint, announces the local identity and
    /// returns the stream of decoded server events for the caller to pump
    /// into [`ChatSession::apply_event`]. Malformed frames are logged and
    /// skipped; the stream ends when either side closes.
    pub async fn connect(&mut self, url: &str) -> Result<mpsc::UnboundedReceiver<ServerEvent>> {
        let (socket, _) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientEvent>();
        tokio::spawn(async move {
            while let Some(event) = out_rx.recv().await {
                let frame = match event.to_json() {
                    Ok(text) => WsMessage::Text(text),
                    Err(err) => {
                        warn!("dropping unencodable event: {err}");
                        continue;
                    }
                };
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerEvent>();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!("socket read failed: {err}");
                        break;
                    }
                };
                match frame {
                    WsMessage::Text(text) => match ServerEvent::from_json(&text) {
                        Ok(event) => {
                            if in_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!("dropping malformed frame: {err}"),
                    },
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        });

        self.outbound = Some(out_tx);
        self.emit(ClientEvent::Identify(self.user.clone()));
        Ok(in_rx)
    }

    /// Best-effort send on the realtime channel. With no socket attached the
    /// event is dropped: persisted state already carries the change, so a
    /// missed event is a staleness risk, not a correctness one.
    fn emit(&self, event: ClientEvent) {
        let Some(tx) = &self.outbound else {
            debug!(?event, "no socket attached, dropping event");
            return;
        };
        if tx.send(event).is_err() {
            debug!("socket writer is gone");
        }
    }

    /// Reloads the chat list from the log.
    pub async fn load_chats(&mut self) -> Result<()> {
        let chats = self.log.list_chats().await?;
        self.chat_list.load_chats(chats);
        Ok(())
    }

    /// Starts a chat with another user. The server pushes the new chat to
    /// the counterpart; our own list is reloaded from the log so the chat
    /// shows up without counting as unread.
    pub async fn create_chat(&mut self, receiver: &UserId) -> Result<ChatId> {
        let chat = self.log.create_chat(receiver).await?;
        self.load_chats().await?;
        Ok(chat.id)
    }

    /// Opens a chat window: history comes from the log (which marks the chat
    /// seen durably), the list entry is marked read locally and the room is
    /// joined for live updates. A previously open window is left first.
    pub async fn open_chat(&mut self, chat_id: &ChatId) -> Result<()> {
        if let Some(window) = &self.window {
            if window.chat_id() != chat_id {
                self.emit(ClientEvent::LeaveRoom(window.chat_id().clone()));
            }
        }

        let history = self.log.fetch_chat(chat_id).await?;
        self.chat_list.mark_as_read(chat_id);
        let counterpart = self.chat_list.get(chat_id).and_then(|c| c.receiver.clone());
        self.window = Some(ChatWindow::new(self.user.clone(), history, counterpart));
        self.chat_list.set_open_chat(chat_id.clone());
        self.emit(ClientEvent::JoinRoom(chat_id.clone()));
        Ok(())
    }

    pub fn close_chat(&mut self) {
        if let Some(window) = self.window.take() {
            self.emit(ClientEvent::LeaveRoom(window.chat_id().clone()));
        }
        self.chat_list.clear_open_chat();
    }

    /// Sends a message in the open chat: persist, then append to the window,
    /// refresh the list entry and notify the counterpart. Empty text is
    /// dropped before it reaches the log.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let Some(window) = &self.window else {
            return Err(ClientError::NoOpenChat);
        };
        let chat_id = window.chat_id().clone();
        let receiver_id = window.counterpart_id().clone();

        let message = self.log.append_message(&chat_id, text).await?;

        if let Some(window) = self.window.as_mut() {
            window.append(message.clone());
        }
        self.chat_list.update_chat(&chat_id, text, true);
        self.emit(ClientEvent::MessageSent {
            receiver_id,
            data: message,
        });
        Ok(())
    }

    /// Toggles a message in the open window's delete selection.
    pub fn toggle_select(&mut self, message_id: &MessageId) {
        if let Some(window) = self.window.as_mut() {
            window.toggle_select(message_id);
        }
    }

    /// Soft-deletes the selected messages, all or nothing: the log call must
    /// succeed before the window text is rewritten, the list entry updated
    /// and the counterpart notified. An empty selection is a no-op.
    pub async fn delete_selected(&mut self) -> Result<()> {
        let Some(window) = &self.window else {
            return Err(ClientError::NoOpenChat);
        };
        let message_ids = window.selected();
        if message_ids.is_empty() {
            return Ok(());
        }
        let chat_id = window.chat_id().clone();
        let receiver_id = window.counterpart_id().clone();

        let new_last_message = self
            .log
            .soft_delete_messages(&chat_id, &message_ids)
            .await?;

        if let Some(window) = self.window.as_mut() {
            window.apply_soft_delete(&message_ids);
            window.clear_selection();
        }
        self.chat_list
            .update_chat(&chat_id, &new_last_message, false);
        self.emit(ClientEvent::DeleteMessages {
            receiver_id,
            chat_id,
            message_ids,
            new_last_message,
        });
        Ok(())
    }

    /// Merges one pushed server event into local state.
    ///
    /// The room-broadcast and direct channels for the same logical message
    /// carry no relative ordering, so the two branches below are written to
    /// commute: whichever arrives second leaves the same list order, badge
    /// and seen state, and the window drops duplicate message identifiers.
    pub fn apply_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::GetMessage(message) => {
                self.chat_list
                    .update_chat(&message.chat_id, &message.text, false);
                if self.is_open(&message.chat_id) {
                    let chat_id = message.chat_id.clone();
                    if let Some(window) = self.window.as_mut() {
                        window.append(message);
                    }
                    self.chat_list.mark_as_read(&chat_id);
                }
            }
            ServerEvent::UpdateChatList(message) => {
                self.chat_list
                    .update_chat(&message.chat_id, &message.text, false);
                if self.is_open(&message.chat_id) {
                    self.chat_list.mark_as_read(&message.chat_id);
                } else {
                    self.chat_list.handle_new_notification(&message.chat_id);
                }
            }
            ServerEvent::NewChat(chat) => {
                self.chat_list.add_chat(chat);
            }
            ServerEvent::MessagesSoftDeleted {
                chat_id,
                message_ids,
                new_last_message,
            } => {
                self.chat_list
                    .update_chat(&chat_id, &new_last_message, false);
                if self.is_open(&chat_id) {
                    if let Some(window) = self.window.as_mut() {
                        window.apply_soft_delete(&message_ids);
                    }
                }
            }
        }
    }

    fn is_open(&self, chat_id: &ChatId) -> bool {
        self.chat_list.open_chat_id() == Some(chat_id)
    }

    /// Ends the session: the server tears the connection down on receipt,
    /// the local writer is dropped and the window goes away.
    pub fn logout(&mut self) {
        self.emit(ClientEvent::SessionEnd);
        self.outbound = None;
        self.window = None;
        self.chat_list.clear_open_chat();
    }
}
