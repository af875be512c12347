//! Client library for Hearsay: message log access, chat list
//! reconciliation and realtime delivery over the server's socket protocol.
//!
//! The entry point is [`session::ChatSession`], which composes a message
//! log ([`log::RemoteLog`] against a server, or [`log::LocalLog`] against
//! an embedded database), the reconciled chat list and the open window.

pub mod chat_list;
pub mod error;
pub mod log;
pub mod session;
pub mod window;

pub use chat_list::ChatListStore;
pub use error::{ClientError, Result};
pub use log::{LocalLog, MessageLog, RemoteLog};
pub use session::ChatSession;
pub use window::ChatWindow;
