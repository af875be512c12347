//! # hearsay-store
//!
//! Durable chat storage for Hearsay, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for users, chats and
//! the message log.  Both the server and the client embed it; the server
//! is the source of truth, the client keeps a local mirror for offline
//! reads.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
