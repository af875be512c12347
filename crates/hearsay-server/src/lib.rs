//! Server internals, exposed as a library so integration tests can run the
//! router in-process. The `hearsay-server` binary is a thin wrapper around
//! these modules.

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod presence;
pub mod rooms;
pub mod ws;
