/// Application name
pub const APP_NAME: &str = "Hearsay";

/// Text a message is rewritten to when soft-deleted. Clients detect
/// deletion by comparing against this exact string.
pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";

/// Last-message snippet for a chat whose messages are all deleted (or a
/// chat with no messages yet).
pub const CHAT_STARTED_TEXT: &str = "Chat started";

/// Maximum message text length in bytes (64 KiB)
pub const MAX_MESSAGE_LEN: usize = 65_536;

/// Default HTTP API + WebSocket port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
