use hearsay_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Chat or message does not exist, or the caller is not a participant.
    #[error("not found")]
    NotFound,

    /// Caller tried to modify messages they did not author.
    #[error("forbidden")]
    Forbidden,

    /// No chat window is open for the attempted action.
    #[error("no open chat")]
    NoOpenChat,

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("encode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ClientError::NotFound,
            StoreError::Forbidden => ClientError::Forbidden,
            other => ClientError::Store(other),
        }
    }
}
