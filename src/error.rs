use thiserror::Error;

use crate::protocol::{Access, Topic};

#[derive(Debug, Error)]
pub enum Error {
    /// A topic name outside the closed registry. Indicates a programming
    /// error on the caller's side or a server speaking another protocol.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    #[error("topic {topic:?} does not allow {access:?}")]
    WrongDirection { topic: Topic, access: Access },
    /// Raised only at the `Transport::send` seam; fire handles swallow it.
    #[error("transport disconnected")]
    Disconnected,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("websocket error: {0}")]
    WebSocket(String),
}

pub type Result<T> = std::result::Result<T, Error>;
