//! Connection transport boundary.
//!
//! The messaging core only needs two things from a connection: a way to
//! [`send`](Transport::send) a [`Frame`], and a stream of
//! [`TransportEvent`]s fed into the [`Hub`](crate::hub::Hub). How frames
//! reach the server is the transport's business.
//!
//! ```text
//! ┌────────────┐  TransportEvent   ┌─────┐  callbacks  ┌──────────────┐
//! │ transport  │ ────────────────▶ │ Hub │ ──────────▶ │ subscriptions│
//! │ (ws, mem)  │ ◀──────────────── │     │ ◀────────── │ fire handles │
//! └────────────┘      Frame        └─────┘   Frame     └──────────────┘
//! ```
//!
//! # Wire format
//!
//! One JSON text message per frame:
//!
//! ```json
//! {"kind": "snapshot", "topic": "notepad", "payload": [{"content": "hi"}]}
//! ```
//!
//! `subscribe` frames go client to server with a `null` payload and ask the
//! server to answer with one `snapshot` frame (a JSON array). `message`
//! frames carry a single value in either direction.

pub mod memory;
#[cfg(feature = "ws")]
pub mod ws;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::protocol::Topic;

pub use memory::MemoryTransport;
#[cfg(feature = "ws")]
pub use ws::WsTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Subscribe,
    Snapshot,
    Message,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub topic: Topic,
    pub payload: Value,
}

#[derive(Serialize)]
struct WireFrameRef<'a> {
    kind: FrameKind,
    topic: &'a str,
    payload: &'a Value,
}

#[derive(Deserialize)]
struct WireFrame {
    kind: FrameKind,
    topic: String,
    #[serde(default)]
    payload: Value,
}

impl Frame {
    pub fn subscribe(topic: Topic) -> Self {
        Self {
            kind: FrameKind::Subscribe,
            topic,
            payload: Value::Null,
        }
    }

    pub fn snapshot(topic: Topic, items: Vec<Value>) -> Self {
        Self {
            kind: FrameKind::Snapshot,
            topic,
            payload: Value::Array(items),
        }
    }

    pub fn message(topic: Topic, payload: Value) -> Self {
        Self {
            kind: FrameKind::Message,
            topic,
            payload,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let wire = WireFrameRef {
            kind: self.kind,
            topic: self.topic.name(),
            payload: &self.payload,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// - `Error::Json`: malformed frame
    /// - `Error::UnknownTopic`: topic not in the registry
    pub fn decode(text: &str) -> Result<Self> {
        let wire: WireFrame = serde_json::from_str(text)?;
        let topic = Topic::from_name(&wire.topic)?;
        Ok(Self {
            kind: wire.kind,
            topic,
            payload: wire.payload,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server closed the connection.
    Closed { code: Option<u16> },
    /// The socket failed.
    Failed(String),
    /// The local side shut the transport down.
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Closed { code: Some(code) } => write!(f, "closed (code: {code})"),
            DisconnectReason::Closed { code: None } => write!(f, "closed"),
            DisconnectReason::Failed(msg) => write!(f, "failed: {msg}"),
            DisconnectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// What a transport reports to the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected(DisconnectReason),
    Frame(Frame),
}

/// Outbound half of a connection.
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Hands a frame to the connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::Disconnected` when the connection is down. Callers on
    /// the publish path treat this as a dropped delivery.
    fn send(&self, frame: Frame) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn encode_uses_wire_names() {
        let frame = Frame::message(Topic::ChangeNotepad, json!({"content": "x"}));
        let text = frame.encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"kind": "message", "topic": "change-notepad", "payload": {"content": "x"}})
        );
    }

    #[test]
    fn decode_snapshot() {
        let frame =
            Frame::decode(r#"{"kind":"snapshot","topic":"notepad","payload":[]}"#).unwrap();
        assert_eq!(frame, Frame::snapshot(Topic::Notepad, vec![]));
    }

    #[test]
    fn decode_without_payload_is_null() {
        let frame = Frame::decode(r#"{"kind":"subscribe","topic":"position"}"#).unwrap();
        assert_eq!(frame, Frame::subscribe(Topic::Position));
    }

    #[test]
    fn decode_unknown_topic() {
        let err = Frame::decode(r#"{"kind":"message","topic":"bogus","payload":1}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownTopic(ref name) if name == "bogus"));
    }

    #[test]
    fn decode_garbage() {
        assert!(matches!(Frame::decode("not json"), Err(Error::Json(_))));
    }
}
