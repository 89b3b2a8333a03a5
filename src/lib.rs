//! Topic pub/sub client layer for the tribeca trading dashboard.
//!
//! The crate sits between a bidirectional connection to the trading engine
//! and the code that renders engine state:
//!
//! - [`protocol`]: the closed set of named topics and their payloads.
//! - [`hub::Hub`]: the single-context dispatcher all callbacks run on.
//! - [`subscriber`] / [`fire`]: typed subscribe and publish handles.
//! - [`pair::DisplayPair`]: everything scoped to the traded instrument.
//! - [`controller::ClientController`]: connection lifecycle and the one
//!   live `DisplayPair`.
//! - [`transport`]: in-memory and WebSocket links.

pub mod config;
pub mod controller;
pub mod error;
pub mod fire;
pub mod hub;
pub mod pair;
pub mod protocol;
pub mod subscriber;
pub mod transport;

pub use config::LinkConfig;
pub use controller::{ClientController, ConnectionState, OrderTicket};
pub use error::{Error, Result};
pub use fire::{Fire, FireFactory};
pub use hub::{Hub, SubscriptionId};
pub use pair::DisplayPair;
pub use protocol::{Topic, TopicSpec};
pub use subscriber::{SubscriberBuilder, SubscriberFactory, Subscription};
pub use transport::{DisconnectReason, Frame, FrameKind, MemoryTransport, Transport, TransportEvent};
