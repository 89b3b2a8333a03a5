//! Fire clients: one-shot, unacknowledged publishes.
//!
//! [`Fire::fire`] serializes the payload and hands it to the hub, which
//! writes it to the transport if the link is up. Publishing is best-effort
//! on purpose: while the link is down the message is dropped and logged at
//! `debug`, and the caller is never told. Control-plane commands from the
//! dashboard (cancel all, clean, notepad edits) are re-issued by the
//! operator if they matter, so the UI never waits on delivery.

use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::hub::Hub;
use crate::protocol::{Access, Publishable, Topic};
use crate::transport::Frame;

/// Hands out fire handles bound to one hub.
#[derive(Clone)]
pub struct FireFactory {
    hub: Rc<Hub>,
}

impl FireFactory {
    pub fn new(hub: &Rc<Hub>) -> Self {
        Self {
            hub: Rc::clone(hub),
        }
    }

    pub fn fire<T: Publishable>(&self) -> Fire<T::Payload> {
        Fire::new(&self.hub, T::TOPIC)
    }

    /// Untyped handle for a topic looked up by wire name.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownTopic`: name not in the registry
    /// - `Error::WrongDirection`: topic is subscribe-only
    pub fn fire_by_name(&self, name: &str) -> Result<Fire<Value>> {
        let topic = Topic::from_name(name)?.require(Access::Publish)?;
        Ok(Fire::new(&self.hub, topic))
    }
}

/// Publish handle for one topic. Cheap to clone and share.
pub struct Fire<P> {
    hub: Weak<Hub>,
    topic: Topic,
    _payload: PhantomData<fn(&P)>,
}

impl<P> Clone for Fire<P> {
    fn clone(&self) -> Self {
        Self {
            hub: Weak::clone(&self.hub),
            topic: self.topic,
            _payload: PhantomData,
        }
    }
}

impl<P: Serialize> Fire<P> {
    fn new(hub: &Rc<Hub>, topic: Topic) -> Self {
        Self {
            hub: Rc::downgrade(hub),
            topic,
            _payload: PhantomData,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Sends `payload` and returns immediately. Never fails.
    pub fn fire(&self, payload: &P) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!("dropping unserializable payload on {}: {err}", self.topic);
                return;
            }
        };
        match self.hub.upgrade() {
            Some(hub) => hub.publish(Frame::message(self.topic, value)),
            None => debug!("dropped publish on {}: hub gone", self.topic),
        }
    }
}
