//! Subscriber clients.
//!
//! A subscription is assembled with a builder and registered with
//! [`SubscriberBuilder::subscribe`], which returns an immutable
//! [`Subscription`] handle.
//!
//! ```no_run
//! use std::rc::Rc;
//! use tribeca_link::hub::Hub;
//! use tribeca_link::protocol::topics;
//! use tribeca_link::subscriber::SubscriberFactory;
//! use tribeca_link::transport::MemoryTransport;
//!
//! let hub = Hub::new(Rc::new(MemoryTransport::new()));
//! let subscribers = SubscriberFactory::new(&hub);
//!
//! let notepad = subscribers
//!     .subscriber::<topics::Notepad>()
//!     .on_snapshot(|pads| println!("{} initial values", pads.len()))
//!     .on_item(|pad| println!("notepad: {:?}", pad))
//!     .on_disconnect(|reason| println!("lost: {reason}"))
//!     .subscribe();
//!
//! notepad.unsubscribe();
//! ```
//!
//! # Delivery contract
//!
//! - The snapshot is handed over once, whole and oldest-first, before any
//!   item. An empty snapshot still calls `on_snapshot` with an empty `Vec`.
//!   Without an `on_snapshot` callback, snapshot values go to `on_item` one
//!   by one.
//! - Items follow in arrival order, one call each.
//! - A transport disconnect calls `on_disconnect` once and ends the
//!   subscription. It does not resume on reconnect; subscribe again.
//! - After [`Subscription::unsubscribe`] (or drop) returns, no callback
//!   runs, even for messages already queued in the hub.
//! - Values that fail to decode are logged and skipped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::hub::{Hub, Sink, Slot, SlotState, SubscriptionId};
use crate::protocol::{Access, Subscribable, Topic};
use crate::transport::DisconnectReason;

type SnapshotFn<P> = Box<dyn FnMut(Vec<P>)>;
type ItemFn<P> = Box<dyn FnMut(P)>;
type DisconnectFn = Box<dyn FnMut(&DisconnectReason)>;

/// Hands out subscriber builders bound to one hub.
#[derive(Clone)]
pub struct SubscriberFactory {
    hub: Rc<Hub>,
}

impl SubscriberFactory {
    pub fn new(hub: &Rc<Hub>) -> Self {
        Self {
            hub: Rc::clone(hub),
        }
    }

    pub fn hub(&self) -> &Rc<Hub> {
        &self.hub
    }

    /// Starts a typed subscription on topic `T`.
    pub fn subscriber<T: Subscribable>(&self) -> SubscriberBuilder<T::Payload> {
        SubscriberBuilder::new(&self.hub, T::TOPIC)
    }

    /// Starts an untyped subscription on a topic looked up by wire name.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownTopic`: name not in the registry
    /// - `Error::WrongDirection`: topic is publish-only
    pub fn subscriber_by_name(&self, name: &str) -> Result<SubscriberBuilder<Value>> {
        let topic = Topic::from_name(name)?.require(Access::Subscribe)?;
        Ok(SubscriberBuilder::new(&self.hub, topic))
    }
}

pub struct SubscriberBuilder<P> {
    hub: Rc<Hub>,
    topic: Topic,
    on_snapshot: Option<SnapshotFn<P>>,
    on_item: Option<ItemFn<P>>,
    on_disconnect: Option<DisconnectFn>,
}

impl<P: DeserializeOwned + 'static> SubscriberBuilder<P> {
    fn new(hub: &Rc<Hub>, topic: Topic) -> Self {
        Self {
            hub: Rc::clone(hub),
            topic,
            on_snapshot: None,
            on_item: None,
            on_disconnect: None,
        }
    }

    pub fn on_snapshot(mut self, f: impl FnMut(Vec<P>) + 'static) -> Self {
        self.on_snapshot = Some(Box::new(f));
        self
    }

    pub fn on_item(mut self, f: impl FnMut(P) + 'static) -> Self {
        self.on_item = Some(Box::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl FnMut(&DisconnectReason) + 'static) -> Self {
        self.on_disconnect = Some(Box::new(f));
        self
    }

    /// Uses `f` for every value, whether it came in the snapshot or as an
    /// item. Replaces any `on_snapshot` / `on_item` set before.
    pub fn on_each(mut self, f: impl FnMut(P) + 'static) -> Self {
        let shared = Rc::new(RefCell::new(f));
        let for_snapshot = Rc::clone(&shared);
        self.on_snapshot = Some(Box::new(move |values: Vec<P>| {
            let mut guard = for_snapshot.borrow_mut();
            let f = &mut *guard;
            for value in values {
                f(value);
            }
        }));
        self.on_item = Some(Box::new(move |value: P| {
            let mut guard = shared.borrow_mut();
            let f = &mut *guard;
            f(value);
        }));
        self
    }

    /// Registers with the hub. A subscribe request goes out now if the link
    /// is up, otherwise on the next connect.
    pub fn subscribe(self) -> Subscription {
        let sink = TypedSink {
            topic: self.topic,
            on_snapshot: self.on_snapshot,
            on_item: self.on_item,
            on_disconnect: self.on_disconnect,
        };
        let slot = self.hub.register(self.topic, Box::new(sink));
        Subscription {
            slot,
            hub: Rc::downgrade(&self.hub),
        }
    }
}

struct TypedSink<P> {
    topic: Topic,
    on_snapshot: Option<SnapshotFn<P>>,
    on_item: Option<ItemFn<P>>,
    on_disconnect: Option<DisconnectFn>,
}

impl<P: DeserializeOwned> TypedSink<P> {
    fn decode(&self, value: Value) -> Option<P> {
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!("skipping undecodable value on {}: {err}", self.topic);
                None
            }
        }
    }
}

impl<P: DeserializeOwned> Sink for TypedSink<P> {
    fn snapshot(&mut self, items: Vec<Value>) {
        let decoded: Vec<P> = items.into_iter().filter_map(|v| self.decode(v)).collect();
        if let Some(on_snapshot) = self.on_snapshot.as_mut() {
            on_snapshot(decoded);
        } else if let Some(on_item) = self.on_item.as_mut() {
            for value in decoded {
                on_item(value);
            }
        }
    }

    fn item(&mut self, item: Value) {
        let Some(decoded) = self.decode(item) else {
            return;
        };
        if let Some(on_item) = self.on_item.as_mut() {
            on_item(decoded);
        }
    }

    fn disconnect(&mut self, reason: &DisconnectReason) {
        if let Some(on_disconnect) = self.on_disconnect.as_mut() {
            on_disconnect(reason);
        }
    }
}

/// Handle to one registered subscription. Dropping it unsubscribes.
pub struct Subscription {
    slot: Rc<Slot>,
    hub: Weak<Hub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.slot.id()
    }

    pub fn topic(&self) -> Topic {
        self.slot.topic()
    }

    /// `true` until the subscription is disposed or severed.
    pub fn is_live(&self) -> bool {
        !matches!(self.slot.state(), SlotState::Disposed | SlotState::Severed)
    }

    /// `true` once the snapshot has been delivered and items flow.
    pub fn is_streaming(&self) -> bool {
        self.slot.state() == SlotState::Live
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.state() == SlotState::Disposed
    }

    /// Stops all further callbacks. Idempotent.
    pub fn unsubscribe(&self) {
        if self.slot.dispose() {
            if let Some(hub) = self.hub.upgrade() {
                hub.release(self.slot.id());
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.slot.id())
            .field("topic", &self.slot.topic())
            .field("state", &self.slot.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::models::{ApplicationState, Notepad};
    use crate::protocol::topics;
    use crate::transport::{Frame, MemoryTransport, TransportEvent};
    use serde_json::json;

    fn connected_hub() -> (Rc<MemoryTransport>, Rc<Hub>) {
        let transport = Rc::new(MemoryTransport::new());
        let hub = Hub::new(transport.clone());
        transport.open();
        hub.dispatch(TransportEvent::Connected);
        (transport, hub)
    }

    #[test]
    fn typed_callbacks_receive_decoded_values() {
        let (_transport, hub) = connected_hub();
        let factory = SubscriberFactory::new(&hub);
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let items = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&snapshots);
        let i = Rc::clone(&items);
        let sub = factory
            .subscriber::<topics::ApplicationState>()
            .on_snapshot(move |v| s.borrow_mut().push(v))
            .on_item(move |v| i.borrow_mut().push(v))
            .subscribe();

        hub.dispatch(TransportEvent::Frame(Frame::snapshot(
            Topic::ApplicationState,
            vec![json!({"memory": 1024, "hour": 9})],
        )));
        hub.dispatch(TransportEvent::Frame(Frame::message(
            Topic::ApplicationState,
            json!({"memory": 2048, "hour": 10}),
        )));

        assert!(sub.is_streaming());
        assert_eq!(
            *snapshots.borrow(),
            vec![vec![ApplicationState { memory: 1024, hour: 9 }]]
        );
        assert_eq!(
            *items.borrow(),
            vec![ApplicationState { memory: 2048, hour: 10 }]
        );
    }

    #[test]
    fn empty_snapshot_still_invokes_callback() {
        let (_transport, hub) = connected_hub();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let c = Rc::clone(&calls);
        let _sub = SubscriberFactory::new(&hub)
            .subscriber::<topics::Notepad>()
            .on_snapshot(move |v: Vec<Option<Notepad>>| c.borrow_mut().push(v.len()))
            .subscribe();

        hub.dispatch(TransportEvent::Frame(Frame::snapshot(Topic::Notepad, vec![])));
        assert_eq!(*calls.borrow(), vec![0]);
    }

    #[test]
    fn on_each_sees_snapshot_then_items() {
        let (_transport, hub) = connected_hub();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = SubscriberFactory::new(&hub)
            .subscriber_by_name("notepad")
            .unwrap()
            .on_each(move |v: Value| s.borrow_mut().push(v))
            .subscribe();

        hub.dispatch(TransportEvent::Frame(Frame::snapshot(
            Topic::Notepad,
            vec![json!({"content": "a"}), json!({"content": "b"})],
        )));
        hub.dispatch(TransportEvent::Frame(Frame::message(
            Topic::Notepad,
            json!({"content": "c"}),
        )));
        assert_eq!(
            *seen.borrow(),
            vec![
                json!({"content": "a"}),
                json!({"content": "b"}),
                json!({"content": "c"})
            ]
        );
    }

    #[test]
    fn undecodable_values_are_skipped() {
        let (_transport, hub) = connected_hub();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = SubscriberFactory::new(&hub)
            .subscriber::<topics::ApplicationState>()
            .on_item(move |v| s.borrow_mut().push(v))
            .subscribe();

        hub.dispatch(TransportEvent::Frame(Frame::snapshot(Topic::ApplicationState, vec![])));
        hub.dispatch(TransportEvent::Frame(Frame::message(
            Topic::ApplicationState,
            json!("garbage"),
        )));
        hub.dispatch(TransportEvent::Frame(Frame::message(
            Topic::ApplicationState,
            json!({"memory": 1, "hour": 1}),
        )));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn by_name_rejects_unknown_and_publish_only() {
        let (_transport, hub) = connected_hub();
        let factory = SubscriberFactory::new(&hub);
        assert!(matches!(
            factory.subscriber_by_name("nope").err(),
            Some(Error::UnknownTopic(_))
        ));
        assert!(matches!(
            factory.subscriber_by_name("cancel-all-orders").err(),
            Some(Error::WrongDirection { .. })
        ));
    }

    #[test]
    fn drop_unsubscribes() {
        let (_transport, hub) = connected_hub();
        let sub = SubscriberFactory::new(&hub)
            .subscriber::<topics::Position>()
            .subscribe();
        let id = sub.id();
        assert!(hub.is_registered(id));
        drop(sub);
        assert!(!hub.is_registered(id));
    }

    #[test]
    fn unsubscribe_from_inside_callback_stops_backlog() {
        let (_transport, hub) = connected_hub();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let handle: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let s = Rc::clone(&seen);
        let h = Rc::clone(&handle);
        let sub = SubscriberFactory::new(&hub)
            .subscriber_by_name("notepad")
            .unwrap()
            .on_snapshot(|_| {})
            .on_item(move |v: Value| {
                s.borrow_mut().push(v);
                if let Some(sub) = h.borrow().as_ref() {
                    sub.unsubscribe();
                }
            })
            .subscribe();
        *handle.borrow_mut() = Some(sub);

        // Both items are buffered until the snapshot arrives.
        hub.dispatch(TransportEvent::Frame(Frame::message(Topic::Notepad, json!(1))));
        hub.dispatch(TransportEvent::Frame(Frame::message(Topic::Notepad, json!(2))));
        hub.dispatch(TransportEvent::Frame(Frame::snapshot(Topic::Notepad, vec![])));

        assert_eq!(*seen.borrow(), vec![json!(1)]);
        assert!(handle.borrow().as_ref().unwrap().is_disposed());
    }
}
