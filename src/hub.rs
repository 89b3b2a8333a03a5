//! Single-context dispatcher between a transport and its subscriptions.
//!
//! The hub is the scheduling context of one client. Transport events are
//! queued with [`Hub::push`] and delivered by [`Hub::pump`]; callbacks run on
//! whatever thread pumps, one event at a time, never re-entrantly. Because
//! disposal runs on the same context and every delivery re-checks the slot
//! state, a subscription disposed from inside a callback (or between two
//! queued events) receives nothing further, including events that were
//! already queued when it was disposed.
//!
//! # Slot states
//!
//! ```text
//!            connect / register while connected
//!  Pending ─────────────────────────────────▶ AwaitingSnapshot
//!     │                                           │ snapshot frame
//!     │                                           ▼
//!     │         transport lost                  Live
//!     └──────────────┬────────────────────────────┘
//!                    ▼
//!                 Severed            (any state) ── unsubscribe ──▶ Disposed
//! ```
//!
//! Items that arrive in `AwaitingSnapshot` are held back and released, in
//! arrival order, right after the snapshot. At most [`MAX_BACKLOG`] items
//! are held per subscription; later ones are dropped with a warning until
//! the snapshot arrives.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info, trace, warn};
use serde_json::Value;

use crate::protocol::{Access, Topic};
use crate::transport::{DisconnectReason, Frame, FrameKind, Transport, TransportEvent};

pub type SubscriptionId = u64;

/// Items held per subscription while its snapshot is outstanding.
pub const MAX_BACKLOG: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Registered while the link was down; no request sent yet.
    Pending,
    AwaitingSnapshot,
    Live,
    /// Cut off by a transport disconnect. Terminal.
    Severed,
    /// Unsubscribed by its owner. Terminal.
    Disposed,
}

/// Type-erased callbacks of one subscription.
pub(crate) trait Sink {
    fn snapshot(&mut self, items: Vec<Value>);
    fn item(&mut self, item: Value);
    fn disconnect(&mut self, reason: &DisconnectReason);
}

pub(crate) struct Slot {
    id: SubscriptionId,
    topic: Topic,
    state: Cell<SlotState>,
    backlog: RefCell<Vec<Value>>,
    overflowed: Cell<u64>,
    sink: RefCell<Box<dyn Sink>>,
}

impl Slot {
    fn new(id: SubscriptionId, topic: Topic, sink: Box<dyn Sink>) -> Self {
        Self {
            id,
            topic,
            state: Cell::new(SlotState::Pending),
            backlog: RefCell::new(Vec::new()),
            overflowed: Cell::new(0),
            sink: RefCell::new(sink),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn topic(&self) -> Topic {
        self.topic
    }

    pub(crate) fn state(&self) -> SlotState {
        self.state.get()
    }

    /// Marks the slot disposed. Returns `true` on the first call only.
    pub(crate) fn dispose(&self) -> bool {
        if self.state.replace(SlotState::Disposed) == SlotState::Disposed {
            return false;
        }
        self.backlog.borrow_mut().clear();
        true
    }

    fn deliver_snapshot(&self, items: &[Value]) {
        match self.state.get() {
            SlotState::AwaitingSnapshot => {}
            SlotState::Live => {
                trace!("sub {} on {}: ignoring repeated snapshot", self.id, self.topic);
                return;
            }
            state => {
                trace!("sub {} on {}: snapshot suppressed ({state:?})", self.id, self.topic);
                return;
            }
        }

        self.state.set(SlotState::Live);
        let overflowed = self.overflowed.replace(0);
        if overflowed > 0 {
            warn!(
                "sub {} on {}: snapshot arrived after {overflowed} early items were dropped",
                self.id, self.topic
            );
        }
        self.sink.borrow_mut().snapshot(items.to_vec());

        let backlog = std::mem::take(&mut *self.backlog.borrow_mut());
        for item in backlog {
            if self.state.get() != SlotState::Live {
                trace!("sub {} on {}: backlog suppressed", self.id, self.topic);
                break;
            }
            self.sink.borrow_mut().item(item);
        }
    }

    fn deliver_item(&self, item: &Value) {
        match self.state.get() {
            SlotState::Live => self.sink.borrow_mut().item(item.clone()),
            SlotState::AwaitingSnapshot => self.hold(item),
            state => {
                trace!("sub {} on {}: item suppressed ({state:?})", self.id, self.topic);
            }
        }
    }

    fn hold(&self, item: &Value) {
        let mut backlog = self.backlog.borrow_mut();
        if backlog.len() < MAX_BACKLOG {
            backlog.push(item.clone());
            return;
        }
        if self.overflowed.replace(self.overflowed.get() + 1) == 0 {
            warn!(
                "sub {} on {}: no snapshot yet and backlog full ({MAX_BACKLOG}), dropping items",
                self.id, self.topic
            );
        }
    }

    fn sever(&self, reason: &DisconnectReason) {
        match self.state.get() {
            SlotState::Severed | SlotState::Disposed => return,
            _ => {}
        }
        self.state.set(SlotState::Severed);
        self.backlog.borrow_mut().clear();
        self.sink.borrow_mut().disconnect(reason);
    }
}

/// Resets the pump flag even if a callback panics.
struct PumpGuard<'a>(&'a Cell<bool>);

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct Hub {
    transport: Rc<dyn Transport>,
    connected: Cell<bool>,
    inbox: RefCell<VecDeque<TransportEvent>>,
    slots: RefCell<Vec<Rc<Slot>>>,
    next_id: Cell<SubscriptionId>,
    pumping: Cell<bool>,
    dropped_sends: Cell<u64>,
}

impl Hub {
    /// Creates a hub over `transport`. The hub starts disconnected and waits
    /// for a `TransportEvent::Connected`.
    pub fn new(transport: Rc<dyn Transport>) -> Rc<Self> {
        Rc::new(Self {
            transport,
            connected: Cell::new(false),
            inbox: RefCell::new(VecDeque::new()),
            slots: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            pumping: Cell::new(false),
            dropped_sends: Cell::new(0),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Queues an event without delivering it.
    pub fn push(&self, event: TransportEvent) {
        self.inbox.borrow_mut().push_back(event);
    }

    /// Delivers every queued event, in order. Returns the number handled.
    ///
    /// Calls made from inside a callback return `0` immediately; events they
    /// pushed are picked up by the outer pump.
    pub fn pump(&self) -> usize {
        if self.pumping.replace(true) {
            return 0;
        }
        let _guard = PumpGuard(&self.pumping);

        let mut handled = 0;
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(event) = next else { break };
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Queues `event` and pumps.
    pub fn dispatch(&self, event: TransportEvent) {
        self.push(event);
        self.pump();
    }

    pub fn queued(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// Number of registered subscriptions (pending, awaiting or live).
    pub fn subscription_count(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn subscriptions_on(&self, topic: Topic) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.topic == topic)
            .count()
    }

    pub fn is_registered(&self, id: SubscriptionId) -> bool {
        self.slots.borrow().iter().any(|slot| slot.id == id)
    }

    /// Publishes dropped because the link was down.
    pub fn dropped_sends(&self) -> u64 {
        self.dropped_sends.get()
    }

    /// Drives the hub from a transport task until the event stream closes.
    ///
    /// Must run on a `LocalSet`; the hub is not `Send`.
    #[cfg(feature = "ws")]
    pub async fn run(&self, mut events: tokio::sync::mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.push(event);
            while let Ok(event) = events.try_recv() {
                self.push(event);
            }
            self.pump();
        }
        debug!("transport event stream closed");
    }

    pub(crate) fn register(&self, topic: Topic, sink: Box<dyn Sink>) -> Rc<Slot> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let slot = Rc::new(Slot::new(id, topic, sink));
        if self.connected.get() {
            self.request_snapshot(&slot);
        }
        self.slots.borrow_mut().push(Rc::clone(&slot));
        debug!("sub {id} registered on {topic}");
        slot
    }

    pub(crate) fn release(&self, id: SubscriptionId) {
        self.slots.borrow_mut().retain(|slot| slot.id != id);
        debug!("sub {id} released");
    }

    /// Best-effort send on the publish path. Never fails.
    pub(crate) fn publish(&self, frame: Frame) {
        let topic = frame.topic;
        if !self.connected.get() {
            self.note_dropped(topic, "link down");
            return;
        }
        if let Err(err) = self.transport.send(frame) {
            self.note_dropped(topic, &err.to_string());
        }
    }

    fn note_dropped(&self, topic: Topic, why: &str) {
        self.dropped_sends.set(self.dropped_sends.get() + 1);
        debug!("dropped publish on {topic}: {why}");
    }

    fn request_snapshot(&self, slot: &Slot) {
        match self.transport.send(Frame::subscribe(slot.topic)) {
            Ok(()) => slot.state.set(SlotState::AwaitingSnapshot),
            Err(err) => debug!("sub {} on {}: request not sent: {err}", slot.id, slot.topic),
        }
    }

    fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected(reason) => self.on_disconnected(reason),
            TransportEvent::Frame(frame) => self.route(frame),
        }
    }

    fn on_connected(&self) {
        if self.connected.replace(true) {
            debug!("ignoring duplicate connect");
            return;
        }
        info!("link up");
        let pending: Vec<Rc<Slot>> = self
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.state.get() == SlotState::Pending)
            .cloned()
            .collect();
        for slot in pending {
            if slot.state.get() == SlotState::Pending {
                self.request_snapshot(&slot);
            }
        }
    }

    fn on_disconnected(&self, reason: DisconnectReason) {
        if !self.connected.replace(false) {
            debug!("ignoring disconnect while down: {reason}");
            return;
        }
        info!("link lost: {reason}");
        // Taken before any callback runs so that resubscriptions made from
        // a disconnect handler land in a fresh registry.
        let severed = std::mem::take(&mut *self.slots.borrow_mut());
        for slot in severed {
            slot.sever(&reason);
        }
    }

    fn route(&self, frame: Frame) {
        let topic = frame.topic;
        if topic.require(Access::Subscribe).is_err() {
            warn!("dropping inbound frame on publish-only topic {topic}");
            return;
        }

        let targets: Vec<Rc<Slot>> = self
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.topic == topic)
            .cloned()
            .collect();

        match frame.kind {
            FrameKind::Snapshot => {
                let items = match frame.payload {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    other => {
                        warn!("snapshot on {topic} is not an array: {other}");
                        return;
                    }
                };
                for slot in targets {
                    slot.deliver_snapshot(&items);
                }
            }
            FrameKind::Message => {
                for slot in targets {
                    slot.deliver_item(&frame.payload);
                }
            }
            FrameKind::Subscribe => warn!("unexpected subscribe frame from server on {topic}"),
        }
    }
}
