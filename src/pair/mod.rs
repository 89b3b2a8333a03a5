//! Per-instrument display aggregate.
//!
//! A [`DisplayPair`] bundles every subscription and publish handle scoped
//! to the instrument the engine is trading. It subscribes on construction
//! and keeps a [`PairState`] up to date until [`DisplayPair::dispose`] (or
//! drop), after which nothing touches that state again.
//!
//! The aggregate does not police how many instances exist; the
//! [`ClientController`](crate::controller::ClientController) guarantees at
//! most one is live and disposes the old one before creating the next.

mod views;

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use log::{debug, info};

use crate::fire::{Fire, FireFactory};
use crate::hub::SubscriptionId;
use crate::protocol::models::{ActiveState, Instrument, QuotingParameters};
use crate::protocol::{topics, Subscribable};
use crate::subscriber::{SubscriberFactory, Subscription};

pub use views::{ActiveButton, OrderList, PairState, QuotingParametersView};

pub struct DisplayPair {
    instrument: Instrument,
    state: Rc<RefCell<PairState>>,
    subscriptions: Vec<Subscription>,
    active_change: Fire<ActiveState>,
    quoting_change: Fire<QuotingParameters>,
    disposed: bool,
}

impl DisplayPair {
    /// Subscribes to every instrument-scoped topic.
    ///
    /// The factories carry the scheduling context: all callbacks of this
    /// aggregate run on the hub they were created from.
    pub fn new(
        subscribers: &SubscriberFactory,
        fires: &FireFactory,
        instrument: Instrument,
    ) -> Self {
        let state = Rc::new(RefCell::new(PairState::default()));

        let subscriptions = vec![
            watch::<topics::ExchangeConnectivity>(subscribers, &state, PairState::on_connectivity),
            watch::<topics::ActiveState>(subscribers, &state, PairState::on_active),
            watch_quoting(subscribers, &state),
            watch::<topics::OrderStatusReports>(subscribers, &state, PairState::on_order),
            watch::<topics::Position>(subscribers, &state, PairState::on_position),
            watch::<topics::MarketData>(subscribers, &state, PairState::on_market),
            watch::<topics::TradeSafety>(subscribers, &state, PairState::on_safety),
        ];

        info!("display pair created for {instrument}");
        Self {
            instrument,
            state,
            subscriptions,
            active_change: fires.fire::<topics::ActiveChange>(),
            quoting_change: fires.fire::<topics::QuotingParameters>(),
            disposed: false,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Read access to the tracked state.
    ///
    /// Subscription callbacks write through the same cell, so the guard
    /// must not be held across `Hub::pump` or `Hub::dispatch`.
    pub fn view(&self) -> Ref<'_, PairState> {
        self.state.borrow()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Subscriptions still registered and not severed.
    pub fn live_subscriptions(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.is_live()).count()
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(Subscription::id).collect()
    }

    /// Asks the engine to flip quoting on or off.
    pub fn toggle_active(&self) {
        if self.disposed {
            debug!("toggle on disposed pair {} ignored", self.instrument);
            return;
        }
        let active = self.state.borrow().active.is_active();
        self.active_change.fire(&ActiveState { active: !active });
    }

    /// Edits the working copy of the quoting parameters.
    pub fn edit_quoting_parameters(&self, edit: impl FnOnce(&mut QuotingParameters)) {
        if self.disposed {
            return;
        }
        edit(self.state.borrow_mut().quoting.display_mut());
    }

    /// Sends the working copy to the engine. It shows as pending until the
    /// engine echoes it back.
    pub fn submit_quoting_parameters(&self) {
        if self.disposed {
            debug!("submit on disposed pair {} ignored", self.instrument);
            return;
        }
        let display = self.state.borrow().quoting.display().clone();
        self.quoting_change.fire(&display);
    }

    pub fn reset_quoting_parameters(&self) {
        if self.disposed {
            return;
        }
        self.state.borrow_mut().quoting.reset();
    }

    /// Unsubscribes everything this aggregate owns. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
        self.disposed = true;
        info!("display pair for {} disposed", self.instrument);
    }
}

impl Drop for DisplayPair {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn watch<T: Subscribable>(
    subscribers: &SubscriberFactory,
    state: &Rc<RefCell<PairState>>,
    apply: fn(&mut PairState, T::Payload),
) -> Subscription {
    let state = Rc::clone(state);
    subscribers
        .subscriber::<T>()
        .on_each(move |payload| apply(&mut state.borrow_mut(), payload))
        .subscribe()
}

fn watch_quoting(subscribers: &SubscriberFactory, state: &Rc<RefCell<PairState>>) -> Subscription {
    let on_snapshot = Rc::clone(state);
    let on_item = Rc::clone(state);
    let on_lost = Rc::clone(state);
    subscribers
        .subscriber::<topics::QuotingParameters>()
        .on_snapshot(move |snapshot| on_snapshot.borrow_mut().on_quoting_snapshot(snapshot))
        .on_item(move |params| on_item.borrow_mut().on_quoting_parameters(params))
        .on_disconnect(move |_| on_lost.borrow_mut().on_quoting_lost())
        .subscribe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use crate::protocol::models::{CurrencyPair, QuotingMode};
    use crate::protocol::Topic;
    use crate::transport::{
        DisconnectReason, Frame, FrameKind, MemoryTransport, TransportEvent,
    };
    use serde_json::json;

    fn setup() -> (Rc<MemoryTransport>, Rc<Hub>, DisplayPair) {
        let transport = Rc::new(MemoryTransport::new());
        let hub = Hub::new(transport.clone());
        transport.open();
        hub.dispatch(TransportEvent::Connected);
        let pair = DisplayPair::new(
            &SubscriberFactory::new(&hub),
            &FireFactory::new(&hub),
            Instrument {
                exchange: "Coinbase".into(),
                pair: CurrencyPair::new("BTC", "USD"),
            },
        );
        (transport, hub, pair)
    }

    fn item(hub: &Hub, topic: Topic, payload: serde_json::Value) {
        hub.dispatch(TransportEvent::Frame(Frame::message(topic, payload)));
    }

    fn snapshot(hub: &Hub, topic: Topic, items: Vec<serde_json::Value>) {
        hub.dispatch(TransportEvent::Frame(Frame::snapshot(topic, items)));
    }

    #[test]
    fn subscribes_to_every_instrument_topic() {
        let (transport, hub, pair) = setup();
        assert_eq!(pair.live_subscriptions(), 7);
        assert_eq!(hub.subscription_count(), 7);
        for topic in [
            Topic::ExchangeConnectivity,
            Topic::ActiveState,
            Topic::QuotingParameters,
            Topic::OrderStatusReports,
            Topic::Position,
            Topic::MarketData,
            Topic::TradeSafety,
        ] {
            assert_eq!(transport.sent_on(FrameKind::Subscribe, topic).len(), 1, "{topic}");
        }
    }

    #[test]
    fn tracks_engine_state() {
        let (_transport, hub, pair) = setup();
        snapshot(&hub, Topic::ExchangeConnectivity, vec![json!("Connected")]);
        snapshot(&hub, Topic::ActiveState, vec![json!({"active": true})]);
        snapshot(&hub, Topic::TradeSafety, vec![]);
        item(&hub, Topic::TradeSafety, json!({"buy": 1.0, "sell": 0.5, "combined": 1.5}));
        snapshot(
            &hub,
            Topic::MarketData,
            vec![json!({"bid": {"price": 99.0, "size": 1.0}, "ask": {"price": 101.0, "size": 2.0}})],
        );

        let view = pair.view();
        assert!(view.exchange_connected());
        assert!(view.active().is_active());
        assert_eq!(view.trade_safety().unwrap().combined, 1.5);
        assert_eq!(view.market_quote().unwrap().spread(), Some(2.0));
    }

    #[test]
    fn toggle_fires_negated_state() {
        let (transport, hub, pair) = setup();
        snapshot(&hub, Topic::ActiveState, vec![json!({"active": false})]);
        pair.toggle_active();
        let sent = transport.sent_on(FrameKind::Message, Topic::ActiveChange);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, json!({"active": true}));
    }

    #[test]
    fn quoting_parameters_round_trip() {
        let (transport, hub, pair) = setup();
        assert!(!pair.view().quoting_parameters().is_connected());
        let params = serde_json::to_value(QuotingParameters::default()).unwrap();
        snapshot(&hub, Topic::QuotingParameters, vec![params]);
        assert!(pair.view().quoting_parameters().is_connected());

        pair.edit_quoting_parameters(|p| p.mode = QuotingMode::PingPong);
        assert!(pair.view().quoting_parameters().is_pending());
        pair.submit_quoting_parameters();

        let sent = transport.sent_on(FrameKind::Message, Topic::QuotingParameters);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload["mode"], json!("PingPong"));

        item(&hub, Topic::QuotingParameters, sent[0].payload.clone());
        assert!(!pair.view().quoting_parameters().is_pending());
    }

    #[test]
    fn quoting_disconnect_clears_connected() {
        let (_transport, hub, pair) = setup();
        snapshot(&hub, Topic::QuotingParameters, vec![]);
        assert!(pair.view().quoting_parameters().is_connected());

        hub.dispatch(TransportEvent::Disconnected(DisconnectReason::Shutdown));
        assert!(!pair.view().quoting_parameters().is_connected());
        assert!(!pair.view().quoting_parameters().is_pending());
    }

    #[test]
    fn dispose_stops_all_updates() {
        let (transport, hub, mut pair) = setup();
        snapshot(&hub, Topic::Position, vec![]);
        snapshot(&hub, Topic::OrderStatusReports, vec![]);

        hub.push(TransportEvent::Frame(Frame::message(
            Topic::OrderStatusReports,
            json!({"order_id": "1", "side": "Bid", "price": 1.0, "quantity": 1.0, "status": "New"}),
        )));
        pair.dispose();
        pair.dispose();
        hub.pump();

        assert!(pair.is_disposed());
        assert_eq!(pair.live_subscriptions(), 0);
        assert_eq!(hub.subscription_count(), 0);
        assert!(pair.view().orders().is_empty());

        transport.take_sent();
        pair.toggle_active();
        pair.submit_quoting_parameters();
        assert!(transport.sent().is_empty());
    }
}
