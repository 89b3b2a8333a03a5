#![allow(dead_code)]

use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use tribeca_link::protocol::models::{CurrencyPair, ProductAdvertisement};
use tribeca_link::{
    DisconnectReason, FireFactory, Frame, Hub, MemoryTransport, SubscriberFactory, Topic,
    TransportEvent,
};

/// A hub over an in-memory transport, with helpers to play the server.
pub struct Rig {
    pub transport: Rc<MemoryTransport>,
    pub hub: Rc<Hub>,
}

impl Rig {
    pub fn new() -> Self {
        let transport = Rc::new(MemoryTransport::new());
        let hub = Hub::new(transport.clone());
        Self { transport, hub }
    }

    pub fn subscribers(&self) -> SubscriberFactory {
        SubscriberFactory::new(&self.hub)
    }

    pub fn fires(&self) -> FireFactory {
        FireFactory::new(&self.hub)
    }

    pub fn connect(&self) {
        self.transport.open();
        self.hub.dispatch(TransportEvent::Connected);
    }

    pub fn disconnect(&self) {
        self.transport.close();
        self.hub
            .dispatch(TransportEvent::Disconnected(DisconnectReason::Closed { code: Some(1006) }));
    }

    pub fn snapshot<T: Serialize>(&self, topic: Topic, items: &[T]) {
        self.hub
            .dispatch(TransportEvent::Frame(Frame::snapshot(topic, to_values(items))));
    }

    pub fn item<T: Serialize>(&self, topic: Topic, item: &T) {
        self.hub.dispatch(TransportEvent::Frame(Frame::message(topic, to_value(item))));
    }

    /// Queues an item without pumping.
    pub fn queue_item<T: Serialize>(&self, topic: Topic, item: &T) {
        self.hub.push(TransportEvent::Frame(Frame::message(topic, to_value(item))));
    }

    pub fn advertise(&self, environment: &str, base: &str, quote: &str) {
        let ad = ProductAdvertisement::new(environment, "Coinbase", CurrencyPair::new(base, quote));
        self.snapshot(Topic::ProductAdvertisement, &[ad]);
    }

    /// A later advertisement on an already-live subscription.
    pub fn readvertise(&self, environment: &str, base: &str, quote: &str) {
        let ad = ProductAdvertisement::new(environment, "Coinbase", CurrencyPair::new(base, quote));
        self.item(Topic::ProductAdvertisement, &ad);
    }
}

pub fn to_value<T: Serialize>(item: &T) -> Value {
    serde_json::to_value(item).expect("serialize")
}

pub fn to_values<T: Serialize>(items: &[T]) -> Vec<Value> {
    items.iter().map(to_value).collect()
}
