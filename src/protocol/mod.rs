//! Topic registry for the dashboard link.
//!
//! Every logical channel between the dashboard and the trading engine is a
//! [`Topic`]. The set is closed: each topic has a fixed wire name, a fixed
//! payload type and a fixed [`Direction`]. Typed code goes through the
//! marker types in [`topics`], whose [`Subscribable`] / [`Publishable`]
//! impls turn direction misuse into a compile error. Dynamic code (wire
//! decoding, the monitor's `--watch` flag) goes through
//! [`Topic::from_name`] and [`Topic::require`].
//!
//! | Topic | Direction | Payload |
//! |-------|-----------|---------|
//! | `product-advertisement` | subscribe | [`models::ProductAdvertisement`] |
//! | `application-state` | subscribe | [`models::ApplicationState`] |
//! | `notepad` | subscribe | `Option<`[`models::Notepad`]`>` |
//! | `change-notepad` | publish | [`models::Notepad`] |
//! | `submit-new-order` | publish | [`models::OrderRequestFromUi`] |
//! | `cancel-all-orders` | publish | [`models::CancelAllOrdersRequest`] |
//! | `clean-all-closed-orders` | publish | [`models::CleanAllClosedOrdersRequest`] |
//! | `clean-all-orders` | publish | [`models::CleanAllOrdersRequest`] |
//! | `exchange-connectivity` | subscribe | [`models::ConnectivityStatus`] |
//! | `active-state` | subscribe | [`models::ActiveState`] |
//! | `active-change` | publish | [`models::ActiveState`] |
//! | `quoting-parameters` | both | [`models::QuotingParameters`] |
//! | `order-status-reports` | subscribe | [`models::OrderStatusReport`] |
//! | `position` | subscribe | [`models::PositionReport`] |
//! | `market-data` | subscribe | [`models::MarketQuote`] |
//! | `trade-safety` | subscribe | [`models::TradeSafety`] |

pub mod models;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ProductAdvertisement,
    ApplicationState,
    Notepad,
    ChangeNotepad,
    SubmitNewOrder,
    CancelAllOrders,
    CleanAllClosedOrders,
    CleanAllOrders,
    ExchangeConnectivity,
    ActiveState,
    ActiveChange,
    QuotingParameters,
    OrderStatusReports,
    Position,
    MarketData,
    TradeSafety,
}

/// Which way traffic may flow on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to client only.
    Subscribe,
    /// Client to server only.
    Publish,
    Both,
}

/// The kind of use a caller asks of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Subscribe,
    Publish,
}

impl Direction {
    #[inline]
    pub const fn allows(self, access: Access) -> bool {
        matches!(
            (self, access),
            (Direction::Both, _)
                | (Direction::Subscribe, Access::Subscribe)
                | (Direction::Publish, Access::Publish)
        )
    }
}

impl Topic {
    pub const ALL: [Topic; 16] = [
        Topic::ProductAdvertisement,
        Topic::ApplicationState,
        Topic::Notepad,
        Topic::ChangeNotepad,
        Topic::SubmitNewOrder,
        Topic::CancelAllOrders,
        Topic::CleanAllClosedOrders,
        Topic::CleanAllOrders,
        Topic::ExchangeConnectivity,
        Topic::ActiveState,
        Topic::ActiveChange,
        Topic::QuotingParameters,
        Topic::OrderStatusReports,
        Topic::Position,
        Topic::MarketData,
        Topic::TradeSafety,
    ];

    /// Stable wire name.
    pub const fn name(self) -> &'static str {
        match self {
            Topic::ProductAdvertisement => "product-advertisement",
            Topic::ApplicationState => "application-state",
            Topic::Notepad => "notepad",
            Topic::ChangeNotepad => "change-notepad",
            Topic::SubmitNewOrder => "submit-new-order",
            Topic::CancelAllOrders => "cancel-all-orders",
            Topic::CleanAllClosedOrders => "clean-all-closed-orders",
            Topic::CleanAllOrders => "clean-all-orders",
            Topic::ExchangeConnectivity => "exchange-connectivity",
            Topic::ActiveState => "active-state",
            Topic::ActiveChange => "active-change",
            Topic::QuotingParameters => "quoting-parameters",
            Topic::OrderStatusReports => "order-status-reports",
            Topic::Position => "position",
            Topic::MarketData => "market-data",
            Topic::TradeSafety => "trade-safety",
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            Topic::ProductAdvertisement
            | Topic::ApplicationState
            | Topic::Notepad
            | Topic::ExchangeConnectivity
            | Topic::ActiveState
            | Topic::OrderStatusReports
            | Topic::Position
            | Topic::MarketData
            | Topic::TradeSafety => Direction::Subscribe,
            Topic::ChangeNotepad
            | Topic::SubmitNewOrder
            | Topic::CancelAllOrders
            | Topic::CleanAllClosedOrders
            | Topic::CleanAllOrders
            | Topic::ActiveChange => Direction::Publish,
            Topic::QuotingParameters => Direction::Both,
        }
    }

    /// Looks a topic up by wire name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTopic` if the name is not in the registry.
    pub fn from_name(name: &str) -> Result<Self> {
        Topic::ALL
            .iter()
            .copied()
            .find(|topic| topic.name() == name)
            .ok_or_else(|| Error::UnknownTopic(name.to_string()))
    }

    /// Returns `self` if the topic permits `access`.
    pub fn require(self, access: Access) -> Result<Self> {
        if self.direction().allows(access) {
            Ok(self)
        } else {
            Err(Error::WrongDirection {
                topic: self,
                access,
            })
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Binds a marker type to a topic and its payload type.
pub trait TopicSpec {
    const TOPIC: Topic;
    type Payload: Serialize + DeserializeOwned + 'static;
}

/// Marker for topics the client may subscribe to.
pub trait Subscribable: TopicSpec {}

/// Marker for topics the client may fire on.
pub trait Publishable: TopicSpec {}

macro_rules! topic_spec {
    ($(#[$meta:meta])* $name:ident => $payload:ty, $($cap:ident),+) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub enum $name {}

        impl TopicSpec for $name {
            const TOPIC: Topic = Topic::$name;
            type Payload = $payload;
        }

        $(impl $cap for $name {})+
    };
}

/// Typed markers, one per [`Topic`].
pub mod topics {
    use super::models;
    use super::{Publishable, Subscribable, Topic, TopicSpec};

    topic_spec!(
        /// Announces the engine's environment, exchange and instrument.
        ProductAdvertisement => models::ProductAdvertisement, Subscribable
    );
    topic_spec!(ApplicationState => models::ApplicationState, Subscribable);
    topic_spec!(
        /// The server may publish `null` for an empty notepad.
        Notepad => Option<models::Notepad>, Subscribable
    );
    topic_spec!(ChangeNotepad => models::Notepad, Publishable);
    topic_spec!(SubmitNewOrder => models::OrderRequestFromUi, Publishable);
    topic_spec!(CancelAllOrders => models::CancelAllOrdersRequest, Publishable);
    topic_spec!(CleanAllClosedOrders => models::CleanAllClosedOrdersRequest, Publishable);
    topic_spec!(CleanAllOrders => models::CleanAllOrdersRequest, Publishable);
    topic_spec!(ExchangeConnectivity => models::ConnectivityStatus, Subscribable);
    topic_spec!(ActiveState => models::ActiveState, Subscribable);
    topic_spec!(ActiveChange => models::ActiveState, Publishable);
    topic_spec!(QuotingParameters => models::QuotingParameters, Subscribable, Publishable);
    topic_spec!(OrderStatusReports => models::OrderStatusReport, Subscribable);
    topic_spec!(Position => models::PositionReport, Subscribable);
    topic_spec!(MarketData => models::MarketQuote, Subscribable);
    topic_spec!(TradeSafety => models::TradeSafety, Subscribable);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribable<T: Subscribable>() -> Topic {
        T::TOPIC
    }

    fn publishable<T: Publishable>() -> Topic {
        T::TOPIC
    }

    #[test]
    fn names_round_trip_through_registry() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.name()).unwrap(), topic);
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Topic::ALL.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Topic::ALL.len());
    }

    #[test]
    fn unknown_name_is_rejected() {
        match Topic::from_name("no-such-topic") {
            Err(Error::UnknownTopic(name)) => assert_eq!(name, "no-such-topic"),
            other => panic!("expected UnknownTopic, got {other:?}"),
        }
    }

    #[test]
    fn require_checks_direction() {
        assert!(Topic::Notepad.require(Access::Subscribe).is_ok());
        assert!(matches!(
            Topic::Notepad.require(Access::Publish),
            Err(Error::WrongDirection { .. })
        ));
        assert!(Topic::QuotingParameters.require(Access::Publish).is_ok());
        assert!(Topic::QuotingParameters.require(Access::Subscribe).is_ok());
        assert!(Topic::CancelAllOrders.require(Access::Subscribe).is_err());
    }

    #[test]
    fn marker_capabilities_match_registry() {
        let subs = [
            subscribable::<topics::ProductAdvertisement>(),
            subscribable::<topics::ApplicationState>(),
            subscribable::<topics::Notepad>(),
            subscribable::<topics::ExchangeConnectivity>(),
            subscribable::<topics::ActiveState>(),
            subscribable::<topics::QuotingParameters>(),
            subscribable::<topics::OrderStatusReports>(),
            subscribable::<topics::Position>(),
            subscribable::<topics::MarketData>(),
            subscribable::<topics::TradeSafety>(),
        ];
        for topic in subs {
            assert!(topic.direction().allows(Access::Subscribe), "{topic}");
        }

        let pubs = [
            publishable::<topics::ChangeNotepad>(),
            publishable::<topics::SubmitNewOrder>(),
            publishable::<topics::CancelAllOrders>(),
            publishable::<topics::CleanAllClosedOrders>(),
            publishable::<topics::CleanAllOrders>(),
            publishable::<topics::ActiveChange>(),
            publishable::<topics::QuotingParameters>(),
        ];
        for topic in pubs {
            assert!(topic.direction().allows(Access::Publish), "{topic}");
        }
    }
}
