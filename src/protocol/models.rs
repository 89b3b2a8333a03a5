//! Payload types carried on each topic.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAdvertisement {
    pub environment: String,
    pub exchange: String,
    pub pair: CurrencyPair,
}

impl ProductAdvertisement {
    pub fn new(
        environment: impl Into<String>,
        exchange: impl Into<String>,
        pair: CurrencyPair,
    ) -> Self {
        Self {
            environment: environment.into(),
            exchange: exchange.into(),
            pair,
        }
    }

    /// The traded instrument this advertisement names.
    pub fn instrument(&self) -> Instrument {
        Instrument {
            exchange: self.exchange.clone(),
            pair: self.pair.clone(),
        }
    }
}

/// Identity of the instrument a `DisplayPair` is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instrument {
    pub exchange: String,
    pub pair: CurrencyPair,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pair, self.exchange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    /// Resident memory of the engine, in bytes.
    pub memory: u64,
    /// Server hour of day, 0-23.
    pub hour: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notepad {
    pub content: String,
}

impl Notepad {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Bid, Side::Ask];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    #[serde(rename = "FOK")]
    FillOrKill,
    #[serde(rename = "GTC")]
    GoodTillCancel,
}

impl TimeInForce {
    pub const ALL: [TimeInForce; 3] = [
        TimeInForce::ImmediateOrCancel,
        TimeInForce::FillOrKill,
        TimeInForce::GoodTillCancel,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub const ALL: [OrderType; 2] = [OrderType::Limit, OrderType::Market];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequestFromUi {
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub time_in_force: TimeInForce,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CancelAllOrdersRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanAllClosedOrdersRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanAllOrdersRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActiveState {
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuotingMode {
    #[default]
    Top,
    Mid,
    Join,
    InverseJoin,
    InverseTop,
    PingPong,
    Boomerang,
    AK47,
}

impl QuotingMode {
    /// Modes that keep open "ping" orders the operator may clean.
    pub const fn keeps_open_pings(self) -> bool {
        matches!(
            self,
            QuotingMode::PingPong | QuotingMode::Boomerang | QuotingMode::AK47
        )
    }

    /// Modes that keep closed "pong" records the operator may clean.
    pub const fn keeps_closed_pongs(self) -> bool {
        matches!(self, QuotingMode::Boomerang | QuotingMode::AK47)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FairValueModel {
    #[default]
    #[serde(rename = "BBO")]
    BestBidOffer,
    #[serde(rename = "wBBO")]
    WeightedBestBidOffer,
}

/// Which side keeps sending pings in the ping-pong family of modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PingAt {
    #[default]
    BothSides,
    BidSide,
    AskSide,
    DepletedSide,
    DepletedBidSide,
    DepletedAskSide,
    StopPings,
}

/// Where the matching pong is placed relative to its ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PongAt {
    #[default]
    ShortPingFair,
    LongPingFair,
    ShortPingAggressive,
    LongPingAggressive,
}

/// Reload speed of the AK-47 mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Magazine {
    #[default]
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoPositionMode {
    #[default]
    Manual,
    #[serde(rename = "EwmaLS")]
    EwmaLongShort,
    #[serde(rename = "EwmaLMS")]
    EwmaLongMediumShort,
}

/// Engine quoting settings.
///
/// Keys this client does not model are kept in `extra` and written back
/// unchanged, so submitting an edited copy never strips engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotingParameters {
    pub mode: QuotingMode,
    pub fv_model: FairValueModel,
    #[serde(default)]
    pub auto_position_mode: AutoPositionMode,
    #[serde(default)]
    pub ping_at: PingAt,
    #[serde(default)]
    pub pong_at: PongAt,
    #[serde(default)]
    pub bullets: u32,
    #[serde(default)]
    pub magazine: Magazine,
    pub width: f64,
    pub buy_size: f64,
    pub sell_size: f64,
    pub target_base_position: f64,
    pub position_divergence: f64,
    pub ewma_protection: bool,
    #[serde(default)]
    pub aggressive_position_rebalancing: bool,
    pub trades_per_minute: f64,
    pub trade_rate_seconds: f64,
    pub audio: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for QuotingParameters {
    fn default() -> Self {
        Self {
            mode: QuotingMode::Top,
            fv_model: FairValueModel::BestBidOffer,
            auto_position_mode: AutoPositionMode::Manual,
            ping_at: PingAt::BothSides,
            pong_at: PongAt::ShortPingFair,
            bullets: 2,
            magazine: Magazine::Fast,
            width: 0.0,
            buy_size: 0.0,
            sell_size: 0.0,
            target_base_position: 0.0,
            position_divergence: 0.0,
            ewma_protection: false,
            aggressive_position_rebalancing: false,
            trades_per_minute: 0.0,
            trade_rate_seconds: 0.0,
            audio: false,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Working,
    Complete,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses drop the order from the open list.
    pub const fn is_done(self) -> bool {
        matches!(
            self,
            OrderStatus::Complete | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    pub order_id: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub base_amount: f64,
    pub quote_amount: f64,
    #[serde(default)]
    pub base_held: f64,
    #[serde(default)]
    pub quote_held: f64,
    /// Total value expressed in the base currency.
    pub value: f64,
    pub pair: CurrencyPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketQuote {
    pub bid: Option<Level>,
    pub ask: Option<Level>,
}

impl MarketQuote {
    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeSafety {
    pub buy: f64,
    pub sell: f64,
    pub combined: f64,
}
