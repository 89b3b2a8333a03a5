use crate::protocol::models::{
    ActiveState, ConnectivityStatus, MarketQuote, OrderStatusReport, PositionReport,
    QuotingParameters, TradeSafety,
};

/// Quoting on/off as last reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveButton {
    server: Option<bool>,
}

impl ActiveButton {
    pub fn is_known(&self) -> bool {
        self.server.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.server.unwrap_or(false)
    }

    pub(crate) fn update(&mut self, state: ActiveState) {
        self.server = Some(state.active);
    }
}

/// Engine-applied quoting parameters plus the operator's working copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotingParametersView {
    connected: bool,
    applied: Option<QuotingParameters>,
    display: QuotingParameters,
}

impl QuotingParametersView {
    /// The quoting stream has delivered its snapshot and not been cut off.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn applied(&self) -> Option<&QuotingParameters> {
        self.applied.as_ref()
    }

    pub fn display(&self) -> &QuotingParameters {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut QuotingParameters {
        &mut self.display
    }

    /// The working copy differs from what the engine applied.
    pub fn is_pending(&self) -> bool {
        match &self.applied {
            Some(applied) => *applied != self.display,
            None => false,
        }
    }

    /// Discards local edits.
    pub fn reset(&mut self) {
        self.display = self.applied.clone().unwrap_or_default();
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// An engine update overwrites any local edits.
    pub(crate) fn update(&mut self, params: QuotingParameters) {
        self.display = params.clone();
        self.applied = Some(params);
    }
}

/// Open orders in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderList {
    orders: Vec<OrderStatusReport>,
}

impl OrderList {
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, order_id: &str) -> Option<&OrderStatusReport> {
        self.orders.iter().find(|o| o.order_id == order_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderStatusReport> {
        self.orders.iter()
    }

    pub(crate) fn apply(&mut self, report: OrderStatusReport) {
        let existing = self.orders.iter().position(|o| o.order_id == report.order_id);
        match (existing, report.status.is_done()) {
            (Some(idx), true) => {
                self.orders.remove(idx);
            }
            (Some(idx), false) => self.orders[idx] = report,
            (None, true) => {}
            (None, false) => self.orders.push(report),
        }
    }
}

/// Everything a `DisplayPair` tracks for its instrument.
#[derive(Debug, Clone, Default)]
pub struct PairState {
    pub(crate) exchange_connected: bool,
    pub(crate) active: ActiveButton,
    pub(crate) quoting: QuotingParametersView,
    pub(crate) orders: OrderList,
    pub(crate) position: Option<PositionReport>,
    pub(crate) market: Option<MarketQuote>,
    pub(crate) safety: Option<TradeSafety>,
}

impl PairState {
    pub fn exchange_connected(&self) -> bool {
        self.exchange_connected
    }

    pub fn active(&self) -> &ActiveButton {
        &self.active
    }

    pub fn quoting_parameters(&self) -> &QuotingParametersView {
        &self.quoting
    }

    pub fn orders(&self) -> &OrderList {
        &self.orders
    }

    pub fn position(&self) -> Option<&PositionReport> {
        self.position.as_ref()
    }

    pub fn market_quote(&self) -> Option<&MarketQuote> {
        self.market.as_ref()
    }

    pub fn trade_safety(&self) -> Option<&TradeSafety> {
        self.safety.as_ref()
    }

    pub(crate) fn on_connectivity(&mut self, status: ConnectivityStatus) {
        self.exchange_connected = status == ConnectivityStatus::Connected;
    }

    pub(crate) fn on_active(&mut self, state: ActiveState) {
        self.active.update(state);
    }

    pub(crate) fn on_quoting_snapshot(&mut self, snapshot: Vec<QuotingParameters>) {
        self.quoting.set_connected(true);
        for params in snapshot {
            self.quoting.update(params);
        }
    }

    pub(crate) fn on_quoting_parameters(&mut self, params: QuotingParameters) {
        self.quoting.update(params);
    }

    pub(crate) fn on_quoting_lost(&mut self) {
        self.quoting.set_connected(false);
    }

    pub(crate) fn on_order(&mut self, report: OrderStatusReport) {
        self.orders.apply(report);
    }

    pub(crate) fn on_position(&mut self, report: PositionReport) {
        self.position = Some(report);
    }

    pub(crate) fn on_market(&mut self, quote: MarketQuote) {
        self.market = Some(quote);
    }

    pub(crate) fn on_safety(&mut self, safety: TradeSafety) {
        self.safety = Some(safety);
    }
}
