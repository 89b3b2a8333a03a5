//! Client lifecycle: connection state, top-level subscriptions, and the
//! single live [`DisplayPair`].
//!
//! ```text
//!                 product advertisement
//!  Disconnected ─────────────────────────▶ Connected ──┐ advertisement
//!       ▲                                     │        │ same instrument: refresh names
//!       │   disconnect on any top-level sub   │        │ other instrument: replace pair
//!       └─────────────────────────────────────┘ ◀──────┘
//! ```
//!
//! The controller subscribes to three server-wide topics: product
//! advertisement, application state and notepad. A disconnect callback on
//! any of them tears the aggregate down and re-arms all three, so the next
//! connection starts from fresh snapshots. Severed subscriptions never
//! resume on their own.

mod ticket;

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, info};

use crate::fire::{Fire, FireFactory};
use crate::pair::DisplayPair;
use crate::protocol::models::{
    ApplicationState, CancelAllOrdersRequest, CleanAllClosedOrdersRequest, CleanAllOrdersRequest,
    Instrument, Notepad, ProductAdvertisement,
};
use crate::protocol::{topics, Subscribable};
use crate::subscriber::{SubscriberFactory, Subscription};
use crate::transport::DisconnectReason;

pub use ticket::OrderTicket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Dark between 21:00 and 09:00 server time.
    pub fn for_hour(hour: u8) -> Self {
        if !(9..21).contains(&hour) {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    fn flipped(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Formats a byte count with 1024-based units, e.g. `1.500KB`.
///
/// Counts of 1024 PiB or more fall back to the raw number.
pub fn bytes_to_size(bytes: u64, precision: usize) -> String {
    const UNITS: [&str; 6] = ["", "K", "M", "G", "T", "P"];

    let mut index = 0;
    let mut whole = bytes;
    while whole >= 1024 {
        whole /= 1024;
        index += 1;
    }
    if index >= UNITS.len() {
        return format!("{bytes}B");
    }
    let scaled = bytes as f64 / 1024f64.powi(index as i32);
    format!("{scaled:.precision$}{}B", UNITS[index])
}

struct Intents {
    cancel_all: Fire<CancelAllOrdersRequest>,
    clean_closed: Fire<CleanAllClosedOrdersRequest>,
    clean_all: Fire<CleanAllOrdersRequest>,
    notepad: Fire<Notepad>,
}

impl Intents {
    fn new(fires: &FireFactory) -> Self {
        Self {
            cancel_all: fires.fire::<topics::CancelAllOrders>(),
            clean_closed: fires.fire::<topics::CleanAllClosedOrders>(),
            clean_all: fires.fire::<topics::CleanAllOrders>(),
            notepad: fires.fire::<topics::ChangeNotepad>(),
        }
    }
}

struct Inner {
    subscribers: SubscriberFactory,
    fires: FireFactory,
    intents: Intents,
    ticket: OrderTicket,

    state: ConnectionState,
    environment: Option<String>,
    instrument: Option<Instrument>,
    pair_name: Option<String>,
    exchange_name: Option<String>,
    title: Option<String>,
    memory: Option<String>,
    hour: Option<u8>,
    notepad: Option<String>,
    user_theme: Option<Theme>,

    pair: Option<DisplayPair>,
    top_level: Vec<Subscription>,
    teardowns: u64,
    generation: u64,
    shut_down: bool,
}

impl Inner {
    fn on_advert(&mut self, ad: ProductAdvertisement) {
        let instrument = ad.instrument();
        self.state = ConnectionState::Connected;
        self.pair_name = Some(ad.pair.to_string());
        self.exchange_name = Some(ad.exchange.clone());
        self.title = Some(format!("tribeca [{}]", ad.environment));
        self.environment = Some(ad.environment);

        if let Some(pair) = &self.pair {
            if *pair.instrument() == instrument {
                debug!("advertisement for current instrument {instrument}, names refreshed");
                return;
            }
            info!("instrument changed from {} to {instrument}", pair.instrument());
        }
        if let Some(mut old) = self.pair.take() {
            old.dispose();
        }

        info!("connected: {instrument}");
        self.pair = Some(DisplayPair::new(
            &self.subscribers,
            &self.fires,
            instrument.clone(),
        ));
        self.instrument = Some(instrument);
        self.generation += 1;
    }

    fn on_app_state(&mut self, state: ApplicationState) {
        self.memory = Some(bytes_to_size(state.memory, 3));
        self.hour = Some(state.hour);
    }

    fn on_notepad(&mut self, notepad: Option<Notepad>) {
        self.notepad = Some(notepad.map(|np| np.content).unwrap_or_default());
    }

    /// Clears connection-scoped state and disposes the aggregate.
    fn teardown(&mut self, reason: &DisconnectReason) {
        if self.state == ConnectionState::Disconnected && self.pair.is_none() {
            debug!("teardown on {reason}: already disconnected");
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.pair_name = None;
        self.exchange_name = None;
        self.instrument = None;
        if let Some(mut pair) = self.pair.take() {
            pair.dispose();
        }
        self.teardowns += 1;
        info!("disconnected: {reason}");
    }
}

/// Owns everything the dashboard shows. Dropping it shuts it down.
pub struct ClientController {
    inner: Rc<RefCell<Inner>>,
}

impl ClientController {
    /// Builds the controller and arms its top-level subscriptions.
    pub fn new(subscribers: SubscriberFactory, fires: FireFactory) -> Self {
        let inner = Rc::new(RefCell::new(Inner {
            intents: Intents::new(&fires),
            ticket: OrderTicket::new(&fires),
            subscribers,
            fires,
            state: ConnectionState::Disconnected,
            environment: None,
            instrument: None,
            pair_name: None,
            exchange_name: None,
            title: None,
            memory: None,
            hour: None,
            notepad: None,
            user_theme: None,
            pair: None,
            top_level: Vec::new(),
            teardowns: 0,
            generation: 0,
            shut_down: false,
        }));

        let weak = Rc::downgrade(&inner);
        let armed = arm(&weak, &inner.borrow().subscribers);
        inner.borrow_mut().top_level = armed;
        Self { inner }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn environment(&self) -> Option<String> {
        self.inner.borrow().environment.clone()
    }

    pub fn instrument(&self) -> Option<Instrument> {
        self.inner.borrow().instrument.clone()
    }

    /// `BASE/QUOTE` of the advertised pair while connected.
    pub fn pair_name(&self) -> Option<String> {
        self.inner.borrow().pair_name.clone()
    }

    pub fn exchange_name(&self) -> Option<String> {
        self.inner.borrow().exchange_name.clone()
    }

    /// Window title, `tribeca [environment]`. Kept across disconnects.
    pub fn title(&self) -> Option<String> {
        self.inner.borrow().title.clone()
    }

    pub fn memory(&self) -> Option<String> {
        self.inner.borrow().memory.clone()
    }

    pub fn hour(&self) -> Option<u8> {
        self.inner.borrow().hour
    }

    pub fn notepad(&self) -> Option<String> {
        self.inner.borrow().notepad.clone()
    }

    /// Operator override if set, otherwise derived from the server hour.
    pub fn theme(&self) -> Theme {
        let inner = self.inner.borrow();
        inner
            .user_theme
            .or_else(|| inner.hour.map(Theme::for_hour))
            .unwrap_or(Theme::Light)
    }

    pub fn change_theme(&self) {
        let flipped = self.theme().flipped();
        self.inner.borrow_mut().user_theme = Some(flipped);
    }

    /// The live aggregate, if connected.
    ///
    /// Drop the guard before the hub is pumped again: an advertisement or
    /// disconnect handled while it is held panics on the borrow.
    pub fn pair(&self) -> Option<Ref<'_, DisplayPair>> {
        Ref::filter_map(self.inner.borrow(), |inner| inner.pair.as_ref()).ok()
    }

    /// Mutable access to the order form. Same rule as [`pair`](Self::pair):
    /// release the guard before pumping the hub.
    pub fn order_ticket(&self) -> RefMut<'_, OrderTicket> {
        RefMut::map(self.inner.borrow_mut(), |inner| &mut inner.ticket)
    }

    /// Number of connected-to-disconnected transitions so far.
    pub fn teardowns(&self) -> u64 {
        self.inner.borrow().teardowns
    }

    /// Number of aggregates created so far.
    pub fn aggregate_generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    pub fn cancel_all_orders(&self) {
        self.inner
            .borrow()
            .intents
            .cancel_all
            .fire(&CancelAllOrdersRequest::default());
    }

    pub fn clean_all_closed_orders(&self) {
        self.inner
            .borrow()
            .intents
            .clean_closed
            .fire(&CleanAllClosedOrdersRequest::default());
    }

    pub fn clean_all_orders(&self) {
        self.inner
            .borrow()
            .intents
            .clean_all
            .fire(&CleanAllOrdersRequest::default());
    }

    pub fn change_notepad(&self, content: impl Into<String>) {
        self.inner
            .borrow()
            .intents
            .notepad
            .fire(&Notepad::new(content));
    }

    /// Disposes the top-level subscriptions and the aggregate. Idempotent.
    pub fn shutdown(&self) {
        let (subscriptions, pair) = {
            let mut inner = self.inner.borrow_mut();
            if inner.shut_down {
                return;
            }
            inner.shut_down = true;
            inner.state = ConnectionState::Disconnected;
            (std::mem::take(&mut inner.top_level), inner.pair.take())
        };
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        if let Some(mut pair) = pair {
            pair.dispose();
        }
        info!("client controller shut down");
    }
}

impl Drop for ClientController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn arm(weak: &Weak<RefCell<Inner>>, subscribers: &SubscriberFactory) -> Vec<Subscription> {
    vec![
        top_level::<topics::ProductAdvertisement>(subscribers, weak, Inner::on_advert),
        top_level::<topics::ApplicationState>(subscribers, weak, Inner::on_app_state),
        top_level::<topics::Notepad>(subscribers, weak, Inner::on_notepad),
    ]
}

fn top_level<T: Subscribable>(
    subscribers: &SubscriberFactory,
    weak: &Weak<RefCell<Inner>>,
    apply: fn(&mut Inner, T::Payload),
) -> Subscription {
    let on_value = Weak::clone(weak);
    let on_lost = Weak::clone(weak);
    subscribers
        .subscriber::<T>()
        .on_each(move |payload| {
            if let Some(inner) = on_value.upgrade() {
                apply(&mut inner.borrow_mut(), payload);
            }
        })
        .on_disconnect(move |reason| {
            if let Some(inner) = on_lost.upgrade() {
                link_lost(&inner, &on_lost, reason);
            }
        })
        .subscribe()
}

fn link_lost(inner: &Rc<RefCell<Inner>>, weak: &Weak<RefCell<Inner>>, reason: &DisconnectReason) {
    let stale = {
        let mut guard = inner.borrow_mut();
        if guard.shut_down {
            return;
        }
        guard.teardown(reason);
        let fresh = arm(weak, &guard.subscribers);
        std::mem::replace(&mut guard.top_level, fresh)
    };
    // Disposing the old handles also suppresses the disconnect callbacks
    // still pending for the other two topics.
    for subscription in &stale {
        subscription.unsubscribe();
    }
    debug!("top-level subscriptions re-armed");
}
