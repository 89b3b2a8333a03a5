use log::debug;

use crate::fire::{Fire, FireFactory};
use crate::protocol::models::{OrderRequestFromUi, OrderType, Side, TimeInForce};
use crate::protocol::topics;

/// Manual order entry form.
///
/// Fields start unset. [`OrderTicket::submit`] only fires once every field
/// is filled in and price and quantity are non-zero; the form keeps its
/// values afterwards so the operator can resend.
pub struct OrderTicket {
    pub side: Option<Side>,
    pub price: Option<f64>,
    pub quantity: Option<f64>,
    pub time_in_force: Option<TimeInForce>,
    pub order_type: Option<OrderType>,
    fire: Fire<OrderRequestFromUi>,
}

impl OrderTicket {
    pub fn new(fires: &FireFactory) -> Self {
        Self {
            side: None,
            price: None,
            quantity: None,
            time_in_force: None,
            order_type: None,
            fire: fires.fire::<topics::SubmitNewOrder>(),
        }
    }

    pub fn available_sides(&self) -> &'static [Side] {
        &Side::ALL
    }

    pub fn available_time_in_force(&self) -> &'static [TimeInForce] {
        &TimeInForce::ALL
    }

    pub fn available_order_types(&self) -> &'static [OrderType] {
        &OrderType::ALL
    }

    /// The request this ticket would send, if it is complete.
    pub fn request(&self) -> Option<OrderRequestFromUi> {
        let price = self.price.filter(|p| *p != 0.0)?;
        let quantity = self.quantity.filter(|q| *q != 0.0)?;
        Some(OrderRequestFromUi {
            side: self.side?,
            price,
            quantity,
            time_in_force: self.time_in_force?,
            order_type: self.order_type?,
        })
    }

    /// Fires the order. Returns `false` without sending if the ticket is
    /// incomplete.
    pub fn submit(&self) -> bool {
        match self.request() {
            Some(request) => {
                self.fire.fire(&request);
                true
            }
            None => {
                debug!("order ticket incomplete, not submitted");
                false
            }
        }
    }
}
