mod common;

use std::time::{Duration, Instant};

use common::Rig;
use serde_json::json;
use tribeca_link::protocol::models::{Notepad, OrderType, Side, TimeInForce};
use tribeca_link::protocol::topics;
use tribeca_link::{ClientController, FrameKind, Topic};

#[test]
fn fire_while_disconnected_drops_without_blocking() {
    let rig = Rig::new();
    let fire = rig.fires().fire::<topics::ChangeNotepad>();

    let start = Instant::now();
    for i in 0..1_000 {
        fire.fire(&Notepad::new(format!("note {i}")));
    }
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(rig.transport.sent().is_empty());
    assert_eq!(rig.hub.dropped_sends(), 1_000);
}

#[test]
fn fire_after_link_loss_is_dropped_and_later_fires_go_through() {
    let rig = Rig::new();
    let fire = rig.fires().fire::<topics::CancelAllOrders>();
    rig.connect();
    fire.fire(&Default::default());
    rig.disconnect();
    fire.fire(&Default::default());
    rig.connect();
    fire.fire(&Default::default());

    assert_eq!(
        rig.transport
            .sent_on(FrameKind::Message, Topic::CancelAllOrders)
            .len(),
        2
    );
    assert_eq!(rig.hub.dropped_sends(), 1);
}

#[test]
fn untyped_fire_by_name() {
    let rig = Rig::new();
    rig.connect();
    let fire = rig.fires().fire_by_name("change-notepad").expect("publishable");
    fire.fire(&json!({"content": "raw"}));

    let sent = rig.transport.sent_on(FrameKind::Message, Topic::ChangeNotepad);
    assert_eq!(sent[0].payload, json!({"content": "raw"}));
    assert!(rig.fires().fire_by_name("market-data").is_err());
}

#[test]
fn controller_intents_are_silent_when_down() {
    let rig = Rig::new();
    let controller = ClientController::new(rig.subscribers(), rig.fires());

    controller.cancel_all_orders();
    controller.clean_all_orders();
    controller.change_notepad("offline");
    {
        let mut ticket = controller.order_ticket();
        ticket.side = Some(Side::Bid);
        ticket.price = Some(100.0);
        ticket.quantity = Some(1.0);
        ticket.time_in_force = Some(TimeInForce::ImmediateOrCancel);
        ticket.order_type = Some(OrderType::Market);
        assert!(ticket.submit());
    }

    assert!(rig.transport.sent().is_empty());
    assert_eq!(rig.hub.dropped_sends(), 4);
}
