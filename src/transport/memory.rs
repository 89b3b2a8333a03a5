//! In-process transport.
//!
//! Records every outbound frame instead of writing to a socket. The host
//! (or a test) decides when the link is up with [`open`](MemoryTransport::open)
//! / [`close`](MemoryTransport::close) and feeds inbound events into the
//! hub directly.

use std::cell::{Cell, RefCell};

use super::{Frame, FrameKind, Transport};
use crate::error::{Error, Result};
use crate::protocol::Topic;

#[derive(Debug, Default)]
pub struct MemoryTransport {
    connected: Cell<bool>,
    sent: RefCell<Vec<Frame>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        self.connected.set(true);
    }

    pub fn close(&self) {
        self.connected.set(false);
    }

    /// All frames accepted so far, oldest first.
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.borrow().clone()
    }

    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    /// Accepted frames of one kind on one topic.
    pub fn sent_on(&self, kind: FrameKind, topic: Topic) -> Vec<Frame> {
        self.sent
            .borrow()
            .iter()
            .filter(|frame| frame.kind == kind && frame.topic == topic)
            .cloned()
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn send(&self, frame: Frame) -> Result<()> {
        if !self.connected.get() {
            return Err(Error::Disconnected);
        }
        self.sent.borrow_mut().push(frame);
        Ok(())
    }
}
