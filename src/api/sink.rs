//! Position sink: the hand-off between the ingestion path and consumers
//!
//! Backed by an unbounded `mpsc` channel, so publishing never blocks and
//! publishers can be cloned across threads. The single [`PositionDrain`]
//! collects whatever is queued without waiting.

use crate::core::Fix;
use std::sync::mpsc::{self, Receiver, Sender};

/// Create a connected publisher/drain pair
pub fn position_channel() -> (PositionPublisher, PositionDrain) {
    let (sender, receiver) = mpsc::channel();
    (PositionPublisher { sender }, PositionDrain { receiver })
}

/// Producer side; cheap to clone
#[derive(Debug, Clone)]
pub struct PositionPublisher {
    sender: Sender<Fix>,
}

impl PositionPublisher {
    /// Queue a fix; false once the drain has been dropped
    pub fn publish(&self, fix: Fix) -> bool {
        self.sender.send(fix).is_ok()
    }
}

/// Consumer side
#[derive(Debug)]
pub struct PositionDrain {
    receiver: Receiver<Fix>,
}

impl PositionDrain {
    /// Take every queued fix in arrival order; empty when nothing is pending
    pub fn drain(&self) -> Vec<Fix> {
        self.receiver.try_iter().collect()
    }
}
