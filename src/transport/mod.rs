//! Telemetry transport adapters
//!
//! The engine only sees [`TelemetryMessage`]s pulled from a [`TelemetrySource`].
//! Connection handling for a live broker lives outside this crate; the sources
//! here cover testing, replay of captured traffic and synthetic data.

pub mod error;
pub mod mock;
pub mod replay;
pub mod simulator;

pub use error::{TransportError, TransportResult};
pub use mock::ScriptedSource;
pub use replay::LineSource;
pub use simulator::{SimulatedTag, Simulator};

use std::time::Instant;

/// One message as delivered by the transport: a topic and a raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: Instant,
}

impl TelemetryMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Instant::now(),
        }
    }

    pub fn with_received_at(mut self, received_at: Instant) -> Self {
        self.received_at = received_at;
        self
    }
}

/// Source of telemetry messages
pub trait TelemetrySource {
    /// Poll for the next message without blocking.
    ///
    /// `Ok(Some(message))` when a message is available, `Ok(None)` when nothing
    /// is pending right now, `Err` when the source failed.
    fn poll_message(&mut self) -> TransportResult<Option<TelemetryMessage>>;

    fn is_connected(&self) -> bool;

    /// Identifier used in log output
    fn source_id(&self) -> &str;
}
