//! Common API types

use crate::core::Technology;
use crate::processing::ParseError;
use crate::validation::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Why an incoming message or observation was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("anchor {anchor_id} is not registered for {technology}")]
    UnregisteredAnchor { technology: Technology, anchor_id: String },
}

/// Running counters of the ingestion path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    /// Messages handed to the engine, valid or not
    pub messages_received: u64,
    /// Observations stored in the sample store
    pub observations_recorded: u64,
    pub observations_dropped: u64,
    pub solve_attempts: u64,
    pub solve_failures: u64,
    pub fixes_emitted: u64,
    /// Fixes produced after the consumer side hung up
    pub fixes_undelivered: u64,
    pub transport_errors: u64,
}

impl EngineStats {
    /// Share of solve attempts that produced a fix
    pub fn solve_success_rate(&self) -> f64 {
        if self.solve_attempts == 0 {
            return 0.0;
        }
        (self.solve_attempts - self.solve_failures) as f64 / self.solve_attempts as f64
    }
}

/// Outcome of one [`pump`](super::PositioningEngine::pump) call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PumpSummary {
    pub messages: usize,
    pub fixes: usize,
    pub dropped: usize,
    pub skipped_frames: usize,
}
