//! Engine façade and consumer-side interfaces

pub mod board;
pub mod engine;
pub mod formatting;
pub mod sink;
pub mod types;

pub use board::{MergedPosition, PositionBoard};
pub use engine::{BeaconEntry, IngestOutcome, PositioningEngine};
pub use formatting::{CsvFormatter, FixFormatter, JsonFormatter, OutputFormat, TextFormatter};
pub use sink::{position_channel, PositionDrain, PositionPublisher};
pub use types::{EngineStats, IngestError, PumpSummary};
