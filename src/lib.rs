//! Range aggregation and multilateration engine
//!
//! Turns streamed tag-to-anchor distance reports into 3D position fixes for
//! independent ranging technologies (BLE beacons, WiFi access points).

pub mod algorithms;
pub mod api;
pub mod core;
pub mod processing;
pub mod transport;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use algorithms::{
    BoundedSolver, BoundingBox, ClosedFormSolver, MultilaterationSolver, Multilaterator, SolveError,
    SolverSettings, SolverStrategy,
};
pub use api::{
    position_channel, EngineStats, IngestError, IngestOutcome, MergedPosition, OutputFormat, PositionBoard,
    PositionDrain, PositionPublisher, PositioningEngine,
};
pub use crate::core::{AnchorPosition, Fix, RangeObservation, Technology};
pub use processing::{MessageParser, ParseError, RangeSampleStore, ReadinessEvaluator};
pub use transport::{LineSource, ScriptedSource, Simulator, TelemetryMessage, TelemetrySource, TransportError};
pub use utils::{ConfigError, EngineConfig};
