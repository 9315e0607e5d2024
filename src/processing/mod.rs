//! Observation decoding, sample aggregation and fix assembly

pub mod assembler;
pub mod parser;
pub mod readiness;
pub mod store;

pub use assembler::FixAssembler;
pub use parser::{MessageParser, ParseError};
pub use readiness::{Readiness, ReadinessEvaluator};
pub use store::{RangeSample, RangeSampleStore, RangeSnapshot, SnapshotEntry};
