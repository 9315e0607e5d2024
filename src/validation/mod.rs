//! Plausibility checks on decoded observations

pub mod data;

pub use data::{DataValidator, ValidationError};
