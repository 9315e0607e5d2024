//! Core types and constants for the range multilateration engine

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
