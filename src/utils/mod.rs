//! Configuration loading and validation

pub mod config;

pub use config::{
    AnchorConfig, AnchorLayout, ConfigError, ConfigSummary, EngineConfig, TechnologyConfig,
    ValidationResult, ValidationSettings,
};
