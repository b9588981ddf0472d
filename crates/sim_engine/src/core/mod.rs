//! # Core Engine Module
//!
//! Shared configuration types consumed by the engine composition root and
//! the capability implementations shipped with the crate.

pub mod config;

pub use config::{
    EngineConfig,
    LoggingConfig,
    PartitionConfig,
    PhysicsConfig,
    RenderLoopConfig,
};
pub use crate::config::{Config, ConfigError};
