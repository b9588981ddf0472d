//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Bounded collections
//! - Time management
//! - Logging and crash reporting
//! - Owner-scoped state machines

pub mod math;
pub mod collections;
pub mod time;
pub mod logging;
pub mod state_machine;
