//! # Unified Configuration System
//!
//! Configuration for the simulation kernel, loadable from TOML or RON through
//! the [`Config`] trait. Every section falls back to defaults so partial files
//! are accepted.
//!
//! ```toml
//! [physics]
//! tick_period_ms = 16
//! gravity = [0.0, -9.81, 0.0]
//!
//! [physics.partition]
//! strategy = "octree"
//! half_size = 512.0
//! capacity = 8
//! min_size = 4.0
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::foundation::math::Vec3;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed-step physics settings
    pub physics: PhysicsConfig,
    /// Frame driver settings
    pub render: RenderLoopConfig,
    /// Logging and crash reporting
    pub logging: LoggingConfig,
}

impl Config for EngineConfig {}

/// Fixed-step physics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Target tick period in milliseconds
    pub tick_period_ms: u64,
    /// Gravity applied to non-kinematic rigidbodies
    pub gravity: Vec3,
    /// Number of recent tick durations kept for diagnostics
    pub tick_history: usize,
    /// Broad-phase partitioning strategy
    pub partition: PartitionConfig,
}

impl PhysicsConfig {
    /// Tick period as a duration
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }

    /// Tick period in seconds, the fixed delta handed to physics hooks
    pub fn tick_delta(&self) -> f32 {
        self.tick_period().as_secs_f32()
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 16,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            tick_history: 120,
            partition: PartitionConfig::default(),
        }
    }
}

/// Broad-phase partitioning strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PartitionConfig {
    /// Uniform grid over the XZ plane
    Grid {
        /// Chunk side length in world units
        side_length: f32,
    },
    /// Lazily subdivided octree
    Octree {
        /// Half extent of the root node
        half_size: f32,
        /// Entities a node holds before descending
        capacity: usize,
        /// Half extent below which nodes stop subdividing
        min_size: f32,
    },
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::Grid { side_length: 10.0 }
    }
}

/// Frame driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLoopConfig {
    /// Target frames per second
    pub target_fps: u32,
    /// Stop the engine after this many frames (headless runs)
    pub max_frames: Option<u64>,
}

impl RenderLoopConfig {
    /// Target frame period
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.target_fps.max(1)))
    }
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_frames: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory crash reports are written to
    pub crash_report_dir: String,
    /// Default `env_logger` filter
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            crash_report_dir: "crash_reports".to_string(),
            level: "info".to_string(),
        }
    }
}
