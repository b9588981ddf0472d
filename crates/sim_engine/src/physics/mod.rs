//! Physics: fixed-step loop, collision detection and contact resolution
//!
//! Rigidbody integration, joints and collision detection are all ordinary
//! physics-update observers; the physics backend only decides when a step
//! happens and broadcasts it through the event bus.

pub mod collision_system;
pub mod fixed_step;
pub mod narrow_phase;

pub use collision_system::{CollisionPair, CollisionSystem};
pub use fixed_step::FixedStepPhysics;
pub use narrow_phase::{ColliderRef, NarrowPhaseDispatcher, NarrowPhaseHandler};

use std::time::Duration;

use crate::engine::EngineComponent;

/// Physics capability
pub trait PhysicsBackend: EngineComponent {
    /// Run a single fixed step on the calling thread
    fn step(&self);

    /// Steps run since creation
    fn tick_count(&self) -> u64;

    /// Mean wall-clock duration of the recent steps
    fn average_tick_duration(&self) -> Option<Duration>;
}
