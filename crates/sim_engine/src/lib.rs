//! # Sim Engine
//!
//! A real-time simulation kernel: entities with components, an event bus
//! delivering lifecycle notifications, a fixed-timestep physics loop with
//! broad-phase partitioning and box/sphere collision, and an engine
//! composition root supervising pluggable capabilities on their own threads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sim_engine::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let render = config.render.clone();
//!     let physics = config.physics.clone();
//!
//!     let engine = Engine::builder(config)
//!         .register_event_bus(|_| Arc::new(EventBus::new()), false)
//!         .register_graphics(move |h| Arc::new(HeadlessRenderer::new(h, &render)), true)
//!         .register_physics(move |h| Arc::new(FixedStepPhysics::new(h, &physics)), true)
//!         .build();
//!
//!     let crate_entity = engine.create_entity();
//!     crate_entity.add(Rigidbody::new(&crate_entity))?;
//!     crate_entity.add(BoxCollider::new(&crate_entity))?;
//!
//!     engine.initialize()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;
pub mod engine;
pub mod events;

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod spatial;
pub mod physics;
pub mod render;
pub mod audio;
pub mod input;

#[cfg(test)]
mod engine_tests;

pub use engine::{Capability, Engine, EngineBuilder, EngineComponent, EngineError, EngineHandle};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        audio::{AudioError, AudioKind, SoundBackend, SoundManager},
        config::Config,
        core::{EngineConfig, PartitionConfig, PhysicsConfig, RenderLoopConfig},
        ecs::{
            components::{BoxCollider, Collider, DistanceJoint, Rigidbody, SphereCollider, Transform},
            Component, ComponentBase, ComponentRegistry, Entity, EntityError,
        },
        engine::{Capability, Engine, EngineBuilder, EngineComponent, EngineError, EngineHandle},
        events::{EventBus, EventDispatcher, Observer, PhysicsStep, Tick, UI_RENDER_CHANNEL},
        foundation::{
            logging::{EngineLogger, FileLogger, LogLevel},
            math::{Quat, Vec3},
            state_machine::{State, StateMachine},
            time::{Stopwatch, Timer},
        },
        input::{InputBackend, KeyAction, KeyCode, KeyTrigger, KeybindMap},
        physics::{FixedStepPhysics, PhysicsBackend},
        render::{GraphicsBackend, HeadlessRenderer},
        spatial::{GridPartition, OctreePartition, SpatialPartition},
    };
}
