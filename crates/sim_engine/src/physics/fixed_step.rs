//! Fixed-timestep physics loop
//!
//! Each tick broadcasts one physics step through the event bus, measures how
//! long the broadcast took and sleeps for the rest of the period. Overruns
//! are logged and never compensated.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::PhysicsConfig;
use crate::ecs::Entity;
use crate::engine::{Engine, EngineComponent, EngineError, EngineHandle};
use crate::events::{ObserverKey, PhysicsStep};
use crate::foundation::collections::RingBuffer;
use crate::foundation::math::Vec3;
use crate::foundation::time::{remaining_in_period, Stopwatch};
use crate::physics::collision_system::CollisionSystem;
use crate::physics::PhysicsBackend;
use crate::spatial::partition_from_config;

/// Physics capability driving steps at a fixed period
pub struct FixedStepPhysics {
    engine: EngineHandle,
    period: Duration,
    gravity: Vec3,
    running: AtomicBool,
    attached: AtomicBool,
    listening: AtomicBool,
    collisions: Arc<CollisionSystem>,
    ticks: AtomicU64,
    history: Mutex<RingBuffer<Duration>>,
}

impl FixedStepPhysics {
    /// Stopped loop configured from `config`
    pub fn new(engine: EngineHandle, config: &PhysicsConfig) -> Self {
        Self {
            engine,
            period: config.tick_period(),
            gravity: config.gravity,
            running: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            listening: AtomicBool::new(false),
            collisions: Arc::new(CollisionSystem::new(partition_from_config(&config.partition))),
            ticks: AtomicU64::new(0),
            history: Mutex::new(RingBuffer::new(config.tick_history)),
        }
    }

    /// Target period between steps
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Collision pipeline fed by this loop
    pub fn collision_system(&self) -> Arc<CollisionSystem> {
        Arc::clone(&self.collisions)
    }

    /// Most recent step durations, oldest first
    pub fn recent_ticks(&self) -> Vec<Duration> {
        self.history.lock().iter().copied().collect()
    }

    fn step_info(&self) -> PhysicsStep {
        PhysicsStep {
            delta: self.period.as_secs_f32(),
            gravity: self.gravity,
        }
    }

    /// Hook the collision pipeline into the engine.
    ///
    /// The bus subscription follows each run; the entity listeners outlive
    /// it and are registered on the first attach only.
    fn attach(&self, engine: &Engine) {
        if self.attached.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = engine.event_bus() {
            bus.subscribe(self.collisions.clone());
        }

        for entity in engine.entities() {
            self.collisions.add_entity(&entity);
        }
        if self.listening.swap(true, Ordering::AcqRel) {
            return;
        }
        let added = Arc::clone(&self.collisions);
        engine.on_entity_created(Arc::new(move |entity: &Arc<Entity>| {
            added.add_entity(entity);
        }));
        let removed = Arc::clone(&self.collisions);
        engine.on_entity_removed(Arc::new(move |entity: &Arc<Entity>| {
            removed.remove_entity(entity);
        }));
    }

    fn detach(&self, engine: &Engine) {
        if let Some(bus) = engine.event_bus() {
            bus.unsubscribe(ObserverKey::of(self.collisions.as_ref()));
        }
        self.attached.store(false, Ordering::Release);
    }

    fn record(&self, elapsed: Duration) {
        self.history.lock().push(elapsed);
    }
}

impl EngineComponent for FixedStepPhysics {
    fn name(&self) -> &str {
        "fixed_step_physics"
    }

    fn initialize(&self) -> Result<(), EngineError> {
        let engine = self.engine.engine()?;
        self.attach(&engine);
        self.running.store(true, Ordering::Release);
        log::info!("Physics loop started at {:?} per step", self.period);

        while self.running.load(Ordering::Acquire) && engine.is_running() {
            let stopwatch = Stopwatch::start_new();
            self.step();
            let elapsed = stopwatch.elapsed();
            self.record(elapsed);

            match remaining_in_period(self.period, elapsed) {
                Some(remaining) if remaining.is_zero() => {}
                Some(remaining) => thread::sleep(remaining),
                None => log::warn!(
                    "Physics falling behind: step took {:?}, period is {:?}",
                    elapsed,
                    self.period
                ),
            }
        }

        self.detach(&engine);
        log::info!("Physics loop stopped after {} steps", self.tick_count());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

impl PhysicsBackend for FixedStepPhysics {
    fn step(&self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        if let Some(bus) = engine.event_bus() {
            bus.notify_physics_update(&self.step_info());
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn average_tick_duration(&self) -> Option<Duration> {
        let history = self.history.lock();
        if history.is_empty() {
            return None;
        }
        let total: Duration = history.iter().sum();
        Some(total / history.len() as u32)
    }
}
