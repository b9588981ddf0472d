//! Engine composition root
//!
//! The engine owns one implementation per capability (graphics, physics,
//! sound, input, event bus), starts each either on the caller's thread or on
//! a dedicated thread, supervises those threads and owns the live entity
//! registry. There is no global instance: components receive an
//! [`EngineHandle`] from their factory and upgrade it when they need the
//! engine.

use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, Weak};
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::audio::SoundBackend;
use crate::core::EngineConfig;
use crate::ecs::Entity;
use crate::events::EventDispatcher;
use crate::foundation::logging::{CrashReport, EngineLogger, FileLogger};
use crate::input::InputBackend;
use crate::physics::PhysicsBackend;
use crate::render::GraphicsBackend;

/// Engine-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A mandatory capability was never registered
    #[error("missing mandatory capability: {0}")]
    MissingCapability(Capability),

    /// `initialize` was called while the engine was already running
    #[error("engine is already running")]
    AlreadyRunning,

    /// A component failed while initializing or running
    #[error("component '{component}' failed: {reason}")]
    ComponentFault {
        /// Name of the failing component
        component: String,
        /// Error or panic message
        reason: String,
    },

    /// The engine behind a handle has been dropped
    #[error("engine is no longer alive")]
    EngineDropped,
}

/// Lifecycle shared by every pluggable engine component
pub trait EngineComponent: Send + Sync {
    /// Identity used in logs and crash reports
    fn name(&self) -> &str;

    /// Start the component. Loop-driving components block here until stopped.
    fn initialize(&self) -> Result<(), EngineError>;

    /// Ask the component to stop; must not block on the component's own loop
    fn shutdown(&self) -> Result<(), EngineError>;
}

/// Capability interfaces an engine can be composed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Frame driver and renderer
    Graphics,
    /// Fixed-step simulation
    Physics,
    /// Audio playback
    Sound,
    /// Key and device polling
    Input,
    /// Lifecycle notification fan-out
    EventBus,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Graphics => "graphics",
            Capability::Physics => "physics",
            Capability::Sound => "sound",
            Capability::Input => "input",
            Capability::EventBus => "event bus",
        };
        f.write_str(name)
    }
}

/// Weak, cloneable reference to an engine
#[derive(Clone, Default)]
pub struct EngineHandle(Weak<Engine>);

impl EngineHandle {
    /// Handle that never upgrades; for components used outside an engine
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    /// The engine, if it is still alive
    pub fn upgrade(&self) -> Option<Arc<Engine>> {
        self.0.upgrade()
    }

    /// Upgrade or fail with [`EngineError::EngineDropped`]
    pub fn engine(&self) -> Result<Arc<Engine>, EngineError> {
        self.upgrade().ok_or(EngineError::EngineDropped)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineHandle")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

/// Callback fired when an entity is registered or unregistered
pub type EntityListener = Arc<dyn Fn(&Arc<Entity>) + Send + Sync>;

enum Typed {
    Graphics(Arc<dyn GraphicsBackend>),
    Physics(Arc<dyn PhysicsBackend>),
    Sound(Arc<dyn SoundBackend>),
    Input(Arc<dyn InputBackend>),
    EventBus(Arc<dyn EventDispatcher>),
}

struct Installed {
    component: Arc<dyn EngineComponent>,
    typed: Typed,
}

type BuildFn = Box<dyn FnOnce(EngineHandle) -> Installed>;

struct Registration {
    capability: Capability,
    dedicated: bool,
    build: BuildFn,
}

/// Registered component plus its threading policy
struct EngineSlot {
    capability: Capability,
    component: Arc<dyn EngineComponent>,
    dedicated: bool,
    alive: Arc<AtomicBool>,
}

/// Builder collecting capability factories before the engine exists
pub struct EngineBuilder {
    config: EngineConfig,
    logger: Option<Arc<dyn EngineLogger>>,
    registrations: Vec<Registration>,
}

macro_rules! register_capability {
    ($(#[$doc:meta])* $method:ident, $bound:ident, $capability:ident) => {
        $(#[$doc])*
        pub fn $method<T, F>(self, factory: F, dedicated_thread: bool) -> Self
        where
            T: $bound + 'static,
            F: FnOnce(EngineHandle) -> Arc<T> + 'static,
        {
            self.register(Capability::$capability, dedicated_thread, move |handle| {
                let component = factory(handle);
                Installed {
                    component: component.clone(),
                    typed: Typed::$capability(component),
                }
            })
        }
    };
}

impl EngineBuilder {
    /// Empty builder carrying `config`
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            logger: None,
            registrations: Vec::new(),
        }
    }

    /// Use a custom logger instead of the default [`FileLogger`]
    pub fn with_logger(mut self, logger: Arc<dyn EngineLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    register_capability!(
        /// Register the graphics capability
        register_graphics, GraphicsBackend, Graphics
    );
    register_capability!(
        /// Register the physics capability
        register_physics, PhysicsBackend, Physics
    );
    register_capability!(
        /// Register the sound capability
        register_sound, SoundBackend, Sound
    );
    register_capability!(
        /// Register the input capability
        register_input, InputBackend, Input
    );
    register_capability!(
        /// Register the event bus capability
        register_event_bus, EventDispatcher, EventBus
    );

    fn register(
        mut self,
        capability: Capability,
        dedicated: bool,
        build: impl FnOnce(EngineHandle) -> Installed + 'static,
    ) -> Self {
        let before = self.registrations.len();
        self.registrations.retain(|existing| existing.capability != capability);
        if self.registrations.len() != before {
            log::warn!("Replacing previously registered {capability} capability");
        }
        self.registrations.push(Registration {
            capability,
            dedicated,
            build: Box::new(build),
        });
        self
    }

    /// Invoke every factory once and produce the engine
    pub fn build(self) -> Arc<Engine> {
        let EngineBuilder {
            config,
            logger,
            mut registrations,
        } = self;

        // Event bus first so later factories observe a stable registration order
        registrations.sort_by_key(|registration| registration.capability != Capability::EventBus);

        Arc::new_cyclic(|weak: &Weak<Engine>| {
            let handle = EngineHandle(weak.clone());
            let mut capabilities = Capabilities::default();
            let mut slots = Vec::with_capacity(registrations.len());

            for registration in registrations {
                let installed = (registration.build)(handle.clone());
                match installed.typed {
                    Typed::Graphics(c) => capabilities.graphics = Some(c),
                    Typed::Physics(c) => capabilities.physics = Some(c),
                    Typed::Sound(c) => capabilities.sound = Some(c),
                    Typed::Input(c) => capabilities.input = Some(c),
                    Typed::EventBus(c) => capabilities.event_bus = Some(c),
                }
                slots.push(EngineSlot {
                    capability: registration.capability,
                    component: installed.component,
                    dedicated: registration.dedicated,
                    alive: Arc::new(AtomicBool::new(false)),
                });
            }

            let logger = logger.unwrap_or_else(|| {
                Arc::new(FileLogger::new(&config.logging.crash_report_dir)) as Arc<dyn EngineLogger>
            });

            Engine {
                self_ref: weak.clone(),
                config,
                logger,
                capabilities,
                slots,
                entities: crate::ecs::EntityRegistry::new(),
                running: AtomicBool::new(false),
                crashed: AtomicBool::new(false),
                fault: Mutex::new(None),
                created_listeners: RwLock::new(Vec::new()),
                removed_listeners: RwLock::new(Vec::new()),
            }
        })
    }
}

#[derive(Default)]
struct Capabilities {
    graphics: Option<Arc<dyn GraphicsBackend>>,
    physics: Option<Arc<dyn PhysicsBackend>>,
    sound: Option<Arc<dyn SoundBackend>>,
    input: Option<Arc<dyn InputBackend>>,
    event_bus: Option<Arc<dyn EventDispatcher>>,
}

/// The composition root
pub struct Engine {
    self_ref: Weak<Engine>,
    config: EngineConfig,
    logger: Arc<dyn EngineLogger>,
    capabilities: Capabilities,
    slots: Vec<EngineSlot>,
    entities: crate::ecs::EntityRegistry,
    running: AtomicBool,
    crashed: AtomicBool,
    fault: Mutex<Option<EngineError>>,
    created_listeners: RwLock<Vec<EntityListener>>,
    removed_listeners: RwLock<Vec<EntityListener>>,
}

impl Engine {
    /// Start building an engine
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Start every registered component and block until dedicated threads exit.
    ///
    /// Refuses to start (logging a fatal message, leaving the engine stopped
    /// and spawning nothing) unless both graphics and an event bus are
    /// registered. Graphics initializes first; the rest follow in
    /// registration order.
    pub fn initialize(self: &Arc<Self>) -> Result<(), EngineError> {
        for required in [Capability::Graphics, Capability::EventBus] {
            if !self.has_capability(required) {
                self.logger
                    .fatal(&format!("Cannot initialize engine: no {required} capability registered"));
                return Err(EngineError::MissingCapability(required));
            }
        }

        if self.running.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyRunning);
        }
        // A restart reports only its own faults.
        self.crashed.store(false, Ordering::Release);
        self.fault.lock().take();
        install_backtrace_hook();
        self.logger.info("Initializing engine");

        if let Some(bus) = self.event_bus() {
            bus.notify_start();
        }

        let mut threads: Vec<(String, JoinHandle<()>)> = Vec::new();
        for slot in self.initialization_order() {
            if !self.is_running() {
                break;
            }
            let name = slot.component.name().to_string();

            if slot.dedicated {
                slot.alive.store(true, Ordering::Release);
                let engine = Arc::clone(self);
                let component = Arc::clone(&slot.component);
                let alive = Arc::clone(&slot.alive);
                let thread_name = name.clone();
                let spawned = thread::Builder::new()
                    .name(format!("{}-{}", slot.capability, name))
                    .spawn(move || {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| component.initialize()));
                        alive.store(false, Ordering::Release);
                        engine.settle(&thread_name, outcome);
                    });
                match spawned {
                    Ok(join) => threads.push((name, join)),
                    Err(err) => {
                        slot.alive.store(false, Ordering::Release);
                        self.report_crash(&name, &format!("failed to spawn thread: {err}"), None);
                    }
                }
            } else {
                log::debug!("Initializing {name} on the calling thread");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| slot.component.initialize()));
                self.settle(&name, outcome);
            }
        }

        for (name, join) in threads {
            if join.join().is_err() {
                log::error!("Thread for '{name}' terminated abnormally");
            }
        }

        self.shutdown();

        match self.fault.lock().clone() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Stop the engine. Safe to call any number of times from any thread.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.logger.info("Shutting down engine");

        for slot in self.shutdown_order() {
            if slot.dedicated && !slot.alive.load(Ordering::Acquire) {
                continue;
            }
            let name = slot.component.name();
            match panic::catch_unwind(AssertUnwindSafe(|| slot.component.shutdown())) {
                Ok(Ok(())) => log::debug!("Shut down {name}"),
                Ok(Err(err)) => self.logger.error(&format!("Error shutting down {name}: {err}")),
                Err(payload) => {
                    take_panic_backtrace();
                    self.logger.error(&format!(
                        "Panic shutting down {name}: {}",
                        panic_message(payload.as_ref())
                    ));
                }
            }
        }
    }

    fn settle(&self, name: &str, outcome: std::thread::Result<Result<(), EngineError>>) {
        match outcome {
            Ok(Ok(())) => log::debug!("Component '{name}' finished"),
            Ok(Err(err)) => self.report_crash(
                name,
                &err.to_string(),
                Some(Backtrace::force_capture().to_string()),
            ),
            Err(payload) => self.report_crash(
                name,
                &panic_message(payload.as_ref()),
                take_panic_backtrace(),
            ),
        }
    }

    fn report_crash(&self, component: &str, fault: &str, backtrace: Option<String>) {
        self.crashed.store(true, Ordering::Release);
        match &backtrace {
            Some(trace) => self
                .logger
                .fatal(&format!("Component '{component}' crashed: {fault}\n{trace}")),
            None => self
                .logger
                .fatal(&format!("Component '{component}' crashed: {fault}")),
        }

        let mut report = CrashReport::new(component, fault);
        if let Some(trace) = backtrace {
            report = report.with_backtrace(trace);
        }
        match self.logger.dump_crash_report(&report) {
            Ok(path) => self
                .logger
                .info(&format!("Crash report written to {}", path.display())),
            Err(err) => self.logger.error(&format!("Failed to write crash report: {err}")),
        }

        self.fault.lock().get_or_insert_with(|| EngineError::ComponentFault {
            component: component.to_string(),
            reason: fault.to_string(),
        });
        self.shutdown();
    }

    fn initialization_order(&self) -> Vec<&EngineSlot> {
        let mut order: Vec<&EngineSlot> = self.slots.iter().collect();
        order.sort_by_key(|slot| slot.capability != Capability::Graphics);
        order
    }

    fn shutdown_order(&self) -> Vec<&EngineSlot> {
        let priority = |capability: Capability| match capability {
            Capability::Sound => 0,
            Capability::Physics => 1,
            Capability::Graphics => 2,
            _ => 3,
        };
        let mut order: Vec<&EngineSlot> = self.slots.iter().collect();
        order.sort_by_key(|slot| priority(slot.capability));
        order
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.slots.iter().any(|slot| slot.capability == capability)
    }

    /// Whether the engine has started and not yet shut down
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether any component has crashed
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::Acquire)
    }

    /// Weak handle to this engine
    pub fn handle(&self) -> EngineHandle {
        EngineHandle(self.self_ref.clone())
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Logger receiving lifecycle messages and crash reports
    pub fn logger(&self) -> Arc<dyn EngineLogger> {
        Arc::clone(&self.logger)
    }

    /// Registered graphics capability
    pub fn graphics(&self) -> Option<Arc<dyn GraphicsBackend>> {
        self.capabilities.graphics.clone()
    }

    /// Registered physics capability
    pub fn physics(&self) -> Option<Arc<dyn PhysicsBackend>> {
        self.capabilities.physics.clone()
    }

    /// Registered sound capability
    pub fn sound(&self) -> Option<Arc<dyn SoundBackend>> {
        self.capabilities.sound.clone()
    }

    /// Registered input capability
    pub fn input(&self) -> Option<Arc<dyn InputBackend>> {
        self.capabilities.input.clone()
    }

    /// Registered event bus
    pub fn event_bus(&self) -> Option<Arc<dyn EventDispatcher>> {
        self.capabilities.event_bus.clone()
    }

    /// Create a fresh entity and register it
    pub fn create_entity(&self) -> Arc<Entity> {
        let entity = Entity::new();
        self.add_entity(&entity);
        entity
    }

    /// Register an entity and its children, attaching all their components
    pub fn add_entity(&self, entity: &Arc<Entity>) {
        if !self.entities.add(Arc::clone(entity)) {
            return;
        }
        entity.bind_engine(self.handle());

        let listeners = self.created_listeners.read().clone();
        for listener in &listeners {
            listener(entity);
        }

        for child in entity.children() {
            self.add_entity(&child);
        }
    }

    /// Destroy a registered entity
    pub fn remove_entity(&self, entity: &Arc<Entity>) {
        entity.destroy();
    }

    /// Drop an entity from the registry and notify removal listeners
    pub(crate) fn unregister_entity(&self, entity: &Entity) {
        let Some(removed) = self.entities.remove(entity) else {
            return;
        };
        let listeners = self.removed_listeners.read().clone();
        for listener in &listeners {
            listener(&removed);
        }
    }

    /// Look up a live entity by id
    pub fn find_entity(&self, id: &str) -> Option<Arc<Entity>> {
        self.entities.find(id)
    }

    /// Snapshot of every live entity
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.entities.snapshot()
    }

    /// Number of registered entities, children included
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Resolve entity-valued component fields of `entity` against live entities
    pub fn resolve_references(&self, entity: &Entity) {
        entity.resolve_references(&|id: &str| self.find_entity(id));
    }

    /// Listen for entity registration
    pub fn on_entity_created(&self, listener: EntityListener) {
        self.created_listeners.write().push(listener);
    }

    /// Listen for entity removal
    pub fn on_entity_removed(&self, listener: EntityListener) {
        self.removed_listeners.write().push(listener);
    }

    #[cfg(test)]
    pub(crate) fn entity_listener_counts(&self) -> (usize, usize) {
        (
            self.created_listeners.read().len(),
            self.removed_listeners.read().len(),
        )
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capabilities: Vec<String> = self
            .slots
            .iter()
            .map(|slot| format!("{}:{}", slot.capability, slot.component.name()))
            .collect();
        f.debug_struct("Engine")
            .field("capabilities", &capabilities)
            .field("running", &self.is_running())
            .field("crashed", &self.has_crashed())
            .field("entities", &self.entity_count())
            .finish()
    }
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static BACKTRACE_HOOK: Once = Once::new();

/// Chain a panic hook that keeps the panicking thread's stack for crash reports.
fn install_backtrace_hook() {
    BACKTRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
