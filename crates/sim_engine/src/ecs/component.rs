//! Component trait and shared component state
//!
//! Components are owned by exactly one [`Entity`] and hold their mutable data
//! behind interior locks so they can be shared with the event bus and read
//! from both the frame and physics threads.
//!
//! Creation is two-phase: a component is constructed with a back-reference to
//! its owner, and only when the owner adds it while registered with an engine
//! does it subscribe to the event bus (and receive `on_start` if the engine is
//! already running).

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::ecs::components::Collider;
use crate::ecs::Entity;
use crate::events::{Observer, PhysicsStep, Tick};

/// Flat field dump used by entity serialization
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// State every component carries: owner back-reference and lifecycle flags
#[derive(Debug)]
pub struct ComponentBase {
    owner: Weak<Entity>,
    enabled: AtomicBool,
    started: AtomicBool,
}

impl ComponentBase {
    /// Create the base for a component owned by `owner`
    pub fn new(owner: &Arc<Entity>) -> Self {
        Self::from_weak(Arc::downgrade(owner))
    }

    pub(crate) fn from_weak(owner: Weak<Entity>) -> Self {
        Self {
            owner,
            enabled: AtomicBool::new(true),
            started: AtomicBool::new(false),
        }
    }

    /// Owning entity, if it is still alive
    pub fn owner(&self) -> Option<Arc<Entity>> {
        self.owner.upgrade()
    }

    /// Whether `entity` is this component's owner
    pub fn is_owned_by(&self, entity: &Entity) -> bool {
        std::ptr::eq(self.owner.as_ptr(), entity)
    }

    /// Component-level enabled flag
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable the component independently of its entity
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Enabled, and the owning entity is alive and active
    pub fn is_active(&self) -> bool {
        self.is_enabled() && self.owner().is_some_and(|owner| owner.is_active())
    }

    /// Whether `on_start` has already run
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Flag the component as started; true only for the first call
    pub(crate) fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::AcqRel)
    }
}

/// Conversions every component gets for free
pub trait ComponentCast: Any + Send + Sync {
    /// Borrow as `Any` for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared component into a shared `Any`
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Convert a shared component into an event bus observer
    fn into_observer(self: Arc<Self>) -> Arc<dyn Observer>;
}

impl<T: Component> ComponentCast for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn into_observer(self: Arc<Self>) -> Arc<dyn Observer> {
        self
    }
}

/// Behaviour/data unit owned by an entity
pub trait Component: ComponentCast {
    /// Shared component state
    fn base(&self) -> &ComponentBase;

    /// Stable tag identifying the component type in documents
    fn type_tag(&self) -> &'static str;

    /// Called once, either on engine start or when attached to a running engine
    fn on_start(&self) {}

    /// Called every frame while active
    fn on_update(&self, _tick: &Tick) {}

    /// Called every physics step while active
    fn on_physics_update(&self, _step: &PhysicsStep) {}

    /// Called every frame after update while active
    fn on_render(&self) {}

    /// Called when the owning entity is destroyed
    fn on_destroy(&self) {}

    /// Dump serializable fields
    fn save_fields(&self) -> FieldMap {
        FieldMap::new()
    }

    /// Copy matching fields from a document; others keep their values
    fn load_fields(&self, _data: &FieldMap) {}

    /// Resolve entity-valued fields after deserialization
    fn resolve_references(&self, _lookup: &dyn Fn(&str) -> Option<Arc<Entity>>) {}

    /// Collider view of this component, if it is one
    fn as_collider(&self) -> Option<&dyn Collider> {
        None
    }
}

impl<T: Component> Observer for T {
    fn handle_start(&self) {
        if self.base().mark_started() {
            self.on_start();
        }
    }

    fn handle_update(&self, tick: &Tick) {
        self.on_update(tick);
    }

    fn handle_physics_update(&self, step: &PhysicsStep) {
        self.on_physics_update(step);
    }

    fn handle_render(&self) {
        self.on_render();
    }

    fn is_active(&self) -> bool {
        self.base().is_active()
    }
}

/// Downcast a shared component to its concrete type
pub fn downcast_component<T: Component>(component: &Arc<dyn Component>) -> Option<Arc<T>> {
    component.clone().into_any().downcast::<T>().ok()
}

/// Whether two shared components are the same instance
pub fn same_component(a: &Arc<dyn Component>, b: &Arc<dyn Component>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
