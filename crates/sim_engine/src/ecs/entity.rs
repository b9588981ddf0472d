//! Entities: identity, component set and hierarchy
//!
//! An entity always owns exactly one distinguished [`Transform`] and caches
//! its first [`Rigidbody`]. Children are owned by their parent; the parent
//! link is weak. Entities are always handled through `Arc<Entity>` and carry
//! a weak self-reference so that `&self` methods can hand themselves out.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use uuid::Uuid;

use crate::ecs::component::{downcast_component, same_component, Component};
use crate::ecs::components::{Rigidbody, Transform};
use crate::engine::{Engine, EngineHandle};
use crate::events::ObserverKey;

/// Errors raised by component and hierarchy mutation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// Component was constructed for a different entity
    #[error("component '{component}' is owned by another entity than '{entity}'")]
    ForeignComponent {
        /// Entity the component was added to
        entity: String,
        /// Type tag of the rejected component
        component: &'static str,
    },

    /// The distinguished transform cannot be removed, only replaced
    #[error("entity '{0}' must keep its transform")]
    TransformRequired(String),

    /// Parenting would create a cycle
    #[error("cannot parent '{child}' under '{parent}': hierarchy cycle")]
    HierarchyCycle {
        /// Prospective parent
        parent: String,
        /// Prospective child
        child: String,
    },
}

/// Identified container of components
pub struct Entity {
    id: String,
    self_ref: Weak<Entity>,
    active: AtomicBool,
    components: RwLock<Vec<Arc<dyn Component>>>,
    transform: RwLock<Arc<Transform>>,
    rigidbody: RwLock<Option<Arc<Rigidbody>>>,
    parent: RwLock<Weak<Entity>>,
    children: RwLock<Vec<Arc<Entity>>>,
    engine: RwLock<Option<EngineHandle>>,
}

impl Entity {
    /// New active entity with a fresh unique id and a default transform
    pub fn new() -> Arc<Self> {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// New active entity with the given id
    pub fn with_id(id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        Arc::new_cyclic(|self_ref: &Weak<Entity>| {
            let transform = Arc::new(Transform::detached(self_ref.clone()));
            let as_component: Arc<dyn Component> = transform.clone();
            Entity {
                id,
                self_ref: self_ref.clone(),
                active: AtomicBool::new(true),
                components: RwLock::new(vec![as_component]),
                transform: RwLock::new(transform),
                rigidbody: RwLock::new(None),
                parent: RwLock::new(Weak::new()),
                children: RwLock::new(Vec::new()),
                engine: RwLock::new(None),
            }
        })
    }

    /// Unique identifier assigned at creation
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the entity takes part in updates
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Inactive entities receive no lifecycle callbacks
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    /// The distinguished transform
    pub fn transform(&self) -> Arc<Transform> {
        self.transform.read().clone()
    }

    /// The tracked rigidbody, if any
    pub fn rigidbody(&self) -> Option<Arc<Rigidbody>> {
        self.rigidbody.read().clone()
    }

    /// Shared handle to this entity, if it is still alive
    pub fn shared(&self) -> Option<Arc<Entity>> {
        self.self_ref.upgrade()
    }

    /// Engine the entity is registered with
    pub fn engine(&self) -> Option<Arc<Engine>> {
        self.engine.read().as_ref().and_then(EngineHandle::upgrade)
    }

    /// Whether the entity is registered with an engine
    pub fn is_live(&self) -> bool {
        self.engine().is_some()
    }

    /// Add a component constructed for this entity.
    ///
    /// Adding an instance already present is a no-op. A transform replaces
    /// the distinguished one; the first rigidbody becomes the tracked one.
    /// When the entity is live the component is attached immediately.
    pub fn add_component(&self, component: Arc<dyn Component>) -> Result<(), EntityError> {
        if !component.base().is_owned_by(self) {
            return Err(EntityError::ForeignComponent {
                entity: self.id.clone(),
                component: component.type_tag(),
            });
        }

        {
            let mut components = self.components.write();
            if components.iter().any(|existing| same_component(existing, &component)) {
                return Ok(());
            }
            components.push(component.clone());
        }

        let engine = self.engine();

        if let Some(transform) = downcast_component::<Transform>(&component) {
            let previous = std::mem::replace(&mut *self.transform.write(), transform);
            let previous: Arc<dyn Component> = previous;
            self.components
                .write()
                .retain(|existing| !same_component(existing, &previous));
            if let Some(engine) = &engine {
                detach_component(engine, &previous);
            }
        } else if let Some(rigidbody) = downcast_component::<Rigidbody>(&component) {
            let mut tracked = self.rigidbody.write();
            if tracked.is_none() {
                *tracked = Some(rigidbody);
            }
        }

        if let Some(engine) = &engine {
            attach_component(engine, &component);
        }
        Ok(())
    }

    /// Add a typed component and get it back shared
    pub fn add<T: Component>(&self, component: T) -> Result<Arc<T>, EntityError> {
        let component = Arc::new(component);
        self.add_component(component.clone())?;
        Ok(component)
    }

    /// Build a component for this entity and add it
    pub fn attach_new<T, F>(self: &Arc<Self>, build: F) -> Result<Arc<T>, EntityError>
    where
        T: Component,
        F: FnOnce(&Arc<Entity>) -> T,
    {
        self.add(build(self))
    }

    /// Remove a component; returns false if it was not present
    pub fn remove_component(&self, component: &Arc<dyn Component>) -> Result<bool, EntityError> {
        let transform: Arc<dyn Component> = self.transform();
        if same_component(&transform, component) {
            return Err(EntityError::TransformRequired(self.id.clone()));
        }

        let removed = {
            let mut components = self.components.write();
            let before = components.len();
            components.retain(|existing| !same_component(existing, component));
            components.len() != before
        };
        if !removed {
            return Ok(false);
        }

        {
            let mut tracked = self.rigidbody.write();
            let is_tracked = tracked.as_ref().is_some_and(|rigidbody| {
                let rigidbody: Arc<dyn Component> = rigidbody.clone();
                same_component(&rigidbody, component)
            });
            if is_tracked {
                *tracked = None;
            }
        }

        if let Some(engine) = self.engine() {
            detach_component(&engine, component);
        }
        Ok(true)
    }

    /// Snapshot of all components in insertion order
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components.read().clone()
    }

    /// First component of type `T`
    pub fn get_component<T: Component>(&self) -> Option<Arc<T>> {
        self.components
            .read()
            .iter()
            .find_map(|component| downcast_component::<T>(component))
    }

    /// Every component of type `T`
    pub fn get_components<T: Component>(&self) -> Vec<Arc<T>> {
        self.components
            .read()
            .iter()
            .filter_map(|component| downcast_component::<T>(component))
            .collect()
    }

    /// Components that expose a collider view
    pub fn colliders(&self) -> Vec<Arc<dyn Component>> {
        self.components
            .read()
            .iter()
            .filter(|component| component.as_collider().is_some())
            .cloned()
            .collect()
    }

    /// Parent entity, if attached to one that is still alive
    pub fn parent(&self) -> Option<Arc<Entity>> {
        self.parent.read().upgrade()
    }

    /// Snapshot of the direct children
    pub fn children(&self) -> Vec<Arc<Entity>> {
        self.children.read().clone()
    }

    /// Parent `child` under this entity, detaching it from any previous parent
    pub fn add_child(&self, child: &Arc<Entity>) -> Result<(), EntityError> {
        if std::ptr::eq(self, Arc::as_ptr(child)) || child.is_ancestor_of(self) {
            return Err(EntityError::HierarchyCycle {
                parent: self.id.clone(),
                child: child.id.clone(),
            });
        }

        if let Some(previous) = child.parent() {
            if std::ptr::eq(Arc::as_ptr(&previous), self) {
                return Ok(());
            }
            previous.remove_child(child);
        }

        *child.parent.write() = self.self_ref.clone();
        self.children.write().push(child.clone());

        if let Some(engine) = self.engine() {
            engine.add_entity(child);
        }
        Ok(())
    }

    /// Unparent a direct child; returns false if it was not a child
    pub fn remove_child(&self, child: &Entity) -> bool {
        let removed = {
            let mut children = self.children.write();
            let before = children.len();
            children.retain(|existing| !std::ptr::eq(Arc::as_ptr(existing), child));
            children.len() != before
        };
        if removed {
            *child.parent.write() = Weak::new();
        }
        removed
    }

    /// Whether this entity appears in `other`'s parent chain
    pub fn is_ancestor_of(&self, other: &Entity) -> bool {
        let mut current = other.parent();
        while let Some(entity) = current {
            if std::ptr::eq(Arc::as_ptr(&entity), self) {
                return true;
            }
            current = entity.parent();
        }
        false
    }

    /// Whether one of the two entities is the direct parent of the other
    pub fn is_parent_or_child_of(&self, other: &Entity) -> bool {
        let is_parent_of = |a: &Entity, b: &Entity| {
            b.parent()
                .is_some_and(|parent| std::ptr::eq(Arc::as_ptr(&parent), a))
        };
        is_parent_of(self, other) || is_parent_of(other, self)
    }

    /// Tear the entity down.
    ///
    /// Unregisters from the engine, destroys children first to last, runs
    /// every component's teardown (which unsubscribes it from the event bus)
    /// and finally detaches from the parent.
    pub fn destroy(&self) {
        let engine = self.engine.write().take().and_then(|handle| handle.upgrade());
        if let Some(engine) = &engine {
            engine.unregister_entity(self);
        }

        for child in self.children() {
            child.destroy();
        }

        for component in self.components() {
            match &engine {
                Some(engine) => detach_component(engine, &component),
                None => component.on_destroy(),
            }
        }

        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Bind to an engine and attach every component
    pub(crate) fn bind_engine(&self, handle: EngineHandle) {
        let Some(engine) = handle.upgrade() else {
            return;
        };
        *self.engine.write() = Some(handle);
        for component in self.components() {
            attach_component(&engine, &component);
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("components", &self.components.read().len())
            .field("children", &self.children.read().len())
            .finish()
    }
}

/// Subscribe a component to the engine's bus and start it if the engine runs
pub(crate) fn attach_component(engine: &Engine, component: &Arc<dyn Component>) {
    let observer = component.clone().into_observer();
    if let Some(bus) = engine.event_bus() {
        bus.subscribe(observer.clone());
    }
    if engine.is_running() {
        observer.handle_start();
    }
}

/// Unsubscribe a component and run its teardown hook
pub(crate) fn detach_component(engine: &Engine, component: &Arc<dyn Component>) {
    if let Some(bus) = engine.event_bus() {
        bus.unsubscribe(ObserverKey::of(component.as_ref()));
    }
    component.on_destroy();
}
