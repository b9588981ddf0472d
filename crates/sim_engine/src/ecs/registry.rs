//! Thread-safe registry of live entities
//!
//! Shared by the frame and physics threads. One lock covers add, remove and
//! enumeration; enumeration hands out a snapshot so callers iterate without
//! holding the lock.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::ecs::Entity;

/// Registry of live entities
#[derive(Default)]
pub struct EntityRegistry {
    entities: Mutex<Vec<Arc<Entity>>>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity; returns false if it was already present
    pub fn add(&self, entity: Arc<Entity>) -> bool {
        let mut entities = self.entities.lock();
        if entities.iter().any(|existing| Arc::ptr_eq(existing, &entity)) {
            return false;
        }
        entities.push(entity);
        true
    }

    /// Unregister an entity, returning it if it was present
    pub fn remove(&self, entity: &Entity) -> Option<Arc<Entity>> {
        let mut entities = self.entities.lock();
        let index = entities
            .iter()
            .position(|existing| std::ptr::eq(Arc::as_ptr(existing), entity))?;
        Some(entities.swap_remove(index))
    }

    /// Snapshot of every live entity
    pub fn snapshot(&self) -> Vec<Arc<Entity>> {
        self.entities.lock().clone()
    }

    /// Find a live entity by id
    pub fn find(&self, id: &str) -> Option<Arc<Entity>> {
        self.entities.lock().iter().find(|entity| entity.id() == id).cloned()
    }

    /// Whether the entity is registered
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities
            .lock()
            .iter()
            .any(|existing| std::ptr::eq(Arc::as_ptr(existing), entity))
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.lock().len()
    }

    /// Whether no entities are registered
    pub fn is_empty(&self) -> bool {
        self.entities.lock().is_empty()
    }
}
