//! Collision pipeline
//!
//! Runs as a physics-update observer. Each step refreshes the spatial
//! partition, gathers candidate pairs from it, releases the partition and
//! then runs the narrow phase for every collider pairing of each candidate.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::ecs::Entity;
use crate::events::{Observer, PhysicsStep};
use crate::physics::narrow_phase::{ColliderRef, NarrowPhaseDispatcher, NarrowPhaseHandler};
use crate::spatial::SpatialPartition;

/// Unordered candidate pair, stored in address order
#[derive(Debug, Clone)]
pub struct CollisionPair {
    /// Entity with the lower address
    pub entity_a: Arc<Entity>,
    /// Entity with the higher address
    pub entity_b: Arc<Entity>,
}

impl CollisionPair {
    /// Pair record for two colliding entities
    pub fn new(entity_a: Arc<Entity>, entity_b: Arc<Entity>) -> Self {
        if Arc::as_ptr(&entity_a) <= Arc::as_ptr(&entity_b) {
            Self { entity_a, entity_b }
        } else {
            Self {
                entity_a: entity_b,
                entity_b: entity_a,
            }
        }
    }

    fn key(&self) -> (usize, usize) {
        (
            Arc::as_ptr(&self.entity_a) as usize,
            Arc::as_ptr(&self.entity_b) as usize,
        )
    }
}

/// Broad phase plus narrow-phase dispatch
pub struct CollisionSystem {
    partition: Mutex<Box<dyn SpatialPartition>>,
    dispatcher: RwLock<NarrowPhaseDispatcher>,
    enabled: AtomicBool,
    contacts: AtomicU64,
}

impl CollisionSystem {
    /// Collision system over `partition` with the built-in handlers
    pub fn new(partition: Box<dyn SpatialPartition>) -> Self {
        Self {
            partition: Mutex::new(partition),
            dispatcher: RwLock::new(NarrowPhaseDispatcher::with_builtins()),
            enabled: AtomicBool::new(true),
            contacts: AtomicU64::new(0),
        }
    }

    /// Register a narrow-phase handler for a shape pair
    pub fn register_handler(&self, a: &'static str, b: &'static str, handler: NarrowPhaseHandler) {
        self.dispatcher.write().register(a, b, handler);
    }

    /// Track an entity in the broad phase
    pub fn add_entity(&self, entity: &Arc<Entity>) -> bool {
        self.partition.lock().add_entity(Arc::clone(entity))
    }

    /// Stop tracking an entity
    pub fn remove_entity(&self, entity: &Entity) -> bool {
        self.partition.lock().remove_entity(entity)
    }

    /// Number of entities the pipeline knows about
    pub fn tracked_entities(&self) -> usize {
        self.partition.lock().entity_count()
    }

    /// Pause or resume detection
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Contacts resolved since creation
    pub fn contact_count(&self) -> u64 {
        self.contacts.load(Ordering::Relaxed)
    }

    /// Refresh the partition and collect deduplicated candidate pairs
    pub fn candidate_pairs(&self) -> Vec<CollisionPair> {
        let mut partition = self.partition.lock();
        partition.update();

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for chunk in partition.entities_chunked() {
            for entity in chunk {
                let position = entity.transform().position();
                for other in partition.entities_near_point(position) {
                    if Arc::ptr_eq(&entity, &other) {
                        continue;
                    }
                    let pair = CollisionPair::new(Arc::clone(&entity), other);
                    if seen.insert(pair.key()) {
                        pairs.push(pair);
                    }
                }
            }
        }
        pairs
    }

    /// Run one detection pass; returns the number of contacts
    pub fn detect(&self) -> usize {
        let pairs = self.candidate_pairs();
        let dispatcher = self.dispatcher.read().clone();

        let mut contacts = 0;
        for pair in &pairs {
            let colliders_a = pair.entity_a.colliders();
            if colliders_a.is_empty() {
                continue;
            }
            let colliders_b = pair.entity_b.colliders();
            for component_a in &colliders_a {
                for component_b in &colliders_b {
                    let (Some(a), Some(b)) = (ColliderRef::new(component_a), ColliderRef::new(component_b))
                    else {
                        continue;
                    };
                    if dispatcher.dispatch(&a, &b) {
                        contacts += 1;
                    }
                }
            }
        }

        self.contacts.fetch_add(contacts as u64, Ordering::Relaxed);
        contacts
    }
}

impl Observer for CollisionSystem {
    fn handle_physics_update(&self, _step: &PhysicsStep) {
        self.detect();
    }

    fn is_active(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{BoxCollider, Rigidbody};
    use crate::foundation::math::Vec3;
    use crate::spatial::{GridPartition, OctreePartition};
    use approx::assert_relative_eq;

    fn crate_at(position: Vec3, kinematic: bool) -> Arc<Entity> {
        let entity = Entity::new();
        entity.transform().set_position(position);
        entity.attach_new(Rigidbody::new).unwrap().set_kinematic(kinematic);
        entity.attach_new(BoxCollider::new).unwrap();
        entity
    }

    #[test]
    fn test_detects_and_resolves_overlap_in_same_chunk() {
        let system = CollisionSystem::new(Box::new(GridPartition::new(10.0)));
        let floor = crate_at(Vec3::new(1.0, 0.0, 1.0), true);
        let falling = crate_at(Vec3::new(1.0, 0.5, 1.0), false);
        system.add_entity(&floor);
        system.add_entity(&falling);

        assert_eq!(system.candidate_pairs().len(), 1);
        assert_eq!(system.detect(), 1);
        assert_relative_eq!(falling.transform().position(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(system.detect(), 0);
        assert_eq!(system.contact_count(), 1);
    }

    #[test]
    fn test_entities_in_different_chunks_are_not_paired() {
        let system = CollisionSystem::new(Box::new(GridPartition::new(1.0)));
        let a = crate_at(Vec3::new(0.9, 0.0, 0.0), false);
        let b = crate_at(Vec3::new(1.1, 0.0, 0.0), false);
        system.add_entity(&a);
        system.add_entity(&b);

        assert!(system.candidate_pairs().is_empty());
        assert_eq!(system.detect(), 0);
    }

    #[test]
    fn test_octree_broad_phase() {
        let system = CollisionSystem::new(Box::new(OctreePartition::new(Vec3::zeros(), 50.0, 2, 1.0)));
        let a = crate_at(Vec3::new(0.0, 0.0, 0.0), false);
        let b = crate_at(Vec3::new(0.6, 0.0, 0.0), true);
        system.add_entity(&a);
        system.add_entity(&b);

        assert_eq!(system.detect(), 1);
        assert_relative_eq!(a.transform().position(), Vec3::new(-0.4, 0.0, 0.0));
    }

    #[test]
    fn test_removed_entities_are_not_checked() {
        let system = CollisionSystem::new(Box::new(GridPartition::new(10.0)));
        let a = crate_at(Vec3::zeros(), false);
        let b = crate_at(Vec3::new(0.5, 0.0, 0.0), false);
        system.add_entity(&a);
        system.add_entity(&b);

        assert!(system.remove_entity(&b));
        assert_eq!(system.tracked_entities(), 1);
        assert_eq!(system.detect(), 0);
    }

    #[test]
    fn test_disabled_system_is_inactive() {
        let system = CollisionSystem::new(Box::new(GridPartition::new(10.0)));
        assert!(system.is_active());
        system.set_enabled(false);
        assert!(!system.is_active());
    }
}
