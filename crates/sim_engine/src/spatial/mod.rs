//! Spatial partitioning for broad-phase collision
//!
//! Two interchangeable strategies bucket entities by position: a uniform grid
//! over the XZ plane and a lazily subdivided octree. Neither is internally
//! synchronized; the owner serializes mutation with queries.

pub mod grid;
pub mod octree;

pub use grid::GridPartition;
pub use octree::{OctreeNode, OctreePartition};

use std::sync::Arc;

use crate::core::PartitionConfig;
use crate::ecs::Entity;
use crate::foundation::math::Vec3;

/// Proximity bucketing of entities
pub trait SpatialPartition: Send {
    /// Track an entity; returns false if it was already tracked
    fn add_entity(&mut self, entity: Arc<Entity>) -> bool;

    /// Stop tracking an entity; returns false if it was not tracked
    fn remove_entity(&mut self, entity: &Entity) -> bool;

    /// Rebuild buckets from current positions
    fn update(&mut self);

    /// Entities bucketed near `point`
    fn entities_near_point(&self, point: Vec3) -> Vec<Arc<Entity>>;

    /// Every non-empty bucket
    fn entities_chunked(&self) -> Vec<Vec<Arc<Entity>>>;

    /// Number of tracked entities
    fn entity_count(&self) -> usize;
}

/// Build the partition selected by configuration
pub fn partition_from_config(config: &PartitionConfig) -> Box<dyn SpatialPartition> {
    match *config {
        PartitionConfig::Grid { side_length } => Box::new(GridPartition::new(side_length)),
        PartitionConfig::Octree {
            half_size,
            capacity,
            min_size,
        } => Box::new(OctreePartition::new(Vec3::zeros(), half_size, capacity, min_size)),
    }
}

fn contains(entities: &[Arc<Entity>], entity: &Entity) -> bool {
    entities
        .iter()
        .any(|tracked| std::ptr::eq(Arc::as_ptr(tracked), entity))
}
