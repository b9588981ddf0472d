//! Uniform grid partition
//!
//! Buckets are square chunks over the XZ plane keyed by
//! `(floor(x / side), floor(z / side))`. Height is ignored. Point queries
//! return only the query point's own chunk, so neighbours across a chunk
//! border are not reported.

use std::collections::HashMap;
use std::sync::Arc;

use super::{contains, SpatialPartition};
use crate::ecs::Entity;
use crate::foundation::math::Vec3;

/// Integer chunk coordinate
pub type ChunkKey = (i32, i32);

/// Uniform XZ grid
pub struct GridPartition {
    side_length: f32,
    entities: Vec<Arc<Entity>>,
    chunks: HashMap<ChunkKey, Vec<Arc<Entity>>>,
}

impl GridPartition {
    /// Grid with square chunks of `side_length`
    pub fn new(side_length: f32) -> Self {
        let side_length = if side_length > 0.0 {
            side_length
        } else {
            log::warn!("Invalid grid side length {side_length}, using 1.0");
            1.0
        };
        Self {
            side_length,
            entities: Vec::new(),
            chunks: HashMap::new(),
        }
    }

    /// Edge length of one cell
    pub fn side_length(&self) -> f32 {
        self.side_length
    }

    /// Chunk containing `point`
    #[allow(clippy::cast_possible_truncation)]
    pub fn chunk_key(&self, point: Vec3) -> ChunkKey {
        (
            (point.x / self.side_length).floor() as i32,
            (point.z / self.side_length).floor() as i32,
        )
    }

    /// Number of non-empty chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn bucket(&mut self, entity: Arc<Entity>) {
        let key = self.chunk_key(entity.transform().position());
        self.chunks.entry(key).or_default().push(entity);
    }
}

impl SpatialPartition for GridPartition {
    fn add_entity(&mut self, entity: Arc<Entity>) -> bool {
        if contains(&self.entities, &entity) {
            return false;
        }
        self.entities.push(entity.clone());
        self.bucket(entity);
        true
    }

    fn remove_entity(&mut self, entity: &Entity) -> bool {
        if !contains(&self.entities, entity) {
            return false;
        }
        let is_other = |tracked: &Arc<Entity>| !std::ptr::eq(Arc::as_ptr(tracked), entity);
        self.entities.retain(is_other);
        for bucket in self.chunks.values_mut() {
            bucket.retain(is_other);
        }
        self.chunks.retain(|_, bucket| !bucket.is_empty());
        true
    }

    fn update(&mut self) {
        self.chunks.clear();
        for entity in self.entities.clone() {
            self.bucket(entity);
        }
    }

    fn entities_near_point(&self, point: Vec3) -> Vec<Arc<Entity>> {
        self.chunks
            .get(&self.chunk_key(point))
            .cloned()
            .unwrap_or_default()
    }

    fn entities_chunked(&self) -> Vec<Vec<Arc<Entity>>> {
        self.chunks.values().cloned().collect()
    }

    fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_at(position: Vec3) -> Arc<Entity> {
        let entity = Entity::new();
        entity.transform().set_position(position);
        entity
    }

    #[test]
    fn test_point_query_returns_same_chunk_only() {
        let mut grid = GridPartition::new(10.0);
        let entity = entity_at(Vec3::new(12.0, 0.0, 3.0));
        grid.add_entity(entity.clone());
        grid.update();

        let near = grid.entities_near_point(Vec3::new(15.0, 0.0, 1.0));
        assert_eq!(near.len(), 1);
        assert!(Arc::ptr_eq(&near[0], &entity));

        assert!(grid.entities_near_point(Vec3::new(25.0, 0.0, 3.0)).is_empty());
    }

    #[test]
    fn test_negative_coordinates_floor_into_their_own_chunk() {
        let grid = GridPartition::new(10.0);
        assert_eq!(grid.chunk_key(Vec3::new(-0.5, 100.0, 9.9)), (-1, 0));
        assert_eq!(grid.chunk_key(Vec3::new(10.0, 0.0, -10.0)), (1, -1));
    }

    #[test]
    fn test_update_rebuckets_moved_entities() {
        let mut grid = GridPartition::new(10.0);
        let entity = entity_at(Vec3::new(1.0, 0.0, 1.0));
        grid.add_entity(entity.clone());

        entity.transform().set_position(Vec3::new(31.0, 0.0, 1.0));
        assert_eq!(grid.entities_near_point(Vec3::new(2.0, 0.0, 2.0)).len(), 1);

        grid.update();
        assert!(grid.entities_near_point(Vec3::new(2.0, 0.0, 2.0)).is_empty());
        assert_eq!(grid.entities_near_point(Vec3::new(35.0, 0.0, 5.0)).len(), 1);
    }

    #[test]
    fn test_chunked_enumeration_and_removal() {
        let mut grid = GridPartition::new(5.0);
        let a = entity_at(Vec3::new(1.0, 0.0, 1.0));
        let b = entity_at(Vec3::new(2.0, 0.0, 2.0));
        let c = entity_at(Vec3::new(12.0, 0.0, 2.0));
        for entity in [&a, &b, &c] {
            assert!(grid.add_entity(entity.clone()));
        }
        assert!(!grid.add_entity(a.clone()));

        let mut sizes: Vec<usize> = grid.entities_chunked().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2]);

        assert!(grid.remove_entity(&c));
        assert!(!grid.remove_entity(&c));
        assert_eq!(grid.chunk_count(), 1);
        assert_eq!(grid.entity_count(), 2);
    }
}
