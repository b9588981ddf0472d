//! Octree partition
//!
//! Nodes are created lazily, one octant at a time. An entity is stored in the
//! first node (walking down from the root) that still has room or that has
//! reached the minimum size. Point queries use a loose test: a node matches
//! when its centre lies within its half size of the point, and every child is
//! visited whether or not the parent matched.

use std::sync::Arc;

use super::{contains, SpatialPartition};
use crate::ecs::Entity;
use crate::foundation::math::Vec3;

/// Single octree node
#[derive(Debug)]
pub struct OctreeNode {
    center: Vec3,
    size: f32,
    entities: Vec<Arc<Entity>>,
    children: [Option<Box<OctreeNode>>; 8],
}

impl OctreeNode {
    /// Empty node with the given centre and half size
    pub fn new(center: Vec3, size: f32) -> Self {
        Self {
            center,
            size,
            entities: Vec::new(),
            children: Default::default(),
        }
    }

    /// Centre of the node
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Half extent of the node
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Entities stored directly in this node
    pub fn entities(&self) -> &[Arc<Entity>] {
        &self.entities
    }

    /// Child nodes created so far
    pub fn children(&self) -> impl Iterator<Item = &OctreeNode> {
        self.children.iter().flatten().map(Box::as_ref)
    }

    // Octant layout matches the bit order x | y << 1 | z << 2
    fn octant_index(&self, position: Vec3) -> usize {
        let x_bit = usize::from(position.x >= self.center.x);
        let y_bit = usize::from(position.y >= self.center.y);
        let z_bit = usize::from(position.z >= self.center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    fn octant_center(&self, octant: usize) -> Vec3 {
        let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
        let quarter = self.size * 0.5;
        self.center + Vec3::new(sign(1) * quarter, sign(2) * quarter, sign(4) * quarter)
    }

    fn insert(&mut self, entity: Arc<Entity>, position: Vec3, capacity: usize, min_size: f32) {
        if self.entities.len() < capacity || self.size <= min_size {
            self.entities.push(entity);
            return;
        }

        let octant = self.octant_index(position);
        let child_center = self.octant_center(octant);
        let child_size = self.size * 0.5;
        self.children[octant]
            .get_or_insert_with(|| Box::new(OctreeNode::new(child_center, child_size)))
            .insert(entity, position, capacity, min_size);
    }

    fn remove(&mut self, entity: &Entity) -> bool {
        if let Some(index) = self
            .entities
            .iter()
            .position(|stored| std::ptr::eq(Arc::as_ptr(stored), entity))
        {
            self.entities.swap_remove(index);
            return true;
        }
        self.children
            .iter_mut()
            .flatten()
            .any(|child| child.remove(entity))
    }

    fn query(&self, point: Vec3, results: &mut Vec<Arc<Entity>>) {
        if (self.center - point).norm() <= self.size {
            results.extend(self.entities.iter().cloned());
        }
        for child in self.children() {
            child.query(point, results);
        }
    }

    fn collect_chunks(&self, chunks: &mut Vec<Vec<Arc<Entity>>>) {
        if !self.entities.is_empty() {
            chunks.push(self.entities.clone());
        }
        for child in self.children() {
            child.collect_chunks(chunks);
        }
    }

    /// Depth of the deepest node below and including this one
    pub fn depth(&self) -> usize {
        1 + self.children().map(OctreeNode::depth).max().unwrap_or(0)
    }
}

/// Smallest node half size; subdivision always stops here
pub const MIN_NODE_SIZE: f32 = 1e-3;

/// Lazily subdivided octree
#[derive(Debug)]
pub struct OctreePartition {
    root: OctreeNode,
    capacity: usize,
    min_size: f32,
    entities: Vec<Arc<Entity>>,
}

impl OctreePartition {
    /// Octree rooted at `center` with half extent `half_size`.
    ///
    /// `min_size` is raised to [`MIN_NODE_SIZE`] so a zero capacity still
    /// bottoms out.
    pub fn new(center: Vec3, half_size: f32, capacity: usize, min_size: f32) -> Self {
        Self {
            root: OctreeNode::new(center, half_size),
            capacity,
            min_size: min_size.max(MIN_NODE_SIZE),
            entities: Vec::new(),
        }
    }

    /// Root node of the tree
    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    fn place(&mut self, entity: Arc<Entity>) {
        let position = entity.transform().position();
        self.root
            .insert(entity, position, self.capacity, self.min_size);
    }
}

impl SpatialPartition for OctreePartition {
    fn add_entity(&mut self, entity: Arc<Entity>) -> bool {
        if contains(&self.entities, &entity) {
            return false;
        }
        self.entities.push(entity.clone());
        self.place(entity);
        true
    }

    fn remove_entity(&mut self, entity: &Entity) -> bool {
        if !contains(&self.entities, entity) {
            return false;
        }
        self.entities
            .retain(|tracked| !std::ptr::eq(Arc::as_ptr(tracked), entity));
        self.root.remove(entity);
        true
    }

    fn update(&mut self) {
        self.root = OctreeNode::new(self.root.center, self.root.size);
        for entity in self.entities.clone() {
            self.place(entity);
        }
    }

    fn entities_near_point(&self, point: Vec3) -> Vec<Arc<Entity>> {
        let mut results = Vec::new();
        self.root.query(point, &mut results);
        results
    }

    fn entities_chunked(&self) -> Vec<Vec<Arc<Entity>>> {
        let mut chunks = Vec::new();
        self.root.collect_chunks(&mut chunks);
        chunks
    }

    fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
