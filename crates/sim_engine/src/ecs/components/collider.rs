//! Collider components
//!
//! A collider describes a collidable shape at an offset from its owner's
//! position. Shapes are identified by a tag that keys narrow-phase dispatch.
//! A collider only participates in collision detection while it is enabled
//! and its owner is active.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ecs::component::{Component, ComponentBase, FieldMap};
use crate::ecs::serialization::{dump_fields, merge_fields};
use crate::ecs::Entity;
use crate::foundation::math::Vec3;

/// Callback invoked with the other entity of a contact
pub type CollisionListener = Arc<dyn Fn(&Arc<Entity>) + Send + Sync>;

/// Listener list plus a running contact count
#[derive(Default)]
pub struct CollisionListeners {
    listeners: RwLock<Vec<CollisionListener>>,
    contacts: AtomicU64,
}

impl CollisionListeners {
    /// Register a listener for every future collision
    pub fn add(&self, listener: CollisionListener) {
        self.listeners.write().push(listener);
    }

    /// Record a contact and notify every listener
    pub fn fire(&self, other: &Arc<Entity>) {
        self.contacts.fetch_add(1, Ordering::Relaxed);
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener(other);
        }
    }

    /// Contacts recorded since creation
    pub fn contact_count(&self) -> u64 {
        self.contacts.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for CollisionListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionListeners")
            .field("listeners", &self.listeners.read().len())
            .field("contacts", &self.contact_count())
            .finish()
    }
}

/// Shape view of a collider component
pub trait Collider: Send + Sync {
    /// Shape tag used to key narrow-phase handlers
    fn shape(&self) -> &'static str;

    /// Offset from the owner's position
    fn offset(&self) -> Vec3;

    /// Contact listeners
    fn listeners(&self) -> &CollisionListeners;

    /// Concrete shape for narrow-phase handlers
    fn shape_any(&self) -> &dyn Any;

    /// Notify listeners of a contact with `other`
    fn on_collision(&self, other: &Arc<Entity>) {
        self.listeners().fire(other);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BoxState {
    offset: Vec3,
    size: Vec3,
}

/// Axis-aligned box collider
#[derive(Debug)]
pub struct BoxCollider {
    base: ComponentBase,
    state: RwLock<BoxState>,
    listeners: CollisionListeners,
}

impl BoxCollider {
    /// Tag used in entity documents and dispatch
    pub const TYPE_TAG: &'static str = "BoxCollider";

    /// Unit box centred on the owner
    pub fn new(owner: &Arc<Entity>) -> Self {
        Self {
            base: ComponentBase::new(owner),
            state: RwLock::new(BoxState {
                offset: Vec3::zeros(),
                size: Vec3::new(1.0, 1.0, 1.0),
            }),
            listeners: CollisionListeners::default(),
        }
    }

    /// Builder-style full extents
    pub fn with_size(mut self, size: Vec3) -> Self {
        self.state.get_mut().size = size;
        self
    }

    /// Builder-style offset
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.state.get_mut().offset = offset;
        self
    }

    /// Full extents along each axis
    pub fn size(&self) -> Vec3 {
        self.state.read().size
    }

    /// Resize the box; `size` is the full extent
    pub fn set_size(&self, size: Vec3) {
        self.state.write().size = size;
    }

    /// Move the collider relative to its transform
    pub fn set_offset(&self, offset: Vec3) {
        self.state.write().offset = offset;
    }

    /// World-space centre, if the owner is alive
    pub fn position(&self) -> Option<Vec3> {
        let owner = self.base.owner()?;
        Some(owner.transform().position() + self.offset())
    }

    /// World-space `(min, max)` corners
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let centre = self.position()?;
        let half = self.size() * 0.5;
        Some((centre - half, centre + half))
    }

    /// Register a contact listener
    pub fn on_contact(&self, listener: CollisionListener) {
        self.listeners.add(listener);
    }
}

impl Collider for BoxCollider {
    fn shape(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn offset(&self) -> Vec3 {
        self.state.read().offset
    }

    fn listeners(&self) -> &CollisionListeners {
        &self.listeners
    }

    fn shape_any(&self) -> &dyn Any {
        self
    }
}

impl Component for BoxCollider {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn save_fields(&self) -> FieldMap {
        dump_fields(&*self.state.read())
    }

    fn load_fields(&self, data: &FieldMap) {
        merge_fields(&mut *self.state.write(), data, Self::TYPE_TAG);
    }

    fn as_collider(&self) -> Option<&dyn Collider> {
        Some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SphereState {
    offset: Vec3,
    radius: f32,
}

/// Sphere collider
#[derive(Debug)]
pub struct SphereCollider {
    base: ComponentBase,
    state: RwLock<SphereState>,
    listeners: CollisionListeners,
}

impl SphereCollider {
    /// Tag used in entity documents and dispatch
    pub const TYPE_TAG: &'static str = "SphereCollider";

    /// Sphere of radius 0.5 centred on the owner
    pub fn new(owner: &Arc<Entity>) -> Self {
        Self {
            base: ComponentBase::new(owner),
            state: RwLock::new(SphereState {
                offset: Vec3::zeros(),
                radius: 0.5,
            }),
            listeners: CollisionListeners::default(),
        }
    }

    /// Builder-style radius
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.state.get_mut().radius = radius;
        self
    }

    /// Sphere radius
    pub fn radius(&self) -> f32 {
        self.state.read().radius
    }

    /// Resize the sphere
    pub fn set_radius(&self, radius: f32) {
        self.state.write().radius = radius.max(0.0);
    }

    /// Move the collider relative to its transform
    pub fn set_offset(&self, offset: Vec3) {
        self.state.write().offset = offset;
    }

    /// World-space centre, if the owner is alive
    pub fn position(&self) -> Option<Vec3> {
        let owner = self.base.owner()?;
        Some(owner.transform().position() + self.offset())
    }

    /// Register a contact listener
    pub fn on_contact(&self, listener: CollisionListener) {
        self.listeners.add(listener);
    }
}

impl Collider for SphereCollider {
    fn shape(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn offset(&self) -> Vec3 {
        self.state.read().offset
    }

    fn listeners(&self) -> &CollisionListeners {
        &self.listeners
    }

    fn shape_any(&self) -> &dyn Any {
        self
    }
}

impl Component for SphereCollider {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn save_fields(&self) -> FieldMap {
        dump_fields(&*self.state.read())
    }

    fn load_fields(&self, data: &FieldMap) {
        merge_fields(&mut *self.state.write(), data, Self::TYPE_TAG);
    }

    fn as_collider(&self) -> Option<&dyn Collider> {
        Some(self)
    }
}
