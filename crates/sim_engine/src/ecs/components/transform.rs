//! Transform component
//!
//! Position and rotation of an entity in world space. Moving a transform
//! moves every child by the same delta; rotation only affects the derived
//! basis vectors.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use crate::ecs::component::{Component, ComponentBase, FieldMap};
use crate::ecs::serialization::{dump_fields, merge_fields};
use crate::ecs::Entity;
use crate::foundation::math::{Basis, Quat, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TransformState {
    position: Vec3,
    rotation: Quat,
    fixed_point: bool,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            fixed_point: false,
        }
    }
}

/// World-space position and rotation
#[derive(Debug)]
pub struct Transform {
    base: ComponentBase,
    state: RwLock<TransformState>,
}

impl Transform {
    /// Tag used in entity documents
    pub const TYPE_TAG: &'static str = "Transform";

    /// Identity transform owned by `owner`
    pub fn new(owner: &Arc<Entity>) -> Self {
        Self::detached(Arc::downgrade(owner))
    }

    pub(crate) fn detached(owner: Weak<Entity>) -> Self {
        Self {
            base: ComponentBase::from_weak(owner),
            state: RwLock::new(TransformState::default()),
        }
    }

    /// Builder-style initial position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.state.get_mut().position = position;
        self
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.state.read().position
    }

    /// Move to `position`, shifting every child by the same delta.
    /// No-op while the transform is a fixed point.
    pub fn set_position(&self, position: Vec3) {
        let delta = {
            let mut state = self.state.write();
            if state.fixed_point {
                return;
            }
            let delta = position - state.position;
            state.position = position;
            delta
        };

        if let Some(owner) = self.base.owner() {
            for child in owner.children() {
                child.transform().translate(delta);
            }
        }
    }

    /// Move by `delta`
    pub fn translate(&self, delta: Vec3) {
        let target = self.position() + delta;
        self.set_position(target);
    }

    /// World rotation
    pub fn rotation(&self) -> Quat {
        self.state.read().rotation
    }

    /// Replace the rotation
    pub fn set_rotation(&self, rotation: Quat) {
        self.state.write().rotation = rotation;
    }

    /// Rotate by `rotation` applied after the current one
    pub fn rotate(&self, rotation: Quat) {
        let mut state = self.state.write();
        state.rotation = rotation * state.rotation;
    }

    /// Forward, right and up axes of the current rotation
    pub fn basis(&self) -> Basis {
        Basis::from_rotation(&self.rotation())
    }

    /// Unit forward axis
    pub fn forward(&self) -> Vec3 {
        self.basis().forward
    }

    /// Unit right axis
    pub fn right(&self) -> Vec3 {
        self.basis().right
    }

    /// Unit up axis
    pub fn up(&self) -> Vec3 {
        self.basis().up
    }

    /// Whether joints treat this transform as an anchor
    pub fn is_fixed_point(&self) -> bool {
        self.state.read().fixed_point
    }

    /// Pin the transform in place; position writes are ignored while set
    pub fn set_fixed_point(&self, fixed: bool) {
        self.state.write().fixed_point = fixed;
    }
}

impl Component for Transform {
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
        let mut state = self.state.write();
        merge_fields(&mut *state, data, Self::TYPE_TAG);
        state.rotation = Quat::new_normalize(state.rotation.into_inner());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_set_position_cascades_to_children() {
        let parent = Entity::new();
        let child = Entity::new();
        let grandchild = Entity::new();
        child.transform().set_position(Vec3::new(1.0, 0.0, 0.0));
        grandchild.transform().set_position(Vec3::new(0.0, 2.0, 0.0));
        parent.add_child(&child).unwrap();
        child.add_child(&grandchild).unwrap();

        parent.transform().set_position(Vec3::new(0.0, 0.0, 5.0));

        assert_relative_eq!(child.transform().position(), Vec3::new(1.0, 0.0, 5.0));
        assert_relative_eq!(grandchild.transform().position(), Vec3::new(0.0, 2.0, 5.0));
    }

    #[test]
    fn test_fixed_point_ignores_position_writes() {
        let entity = Entity::new();
        let child = Entity::new();
        entity.add_child(&child).unwrap();
        let transform = entity.transform();

        transform.set_fixed_point(true);
        transform.set_position(Vec3::new(3.0, 3.0, 3.0));

        assert_eq!(transform.position(), Vec3::zeros());
        assert_eq!(child.transform().position(), Vec3::zeros());
    }

    #[test]
    fn test_fixed_point_child_does_not_follow() {
        let parent = Entity::new();
        let child = Entity::new();
        parent.add_child(&child).unwrap();
        child.transform().set_fixed_point(true);

        parent.transform().set_position(Vec3::new(1.0, 1.0, 1.0));

        assert_eq!(child.transform().position(), Vec3::zeros());
    }

    #[test]
    fn test_rotation_updates_basis_without_cascading() {
        let parent = Entity::new();
        let child = Entity::new();
        parent.add_child(&child).unwrap();

        parent
            .transform()
            .set_rotation(Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2));

        let basis = parent.transform().basis();
        assert_relative_eq!(basis.forward, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(basis.right, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
        assert_relative_eq!(basis.up, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        assert_eq!(child.transform().rotation(), Quat::identity());
    }

    #[test]
    fn test_field_round_trip() {
        let entity = Entity::new();
        let transform = entity.transform();
        transform.set_position(Vec3::new(1.0, 2.0, 3.0));
        transform.set_rotation(Quat::from_euler_angles(0.1, 0.2, 0.3));
        transform.set_fixed_point(true);

        let other = Entity::new();
        other.transform().load_fields(&transform.save_fields());

        assert_relative_eq!(other.transform().position(), transform.position());
        assert_relative_eq!(other.transform().rotation(), transform.rotation(), epsilon = 1e-6);
        assert!(other.transform().is_fixed_point());
    }
}
