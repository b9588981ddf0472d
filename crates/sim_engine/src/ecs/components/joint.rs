//! Distance joint
//!
//! Pulls its owner and a target entity toward a rest length every physics
//! step. The target is stored as an entity id so it survives serialization
//! and is re-bound by a reference resolution pass.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use crate::ecs::component::{Component, ComponentBase, FieldMap};
use crate::ecs::serialization::{dump_fields, merge_fields};
use crate::ecs::Entity;
use crate::events::PhysicsStep;

const MIN_SEPARATION: f32 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JointState {
    target: Option<String>,
    rest_length: f32,
    stiffness: f32,
}

impl Default for JointState {
    fn default() -> Self {
        Self {
            target: None,
            rest_length: 1.0,
            stiffness: 1.0,
        }
    }
}

/// Keeps two entities at a fixed distance
#[derive(Debug)]
pub struct DistanceJoint {
    base: ComponentBase,
    state: RwLock<JointState>,
    target: RwLock<Weak<Entity>>,
}

impl DistanceJoint {
    /// Tag used in entity documents
    pub const TYPE_TAG: &'static str = "DistanceJoint";

    /// Unconnected joint owned by `owner`
    pub fn new(owner: &Arc<Entity>) -> Self {
        Self {
            base: ComponentBase::new(owner),
            state: RwLock::new(JointState::default()),
            target: RwLock::new(Weak::new()),
        }
    }

    /// Builder-style rest length
    pub fn with_rest_length(mut self, rest_length: f32) -> Self {
        self.state.get_mut().rest_length = rest_length.max(0.0);
        self
    }

    /// Bind the joint to `target`
    pub fn set_target(&self, target: &Arc<Entity>) {
        self.state.write().target = Some(target.id().to_string());
        *self.target.write() = Arc::downgrade(target);
    }

    /// Bound target entity, if resolved and alive
    pub fn target(&self) -> Option<Arc<Entity>> {
        self.target.read().upgrade()
    }

    /// Id of the target, resolved or not
    pub fn target_id(&self) -> Option<String> {
        self.state.read().target.clone()
    }

    /// Distance the joint tries to maintain
    pub fn rest_length(&self) -> f32 {
        self.state.read().rest_length
    }

    /// Change the distance the joint maintains
    pub fn set_rest_length(&self, rest_length: f32) {
        self.state.write().rest_length = rest_length.max(0.0);
    }

    /// Fraction of the length error corrected per step, clamped to `[0, 1]`
    pub fn set_stiffness(&self, stiffness: f32) {
        self.state.write().stiffness = stiffness.clamp(0.0, 1.0);
    }
}

fn is_movable(entity: &Entity) -> bool {
    entity
        .rigidbody()
        .is_some_and(|rigidbody| !rigidbody.is_kinematic())
}

impl Component for DistanceJoint {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn on_physics_update(&self, _step: &PhysicsStep) {
        let (Some(owner), Some(target)) = (self.base.owner(), self.target()) else {
            return;
        };
        let (rest_length, stiffness) = {
            let state = self.state.read();
            (state.rest_length, state.stiffness.clamp(0.0, 1.0))
        };

        let delta = target.transform().position() - owner.transform().position();
        let distance = delta.norm();
        if distance < MIN_SEPARATION {
            return;
        }
        let correction = delta / distance * (distance - rest_length) * stiffness;

        match (is_movable(&owner), is_movable(&target)) {
            (true, true) => {
                owner.transform().translate(correction * 0.5);
                target.transform().translate(-correction * 0.5);
            }
            (true, false) => owner.transform().translate(correction),
            (false, true) => target.transform().translate(-correction),
            (false, false) => {}
        }
    }

    fn save_fields(&self) -> FieldMap {
        dump_fields(&*self.state.read())
    }

    fn load_fields(&self, data: &FieldMap) {
        merge_fields(&mut *self.state.write(), data, Self::TYPE_TAG);
    }

    fn resolve_references(&self, lookup: &dyn Fn(&str) -> Option<Arc<Entity>>) {
        let Some(id) = self.target_id() else {
            return;
        };
        match lookup(&id) {
            Some(target) => *self.target.write() = Arc::downgrade(&target),
            None => log::warn!("DistanceJoint target '{id}' is not a live entity"),
        }
    }
}
