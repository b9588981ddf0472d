//! Rigidbody component
//!
//! Linear dynamics only: gravity, drag and velocity are integrated into the
//! owner's transform every physics step. Kinematic bodies are never moved by
//! the integrator or by collision response.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ecs::component::{Component, ComponentBase, FieldMap};
use crate::ecs::serialization::{dump_fields, merge_fields};
use crate::ecs::Entity;
use crate::events::PhysicsStep;
use crate::foundation::math::{inverse_mass, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RigidbodyState {
    mass: f32,
    drag: f32,
    is_kinematic: bool,
    use_gravity: bool,
    velocity: Vec3,
}

impl Default for RigidbodyState {
    fn default() -> Self {
        Self {
            mass: 1.0,
            drag: 0.0,
            is_kinematic: false,
            use_gravity: true,
            velocity: Vec3::zeros(),
        }
    }
}

/// Mass, drag, velocity and kinematic flag of an entity
#[derive(Debug)]
pub struct Rigidbody {
    base: ComponentBase,
    state: RwLock<RigidbodyState>,
}

impl Rigidbody {
    /// Tag used in entity documents
    pub const TYPE_TAG: &'static str = "Rigidbody";

    /// Dynamic body of mass 1 affected by gravity
    pub fn new(owner: &Arc<Entity>) -> Self {
        Self {
            base: ComponentBase::new(owner),
            state: RwLock::new(RigidbodyState::default()),
        }
    }

    /// Builder-style kinematic body
    pub fn kinematic(owner: &Arc<Entity>) -> Self {
        let body = Self::new(owner);
        body.set_kinematic(true);
        body
    }

    /// Mass in kilograms
    pub fn mass(&self) -> f32 {
        self.state.read().mass
    }

    /// Set the mass; non-positive values are rejected
    pub fn set_mass(&self, mass: f32) {
        if mass <= 0.0 || !mass.is_finite() {
            log::warn!("Ignoring invalid rigidbody mass {mass}");
            return;
        }
        self.state.write().mass = mass;
    }

    /// Inverse mass, zero when kinematic
    pub fn inverse_mass(&self) -> f32 {
        let state = self.state.read();
        inverse_mass(state.mass, state.is_kinematic)
    }

    /// Linear drag coefficient
    pub fn drag(&self) -> f32 {
        self.state.read().drag
    }

    /// Change the drag coefficient
    pub fn set_drag(&self, drag: f32) {
        self.state.write().drag = drag.max(0.0);
    }

    /// Kinematic bodies are moved by hand and ignore forces
    pub fn is_kinematic(&self) -> bool {
        self.state.read().is_kinematic
    }

    /// Switch between kinematic and dynamic
    pub fn set_kinematic(&self, kinematic: bool) {
        self.state.write().is_kinematic = kinematic;
    }

    /// Whether gravity accelerates this body
    pub fn uses_gravity(&self) -> bool {
        self.state.read().use_gravity
    }

    /// Enable or disable gravity for this body
    pub fn set_use_gravity(&self, use_gravity: bool) {
        self.state.write().use_gravity = use_gravity;
    }

    /// Current linear velocity
    pub fn velocity(&self) -> Vec3 {
        self.state.read().velocity
    }

    /// Overwrite the linear velocity
    pub fn set_velocity(&self, velocity: Vec3) {
        self.state.write().velocity = velocity;
    }

    /// Change velocity by `impulse / mass`; ignored by kinematic bodies
    pub fn apply_impulse(&self, impulse: Vec3) {
        let mut state = self.state.write();
        let inverse = inverse_mass(state.mass, state.is_kinematic);
        state.velocity += impulse * inverse;
    }

    /// Advance velocity by one step and return the displacement to apply
    fn integrate(&self, step: &PhysicsStep) -> Option<Vec3> {
        let mut state = self.state.write();
        if state.is_kinematic {
            return None;
        }
        if state.use_gravity {
            state.velocity += step.gravity * step.delta;
        }
        let damping = (1.0 - state.drag * step.delta).max(0.0);
        state.velocity *= damping;
        Some(state.velocity * step.delta)
    }
}

impl Component for Rigidbody {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn on_physics_update(&self, step: &PhysicsStep) {
        let Some(displacement) = self.integrate(step) else {
            return;
        };
        if let Some(owner) = self.base.owner() {
            owner.transform().translate(displacement);
        }
    }

    fn save_fields(&self) -> FieldMap {
        dump_fields(&*self.state.read())
    }

    fn load_fields(&self, data: &FieldMap) {
        let mut state = self.state.write();
        merge_fields(&mut *state, data, Self::TYPE_TAG);
        if state.mass <= 0.0 {
            log::warn!("Rigidbody mass {} out of range, resetting to 1", state.mass);
            state.mass = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Observer;
    use approx::assert_relative_eq;

    fn step(delta: f32) -> PhysicsStep {
        PhysicsStep {
            delta,
            gravity: Vec3::new(0.0, -10.0, 0.0),
        }
    }

    #[test]
    fn test_integrates_gravity_into_position() {
        let entity = Entity::new();
        let body = entity.attach_new(Rigidbody::new).unwrap();

        body.on_physics_update(&step(0.5));

        assert_relative_eq!(body.velocity(), Vec3::new(0.0, -5.0, 0.0));
        assert_relative_eq!(entity.transform().position(), Vec3::new(0.0, -2.5, 0.0));
    }

    #[test]
    fn test_drag_damps_velocity() {
        let entity = Entity::new();
        let body = entity.attach_new(Rigidbody::new).unwrap();
        body.set_use_gravity(false);
        body.set_drag(1.0);
        body.set_velocity(Vec3::new(4.0, 0.0, 0.0));

        body.on_physics_update(&step(0.25));

        assert_relative_eq!(body.velocity(), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_kinematic_body_is_not_integrated() {
        let entity = Entity::new();
        let body = entity.attach_new(Rigidbody::kinematic).unwrap();
        body.set_velocity(Vec3::new(1.0, 0.0, 0.0));

        body.on_physics_update(&step(1.0));

        assert_eq!(entity.transform().position(), Vec3::zeros());
        assert_eq!(body.inverse_mass(), 0.0);
    }

    #[test]
    fn test_invalid_mass_is_rejected() {
        let entity = Entity::new();
        let body = Rigidbody::new(&entity);
        body.set_mass(-2.0);
        assert_eq!(body.mass(), 1.0);
        body.set_mass(4.0);
        assert_relative_eq!(body.inverse_mass(), 0.25);
    }

    #[test]
    fn test_disabled_body_skips_physics_hook() {
        let entity = Entity::new();
        let body = entity.attach_new(Rigidbody::new).unwrap();
        body.base().set_enabled(false);

        assert!(!Observer::is_active(&*body));
        entity.set_active(true);
        body.base().set_enabled(true);
        entity.set_active(false);
        assert!(!Observer::is_active(&*body));
    }
}
