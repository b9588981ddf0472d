//! Narrow-phase collision handlers
//!
//! Handlers are keyed by the ordered pair of collider shape tags. A pair
//! registered as `(A, B)` also serves `(B, A)` with its arguments swapped.
//! Pairs with no handler are logged and skipped.
//!
//! Contact resolution is linear only and splits by kinematic state:
//! - one side kinematic: the dynamic side takes the full correction and its
//!   velocity is halved;
//! - both dynamic: each side takes half the correction and an impulse cancels
//!   the approaching relative velocity along the contact normal;
//! - both kinematic: listeners fire, nothing moves.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ecs::components::{BoxCollider, Collider, Rigidbody, SphereCollider};
use crate::ecs::{Component, Entity};
use crate::foundation::math::{axis, Vec3, UP};

/// Collider component plus everything a handler needs about its owner
pub struct ColliderRef<'a> {
    /// Collider as a component
    pub component: &'a Arc<dyn Component>,
    /// Collider shape view
    pub collider: &'a dyn Collider,
    /// Owning entity
    pub owner: Arc<Entity>,
}

impl<'a> ColliderRef<'a> {
    /// View `component` as a collider; `None` if it is not one or is orphaned
    pub fn new(component: &'a Arc<dyn Component>) -> Option<Self> {
        let collider = component.as_collider()?;
        let owner = component.base().owner()?;
        Some(Self {
            component,
            collider,
            owner,
        })
    }

    /// Enabled and owned by an active entity
    pub fn is_active(&self) -> bool {
        self.component.base().is_active()
    }

    /// World-space centre
    pub fn position(&self) -> Vec3 {
        self.owner.transform().position() + self.collider.offset()
    }

    /// Concrete shape
    pub fn shape<T: Any>(&self) -> Option<&T> {
        self.collider.shape_any().downcast_ref::<T>()
    }
}

/// Returns true when the pair was in contact
pub type NarrowPhaseHandler = fn(&ColliderRef<'_>, &ColliderRef<'_>) -> bool;

/// Shape-pair keyed handler table
#[derive(Clone)]
pub struct NarrowPhaseDispatcher {
    handlers: HashMap<(&'static str, &'static str), NarrowPhaseHandler>,
}

impl NarrowPhaseDispatcher {
    /// Table without handlers
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Table with box-box and sphere-sphere handlers
    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.register(BoxCollider::TYPE_TAG, BoxCollider::TYPE_TAG, box_box);
        dispatcher.register(SphereCollider::TYPE_TAG, SphereCollider::TYPE_TAG, sphere_sphere);
        dispatcher
    }

    /// Register the handler for a shape pair
    pub fn register(&mut self, a: &'static str, b: &'static str, handler: NarrowPhaseHandler) {
        self.handlers.insert((a, b), handler);
    }

    /// Whether some handler serves the pair in either order
    pub fn handles(&self, a: &str, b: &str) -> bool {
        self.handlers
            .keys()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Run the handler for the pair; returns whether they were in contact
    pub fn dispatch(&self, a: &ColliderRef<'_>, b: &ColliderRef<'_>) -> bool {
        let (shape_a, shape_b) = (a.collider.shape(), b.collider.shape());
        if let Some(handler) = self.handlers.get(&(shape_a, shape_b)) {
            return handler(a, b);
        }
        if let Some(handler) = self.handlers.get(&(shape_b, shape_a)) {
            return handler(b, a);
        }
        log::error!("No narrow-phase handler for {shape_a} vs {shape_b}");
        false
    }
}

impl Default for NarrowPhaseDispatcher {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Common pre-checks: both active, distinct unrelated owners, both with bodies
fn bodies(a: &ColliderRef<'_>, b: &ColliderRef<'_>) -> Option<(Arc<Rigidbody>, Arc<Rigidbody>)> {
    if !a.is_active() || !b.is_active() {
        return None;
    }
    if Arc::ptr_eq(&a.owner, &b.owner) || a.owner.is_parent_or_child_of(&b.owner) {
        return None;
    }
    Some((a.owner.rigidbody()?, b.owner.rigidbody()?))
}

/// Axis-aligned box against axis-aligned box
pub fn box_box(a: &ColliderRef<'_>, b: &ColliderRef<'_>) -> bool {
    let (Some(box_a), Some(box_b)) = (a.shape::<BoxCollider>(), b.shape::<BoxCollider>()) else {
        return false;
    };
    let Some((body_a, body_b)) = bodies(a, b) else {
        return false;
    };

    let (center_a, center_b) = (a.position(), b.position());
    let (half_a, half_b) = (box_a.size() * 0.5, box_b.size() * 0.5);
    let (min_a, max_a) = (center_a - half_a, center_a + half_a);
    let (min_b, max_b) = (center_b - half_b, center_b + half_b);

    let mut separation_axis = 0;
    let mut depth = f32::INFINITY;
    for i in 0..3 {
        let overlap = max_a[i].min(max_b[i]) - min_a[i].max(min_b[i]);
        if overlap <= 0.0 {
            return false;
        }
        if overlap < depth {
            depth = overlap;
            separation_axis = i;
        }
    }

    notify(a, b);

    let sign = if center_a[separation_axis] - center_b[separation_axis] >= 0.0 {
        1.0
    } else {
        -1.0
    };
    resolve(a, &body_a, b, &body_b, axis(separation_axis) * sign, depth);
    true
}

/// Sphere against sphere
pub fn sphere_sphere(a: &ColliderRef<'_>, b: &ColliderRef<'_>) -> bool {
    let (Some(sphere_a), Some(sphere_b)) = (a.shape::<SphereCollider>(), b.shape::<SphereCollider>())
    else {
        return false;
    };
    let Some((body_a, body_b)) = bodies(a, b) else {
        return false;
    };

    let offset = a.position() - b.position();
    let distance = offset.norm();
    let depth = sphere_a.radius() + sphere_b.radius() - distance;
    if depth <= 0.0 {
        return false;
    }

    notify(a, b);

    let normal = if distance > f32::EPSILON {
        offset / distance
    } else {
        UP
    };
    resolve(a, &body_a, b, &body_b, normal, depth);
    true
}

fn notify(a: &ColliderRef<'_>, b: &ColliderRef<'_>) {
    a.collider.on_collision(&b.owner);
    b.collider.on_collision(&a.owner);
}

/// Separate and exchange momentum; `normal` points from `b` toward `a`
fn resolve(
    a: &ColliderRef<'_>,
    body_a: &Rigidbody,
    b: &ColliderRef<'_>,
    body_b: &Rigidbody,
    normal: Vec3,
    depth: f32,
) {
    match (body_a.is_kinematic(), body_b.is_kinematic()) {
        (false, true) => {
            a.owner.transform().translate(normal * depth);
            body_a.set_velocity(body_a.velocity() * 0.5);
        }
        (true, false) => {
            b.owner.transform().translate(-normal * depth);
            body_b.set_velocity(body_b.velocity() * 0.5);
        }
        (false, false) => {
            let half = depth * 0.5;
            a.owner.transform().translate(normal * half);
            b.owner.transform().translate(-normal * half);

            let relative = (body_a.velocity() - body_b.velocity()).dot(&normal);
            if relative < 0.0 {
                let (inverse_a, inverse_b) = (body_a.inverse_mass(), body_b.inverse_mass());
                let impulse = -relative / (inverse_a + inverse_b);
                body_a.set_velocity(body_a.velocity() + normal * impulse * inverse_a);
                body_b.set_velocity(body_b.velocity() - normal * impulse * inverse_b);
            }
        }
        (true, true) => {}
    }
}
