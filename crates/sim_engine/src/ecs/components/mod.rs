//! Built-in components

pub mod collider;
pub mod joint;
pub mod rigidbody;
pub mod transform;

pub use collider::{BoxCollider, Collider, CollisionListener, CollisionListeners, SphereCollider};
pub use joint::DistanceJoint;
pub use rigidbody::Rigidbody;
pub use transform::Transform;
