//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the handful of helpers the simulation
//! kernel needs for transforms and contact resolution.

pub use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Unit quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// World forward axis (right-handed, -Z forward)
pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// World right axis
pub const RIGHT: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// World up axis
pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Basis vectors derived from a rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    /// Rotated forward vector
    pub forward: Vec3,
    /// Rotated right vector
    pub right: Vec3,
    /// Rotated up vector
    pub up: Vec3,
}

impl Basis {
    /// Compute the basis for a rotation
    pub fn from_rotation(rotation: &Quat) -> Self {
        Self {
            forward: rotation * FORWARD,
            right: rotation * RIGHT,
            up: rotation * UP,
        }
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::from_rotation(&Quat::identity())
    }
}

/// Unit vector along one of the three world axes
pub fn axis(index: usize) -> Vec3 {
    match index {
        0 => RIGHT,
        1 => UP,
        _ => Vec3::new(0.0, 0.0, 1.0),
    }
}

/// Inverse mass for a body; zero for immovable bodies
pub fn inverse_mass(mass: f32, immovable: bool) -> f32 {
    if immovable || mass <= 0.0 {
        0.0
    } else {
        1.0 / mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basis_identity() {
        let basis = Basis::default();
        assert_relative_eq!(basis.forward, FORWARD);
        assert_relative_eq!(basis.right, RIGHT);
        assert_relative_eq!(basis.up, UP);
    }

    #[test]
    fn test_basis_follows_rotation() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2);
        let basis = Basis::from_rotation(&rotation);
        assert_relative_eq!(basis.forward, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(basis.up, UP, epsilon = 1e-6);
    }

    #[test]
    fn test_inverse_mass() {
        assert_relative_eq!(inverse_mass(2.0, false), 0.5);
        assert_relative_eq!(inverse_mass(2.0, true), 0.0);
        assert_relative_eq!(inverse_mass(0.0, false), 0.0);
    }
}
