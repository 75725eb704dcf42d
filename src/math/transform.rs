use std::ops::Mul;

use glam::{Mat4, Quat, Vec3};

/// Rigid transform (rotation then translation). Used for IK goals and limb
/// base frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Drops any scale carried by `m`.
    pub fn from_matrix(m: Mat4) -> Self {
        let (_, rotation, position) = m.to_scale_rotation_translation();
        Self {
            position,
            rotation: rotation.normalize(),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            position: rotation * -self.position,
            rotation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.position
    }

    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }

    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
        }
    }
}

impl Mul for Transform {
    type Output = Transform;

    /// `(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`
    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            position: self.transform_point(rhs.position),
            rotation: (self.rotation * rhs.rotation).normalize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_composes_to_identity() {
        let t = Transform::from_position_rotation(Vec3::new(1.0, -2.0, 0.5), Quat::from_rotation_y(0.8));
        let id = t * t.inverse();
        assert!(id.position.abs_diff_eq(Vec3::ZERO, 1e-6));
        assert!(id.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn matrix_round_trip() {
        let t = Transform::from_position_rotation(Vec3::new(0.0, 3.0, -1.0), Quat::from_rotation_x(-0.4));
        let back = Transform::from_matrix(t.to_matrix());
        assert!(back.position.abs_diff_eq(t.position, 1e-5));
        assert!(back.rotation.dot(t.rotation).abs() > 1.0 - 1e-6);
        let p = Vec3::new(0.3, 0.2, 0.1);
        assert!(t.to_matrix().transform_point3(p).abs_diff_eq(t.transform_point(p), 1e-5));
    }
}
