use glam::{EulerRot, Quat, Vec3};
use rand::Rng;

use super::limits::VecLimits;

/// Axis order of an Euler parameterization, written as the column-vector
/// product it generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EulerOrder {
    /// R = Rx * Ry * Rz
    Xyz,
    /// R = Ry * Rx * Rz
    #[default]
    Yxz,
    /// R = Ry * Rz, the X angle stays frozen at zero
    Zy,
    /// R = Ry * Rz * Rx
    Yzx,
}

impl EulerOrder {
    pub fn name(self) -> &'static str {
        match self {
            EulerOrder::Xyz => "XYZ",
            EulerOrder::Yxz => "YXZ",
            EulerOrder::Zy => "ZY",
            EulerOrder::Yzx => "YZX",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "XYZ" => Some(EulerOrder::Xyz),
            "YXZ" => Some(EulerOrder::Yxz),
            "ZY" => Some(EulerOrder::Zy),
            "YZX" => Some(EulerOrder::Yzx),
            _ => None,
        }
    }
}

/// Euler angle parameterization of a joint rotation. Each axis is a
/// [`VecLimits`] DOF, so angles start frozen at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointEuler {
    order: EulerOrder,
    angles: VecLimits,
}

impl JointEuler {
    pub fn new(order: EulerOrder) -> Self {
        let mut e = Self::default();
        e.set_order(order);
        e
    }

    pub fn order(&self) -> EulerOrder {
        self.order
    }

    pub fn set_order(&mut self, order: EulerOrder) {
        self.order = order;
        if order == EulerOrder::Zy {
            self.angles.thaw(0);
            self.angles.set_value(0, 0.0);
            self.angles.freeze(0);
        }
    }

    pub fn value(&self, d: usize) -> f32 {
        self.angles.value(d)
    }

    pub fn values(&self) -> Vec3 {
        self.angles.values()
    }

    pub fn set_value(&mut self, d: usize, v: f32) -> bool {
        self.angles.set_value(d, v)
    }

    pub fn set_values(&mut self, v: Vec3) -> bool {
        self.angles.set_values(v)
    }

    pub fn limits(&self) -> &VecLimits {
        &self.angles
    }

    pub fn limits_mut(&mut self) -> &mut VecLimits {
        &mut self.angles
    }

    pub fn set_limits(&mut self, d: usize, lo: f32, hi: f32) -> bool {
        self.angles.set_limits(d, lo, hi)
    }

    pub fn in_limits(&self, d: usize, v: f32) -> bool {
        self.angles.in_limits(d, v)
    }

    pub fn frozen(&self, d: usize) -> bool {
        self.angles.frozen(d)
    }

    pub fn to_quat(&self) -> Quat {
        let a = self.angles.values();
        match self.order {
            EulerOrder::Xyz => Quat::from_euler(EulerRot::XYZ, a.x, a.y, a.z),
            EulerOrder::Yxz => Quat::from_euler(EulerRot::YXZ, a.y, a.x, a.z),
            EulerOrder::Zy => Quat::from_rotation_y(a.y) * Quat::from_rotation_z(a.z),
            EulerOrder::Yzx => Quat::from_euler(EulerRot::YZX, a.y, a.z, a.x),
        }
    }

    /// Decomposes `q` in this order and stores the (clamped) angles. Near
    /// gimbal lock the decomposition picks one of the equivalent branches.
    pub fn set_from_quat(&mut self, q: Quat) -> bool {
        let angles = match self.order {
            EulerOrder::Xyz => {
                let (x, y, z) = q.to_euler(EulerRot::XYZ);
                Vec3::new(x, y, z)
            }
            EulerOrder::Yxz => {
                let (y, x, z) = q.to_euler(EulerRot::YXZ);
                Vec3::new(x, y, z)
            }
            EulerOrder::Zy => {
                let (y, z, _) = q.to_euler(EulerRot::YZX);
                Vec3::new(0.0, y, z)
            }
            EulerOrder::Yzx => {
                let (y, z, x) = q.to_euler(EulerRot::YZX);
                Vec3::new(x, y, z)
            }
        };
        self.angles.set_values(angles)
    }

    pub fn random<R: Rng + ?Sized>(&self, d: usize, rng: &mut R) -> f32 {
        self.angles.random(d, rng)
    }
}
