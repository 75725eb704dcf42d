//! Math utilities module
//!
//! Rigid transforms plus small angle helpers, on top of glam.

mod transform;

pub use transform::Transform;

use std::f32::consts::{PI, TAU};

use glam::Quat;

/// Wraps an angle into `(-π, π]`.
pub fn wrap_angle(a: f32) -> f32 {
    let mut a = a % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Interpolates two angles along the shortest arc.
pub fn angle_lerp(a: f32, b: f32, t: f32) -> f32 {
    a + wrap_angle(b - a) * t
}

/// Reads a `[w, x, y, z]` quaternion, falling back to identity when it is
/// degenerate.
pub fn quat_from_wxyz(v: &[f32]) -> Quat {
    let q = Quat::from_xyzw(v[1], v[2], v[3], v[0]);
    let len = q.length();
    if len < 1.0e-8 || !len.is_finite() {
        Quat::IDENTITY
    } else {
        q / len
    }
}

pub fn quat_to_wxyz(q: Quat, out: &mut [f32]) {
    out[0] = q.w;
    out[1] = q.x;
    out[2] = q.y;
    out[3] = q.z;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_arc_crosses_pi() {
        let a = 170.0f32.to_radians();
        let b = -170.0f32.to_radians();
        let mid = angle_lerp(a, b, 0.5);
        assert!((wrap_angle(mid).abs() - PI).abs() < 1e-5);
    }

    #[test]
    fn degenerate_quat_reads_as_identity() {
        assert_eq!(quat_from_wxyz(&[0.0, 0.0, 0.0, 0.0]), Quat::IDENTITY);
        let q = quat_from_wxyz(&[2.0, 0.0, 0.0, 0.0]);
        assert!(q.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }
}
