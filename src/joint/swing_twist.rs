use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec2, Vec3};
use rand::Rng;

const MIN_RADIUS: f32 = 0.00001;

/// Splits `q` into `swing * twist`, where swing is an axis-angle vector in the
/// XY plane and twist is an angle about Z.
pub fn swing_twist_from_quat(q: Quat) -> (Vec2, f32) {
    let q = if q.w < 0.0 { -q } else { q };
    let len = (q.w * q.w + q.z * q.z).sqrt();
    if len < 1.0e-8 {
        // half-turn swing: twist is undefined, report zero
        let sv = q.to_scaled_axis();
        return (Vec2::new(sv.x, sv.y), 0.0);
    }
    let tq = Quat::from_xyzw(0.0, 0.0, q.z / len, q.w / len);
    let twist = 2.0 * tq.z.atan2(tq.w);
    let sv = (q * tq.conjugate()).to_scaled_axis();
    (Vec2::new(sv.x, sv.y), twist)
}

/// Splits `q` into `twist * swing` (twist applied after the swing).
pub fn twist_swing_from_quat(q: Quat) -> (f32, Vec2) {
    let (swing, twist) = swing_twist_from_quat(q.conjugate());
    (-twist, -swing)
}

pub fn swing_twist_to_quat(swing: Vec2, twist: f32) -> Quat {
    Quat::from_scaled_axis(Vec3::new(swing.x, swing.y, 0.0)) * Quat::from_rotation_z(twist)
}

/// Closest point to `p` on the ellipse with radii `(rx, ry)` centred at the
/// origin.
pub fn closest_on_ellipse(rx: f32, ry: f32, p: Vec2) -> Vec2 {
    // Eberly's robust bisection, solved in the first quadrant with e0 >= e1.
    let swap = rx < ry;
    let (e0, e1) = if swap { (ry as f64, rx as f64) } else { (rx as f64, ry as f64) };
    let (px, py) = if swap { (p.y, p.x) } else { (p.x, p.y) };
    let (y0, y1) = (px.abs() as f64, py.abs() as f64);

    let (x0, x1) = if y1 > 0.0 {
        if y0 > 0.0 {
            let z0 = y0 / e0;
            let z1 = y1 / e1;
            let g = z0 * z0 + z1 * z1 - 1.0;
            if g != 0.0 {
                let r0 = (e0 / e1) * (e0 / e1);
                let sbar = ellipse_root(r0, z0, z1, g);
                (r0 * y0 / (sbar + r0), y1 / (sbar + 1.0))
            } else {
                (y0, y1)
            }
        } else {
            (0.0, e1)
        }
    } else {
        let numer = e0 * y0;
        let denom = e0 * e0 - e1 * e1;
        if numer < denom {
            let xde0 = numer / denom;
            (e0 * xde0, e1 * (1.0 - xde0 * xde0).max(0.0).sqrt())
        } else {
            (e0, 0.0)
        }
    };

    let (x0, x1) = (
        (x0 as f32).copysign(px),
        (x1 as f32).copysign(py),
    );
    if swap {
        Vec2::new(x1, x0)
    } else {
        Vec2::new(x0, x1)
    }
}

fn ellipse_root(r0: f64, z0: f64, z1: f64, g: f64) -> f64 {
    let n0 = r0 * z0;
    let mut s0 = z1 - 1.0;
    let mut s1 = if g < 0.0 {
        0.0
    } else {
        (n0 * n0 + z1 * z1).sqrt() - 1.0
    };
    let mut s = 0.0;
    for _ in 0..200 {
        s = 0.5 * (s0 + s1);
        if s == s0 || s == s1 {
            break;
        }
        let ratio0 = n0 / (s + r0);
        let ratio1 = z1 / (s + 1.0);
        let g = ratio0 * ratio0 + ratio1 * ratio1 - 1.0;
        if g > 0.0 {
            s0 = s;
        } else if g < 0.0 {
            s1 = s;
        } else {
            break;
        }
    }
    s
}

/// Swing-twist parameterization of a joint rotation.
///
/// The swing is bounded by an ellipse (always active, default radii π);
/// the twist has its own `[lo, hi]` limits, active and `[0, 0]` by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSwingTwist {
    swing: Vec2,
    ellipse: Vec2,
    twist: f32,
    twist_lo: f32,
    twist_hi: f32,
    twist_limited: bool,
}

impl Default for JointSwingTwist {
    fn default() -> Self {
        Self {
            swing: Vec2::ZERO,
            ellipse: Vec2::splat(PI),
            twist: 0.0,
            twist_lo: 0.0,
            twist_hi: 0.0,
            twist_limited: true,
        }
    }
}

impl JointSwingTwist {
    pub fn swing(&self) -> Vec2 {
        self.swing
    }

    pub fn twist(&self) -> f32 {
        self.twist
    }

    /// Sets the swing, moving it onto the ellipse border if it lies outside.
    pub fn set_swing(&mut self, x: f32, y: f32) -> bool {
        let mut s = Vec2::new(x, y);
        if !self.swing_in_limits(x, y) {
            s = closest_on_ellipse(self.ellipse.x, self.ellipse.y, s);
        }
        if s == self.swing {
            return false;
        }
        self.swing = s;
        true
    }

    pub fn set_twist(&mut self, t: f32) -> bool {
        let t = if self.twist_limited {
            t.clamp(self.twist_lo, self.twist_hi)
        } else {
            t
        };
        if t == self.twist {
            return false;
        }
        self.twist = t;
        true
    }

    pub fn ellipse(&self) -> Vec2 {
        self.ellipse
    }

    pub fn set_ellipse(&mut self, rx: f32, ry: f32) {
        self.ellipse = Vec2::new(rx.clamp(MIN_RADIUS, PI), ry.clamp(MIN_RADIUS, PI));
        let s = self.swing;
        self.set_swing(s.x, s.y);
    }

    pub fn twist_limits(&self) -> (f32, f32) {
        (self.twist_lo, self.twist_hi)
    }

    /// Sets and activates the twist limits. Reversed limits collapse to
    /// their midpoint.
    pub fn set_twist_limits(&mut self, min: f32, max: f32) {
        let (min, max) = if min > max {
            let mid = 0.5 * (min + max);
            (mid, mid)
        } else {
            (min, max)
        };
        self.twist_lo = min;
        self.twist_hi = max;
        self.twist_limited = true;
        let t = self.twist;
        self.set_twist(t);
    }

    pub fn twist_limits_active(&self) -> bool {
        self.twist_limited
    }

    pub fn set_twist_limits_active(&mut self, active: bool) {
        self.twist_limited = active;
        let t = self.twist;
        self.set_twist(t);
    }

    pub fn twist_freeze(&mut self) {
        self.twist_lo = self.twist;
        self.twist_hi = self.twist;
        self.twist_limited = true;
    }

    pub fn twist_frozen(&self) -> bool {
        self.twist_limited && self.twist_lo == self.twist_hi
    }

    pub fn swing_in_limits(&self, x: f32, y: f32) -> bool {
        let (ex, ey) = (self.ellipse.x, self.ellipse.y);
        (x / ex) * (x / ex) + (y / ey) * (y / ey) <= 1.0
    }

    pub fn twist_in_limits(&self, t: f32) -> bool {
        !self.twist_limited || (self.twist_lo..=self.twist_hi).contains(&t)
    }

    pub fn to_quat(&self) -> Quat {
        swing_twist_to_quat(self.swing, self.twist)
    }

    pub fn set_from_quat(&mut self, q: Quat) -> bool {
        let (swing, twist) = swing_twist_from_quat(q);
        let a = self.set_swing(swing.x, swing.y);
        let b = self.set_twist(twist);
        a || b
    }

    pub fn random_swing<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let a = rng.random_range(0.0..TAU);
        let t: f32 = rng.random();
        Vec2::new(t * self.ellipse.x * a.cos(), t * self.ellipse.y * a.sin())
    }

    pub fn random_twist<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.twist_lo >= self.twist_hi {
            return self.twist_lo;
        }
        rng.random_range(self.twist_lo..=self.twist_hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn decomposition_round_trip() {
        let q = Quat::from_scaled_axis(Vec3::new(0.4, -0.8, 0.0)) * Quat::from_rotation_z(0.6);
        let (swing, twist) = swing_twist_from_quat(q);
        assert_abs_diff_eq!(swing.x, 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(swing.y, -0.8, epsilon = 1e-5);
        assert_abs_diff_eq!(twist, 0.6, epsilon = 1e-5);
        assert!(swing_twist_to_quat(swing, twist).dot(q).abs() > 1.0 - 1e-6);
    }

    #[test]
    fn twist_swing_round_trip() {
        let q = Quat::from_rotation_z(-1.1) * Quat::from_scaled_axis(Vec3::new(0.2, 0.5, 0.0));
        let (twist, swing) = twist_swing_from_quat(q);
        let back = Quat::from_rotation_z(twist) * Quat::from_scaled_axis(swing.extend(0.0));
        assert!(back.dot(q).abs() > 1.0 - 1e-6);
        assert_abs_diff_eq!(twist, -1.1, epsilon = 1e-5);
    }

    #[test]
    fn swing_outside_ellipse_is_projected() {
        let mut st = JointSwingTwist::default();
        st.set_ellipse(0.5, 1.0);
        st.set_swing(2.0, 0.0);
        assert_abs_diff_eq!(st.swing().x, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(st.swing().y, 0.0, epsilon = 1e-5);

        st.set_swing(1.0, 1.0);
        let s = st.swing();
        let on_border = (s.x / 0.5).powi(2) + s.y.powi(2);
        assert_abs_diff_eq!(on_border, 1.0, epsilon = 1e-4);
        assert!(s.x > 0.0 && s.y > 0.0);
    }

    #[test]
    fn closest_point_in_every_quadrant() {
        for p in [
            Vec2::new(3.0, 2.0),
            Vec2::new(-3.0, 2.0),
            Vec2::new(-3.0, -2.0),
            Vec2::new(0.0, -5.0),
        ] {
            let c = closest_on_ellipse(2.0, 1.0, p);
            assert_abs_diff_eq!((c.x / 2.0).powi(2) + c.y.powi(2), 1.0, epsilon = 1e-4);
            assert_eq!(c.x.signum() == p.x.signum() || p.x == 0.0, true);
        }
    }

    #[test]
    fn twist_starts_frozen() {
        let mut st = JointSwingTwist::default();
        assert!(st.twist_frozen());
        assert!(!st.set_twist(0.3));
        st.set_twist_limits(-1.0, 1.0);
        assert!(st.set_twist(3.0));
        assert_eq!(st.twist(), 1.0);
        st.set_twist_limits(0.8, 0.2);
        assert_abs_diff_eq!(st.twist(), 0.5, epsilon = 1e-6);
        assert!(st.twist_frozen());
    }

    #[test]
    fn ellipse_radii_are_bounded() {
        let mut st = JointSwingTwist::default();
        st.set_ellipse(0.0, 10.0);
        assert_eq!(st.ellipse(), Vec2::new(MIN_RADIUS, PI));
    }
}
