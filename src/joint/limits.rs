use glam::Vec3;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Dof {
    value: f32,
    lo: f32,
    hi: f32,
    limited: bool,
}

impl Dof {
    const FROZEN_ZERO: Dof = Dof {
        value: 0.0,
        lo: 0.0,
        hi: 0.0,
        limited: true,
    };

    fn clamp(&self, v: f32) -> f32 {
        if self.limited {
            v.clamp(self.lo, self.hi)
        } else {
            v
        }
    }
}

/// Three scalar DOFs with optional `[lo, hi]` clamping.
///
/// A DOF is frozen when its limits are active and `lo == hi`. The default
/// state has every DOF frozen at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VecLimits {
    dofs: [Dof; 3],
}

impl Default for VecLimits {
    fn default() -> Self {
        Self::new()
    }
}

impl VecLimits {
    pub fn new() -> Self {
        Self {
            dofs: [Dof::FROZEN_ZERO; 3],
        }
    }

    /// Resets every DOF to zero and frozen.
    pub fn init(&mut self) {
        self.dofs = [Dof::FROZEN_ZERO; 3];
    }

    pub fn value(&self, d: usize) -> f32 {
        self.dofs[d].value
    }

    pub fn values(&self) -> Vec3 {
        Vec3::new(self.dofs[0].value, self.dofs[1].value, self.dofs[2].value)
    }

    /// Sets DOF `d`, clamping when its limits are active. Returns true if the
    /// stored value changed.
    pub fn set_value(&mut self, d: usize, v: f32) -> bool {
        let dof = &mut self.dofs[d];
        let v = dof.clamp(v);
        if v == dof.value {
            return false;
        }
        dof.value = v;
        true
    }

    pub fn set_values(&mut self, v: Vec3) -> bool {
        let a = self.set_value(0, v.x);
        let b = self.set_value(1, v.y);
        let c = self.set_value(2, v.z);
        a || b || c
    }

    /// Sets the limits of DOF `d`, activates them and re-clamps the value.
    pub fn set_limits(&mut self, d: usize, lo: f32, hi: f32) -> bool {
        let dof = &mut self.dofs[d];
        dof.lo = lo.min(hi);
        dof.hi = lo.max(hi);
        dof.limited = true;
        let v = dof.value;
        self.set_value(d, v)
    }

    pub fn set_limits_active(&mut self, d: usize, active: bool) -> bool {
        self.dofs[d].limited = active;
        let v = self.dofs[d].value;
        self.set_value(d, v)
    }

    pub fn limits_active(&self, d: usize) -> bool {
        self.dofs[d].limited
    }

    pub fn lower(&self, d: usize) -> f32 {
        self.dofs[d].lo
    }

    pub fn upper(&self, d: usize) -> f32 {
        self.dofs[d].hi
    }

    pub fn in_limits(&self, d: usize, v: f32) -> bool {
        let dof = &self.dofs[d];
        !dof.limited || (dof.lo..=dof.hi).contains(&v)
    }

    /// Locks DOF `d` at its current value.
    pub fn freeze(&mut self, d: usize) {
        let dof = &mut self.dofs[d];
        dof.lo = dof.value;
        dof.hi = dof.value;
        dof.limited = true;
    }

    /// Turns limits off for DOF `d`.
    pub fn thaw(&mut self, d: usize) {
        self.dofs[d].limited = false;
    }

    pub fn frozen(&self, d: usize) -> bool {
        let dof = &self.dofs[d];
        dof.limited && dof.lo == dof.hi
    }

    pub fn frozen_count(&self) -> usize {
        (0..3).filter(|&d| self.frozen(d)).count()
    }

    /// A random value inside the limits of DOF `d` (the current value when
    /// the limits are inactive).
    pub fn random<R: Rng + ?Sized>(&self, d: usize, rng: &mut R) -> f32 {
        let dof = &self.dofs[d];
        if !dof.limited || dof.lo == dof.hi {
            return if dof.limited { dof.lo } else { dof.value };
        }
        rng.random_range(dof.lo..=dof.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn starts_frozen_at_zero() {
        let mut l = VecLimits::new();
        assert_eq!(l.frozen_count(), 3);
        assert!(!l.set_value(0, 3.0));
        assert_eq!(l.value(0), 0.0);
    }

    #[test]
    fn clamps_inside_active_limits() {
        let mut l = VecLimits::new();
        l.set_limits(0, -1.0, 1.0);
        assert!(l.set_value(0, 5.0));
        assert_eq!(l.value(0), 1.0);
        l.set_value(0, -7.5);
        assert_eq!(l.value(0), -1.0);
    }

    #[test]
    fn limits_reclamp_current_value() {
        let mut l = VecLimits::new();
        l.thaw(1);
        l.set_value(1, 4.0);
        assert!(l.set_limits(1, 0.0, 2.0));
        assert_eq!(l.value(1), 2.0);
    }

    #[test]
    fn freeze_and_thaw() {
        let mut l = VecLimits::new();
        l.thaw(2);
        assert!(!l.frozen(2));
        l.set_value(2, 0.25);
        l.freeze(2);
        assert!(l.frozen(2));
        assert_eq!(l.lower(2), 0.25);
        l.set_value(2, 9.0);
        assert_eq!(l.value(2), 0.25);
        l.thaw(2);
        l.set_value(2, 9.0);
        assert_eq!(l.values(), Vec3::new(0.0, 0.0, 9.0));
    }

    #[test]
    fn random_stays_inside_limits() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut l = VecLimits::new();
        l.set_limits(0, -0.5, 0.75);
        for _ in 0..100 {
            let v = l.random(0, &mut rng);
            assert!(l.in_limits(0, v));
        }
    }
}
