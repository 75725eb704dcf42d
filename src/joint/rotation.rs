use std::cell::Cell;

use glam::{Quat, Vec3};

use super::euler::JointEuler;
use super::swing_twist::JointSwingTwist;

/// Selects which quaternion [`JointRotation::value`] reads and writes when
/// pre/post rotations are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    #[default]
    Full,
    Local,
}

/// How [`JointRotation::align`] adjusts the pre/post frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignType {
    /// Rotate `pre` so `pre * v` follows the incoming link.
    Pre,
    /// Rotate `post` so the outgoing link maps onto `v`.
    Post,
    PrePost,
    PreInv,
    PostInv,
}

/// The representation currently holding the ground-truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Representation {
    FullQuat,
    LocalQuat,
    SwingTwist,
    Euler,
}

/// Which derived views agree with the owner.
#[derive(Debug, Clone, Copy, Default)]
struct Memo {
    full: bool,
    local: bool,
    swing_twist: bool,
    euler: bool,
}

impl Memo {
    fn only(owner: Representation) -> Self {
        let mut m = Memo::default();
        match owner {
            Representation::FullQuat => m.full = true,
            Representation::LocalQuat => m.local = true,
            Representation::SwingTwist => m.swing_twist = true,
            Representation::Euler => m.euler = true,
        }
        m
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PrePost {
    pre: Quat,
    post: Quat,
}

#[derive(Debug, Clone, Copy)]
struct State {
    full: Quat,
    local: Quat,
    swing_twist: JointSwingTwist,
    euler: JointEuler,
    owner: Representation,
    memo: Memo,
    revision: u64,
}

impl State {
    fn set_owner(&mut self, owner: Representation) {
        self.owner = owner;
        self.memo = Memo::only(owner);
        self.revision = self.revision.wrapping_add(1);
    }

    fn sync_local(&mut self, pp: Option<&PrePost>) {
        if self.memo.local {
            return;
        }
        self.local = match self.owner {
            Representation::FullQuat => match pp {
                Some(pp) => (pp.pre.inverse() * self.full * pp.post.inverse()).normalize(),
                None => self.full,
            },
            Representation::SwingTwist => self.swing_twist.to_quat(),
            Representation::Euler => self.euler.to_quat(),
            Representation::LocalQuat => self.local,
        };
        self.memo.local = true;
    }

    fn sync_full(&mut self, pp: Option<&PrePost>) {
        if self.memo.full {
            return;
        }
        self.sync_local(pp);
        self.full = match pp {
            Some(pp) => pp.pre * self.local * pp.post,
            None => self.local,
        };
        self.memo.full = true;
    }

    fn sync_swing_twist(&mut self, pp: Option<&PrePost>, enforce: bool) {
        if self.memo.swing_twist {
            return;
        }
        self.sync_local(pp);
        self.swing_twist.set_from_quat(self.local);
        self.memo.swing_twist = true;
        let clamped = self.swing_twist.to_quat();
        if enforce && clamped.dot(self.local).abs() < 1.0 - 1.0e-6 {
            self.set_owner(Representation::SwingTwist);
            self.local = clamped;
            self.memo.local = true;
        }
    }

    fn sync_euler(&mut self, pp: Option<&PrePost>, enforce: bool) {
        if self.memo.euler {
            return;
        }
        self.sync_local(pp);
        self.euler.set_from_quat(self.local);
        self.memo.euler = true;
        let clamped = self.euler.to_quat();
        if enforce && clamped.dot(self.local).abs() < 1.0 - 1.0e-6 {
            self.set_owner(Representation::Euler);
            self.local = clamped;
            self.memo.local = true;
        }
    }
}

/// A joint orientation with synchronized quaternion, Euler and swing-twist
/// views.
///
/// Exactly one representation owns the value at a time. The others are
/// derived on first read and memoized until the next write, which also bumps
/// [`revision`](Self::revision) so the owning joint can tell its local matrix
/// is stale. With pre/post rotations, `full = pre * local * post`.
#[derive(Debug, Clone)]
pub struct JointRotation {
    state: Cell<State>,
    prepost: Option<PrePost>,
    frozen: bool,
    mode: ValueMode,
    enforce_limits: bool,
}

impl Default for JointRotation {
    fn default() -> Self {
        Self::new()
    }
}

impl JointRotation {
    pub fn new() -> Self {
        Self {
            state: Cell::new(State {
                full: Quat::IDENTITY,
                local: Quat::IDENTITY,
                swing_twist: JointSwingTwist::default(),
                euler: JointEuler::default(),
                owner: Representation::LocalQuat,
                memo: Memo {
                    full: true,
                    local: true,
                    swing_twist: true,
                    euler: true,
                },
                revision: 0,
            }),
            prepost: None,
            frozen: true,
            mode: ValueMode::Full,
            enforce_limits: false,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&mut State, Option<&PrePost>, bool) -> T) -> T {
        let mut s = self.state.get();
        let out = f(&mut s, self.prepost.as_ref(), self.enforce_limits);
        self.state.set(s);
        out
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut()
    }

    /// The rotation addressed by the current [`ValueMode`].
    pub fn value(&self) -> Quat {
        match self.mode {
            ValueMode::Full => self.full(),
            ValueMode::Local => self.local(),
        }
    }

    pub fn full(&self) -> Quat {
        self.read(|s, pp, _| {
            s.sync_full(pp);
            s.full
        })
    }

    pub fn local(&self) -> Quat {
        self.read(|s, pp, _| {
            s.sync_local(pp);
            s.local
        })
    }

    /// Sets the rotation addressed by the current mode. Ignored while frozen.
    pub fn set_value(&mut self, q: Quat) {
        if self.frozen {
            return;
        }
        if self.prepost.is_none() || self.mode == ValueMode::Full {
            self.write_full(q);
        } else {
            self.write_local(q);
        }
    }

    pub fn set_full(&mut self, q: Quat) {
        if !self.frozen {
            self.write_full(q);
        }
    }

    pub fn set_local(&mut self, q: Quat) {
        if !self.frozen {
            self.write_local(q);
        }
    }

    fn write_full(&mut self, q: Quat) {
        let s = self.state_mut();
        s.set_owner(Representation::FullQuat);
        s.full = q;
    }

    fn write_local(&mut self, q: Quat) {
        let s = self.state_mut();
        s.set_owner(Representation::LocalQuat);
        s.local = q;
    }

    /// Swing-twist view of the local rotation.
    pub fn swing_twist(&self) -> JointSwingTwist {
        self.read(|s, pp, enforce| {
            s.sync_swing_twist(pp, enforce);
            s.swing_twist
        })
    }

    /// Euler view of the local rotation.
    pub fn euler(&self) -> JointEuler {
        self.read(|s, pp, enforce| {
            s.sync_euler(pp, enforce);
            s.euler
        })
    }

    /// Synchronizes and hands out the swing-twist parameterization, which
    /// becomes the owner. Limit edits go through here.
    pub fn st_mut(&mut self) -> &mut JointSwingTwist {
        let pp = self.prepost;
        let enforce = self.enforce_limits;
        let s = self.state.get_mut();
        s.sync_swing_twist(pp.as_ref(), enforce);
        s.set_owner(Representation::SwingTwist);
        &mut s.swing_twist
    }

    pub fn euler_mut(&mut self) -> &mut JointEuler {
        let pp = self.prepost;
        let enforce = self.enforce_limits;
        let s = self.state.get_mut();
        s.sync_euler(pp.as_ref(), enforce);
        s.set_owner(Representation::Euler);
        &mut s.euler
    }

    pub fn set_swing(&mut self, x: f32, y: f32) {
        if !self.frozen {
            self.st_mut().set_swing(x, y);
        }
    }

    pub fn set_twist(&mut self, t: f32) {
        if !self.frozen {
            self.st_mut().set_twist(t);
        }
    }

    pub fn set_euler_value(&mut self, d: usize, v: f32) {
        if !self.frozen {
            self.euler_mut().set_value(d, v);
        }
    }

    /// Resets the local rotation to identity and clears the parameterized
    /// values, ignoring the frozen flag.
    pub fn zero(&mut self) {
        let s = self.state_mut();
        s.swing_twist.set_swing(0.0, 0.0);
        s.swing_twist.set_twist(0.0);
        s.euler.set_values(Vec3::ZERO);
        s.set_owner(Representation::LocalQuat);
        s.local = Quat::IDENTITY;
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn thaw(&mut self) {
        self.frozen = false;
    }

    pub fn frozen(&self) -> bool {
        self.frozen
    }

    pub fn mode(&self) -> ValueMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ValueMode) {
        self.mode = mode;
    }

    pub fn enforce_limits(&self) -> bool {
        self.enforce_limits
    }

    pub fn set_enforce_limits(&mut self, enforce: bool) {
        self.enforce_limits = enforce;
        let s = self.state_mut();
        s.memo.swing_twist = s.owner == Representation::SwingTwist;
        s.memo.euler = s.owner == Representation::Euler;
    }

    /// Counter bumped by every write that may change the rotation.
    pub fn revision(&self) -> u64 {
        self.state.get().revision
    }

    pub fn has_prepost(&self) -> bool {
        self.prepost.is_some()
    }

    pub fn pre(&self) -> Quat {
        self.prepost.map_or(Quat::IDENTITY, |pp| pp.pre)
    }

    pub fn post(&self) -> Quat {
        self.prepost.map_or(Quat::IDENTITY, |pp| pp.post)
    }

    /// Replaces the pre rotation, keeping the full rotation unchanged.
    pub fn set_pre(&mut self, pre: Quat) {
        let post = self.post();
        self.replace_prepost(pre, post);
    }

    /// Replaces the post rotation, keeping the full rotation unchanged.
    pub fn set_post(&mut self, post: Quat) {
        let pre = self.pre();
        self.replace_prepost(pre, post);
    }

    /// Removes pre/post rotations, keeping the full rotation unchanged.
    pub fn init_prepost(&mut self) {
        if self.prepost.is_none() {
            return;
        }
        let full = self.full();
        self.prepost = None;
        self.write_full(full);
    }

    fn replace_prepost(&mut self, pre: Quat, post: Quat) {
        let full = self.full();
        self.prepost = Some(PrePost {
            pre: pre.normalize(),
            post: post.normalize(),
        });
        self.write_full(full);
    }

    /// Adjusts pre/post so the local axis `v` follows the incoming link
    /// (`joint_offset`) and/or the outgoing link (`child_offset`). Zero
    /// vectors leave the corresponding frame untouched.
    pub fn align(&mut self, kind: AlignType, v: Vec3, joint_offset: Vec3, child_offset: Vec3) {
        let mut pre = self.pre();
        let mut post = self.post();
        let do_pre = matches!(kind, AlignType::Pre | AlignType::PrePost | AlignType::PreInv);
        let do_post = matches!(kind, AlignType::Post | AlignType::PrePost | AlignType::PostInv);
        let v = v.normalize_or_zero();
        if v == Vec3::ZERO {
            return;
        }
        if do_pre {
            let to = joint_offset.normalize_or_zero();
            if to != Vec3::ZERO {
                let from = (pre * v).normalize();
                pre = Quat::from_rotation_arc(from, to) * pre;
            }
        }
        if do_post {
            let link = (post * child_offset).normalize_or_zero();
            if link != Vec3::ZERO {
                post = Quat::from_rotation_arc(v, link).inverse() * post;
            }
        }
        match kind {
            AlignType::PreInv => post = pre.inverse(),
            AlignType::PostInv => pre = post.inverse(),
            _ => {}
        }
        self.replace_prepost(pre, post);
    }

    /// Copies value, parameterizations, pre/post and flags from `other`.
    pub fn copy_from(&mut self, other: &JointRotation) {
        let rev = self.revision();
        let mut s = other.state.get();
        s.revision = rev.wrapping_add(1);
        self.state.set(s);
        self.prepost = other.prepost;
        self.frozen = other.frozen;
        self.mode = other.mode;
        self.enforce_limits = other.enforce_limits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::euler::EulerOrder;
    use std::f32::consts::FRAC_PI_2;

    fn thawed() -> JointRotation {
        let mut r = JointRotation::new();
        r.thaw();
        r
    }

    #[test]
    fn frozen_rotation_ignores_writes() {
        let mut r = JointRotation::new();
        r.set_value(Quat::from_rotation_x(0.5));
        assert_eq!(r.value(), Quat::IDENTITY);
        assert_eq!(r.revision(), 0);
    }

    #[test]
    fn full_is_pre_local_post() {
        let mut r = thawed();
        let pre = Quat::from_rotation_y(FRAC_PI_2);
        let post = pre.inverse();
        r.set_pre(pre);
        r.set_post(post);
        r.set_mode(ValueMode::Local);
        let local = Quat::from_rotation_z(0.3);
        r.set_value(local);
        assert!(r.full().abs_diff_eq(pre * local * post, 1e-6));
        assert!(r.local().abs_diff_eq(local, 1e-6));
    }

    #[test]
    fn prepost_changes_keep_full_value() {
        let mut r = thawed();
        let q = Quat::from_rotation_x(0.7) * Quat::from_rotation_y(-0.2);
        r.set_value(q);
        r.set_pre(Quat::from_rotation_z(1.0));
        assert!(r.full().abs_diff_eq(q, 1e-6));
        r.init_prepost();
        assert!(!r.has_prepost());
        assert!(r.local().abs_diff_eq(q, 1e-6));
    }

    #[test]
    fn views_follow_the_owner() {
        let mut r = thawed();
        r.st_mut().set_twist_limits(-1.0, 1.0);
        r.set_swing(0.2, 0.4);
        r.set_twist(0.5);
        let expected = Quat::from_scaled_axis(Vec3::new(0.2, 0.4, 0.0)) * Quat::from_rotation_z(0.5);
        assert!(r.local().abs_diff_eq(expected, 1e-6));

        r.set_value(Quat::from_rotation_z(-0.25));
        assert!((r.swing_twist().twist() + 0.25).abs() < 1e-5);
        assert!(r.swing_twist().swing().length() < 1e-5);
    }

    #[test]
    fn euler_writes_bump_revision() {
        let mut r = thawed();
        r.euler_mut().set_order(EulerOrder::Zy);
        r.euler_mut().limits_mut().thaw(1);
        let before = r.revision();
        r.set_euler_value(1, 0.8);
        assert!(r.revision() > before);
        assert!(r.local().abs_diff_eq(Quat::from_rotation_y(0.8), 1e-6));
    }

    #[test]
    fn enforced_limits_take_ownership() {
        let mut r = thawed();
        r.set_enforce_limits(true);
        r.st_mut().set_ellipse(0.1, 0.1);
        r.set_value(Quat::from_rotation_x(1.0));
        let st = r.swing_twist();
        assert!((st.swing().x - 0.1).abs() < 1e-5);
        assert!(r.local().abs_diff_eq(Quat::from_rotation_x(0.1), 1e-5));
    }

    #[test]
    fn align_pre_points_axis_along_link() {
        let mut r = thawed();
        r.align(AlignType::PreInv, Vec3::Z, Vec3::X, Vec3::ZERO);
        assert!((r.pre() * Vec3::Z).abs_diff_eq(Vec3::X, 1e-6));
        assert!((r.post() * Vec3::X).abs_diff_eq(Vec3::Z, 1e-6));
        assert!(r.full().abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn copy_from_duplicates_state() {
        let mut a = thawed();
        a.set_pre(Quat::from_rotation_x(0.3));
        a.set_value(Quat::from_rotation_y(0.4));
        let mut b = JointRotation::new();
        b.copy_from(&a);
        assert!(!b.frozen());
        assert!(b.full().abs_diff_eq(a.full(), 1e-6));
        assert_eq!(b.pre(), a.pre());
    }
}
