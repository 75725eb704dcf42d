use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use glam::{Mat4, Quat, Vec3};

use super::orbit::OrbitSearch;
use crate::collision::CollisionDetector;
use crate::joint::{swing_twist_from_quat, twist_swing_from_quat, JointId, RotType};
use crate::math::Transform;
use crate::skeleton::Skeleton;

const AXES: [Vec3; 2] = [Vec3::X, Vec3::Y];

/// The four limbs the analytic solver knows how to orient.
///
/// Arms extend sideways (the right arm along -X, the left along +X) and legs
/// hang along -Y in the rest pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimbType {
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl LimbType {
    pub fn is_arm(self) -> bool {
        matches!(self, LimbType::LeftArm | LimbType::RightArm)
    }
}

/// Outcome of an IK query. Never an error: callers decide what to do with a
/// partial or failed solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IkResult {
    Ok,
    NotReachable,
    NoBaseSwing,
    NoBaseTwist,
    NoMidFlexion,
    NoMidTwist,
    NoEndSwing,
    Collision,
    #[default]
    Undef,
}

impl IkResult {
    pub fn message(self) -> &'static str {
        match self {
            IkResult::Ok => "Ok",
            IkResult::NotReachable => "Not Reachable",
            IkResult::NoBaseSwing => "No Base Swing",
            IkResult::NoBaseTwist => "No Base Twist",
            IkResult::NoMidFlexion => "No Mid Flexion",
            IkResult::NoMidTwist => "No Mid Twist",
            IkResult::NoEndSwing => "No End Swing",
            IkResult::Collision => "Collision",
            IkResult::Undef => "Undef",
        }
    }

    pub fn is_ok(self) -> bool {
        self == IkResult::Ok
    }
}

impl fmt::Display for IkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Closed-form solver for a base / mid / end linkage such as
/// shoulder-elbow-wrist or hip-knee-ankle.
///
/// Three layouts are accepted:
/// - swing-twist base, Euler mid (flexion only), swing-twist end;
/// - the same with the final twist on a second axis of the mid joint;
/// - the same with the final twist on a separate Euler joint between mid and
///   end.
///
/// The link offsets, seen through each joint's post rotation, must point
/// along +Z, and consecutive pre/post rotations must cancel.
/// [`configure_skeleton`](super::configure_skeleton) sets this up.
///
/// Solved values are kept as seven floats: base swing x/y, base twist, mid
/// flexion, then either end swing x/y and end twist, or mid twist and end
/// swing x/y when a mid twist joint is used.
#[derive(Debug, Clone)]
pub struct LimbIk {
    limb: LimbType,
    base: JointId,
    mid: JointId,
    end: JointId,
    midflex_axis: usize,
    midtwist: Option<(JointId, usize)>,
    solve_rot_goal: bool,
    solve_closest: bool,
    result: [f32; 7],
    d1: f32,
    d2: f32,
}

impl LimbIk {
    /// Builds a solver over an explicit linkage. Fails unless base and end
    /// are swing-twist joints and mid (and the mid twist joint) are Euler.
    /// The flexion axis must be X or Y, since the links lie along +Z.
    pub fn new(
        sk: &Skeleton,
        limb: LimbType,
        base: JointId,
        mid: JointId,
        midflex_axis: usize,
        end: JointId,
        midtwist: Option<(JointId, usize)>,
    ) -> Option<Self> {
        let rt = |id: JointId| sk.joint(id).rot_type();
        if rt(base) != RotType::SwingTwist || rt(mid) != RotType::Euler || rt(end) != RotType::SwingTwist {
            return None;
        }
        if midtwist.is_some_and(|(mt, _)| rt(mt) != RotType::Euler) {
            return None;
        }
        if midflex_axis > 1 || midtwist.is_some_and(|(_, a)| a > 2) {
            return None;
        }

        let d1 = sk.joint(mid).offset().length();
        let mut d2 = sk.joint(end).offset().length();
        if let Some((mt, _)) = midtwist.filter(|&(mt, _)| mt != mid) {
            d2 += sk.joint(mt).offset().length();
        }

        Some(Self {
            limb,
            base,
            mid,
            end,
            midflex_axis,
            midtwist,
            solve_rot_goal: true,
            solve_closest: false,
            result: [0.0; 7],
            d1,
            d2,
        })
    }

    /// Builds a solver by walking up from `end` and reading the linkage's
    /// rotation types and limits:
    /// - a base that is not swing-twist means a separate mid twist joint sits
    ///   between mid and end;
    /// - a frozen end twist means the mid joint carries both flexion and
    ///   twist, the flexion being the axis with a zero limit;
    /// - otherwise the mid joint only flexes.
    pub fn init(sk: &Skeleton, end: JointId, limb: LimbType) -> Option<Self> {
        let ej = sk.joint(end);
        if ej.rot_type() != RotType::SwingTwist {
            return None;
        }
        let mid = ej.parent()?;
        if sk.joint(mid).rot_type() != RotType::Euler {
            return None;
        }
        let base = sk.joint(mid).parent()?;
        let free_axes = |id: JointId| {
            let e = sk.joint(id).rot().euler();
            (0..3).filter(move |&d| !e.frozen(d))
        };

        if sk.joint(base).rot_type() != RotType::SwingTwist {
            let (midt, mid) = (mid, base);
            let base = sk.joint(mid).parent()?;
            if sk.joint(mid).rot_type() != RotType::Euler {
                return None;
            }
            let flex = free_axes(mid).next()?;
            let twist = free_axes(midt).next()?;
            Self::new(sk, limb, base, mid, flex, end, Some((midt, twist)))
        } else if ej.rot().swing_twist().twist_frozen() {
            let e = sk.joint(mid).rot().euler();
            let (mut flex, mut twist) = (None, None);
            for d in free_axes(mid) {
                if e.limits().lower(d) == 0.0 || e.limits().upper(d) == 0.0 {
                    flex = Some(d);
                } else {
                    twist = Some(d);
                }
            }
            Self::new(sk, limb, base, mid, flex?, end, Some((mid, twist?)))
        } else {
            let flex = free_axes(mid).last()?;
            Self::new(sk, limb, base, mid, flex, end, None)
        }
    }

    pub fn limb(&self) -> LimbType {
        self.limb
    }

    pub fn base(&self) -> JointId {
        self.base
    }

    pub fn mid(&self) -> JointId {
        self.mid
    }

    pub fn end(&self) -> JointId {
        self.end
    }

    /// The joint and Euler axis holding the mid twist, if any. The joint may
    /// be the mid joint itself.
    pub fn midtwist(&self) -> Option<(JointId, usize)> {
        self.midtwist
    }

    pub fn midflex_axis(&self) -> usize {
        self.midflex_axis
    }

    pub fn solve_rot_goal(&self) -> bool {
        self.solve_rot_goal
    }

    /// When false only the goal position is solved and the end rotation keeps
    /// the skeleton's current values.
    pub fn set_solve_rot_goal(&mut self, b: bool) {
        self.solve_rot_goal = b;
    }

    pub fn solve_closest(&self) -> bool {
        self.solve_closest
    }

    /// In closest mode an out-of-reach goal is aimed at with the limb fully
    /// stretched, and limits are not checked.
    pub fn set_solve_closest(&mut self, b: bool) {
        self.solve_closest = b;
    }

    /// Length of the linkage at full extension.
    pub fn linkage_len(&self) -> f32 {
        self.d1 + self.d2
    }

    pub fn last_result(&self) -> &[f32; 7] {
        &self.result
    }

    pub fn last_result_mut(&mut self) -> &mut [f32; 7] {
        &mut self.result
    }

    /// Opens every limit the solver checks to `[-pi, pi]`.
    pub fn remove_joint_limits(&self, sk: &mut Skeleton) {
        let st = sk.joint_mut(self.base).rot_mut().st_mut();
        st.set_ellipse(PI, PI);
        st.set_twist_limits(-PI, PI);
        sk.joint_mut(self.mid)
            .rot_mut()
            .euler_mut()
            .set_limits(self.midflex_axis, -PI, PI);
        sk.joint_mut(self.end).rot_mut().st_mut().set_ellipse(PI, PI);
        match self.midtwist {
            Some((mt, axis)) => {
                sk.joint_mut(mt).rot_mut().euler_mut().set_limits(axis, -PI, PI);
            }
            None => sk.joint_mut(self.end).rot_mut().st_mut().set_twist_limits(-PI, PI),
        }
    }

    /// Brings the ancestors of the base joint up to date when the skeleton's
    /// global matrices are stale.
    pub fn update_base_up(&self, sk: &mut Skeleton) {
        if !sk.global_matrices_uptodate() {
            sk.update_gmat_up(self.base, None);
        }
    }

    /// Recomputes the global matrices from the base to the end joint.
    pub fn update_base_end(&self, sk: &mut Skeleton) {
        sk.update_gmat_local(self.base);
        sk.update_gmat_local(self.mid);
        if let Some((mt, _)) = self.midtwist.filter(|&(mt, _)| mt != self.mid) {
            sk.update_gmat_local(mt);
        }
        sk.update_gmat_local(self.end);
    }

    /// The base joint's global frame with its pre rotation but without its
    /// own rotation value. The parent's global matrix must be current.
    pub fn base_frame(&self, sk: &Skeleton) -> Mat4 {
        let b = sk.joint(self.base);
        let local = Mat4::from_rotation_translation(b.rot().pre(), b.offset() + b.pos().values());
        match b.parent() {
            Some(p) => sk.joint(p).gmat() * local,
            None => local,
        }
    }

    /// Expresses a global goal in the base frame.
    pub fn to_local(&self, sk: &Skeleton, goal: &Transform) -> Transform {
        Transform::from_matrix(self.base_frame(sk).inverse() * goal.to_matrix())
    }

    /// Orbit-circle frame `(n, u, v)` and circle centre for an end point at
    /// distance `dist` along `e`.
    fn orbit_frame(&self, e: Vec3, dist: f32) -> (Vec3, Vec3, Vec3, Vec3) {
        let (d1, d2) = (self.d1, self.d2);
        let axis = Vec3::NEG_Y;
        let n = e / dist;
        let u = (axis + n * (-axis).dot(n)).try_normalize().unwrap_or(Vec3::X);
        let v = u.cross(n);
        let cosa = (d2 * d2 - d1 * d1 - dist * dist) / (-2.0 * d1 * dist);
        (n, u, v, n * (cosa * d1))
    }

    /// Solves for a goal in the base frame and orbit angle `oang`. Nothing is
    /// written to the skeleton; see [`apply_last_result`](Self::apply_last_result).
    pub fn solve(&mut self, sk: &Skeleton, goal: &Transform, oang: f32) -> IkResult {
        let (d1, d2) = (self.d1, self.d2);
        let mut e = goal.position;
        let mut dist = e.length();
        if dist == 0.0 {
            return IkResult::NotReachable;
        }
        let mut aim = false;
        if dist > d1 + d2 {
            if !self.solve_closest {
                return IkResult::NotReachable;
            }
            dist = d1 + d2;
            e = e.normalize() * dist;
            aim = true;
        }

        // flexion from the triangle (d1, d2, dist)
        let k = ((d1 * d1 + d2 * d2 - dist * dist) / (2.0 * d1 * d2)).clamp(-1.0, 1.0);
        let mut midr = PI - k.acos();
        let mut oang = oang;
        match self.limb {
            LimbType::LeftArm => {
                midr = -midr;
                oang = -oang;
            }
            LimbType::RightArm => {}
            LimbType::RightLeg => oang = FRAC_PI_2 - oang,
            LimbType::LeftLeg => oang += FRAC_PI_2,
        }
        self.result[3] = midr;

        let (n, u, v, c) = self.orbit_frame(e, dist);
        let m = if aim {
            n * d1
        } else {
            let r = d1 * (d2 * (PI - midr).sin() / dist).abs();
            c + (u * oang.cos() + v * oang.sin()) * r
        };

        // base swing takes +Z onto the mid position
        let swing = Vec3::new(-m.y, m.x, 0.0)
            .try_normalize()
            .map_or(Vec3::ZERO, |s| s * (m.z / d1).clamp(-1.0, 1.0).acos());
        self.result[0] = swing.x;
        self.result[1] = swing.y;

        let qs = Quat::from_scaled_axis(swing);
        let qe = Quat::from_axis_angle(AXES[self.midflex_axis], midr);
        self.result[2] = if d1 + d2 - dist < 1.0e-5 {
            0.0
        } else {
            // twist about the upper link so the lower link reaches e
            let a = qe * Vec3::new(0.0, 0.0, d2);
            let b = qs.inverse() * e;
            (a.x * b.y - a.y * b.x).atan2(a.x * b.x + a.y * b.y)
        };

        if self.solve_rot_goal {
            let qw = qs * Quat::from_rotation_z(self.result[2]) * qe;
            let ej = sk.joint(self.end);
            let mut qg = goal.rotation;
            if ej.rot().has_prepost() {
                qg *= ej.rot().post().inverse();
            }
            let q = qw.inverse() * qg;
            if self.midtwist.is_none() {
                let (s, t) = swing_twist_from_quat(q);
                self.result[4..7].copy_from_slice(&[s.x, s.y, t]);
            } else {
                let (t, s) = twist_swing_from_quat(q);
                self.result[4..7].copy_from_slice(&[t, s.x, s.y]);
            }
        } else {
            let current = self.skeleton_values(sk);
            self.result[4..7].copy_from_slice(&current[4..7]);
        }

        if self.solve_closest {
            return IkResult::Ok;
        }
        self.check_limits(sk)
    }

    fn check_limits(&self, sk: &Skeleton) -> IkResult {
        let r = &self.result;
        let base = sk.joint(self.base).rot().swing_twist();
        if !base.swing_in_limits(r[0], r[1]) {
            return IkResult::NoBaseSwing;
        }
        if !base.twist_in_limits(r[2]) {
            return IkResult::NoBaseTwist;
        }
        if !sk.joint(self.mid).rot().euler().in_limits(self.midflex_axis, r[3]) {
            return IkResult::NoMidFlexion;
        }
        let end = sk.joint(self.end).rot().swing_twist();
        match self.midtwist {
            None => {
                if !end.swing_in_limits(r[4], r[5]) {
                    return IkResult::NoEndSwing;
                }
                if !end.twist_in_limits(r[6]) {
                    return IkResult::NoMidTwist;
                }
            }
            Some((mt, axis)) => {
                if !sk.joint(mt).rot().euler().in_limits(axis, r[4]) {
                    return IkResult::NoMidTwist;
                }
                if !end.swing_in_limits(r[5], r[6]) {
                    return IkResult::NoEndSwing;
                }
            }
        }
        IkResult::Ok
    }

    /// Solves and, on success, applies the values. With a collision detector
    /// the posed skeleton is then tested and may yield
    /// [`IkResult::Collision`] (the values stay applied).
    pub fn solve_checked(
        &mut self,
        sk: &mut Skeleton,
        goal: &Transform,
        oang: f32,
        coldet: Option<&mut (dyn CollisionDetector + '_)>,
    ) -> IkResult {
        let res = self.solve(sk, goal, oang);
        if res != IkResult::Ok {
            return res;
        }
        self.apply_last_result(sk);
        match coldet {
            None => res,
            Some(cd) => {
                cd.update(sk);
                if cd.collide() {
                    IkResult::Collision
                } else {
                    IkResult::Ok
                }
            }
        }
    }

    /// Searches orbit angles outward from `search.init`, alternating below
    /// and above, with a step growing by `search.rate` each round, until a
    /// valid collision-free solution is found or both bounds are passed.
    /// The skeleton is modified along the way.
    pub fn solve_search(
        &mut self,
        sk: &mut Skeleton,
        goal: &Transform,
        search: &mut OrbitSearch,
        mut coldet: Option<&mut (dyn CollisionDetector + '_)>,
    ) -> IkResult {
        search.iterations = 1;
        search.oangle = search.init;
        let mut res = self.solve_checked(sk, goal, search.init, coldet.as_deref_mut());
        if matches!(res, IkResult::Ok | IkResult::NotReachable) {
            return res;
        }

        let mut inc = search.inc;
        let mut ang1 = search.init - inc;
        let mut ang2 = search.init + inc;
        loop {
            let mut run = false;
            inc += search.rate;
            if search.min <= ang1 {
                search.iterations += 1;
                search.oangle = ang1;
                res = self.solve_checked(sk, goal, ang1, coldet.as_deref_mut());
                if res == IkResult::Ok {
                    break;
                }
                ang1 -= inc;
                run = true;
            }
            if ang2 <= search.max {
                search.iterations += 1;
                search.oangle = ang2;
                res = self.solve_checked(sk, goal, ang2, coldet.as_deref_mut());
                if res == IkResult::Ok {
                    break;
                }
                ang2 += inc;
                run = true;
            }
            if !run {
                break;
            }
        }
        log::debug!(
            "orbit search for {:?}: {} after {} iterations (angle {:.3})",
            self.limb,
            res,
            search.iterations,
            search.oangle
        );
        res
    }

    /// Orbit angle of the current posture. Global matrices must be current.
    /// Returns zero at (or near) full extension, where any angle fits.
    pub fn orbit_angle(&self, sk: &Skeleton) -> f32 {
        let end = Transform::from_matrix(sk.joint(self.end).gmat());
        let e = self.to_local(sk, &end).position;
        let dist = e.length();
        if dist > self.d1 + self.d2 - 1.0e-4 || dist == 0.0 {
            return 0.0;
        }
        let (_, u, v, c) = self.orbit_frame(e, dist);
        let m = self.base_frame(sk).inverse().transform_point3(sk.joint(self.mid).gcenter()) - c;
        let oang = m.dot(v).atan2(m.dot(u));
        match self.limb {
            LimbType::LeftArm => -oang,
            LimbType::RightArm => oang,
            LimbType::RightLeg => {
                let a = FRAC_PI_2 - oang;
                if a > PI {
                    a - TAU
                } else {
                    a
                }
            }
            LimbType::LeftLeg => {
                let a = oang - FRAC_PI_2;
                if a < -PI {
                    a + TAU
                } else {
                    a
                }
            }
        }
    }

    /// Reads the seven solver values from the skeleton.
    pub fn skeleton_values(&self, sk: &Skeleton) -> [f32; 7] {
        let base = sk.joint(self.base).rot().swing_twist();
        let end = sk.joint(self.end).rot().swing_twist();
        let flex = sk.joint(self.mid).rot().euler().value(self.midflex_axis);
        match self.midtwist {
            Some((mt, axis)) => {
                let tw = sk.joint(mt).rot().euler().value(axis);
                [base.swing().x, base.swing().y, base.twist(), flex, tw, end.swing().x, end.swing().y]
            }
            None => [
                base.swing().x,
                base.swing().y,
                base.twist(),
                flex,
                end.swing().x,
                end.swing().y,
                end.twist(),
            ],
        }
    }

    /// Writes seven solver values into the linkage joints.
    pub fn apply_values(&self, sk: &mut Skeleton, values: &[f32; 7]) {
        let base = sk.joint_mut(self.base).rot_mut();
        base.set_swing(values[0], values[1]);
        base.set_twist(values[2]);
        sk.joint_mut(self.mid)
            .rot_mut()
            .set_euler_value(self.midflex_axis, values[3]);
        match self.midtwist {
            Some((mt, axis)) => {
                sk.joint_mut(mt).rot_mut().set_euler_value(axis, values[4]);
                sk.joint_mut(self.end).rot_mut().set_swing(values[5], values[6]);
            }
            None => {
                let end = sk.joint_mut(self.end).rot_mut();
                end.set_swing(values[4], values[5]);
                end.set_twist(values[6]);
            }
        }
    }

    pub fn apply_last_result(&self, sk: &mut Skeleton) {
        let values = self.result;
        self.apply_values(sk, &values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{ProxyColdet, ProxyConfig};
    use crate::ik::{configure_skeleton, OrbitSearch};
    use crate::joint::RotType;
    use approx::assert_abs_diff_eq;

    /// Chest -> shoulder -> elbow -> wrist, arm along -X.
    fn right_arm() -> (Skeleton, JointId) {
        let mut sk = Skeleton::new("arm");
        let chest = sk.add_joint(RotType::Quat, None, "chest");
        let sh = sk.add_joint(RotType::Quat, Some(chest), "shoulder");
        sk.joint_mut(sh).set_offset(Vec3::new(-0.2, 0.5, 0.0));
        let el = sk.add_joint(RotType::Quat, Some(sh), "elbow");
        sk.joint_mut(el).set_offset(Vec3::new(-0.3, 0.0, 0.0));
        let wr = sk.add_joint(RotType::Quat, Some(el), "wrist");
        sk.joint_mut(wr).set_offset(Vec3::new(-0.25, 0.0, 0.0));
        assert!(configure_skeleton(&mut sk, wr, LimbType::RightArm));
        sk.update_global_matrices();
        (sk, wr)
    }

    #[test]
    fn messages() {
        assert_eq!(IkResult::NotReachable.message(), "Not Reachable");
        assert_eq!(IkResult::NoMidFlexion.to_string(), "No Mid Flexion");
        assert_eq!(IkResult::default().message(), "Undef");
    }

    #[test]
    fn detects_mid_twist_layout() {
        let (sk, wr) = right_arm();
        let ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        assert_eq!(ik.midflex_axis(), 1);
        assert_eq!(ik.midtwist(), Some((ik.mid(), 2)));
        assert_abs_diff_eq!(ik.linkage_len(), 0.55, epsilon = 1e-6);
        assert_eq!(sk.joint(ik.base()).name().as_str(), "shoulder");
    }

    #[test]
    fn rejects_wrong_rotation_types() {
        let mut sk = Skeleton::new("bad");
        let a = sk.add_joint(RotType::Quat, None, "a");
        let b = sk.add_joint(RotType::Euler, Some(a), "b");
        let c = sk.add_joint(RotType::SwingTwist, Some(b), "c");
        assert!(LimbIk::init(&sk, c, LimbType::LeftLeg).is_none());
        assert!(LimbIk::init(&sk, a, LimbType::LeftLeg).is_none());
    }

    #[test]
    fn reaches_goal_position() {
        let (mut sk, wr) = right_arm();
        let mut ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        ik.remove_joint_limits(&mut sk);
        ik.set_solve_rot_goal(false);
        let target = Vec3::new(-0.55, 0.2, 0.25);
        let goal = ik.to_local(&sk, &Transform::from_position(target));
        assert_eq!(ik.solve(&sk, &goal, 0.4), IkResult::Ok);
        ik.apply_last_result(&mut sk);
        sk.update_global_matrices();
        assert!(sk.joint(wr).gcenter().abs_diff_eq(target, 1e-4));
        assert_abs_diff_eq!(ik.orbit_angle(&sk), 0.4, epsilon = 1e-3);
    }

    #[test]
    fn reaches_goal_orientation() {
        let (mut sk, wr) = right_arm();
        let mut ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        ik.remove_joint_limits(&mut sk);
        let rot = Quat::from_rotation_x(0.3) * Quat::from_rotation_y(-0.2);
        let target = Transform::from_position_rotation(Vec3::new(-0.5, 0.3, 0.2), rot);
        let goal = ik.to_local(&sk, &target);
        assert_eq!(ik.solve(&sk, &goal, 0.2), IkResult::Ok);
        ik.apply_last_result(&mut sk);
        sk.update_global_matrices();
        let g = Transform::from_matrix(sk.joint(wr).gmat());
        assert!(g.position.abs_diff_eq(target.position, 1e-4));
        assert!(g.rotation.dot(rot).abs() > 1.0 - 1e-4);
    }

    #[test]
    fn unreachable_and_closest() {
        let (sk, wr) = right_arm();
        let mut ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        let far = ik.to_local(&sk, &Transform::from_position(Vec3::new(-3.0, 0.5, 0.0)));
        assert_eq!(ik.solve(&sk, &far, 0.0), IkResult::NotReachable);
        let zero = Transform::IDENTITY;
        assert_eq!(ik.solve(&sk, &zero, 0.0), IkResult::NotReachable);

        ik.set_solve_closest(true);
        ik.set_solve_rot_goal(false);
        assert_eq!(ik.solve(&sk, &far, 0.0), IkResult::Ok);
        assert_abs_diff_eq!(ik.last_result()[2], 0.0);
        assert_abs_diff_eq!(ik.last_result()[3], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn limits_are_reported() {
        let (sk, wr) = right_arm();
        let mut ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        ik.set_solve_rot_goal(false);
        // a goal behind the shoulder needs more swing than the ellipse allows
        let goal = Transform::from_position(Vec3::new(0.0, 0.0, -0.5));
        let res = ik.solve(&sk, &goal, 0.0);
        assert_ne!(res, IkResult::Ok);
        assert_ne!(res, IkResult::NotReachable);
    }

    #[test]
    fn values_round_trip_through_skeleton() {
        let (mut sk, wr) = right_arm();
        let ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        let v = [0.2, -0.1, 0.3, 0.8, -0.4, 0.1, 0.05];
        ik.apply_values(&mut sk, &v);
        let back = ik.skeleton_values(&sk);
        for (a, b) in v.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    /// Base, mid and end along +Z with the mid joint flexing about X.
    fn x_flex_leg() -> (Skeleton, LimbIk) {
        let mut sk = Skeleton::new("xleg");
        let base = sk.add_joint(RotType::SwingTwist, None, "base");
        let mid = sk.add_joint(RotType::Euler, Some(base), "mid");
        sk.joint_mut(mid).set_offset(Vec3::new(0.0, 0.0, 0.4));
        let end = sk.add_joint(RotType::SwingTwist, Some(mid), "end");
        sk.joint_mut(end).set_offset(Vec3::new(0.0, 0.0, 0.35));
        for id in [base, mid, end] {
            sk.joint_mut(id).rot_mut().thaw();
        }
        let ik = LimbIk::new(&sk, LimbType::RightLeg, base, mid, 0, end, None).unwrap();
        ik.remove_joint_limits(&mut sk);
        sk.update_global_matrices();
        (sk, ik)
    }

    #[test]
    fn flexes_about_the_configured_axis() {
        let (mut sk, mut ik) = x_flex_leg();
        assert_eq!(ik.midflex_axis(), 0);
        ik.set_solve_rot_goal(false);
        let target = Vec3::new(0.2, 0.1, 0.5);
        let goal = ik.to_local(&sk, &Transform::from_position(target));
        assert_eq!(ik.solve(&sk, &goal, 0.3), IkResult::Ok);
        ik.apply_last_result(&mut sk);
        sk.update_global_matrices();
        assert!(sk.joint(ik.end()).gcenter().abs_diff_eq(target, 1e-4));
        assert_abs_diff_eq!(sk.joint(ik.mid()).rot().euler().value(1), 0.0);
    }

    #[test]
    fn rejects_flexion_along_the_link() {
        let (sk, ik) = x_flex_leg();
        assert!(LimbIk::new(&sk, LimbType::RightLeg, ik.base(), ik.mid(), 2, ik.end(), None).is_none());
    }

    #[test]
    fn search_finds_an_orbit() {
        let (mut sk, wr) = right_arm();
        let mut ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        ik.set_solve_rot_goal(false);
        let target = Vec3::new(-0.5, 0.3, 0.2);
        let goal = ik.to_local(&sk, &Transform::from_position(target));
        let mut search = OrbitSearch::for_limb(LimbType::RightArm);
        let res = ik.solve_search(&mut sk, &goal, &mut search, None);
        assert_eq!(res, IkResult::Ok);
        assert!(search.iterations >= 1);
        assert!((search.min..=search.max).contains(&search.oangle));
        sk.update_global_matrices();
        assert!(sk.joint(wr).gcenter().abs_diff_eq(target, 1e-4));
    }

    #[test]
    fn search_with_a_borrowed_detector() {
        let (mut sk, wr) = right_arm();
        let mut cd = ProxyColdet::new(ProxyConfig::default().with_default_radius(0.05));
        cd.connect(&mut sk, "A");
        let mut ik = LimbIk::init(&sk, wr, LimbType::RightArm).unwrap();
        ik.set_solve_rot_goal(false);
        let target = Vec3::new(-0.5, 0.3, 0.2);
        let goal = ik.to_local(&sk, &Transform::from_position(target));

        let mut search = OrbitSearch::for_limb(LimbType::RightArm);
        assert_eq!(ik.solve_search(&mut sk, &goal, &mut search, Some(&mut cd)), IkResult::Ok);
        assert!(!cd.collide());

        cd.obstacles_mut().add_sphere(target, 0.1);
        let res = ik.solve_checked(&mut sk, &goal, search.oangle, Some(&mut cd));
        assert_eq!(res, IkResult::Collision);
    }
}
