use glam::{Quat, Vec3};

use super::limb::LimbType;
use crate::joint::{EulerOrder, JointId, RotType};
use crate::skeleton::Skeleton;

/// Joint limits for [`configure_skeleton_with`], in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimbLimits {
    /// Base swing ellipse radii.
    pub base_swing: (f32, f32),
    pub base_twist: (f32, f32),
    /// Mid flexion (Y) range.
    pub mid_y: (f32, f32),
    /// Mid twist (Z) range.
    pub mid_z: (f32, f32),
    /// End swing ellipse radii.
    pub end_swing: (f32, f32),
}

impl LimbLimits {
    /// Builds limits from ten angles in degrees, in field order.
    pub fn from_degrees(l: [f32; 10]) -> Self {
        let r = |i: usize| (l[i].to_radians(), l[i + 1].to_radians());
        Self {
            base_swing: r(0),
            base_twist: r(2),
            mid_y: r(4),
            mid_z: r(6),
            end_swing: r(8),
        }
    }

    pub fn for_limb(limb: LimbType) -> Self {
        match limb {
            LimbType::LeftArm => Self::from_degrees([130.0, 175.0, -90.0, 120.0, -160.0, 0.0, -48.0, 130.0, 60.0, 90.0]),
            LimbType::RightArm => Self::from_degrees([130.0, 175.0, -90.0, 120.0, 0.0, 160.0, -130.0, 48.0, 60.0, 90.0]),
            LimbType::LeftLeg => Self::from_degrees([65.0, 135.0, -100.0, 35.0, 0.0, 160.0, -75.0, 55.0, 45.0, 75.0]),
            LimbType::RightLeg => Self::from_degrees([65.0, 135.0, -35.0, 100.0, 0.0, 160.0, -55.0, 75.0, 45.0, 75.0]),
        }
    }
}

/// Pre rotation that turns a limb's rest direction into +Z; the post
/// rotation is its inverse.
fn limb_pre(limb: LimbType) -> Quat {
    match limb {
        LimbType::LeftArm => Quat::from_axis_angle(Vec3::Y, 90f32.to_radians()),
        LimbType::RightArm => Quat::from_axis_angle(Vec3::Y, -90f32.to_radians()),
        LimbType::LeftLeg | LimbType::RightLeg => {
            Quat::from_axis_angle(Vec3::new(1.0, 1.0, -1.0).normalize(), 120f32.to_radians())
        }
    }
}

/// Sets up the three joints above and including `end` for [`LimbIk`]:
/// a swing-twist base, a `Zy` Euler mid and a swing-twist end, all thawed,
/// with the given pre/post rotations and limits. Returns false when `end`
/// has fewer than two ancestors.
///
/// [`LimbIk`]: super::LimbIk
pub fn configure_skeleton_with(sk: &mut Skeleton, end: JointId, pre: Quat, post: Quat, limits: &LimbLimits) -> bool {
    let Some(mid) = sk.joint(end).parent() else {
        return false;
    };
    let Some(base) = sk.joint(mid).parent() else {
        return false;
    };

    let b = sk.joint_mut(base);
    b.set_rot_type(RotType::SwingTwist);
    let r = b.rot_mut();
    r.thaw();
    let st = r.st_mut();
    st.set_ellipse(limits.base_swing.0, limits.base_swing.1);
    st.set_twist_limits(limits.base_twist.0, limits.base_twist.1);
    r.set_pre(pre);
    r.set_post(post);

    let m = sk.joint_mut(mid);
    m.set_rot_type(RotType::Euler);
    let r = m.rot_mut();
    r.thaw();
    let e = r.euler_mut();
    e.set_order(EulerOrder::Zy);
    e.set_limits(1, limits.mid_y.0, limits.mid_y.1);
    e.set_limits(2, limits.mid_z.0, limits.mid_z.1);
    r.set_pre(pre);
    r.set_post(post);

    let e = sk.joint_mut(end);
    e.set_rot_type(RotType::SwingTwist);
    let r = e.rot_mut();
    r.thaw();
    r.st_mut().set_ellipse(limits.end_swing.0, limits.end_swing.1);
    r.set_pre(pre);
    r.set_post(post);

    log::debug!(
        "configured limb {} / {} / {}",
        sk.joint(base).name(),
        sk.joint(mid).name(),
        sk.joint(end).name()
    );
    true
}

/// [`configure_skeleton_with`] using the recommended rest frames and limits
/// of `limb`.
pub fn configure_skeleton(sk: &mut Skeleton, end: JointId, limb: LimbType) -> bool {
    let pre = limb_pre(limb);
    configure_skeleton_with(sk, end, pre, pre.inverse(), &LimbLimits::for_limb(limb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pre_rotation_maps_limbs_onto_z() {
        let post = |l| limb_pre(l).inverse();
        assert!((post(LimbType::RightArm) * Vec3::NEG_X).abs_diff_eq(Vec3::Z, 1e-5));
        assert!((post(LimbType::LeftArm) * Vec3::X).abs_diff_eq(Vec3::Z, 1e-5));
        assert!((post(LimbType::LeftLeg) * Vec3::NEG_Y).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn configures_three_joints() {
        let mut sk = Skeleton::new("leg");
        let hip = sk.add_joint(RotType::Quat, None, "hip");
        let knee = sk.add_joint(RotType::Quat, Some(hip), "knee");
        let ankle = sk.add_joint(RotType::Quat, Some(knee), "ankle");
        assert!(!configure_skeleton(&mut sk, knee, LimbType::LeftLeg));
        assert!(configure_skeleton(&mut sk, ankle, LimbType::LeftLeg));

        assert_eq!(sk.joint(hip).rot_type(), RotType::SwingTwist);
        assert_eq!(sk.joint(knee).rot_type(), RotType::Euler);
        let st = sk.joint(hip).rot().swing_twist();
        assert_abs_diff_eq!(st.ellipse().x, 65f32.to_radians(), epsilon = 1e-6);
        assert_abs_diff_eq!(st.twist_limits().0, -100f32.to_radians(), epsilon = 1e-6);
        let e = sk.joint(knee).rot().euler();
        assert_eq!(e.order(), EulerOrder::Zy);
        assert!(e.frozen(0) && !e.frozen(1) && !e.frozen(2));
        assert!(!sk.joint(ankle).rot().frozen());
        assert!(sk.joint(ankle).rot().swing_twist().twist_frozen());
        assert!(sk.joint(ankle).rot().value().abs_diff_eq(glam::Quat::IDENTITY, 1e-6));
    }
}
