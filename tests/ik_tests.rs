use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};
use skelkin::{
    configure_skeleton, ChannelTarget, ChannelType, Channels, CollisionDetector, GoalFrame, IkResult, IkSolver,
    JointId, LimbSolver, LimbType, ProxyColdet, ProxyConfig, RotType, Skeleton, Transform,
};

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
    (sk, wr)
}

fn left_leg() -> (Skeleton, JointId) {
    let mut sk = Skeleton::new("leg");
    let pelvis = sk.add_joint(RotType::Quat, None, "pelvis");
    sk.joint_mut(pelvis).set_offset(Vec3::new(0.0, 1.0, 0.0));
    let hip = sk.add_joint(RotType::Quat, Some(pelvis), "hip");
    sk.joint_mut(hip).set_offset(Vec3::new(0.1, 0.0, 0.0));
    let knee = sk.add_joint(RotType::Quat, Some(hip), "knee");
    sk.joint_mut(knee).set_offset(Vec3::new(0.0, -0.45, 0.0));
    let ankle = sk.add_joint(RotType::Quat, Some(knee), "ankle");
    sk.joint_mut(ankle).set_offset(Vec3::new(0.0, -0.4, 0.0));
    assert!(configure_skeleton(&mut sk, ankle, LimbType::LeftLeg));
    (sk, ankle)
}

fn gmats(sk: &Skeleton) -> Vec<Mat4> {
    sk.joints().iter().map(|j| j.gmat()).collect()
}

#[test]
fn test_update_gmat_is_idempotent() {
    let (mut sk, wr) = right_arm();
    let sh = sk.joint_id("shoulder").unwrap();
    sk.joint_mut(sh).rot_mut().set_swing(0.3, -0.2);
    sk.update_gmat(sk.root().unwrap());
    let once = gmats(&sk);
    sk.update_gmat(sk.root().unwrap());
    assert_eq!(gmats(&sk), once);

    sk.invalidate_global_matrices();
    sk.update_global_matrices();
    assert_eq!(gmats(&sk), once);
    assert!(sk.global_matrices_uptodate());
    assert!(sk.joint(wr).gcenter().is_finite());
}

#[test]
fn test_arm_reaches_targets() {
    let (mut sk, wr) = right_arm();
    assert!(sk.ik_init(wr, LimbType::RightArm));
    for target in [Vec3::new(-0.5, 0.3, 0.2), Vec3::new(-0.55, 0.2, 0.25)] {
        let res = sk.ik_solve_position(wr, target, GoalFrame::Global);
        assert_eq!(res, IkResult::Ok, "{target}");
        sk.update_global_matrices();
        assert!(sk.joint(wr).gcenter().abs_diff_eq(target, 1e-4), "{target}");
    }
}

#[test]
fn test_leg_reaches_pose() {
    let (mut sk, ankle) = left_leg();
    assert!(sk.ik_init(ankle, LimbType::LeftLeg));
    let target = Vec3::new(0.1, 0.25, 0.15);
    assert_eq!(sk.ik_solve_position(ankle, target, GoalFrame::Global), IkResult::Ok);
    sk.update_global_matrices();
    let reached = sk.joint(ankle).gmat();

    // asking for the pose just reached must keep it
    let rot = Quat::from_mat4(&reached);
    assert_eq!(sk.ik_solve_pose(ankle, target, rot, GoalFrame::Global), IkResult::Ok);
    sk.update_global_matrices();
    let again = sk.joint(ankle).gmat();
    assert!(again.abs_diff_eq(reached, 1e-4));
}

#[test]
fn test_unreachable_target_is_reported() {
    let (mut sk, wr) = right_arm();
    sk.ik_init(wr, LimbType::RightArm);
    let res = sk.ik_solve_position(wr, Vec3::new(-2.0, 0.5, 0.0), GoalFrame::Global);
    assert_eq!(res, IkResult::NotReachable);
    assert_eq!(res.message(), "Not Reachable");
}

#[test]
fn test_ik_channel_replays_goal() {
    let (mut sk, wr) = right_arm();
    sk.ik_init(wr, LimbType::RightArm);
    let target = Vec3::new(-0.5, 0.3, 0.2);
    assert_eq!(sk.ik_solve_position(wr, target, GoalFrame::Global), IkResult::Ok);
    let local = sk.joint(wr).ik().map(|ik| ik.goal()).unwrap_or_default();

    // back to rest, then drive the limb through an IK channel
    let names = sk.names().clone();
    for j in sk.dfs_order() {
        sk.joint_mut(j).rot_mut().zero();
    }
    let mut chs = Channels::new(names);
    chs.push("wrist", ChannelType::IKPos);
    chs.connect_skeleton(&sk);
    chs.apply(&local.position.to_array(), ChannelTarget::Skeleton(&mut sk));

    sk.update_global_matrices();
    assert!(sk.joint(wr).gcenter().abs_diff_eq(target, 1e-4));
}

#[test]
fn test_collision_blocks_solution() {
    let (mut sk, wr) = right_arm();
    let target = Vec3::new(-0.5, 0.3, 0.2);

    let cd = Rc::new(RefCell::new(ProxyColdet::new(ProxyConfig::default().with_default_radius(0.05))));
    cd.borrow_mut().connect(&mut sk, "A");
    cd.borrow_mut().obstacles_mut().add_sphere(target, 0.1);

    let mut solver = LimbSolver::new(&sk, wr, LimbType::RightArm).unwrap();
    solver.set_fixed_orbit(32f32.to_radians());
    let shared: Rc<RefCell<dyn CollisionDetector>> = cd.clone();
    solver.set_coldet(Some(shared));

    let goal = Transform::from_position(target);
    assert_eq!(solver.solve(&mut sk, goal, GoalFrame::Global, false), IkResult::Collision);

    cd.borrow_mut().obstacles_mut().clear();
    assert_eq!(solver.solve(&mut sk, goal, GoalFrame::Global, false), IkResult::Ok);
    assert!(!cd.borrow().collide());
}
