//! # skelkin
//!
//! Skeletal kinematics for character animation: joint hierarchies with
//! several rotation parameterizations, channel-based postures and keyframed
//! motions, BVH import/export and analytic IK for human limbs.
//!
//! ## Features
//! - Joint rotations kept in sync as quaternion, Euler and swing-twist values, with limits
//! - Channels connecting flat value buffers to joint DOFs
//! - Postures and motions with linear and cubic interpolation, `.sm` text format
//! - BVH loading and export
//! - Closed-form arm/leg IK with orbit angle search and optional collision checks
//!
//! ## Example
//! ```rust,ignore
//! use skelkin::{configure_skeleton, GoalFrame, LimbType, Skeleton};
//! use glam::Vec3;
//!
//! let mut sk = Skeleton::load_bvh(&std::fs::read_to_string("walk.bvh")?)?;
//! let wrist = sk.joint_id("RightHand").unwrap();
//! configure_skeleton(&mut sk, wrist, LimbType::RightArm);
//! sk.ik_init(wrist, LimbType::RightArm);
//!
//! let result = sk.ik_solve_position(wrist, Vec3::new(-0.5, 1.3, 0.2), GoalFrame::Global);
//! println!("{}", result.message());
//! ```

pub mod channel;
pub mod collision;
pub mod error;
pub mod ik;
pub mod io;
pub mod joint;
pub mod math;
pub mod motion;
pub mod skeleton;

pub use channel::{Channel, ChannelSource, ChannelTarget, ChannelType, Channels, Connection, SharedChannels};
pub use collision::{
    AabbObstacle, CollisionDetector, Obstacle, ObstacleShape, ObstacleWorld, ProxyColdet, ProxyConfig,
    SphereObstacle,
};
pub use error::{KinError, Result};
pub use ik::{
    configure_skeleton, configure_skeleton_with, GoalFrame, IkResult, IkSolver, LimbIk, LimbLimits, LimbSolver,
    LimbType, OrbitSearch,
};
pub use joint::{
    AlignType, EulerOrder, Joint, JointEuler, JointId, JointName, JointRotation, JointSwingTwist, NameTable,
    RotType, ValueMode, VecLimits,
};
pub use math::Transform;
pub use motion::{parse_bvh, Bvh, BvhExport, Frame, InterpType, Motion, MotionBuilderMode, Posture};
pub use skeleton::{Model, Skeleton};
