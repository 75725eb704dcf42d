//! Joints and their degrees of freedom
//!
//! Translational DOFs live in [`VecLimits`]; rotations in [`JointRotation`],
//! which keeps quaternion, Euler and swing-twist views in sync.

mod euler;
#[allow(clippy::module_inception)]
mod joint;
mod limits;
mod name;
mod rotation;
mod swing_twist;

pub use euler::{EulerOrder, JointEuler};
pub use joint::{Joint, JointId, RotType};
pub use limits::VecLimits;
pub use name::{JointName, NameTable};
pub use rotation::{AlignType, JointRotation, ValueMode};
pub use swing_twist::{
    closest_on_ellipse, swing_twist_from_quat, swing_twist_to_quat, twist_swing_from_quat,
    JointSwingTwist,
};
