//! Analytic limb inverse kinematics
//!
//! [`LimbIk`] solves a base / mid / end linkage in closed form for a given
//! orbit angle, the one redundant DOF of an arm or leg. [`OrbitSearch`]
//! drives a 1-D search over that angle, and [`LimbSolver`] wraps both behind
//! the per-joint [`IkSolver`] trait.

mod configure;
mod limb;
mod orbit;
mod solver;

pub use configure::{configure_skeleton, configure_skeleton_with, LimbLimits};
pub use limb::{IkResult, LimbIk, LimbType};
pub use orbit::OrbitSearch;
pub use solver::{GoalFrame, IkSolver, LimbSolver};
