//! Postures, key-framed motions and their file formats

mod bvh;
#[allow(clippy::module_inception)]
mod motion;
mod posture;
mod sm;

pub use bvh::{parse_bvh, Bvh, BvhExport, MotionBuilderMode};
pub use motion::{Frame, InterpType, Motion};
pub use posture::Posture;
