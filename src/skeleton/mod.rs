//! Skeleton hierarchy and attached geometry

mod model;
#[allow(clippy::module_inception)]
mod skeleton;

pub use model::Model;
pub use skeleton::Skeleton;
