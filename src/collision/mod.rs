//! Collision detection behind the [`CollisionDetector`] trait used by IK,
//! with a sphere-proxy implementation and static obstacles.

mod coldet;
mod obstacle;
mod world;

pub use coldet::{CollisionDetector, ProxyColdet, ProxyConfig};
pub use obstacle::{AabbObstacle, Obstacle, ObstacleShape, SphereObstacle};
pub use world::ObstacleWorld;
