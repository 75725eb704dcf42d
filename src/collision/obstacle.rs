use glam::Vec3;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObstacleShape {
    Sphere { center: Vec3, radius: f32 },
    Box { center: Vec3, half_extents: Vec3 },
}

/// A static solid that joint proxies are tested against.
pub trait Obstacle: Debug {
    /// Negative inside, zero on the surface.
    fn signed_distance(&self, point: Vec3) -> f32;
    fn center(&self) -> Vec3;
    fn shape(&self) -> ObstacleShape;
    fn clone_box(&self) -> Box<dyn Obstacle>;

    fn contains_point(&self, point: Vec3) -> bool {
        self.signed_distance(point) <= 0.0
    }

    /// True if a sphere of `radius` around `center` comes closer than
    /// `tolerance` to the solid.
    fn near_sphere(&self, center: Vec3, radius: f32, tolerance: f32) -> bool {
        self.signed_distance(center) < radius + tolerance
    }
}

impl Clone for Box<dyn Obstacle> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereObstacle {
    pub center: Vec3,
    pub radius: f32,
}

impl SphereObstacle {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl Obstacle for SphereObstacle {
    fn signed_distance(&self, point: Vec3) -> f32 {
        point.distance(self.center) - self.radius
    }

    fn center(&self) -> Vec3 {
        self.center
    }

    fn shape(&self) -> ObstacleShape {
        ObstacleShape::Sphere {
            center: self.center,
            radius: self.radius,
        }
    }

    fn clone_box(&self) -> Box<dyn Obstacle> {
        Box::new(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AabbObstacle {
    pub min: Vec3,
    pub max: Vec3,
}

impl AabbObstacle {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

impl Obstacle for AabbObstacle {
    fn signed_distance(&self, point: Vec3) -> f32 {
        let q = (point - self.center()).abs() - self.half_extents();
        q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
    }

    fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    fn shape(&self) -> ObstacleShape {
        ObstacleShape::Box {
            center: self.center(),
            half_extents: self.half_extents(),
        }
    }

    fn clone_box(&self) -> Box<dyn Obstacle> {
        Box::new(*self)
    }
}
