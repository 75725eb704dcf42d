use glam::Vec3;

use super::obstacle::{AabbObstacle, Obstacle, SphereObstacle};

/// Static obstacles shared by every joint proxy of a collision detector.
#[derive(Default, Clone)]
pub struct ObstacleWorld {
    obstacles: Vec<Box<dyn Obstacle>>,
}

impl ObstacleWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Obstacle + 'static>(&mut self, obstacle: T) -> usize {
        self.obstacles.push(Box::new(obstacle));
        self.obstacles.len() - 1
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32) -> usize {
        self.add(SphereObstacle::new(center, radius))
    }

    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) -> usize {
        self.add(AabbObstacle::from_center_half_extents(center, half_extents))
    }

    pub fn add_aabb(&mut self, min: Vec3, max: Vec3) -> usize {
        self.add(AabbObstacle::new(min, max))
    }

    pub fn clear(&mut self) {
        self.obstacles.clear();
    }

    pub fn obstacles(&self) -> &[Box<dyn Obstacle>] {
        &self.obstacles
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn point_inside_any(&self, point: Vec3) -> bool {
        self.obstacles.iter().any(|o| o.contains_point(point))
    }

    /// Index and signed distance of the obstacle closest to `point`.
    pub fn closest_obstacle(&self, point: Vec3) -> Option<(usize, f32)> {
        self.obstacles
            .iter()
            .enumerate()
            .map(|(i, o)| (i, o.signed_distance(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Indices of the obstacles within `tolerance` of the given sphere.
    pub fn sphere_hits(&self, center: Vec3, radius: f32, tolerance: f32) -> impl Iterator<Item = usize> + '_ {
        self.obstacles
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.near_sphere(center, radius, tolerance))
            .map(|(i, _)| i)
    }
}

impl std::fmt::Debug for ObstacleWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObstacleWorld")
            .field("obstacle_count", &self.obstacles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries() {
        let mut w = ObstacleWorld::new();
        assert!(w.is_empty());
        w.add_sphere(Vec3::new(5.0, 0.0, 0.0), 1.0);
        let b = w.add_box(Vec3::ZERO, Vec3::splat(0.5));
        assert_eq!(w.len(), 2);
        assert!(w.point_inside_any(Vec3::new(0.2, 0.2, 0.2)));
        assert_eq!(w.closest_obstacle(Vec3::new(1.0, 0.0, 0.0)).map(|(i, _)| i), Some(b));
        let hits: Vec<usize> = w.sphere_hits(Vec3::new(3.5, 0.0, 0.0), 0.6, 0.0).collect();
        assert_eq!(hits, vec![0]);
        let cloned = w.clone();
        w.clear();
        assert_eq!(cloned.len(), 2);
        assert!(w.is_empty());
    }
}
