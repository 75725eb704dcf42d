use glam::Vec3;

/// Triangle mesh attached to a joint as visual or collision geometry.
///
/// Models are shared through `Rc`, so several joints (or skeletons) can
/// reference one asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl Model {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Axis-aligned box spanning `min..max`, 12 triangles.
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { min.x } else { max.x },
                    if i & 2 == 0 { min.y } else { max.y },
                    if i & 4 == 0 { min.z } else { max.z },
                )
            })
            .collect();
        let faces = vec![
            [0, 2, 1], [1, 2, 3],
            [4, 5, 6], [5, 7, 6],
            [0, 1, 4], [1, 5, 4],
            [2, 6, 3], [3, 6, 7],
            [0, 4, 2], [2, 4, 6],
            [1, 3, 5], [3, 7, 5],
        ];
        Self { vertices, faces }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// Axis-aligned bounds, or `None` for an empty model.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Sphere centred on the bounds that encloses every vertex.
    pub fn bounding_sphere(&self) -> Option<(Vec3, f32)> {
        let (lo, hi) = self.bounds()?;
        let center = (lo + hi) * 0.5;
        let radius = self
            .vertices
            .iter()
            .map(|v| v.distance(center))
            .fold(0.0, f32::max);
        Some((center, radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_bounds_and_sphere() {
        let m = Model::cuboid(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(m.triangle_count(), 12);
        assert_eq!(m.bounds(), Some((Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0))));
        let (c, r) = m.bounding_sphere().unwrap_or_default();
        assert_eq!(c, Vec3::Y);
        assert!((r - 3.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn empty_model_has_no_bounds() {
        assert!(Model::default().bounds().is_none());
        assert!(Model::default().bounding_sphere().is_none());
    }
}
