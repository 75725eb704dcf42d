use std::collections::{HashMap, HashSet};

use glam::Vec3;

use super::world::ObstacleWorld;
use crate::joint::JointId;
use crate::skeleton::Skeleton;

/// What IK needs from a collision detector: refresh object placements from
/// a skeleton, then ask whether anything collides. Pairs of joints can be
/// switched off individually.
pub trait CollisionDetector {
    /// Brings the global matrices of `sk` up to date and moves the
    /// detector's objects to match. Returns the number of objects moved.
    fn update(&mut self, sk: &mut Skeleton) -> usize;

    fn collide(&self) -> bool;

    fn colliding_pairs(&self) -> Vec<(JointId, JointId)>;

    /// Returns false if either joint has no collision object.
    fn activate_pair(&mut self, a: JointId, b: JointId) -> bool;

    fn deactivate_pair(&mut self, a: JointId, b: JointId) -> bool;

    fn pair_deactivated(&self, a: JointId, b: JointId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyConfig {
    /// Added to every proxy radius.
    pub margin: f32,
    /// Radius for joints without collision geometry. Zero skips them.
    pub default_radius: f32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            margin: 0.0,
            default_radius: 0.0,
        }
    }
}

impl ProxyConfig {
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_default_radius(mut self, radius: f32) -> Self {
        self.default_radius = radius;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Proxy {
    joint: JointId,
    local_center: Vec3,
    radius: f32,
    center: Vec3,
}

/// Collision detector approximating each joint's geometry by one sphere
/// that follows the joint's global frame.
#[derive(Debug, Clone, Default)]
pub struct ProxyColdet {
    config: ProxyConfig,
    proxies: Vec<Proxy>,
    by_joint: HashMap<JointId, usize>,
    deactivated: HashSet<(usize, usize)>,
    obstacles: ObstacleWorld,
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl ProxyColdet {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn obstacles(&self) -> &ObstacleWorld {
        &self.obstacles
    }

    pub fn obstacles_mut(&mut self) -> &mut ObstacleWorld {
        &mut self.obstacles
    }

    /// Number of joint proxies.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Proxy sphere of `joint` in world space, as of the last update.
    pub fn proxy_sphere(&self, joint: JointId) -> Option<(Vec3, f32)> {
        self.by_joint.get(&joint).map(|&i| (self.proxies[i].center, self.proxies[i].radius))
    }

    /// Builds one proxy per joint of `sk` and applies the deactivation
    /// flags: `D` for the skeleton's collision-free pairs, `A` for parent
    /// and child joints, `C` for pairs colliding in the current posture.
    /// Returns the number of colliding pairs found for `C`.
    pub fn connect(&mut self, sk: &mut Skeleton, deactivations: &str) -> usize {
        self.proxies.clear();
        self.by_joint.clear();
        self.deactivated.clear();

        let ids: Vec<JointId> = (0..sk.len()).map(JointId).collect();
        for id in ids {
            let sphere = match sk.joint(id).colgeo().and_then(|m| m.bounding_sphere()) {
                Some(s) => Some(s),
                None if self.config.default_radius > 0.0 => Some((Vec3::ZERO, self.config.default_radius)),
                None => None,
            };
            let joint = sk.joint_mut(id);
            joint.coldet_id = None;
            let Some((local_center, radius)) = sphere else {
                continue;
            };
            joint.coldet_id = Some(self.proxies.len());
            self.by_joint.insert(id, self.proxies.len());
            self.proxies.push(Proxy {
                joint: id,
                local_center,
                radius: radius + self.config.margin,
                center: local_center,
            });
        }
        self.update(sk);

        if deactivations.contains('D') {
            let pairs = sk.collision_free_pairs().to_vec();
            for (a, b) in pairs {
                self.deactivate_pair(a, b);
            }
        }
        if deactivations.contains('A') {
            self.deactivate_adjacent_joints(sk);
        }
        let mut found = 0;
        if deactivations.contains('C') {
            let pairs = self.colliding_pairs();
            found = pairs.len();
            for (a, b) in pairs {
                self.deactivate_pair(a, b);
            }
        }
        log::debug!(
            "connected {} proxies to {}, {} pairs deactivated",
            self.proxies.len(),
            sk.name(),
            self.deactivated.len()
        );
        found
    }

    /// Deactivates every parent/child pair with proxies on both sides.
    pub fn deactivate_adjacent_joints(&mut self, sk: &Skeleton) -> usize {
        let pairs: Vec<(JointId, JointId)> = self
            .proxies
            .iter()
            .filter_map(|p| sk.joint(p.joint).parent().map(|parent| (parent, p.joint)))
            .collect();
        pairs
            .into_iter()
            .filter(|&(a, b)| self.deactivate_pair(a, b))
            .count()
    }

    pub fn deactivate_all_pairs(&mut self) -> usize {
        let n = self.proxies.len();
        for i in 0..n {
            for j in i + 1..n {
                self.deactivated.insert((i, j));
            }
        }
        self.deactivated.len()
    }

    pub fn count_deactivated_pairs(&self) -> usize {
        self.deactivated.len()
    }

    /// Like [`CollisionDetector::collide`], but objects closer than
    /// `tolerance` already count as colliding.
    pub fn collide_tolerance(&self, tolerance: f32) -> bool {
        !self.pairs_within(tolerance).is_empty() || self.obstacle_hit(tolerance)
    }

    /// Joints whose proxies touch an obstacle, with the obstacle index.
    pub fn colliding_obstacles(&self) -> Vec<(JointId, usize)> {
        self.proxies
            .iter()
            .flat_map(|p| {
                self.obstacles
                    .sphere_hits(p.center, p.radius, 0.0)
                    .map(move |o| (p.joint, o))
            })
            .collect()
    }

    fn obstacle_hit(&self, tolerance: f32) -> bool {
        self.proxies
            .iter()
            .any(|p| self.obstacles.sphere_hits(p.center, p.radius, tolerance).next().is_some())
    }

    fn pairs_within(&self, tolerance: f32) -> Vec<(JointId, JointId)> {
        let mut out = Vec::new();
        for (i, a) in self.proxies.iter().enumerate() {
            for (j, b) in self.proxies.iter().enumerate().skip(i + 1) {
                if self.deactivated.contains(&(i, j)) {
                    continue;
                }
                if a.center.distance(b.center) < a.radius + b.radius + tolerance {
                    out.push((a.joint, b.joint));
                }
            }
        }
        out
    }

    fn key(&self, a: JointId, b: JointId) -> Option<(usize, usize)> {
        let ia = *self.by_joint.get(&a)?;
        let ib = *self.by_joint.get(&b)?;
        (ia != ib).then(|| pair_key(ia, ib))
    }
}

impl CollisionDetector for ProxyColdet {
    fn update(&mut self, sk: &mut Skeleton) -> usize {
        sk.update_global_matrices();
        for p in &mut self.proxies {
            p.center = sk.joint(p.joint).gmat().transform_point3(p.local_center);
        }
        self.proxies.len()
    }

    fn collide(&self) -> bool {
        self.collide_tolerance(0.0)
    }

    fn colliding_pairs(&self) -> Vec<(JointId, JointId)> {
        self.pairs_within(0.0)
    }

    fn activate_pair(&mut self, a: JointId, b: JointId) -> bool {
        match self.key(a, b) {
            Some(k) => {
                self.deactivated.remove(&k);
                true
            }
            None => false,
        }
    }

    fn deactivate_pair(&mut self, a: JointId, b: JointId) -> bool {
        match self.key(a, b) {
            Some(k) => {
                self.deactivated.insert(k);
                true
            }
            None => false,
        }
    }

    fn pair_deactivated(&self, a: JointId, b: JointId) -> bool {
        self.key(a, b).is_some_and(|k| self.deactivated.contains(&k))
    }
}
