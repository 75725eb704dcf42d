use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};

use crate::channel::{Channels, SharedChannels};
use crate::ik::{GoalFrame, IkResult, IkSolver, LimbSolver, LimbType};
use crate::joint::{AlignType, Joint, JointId, JointName, NameTable, RotType};
use crate::math::Transform;

/// A joint tree with its name table and animatable channel list.
///
/// Global matrices follow an explicit update discipline: writing a DOF never
/// recomputes transforms, it only marks the skeleton stale. Call
/// [`update_global_matrices`](Self::update_global_matrices) (or one of the
/// `update_gmat*` variants) before reading [`Joint::gmat`].
pub struct Skeleton {
    name: String,
    names: NameTable,
    joints: Vec<Joint>,
    root: Option<JointId>,
    name_index: HashMap<JointName, JointId>,
    gmat_uptodate: bool,
    enforce_rot_limits: bool,
    channels: SharedChannels,
    collision_free_pairs: Vec<(JointId, JointId)>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_names(name, NameTable::new())
    }

    /// Creates a skeleton interning joint names into an existing table.
    pub fn with_names(name: impl Into<String>, names: NameTable) -> Self {
        let channels = Rc::new(RefCell::new(Channels::new(names.clone())));
        Self {
            name: name.into(),
            names,
            joints: Vec::new(),
            root: None,
            name_index: HashMap::new(),
            gmat_uptodate: false,
            enforce_rot_limits: false,
            channels,
            collision_free_pairs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Appends a joint under `parent`. The first parentless joint becomes the
    /// root; a second one is a programming error.
    pub fn add_joint(&mut self, rot_type: RotType, parent: Option<JointId>, name: &str) -> JointId {
        let id = JointId(self.joints.len());
        let name = self.names.intern(name);
        let mut joint = Joint::new(id, name.clone(), parent, rot_type);
        joint.rot_mut().set_enforce_limits(self.enforce_rot_limits);
        match parent {
            Some(p) => self.joints[p.0].children.push(id),
            None => {
                assert!(self.root.is_none(), "skeleton already has a root joint");
                self.root = Some(id);
            }
        }
        self.name_index.entry(name).or_insert(id);
        self.joints.push(joint);
        self.gmat_uptodate = false;
        id
    }

    pub fn root(&self) -> Option<JointId> {
        self.root
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id.0]
    }

    /// Mutable access to a joint. Marks the global matrices stale.
    pub fn joint_mut(&mut self, id: JointId) -> &mut Joint {
        self.gmat_uptodate = false;
        &mut self.joints[id.0]
    }

    /// Hash lookup by name (case-insensitive).
    pub fn joint_id(&self, name: &str) -> Option<JointId> {
        let name = self.names.lookup(name)?;
        self.name_index.get(&name).copied()
    }

    pub fn joint_by_name(&self, name: &JointName) -> Option<JointId> {
        self.name_index.get(name).copied()
    }

    /// Linear search by name, ignoring the hash table.
    pub fn lsearch_joint(&self, name: &str) -> Option<JointId> {
        self.joints
            .iter()
            .find(|j| j.name().as_str().eq_ignore_ascii_case(name))
            .map(|j| j.id())
    }

    pub fn enforce_rot_limits(&self) -> bool {
        self.enforce_rot_limits
    }

    pub fn set_enforce_rot_limits(&mut self, enforce: bool) {
        self.enforce_rot_limits = enforce;
        for j in &mut self.joints {
            j.rot_mut().set_enforce_limits(enforce);
        }
    }

    pub fn channels(&self) -> &SharedChannels {
        &self.channels
    }

    /// Rebuilds the channel list from every non-frozen DOF.
    pub fn make_channels(&mut self) {
        let channels = Rc::clone(&self.channels);
        channels.borrow_mut().make_from_skeleton(self);
    }

    pub fn collision_free_pairs(&self) -> &[(JointId, JointId)] {
        &self.collision_free_pairs
    }

    pub fn add_collision_free_pair(&mut self, a: JointId, b: JointId) {
        self.collision_free_pairs.push((a, b));
    }

    /// Resets every joint's position and rotation values.
    pub fn init_values(&mut self) {
        for j in &mut self.joints {
            j.init_values();
        }
        self.gmat_uptodate = false;
    }

    pub fn global_matrices_uptodate(&self) -> bool {
        self.gmat_uptodate
    }

    pub fn invalidate_global_matrices(&mut self) {
        self.gmat_uptodate = false;
    }

    /// Propagates global matrices from the root, only if they are stale.
    pub fn update_global_matrices(&mut self) {
        if self.gmat_uptodate {
            return;
        }
        if let Some(root) = self.root {
            self.update_gmat(root);
        }
        self.gmat_uptodate = true;
    }

    /// Recomputes `id` from its parent's current global matrix.
    pub fn update_gmat_local(&mut self, id: JointId) {
        let pmat = self.joints[id.0]
            .parent
            .map_or(Mat4::IDENTITY, |p| self.joints[p.0].gmat);
        let j = &mut self.joints[id.0];
        j.update_lmat();
        j.gmat = pmat * j.lmat();
    }

    /// Recomputes `id` and its whole subtree. The parent's global matrix must
    /// be current.
    pub fn update_gmat(&mut self, id: JointId) {
        self.update_gmat_local(id);
        for i in 0..self.joints[id.0].children.len() {
            let c = self.joints[id.0].children[i];
            self.update_gmat(c);
        }
        if Some(id) == self.root {
            self.gmat_uptodate = true;
        }
    }

    /// Like [`update_gmat`](Self::update_gmat), but stop joints are updated
    /// without descending into their children.
    pub fn update_gmat_bounded(&mut self, id: JointId, stop1: Option<JointId>, stop2: Option<JointId>) {
        self.update_gmat_local(id);
        if Some(id) == stop1 || Some(id) == stop2 {
            return;
        }
        for i in 0..self.joints[id.0].children.len() {
            let c = self.joints[id.0].children[i];
            self.update_gmat_bounded(c, stop1, stop2);
        }
    }

    /// Updates `id`, then follows first children until `stop` or a leaf.
    pub fn update_branch_gmat(&mut self, id: JointId, stop: Option<JointId>) {
        self.update_gmat_local(id);
        let mut j = id;
        while Some(j) != stop {
            let Some(&c) = self.joints[j.0].children.first() else {
                break;
            };
            self.update_gmat_local(c);
            j = c;
        }
    }

    /// Updates the ancestors of `id`, root first, without touching `id`
    /// itself. Ancestors at or above `stop` are left alone.
    pub fn update_gmat_up(&mut self, id: JointId, stop: Option<JointId>) {
        let mut chain = Vec::with_capacity(32);
        let mut j = self.joints[id.0].parent;
        while let Some(p) = j {
            if Some(p) == stop {
                break;
            }
            chain.push(p);
            j = self.joints[p.0].parent;
        }
        for p in chain.into_iter().rev() {
            self.update_gmat_local(p);
        }
    }

    /// Every descendant of `id` in depth-first order, excluding `id`.
    pub fn subtree(&self, id: JointId) -> Vec<JointId> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: JointId, out: &mut Vec<JointId>) {
        for &c in &self.joints[id.0].children {
            out.push(c);
            self.collect_subtree(c, out);
        }
    }

    /// Joints in depth-first order from the root.
    pub fn dfs_order(&self) -> Vec<JointId> {
        match self.root {
            Some(r) => {
                let mut out = vec![r];
                self.collect_subtree(r, &mut out);
                out
            }
            None => Vec::new(),
        }
    }

    /// Aligns the pre/post frames of `id` using its offset and its first
    /// child's offset.
    pub fn align_rotation(&mut self, id: JointId, kind: AlignType, v: Vec3) {
        let child_offset = self.joints[id.0]
            .children
            .first()
            .map_or(Vec3::ZERO, |c| self.joints[c.0].offset());
        let j = self.joint_mut(id);
        let offset = j.offset();
        j.rot_mut().align(kind, v, offset, child_offset);
    }

    /// Attaches a limb solver to end joint `id`. Returns false when the
    /// linkage above `id` is not a valid limb.
    pub fn ik_init(&mut self, id: JointId, limb: LimbType) -> bool {
        match LimbSolver::new(self, id, limb) {
            Some(solver) => {
                self.joints[id.0].ik = Some(Box::new(solver));
                true
            }
            None => {
                log::warn!("cannot attach {:?} IK to joint {}", limb, self.joints[id.0].name());
                false
            }
        }
    }

    pub fn set_ik_solver(&mut self, id: JointId, solver: Option<Box<dyn IkSolver>>) {
        self.joints[id.0].ik = solver;
    }

    fn with_ik(&mut self, id: JointId, f: impl FnOnce(&mut dyn IkSolver, &mut Skeleton) -> IkResult) -> IkResult {
        let Some(mut solver) = self.joints[id.0].ik.take() else {
            return IkResult::Undef;
        };
        let res = f(solver.as_mut(), self);
        self.joints[id.0].ik = Some(solver);
        res
    }

    pub fn ik_solve_position(&mut self, id: JointId, pos: Vec3, frame: GoalFrame) -> IkResult {
        self.with_ik(id, |ik, sk| ik.solve(sk, Transform::from_position(pos), frame, false))
    }

    pub fn ik_solve_pose(&mut self, id: JointId, pos: Vec3, rot: Quat, frame: GoalFrame) -> IkResult {
        self.with_ik(id, |ik, sk| {
            ik.solve(sk, Transform::from_position_rotation(pos, rot), frame, true)
        })
    }

    pub fn ik_solve_matrix(&mut self, id: JointId, m: Mat4, frame: GoalFrame) -> IkResult {
        self.with_ik(id, |ik, sk| ik.solve(sk, Transform::from_matrix(m), frame, true))
    }

    /// Reads the current end pose back into the solver goal.
    pub fn ik_capture_goal(&mut self, id: JointId) {
        self.with_ik(id, |ik, sk| {
            ik.capture_goal(sk);
            IkResult::Ok
        });
    }
}

impl std::fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skeleton")
            .field("name", &self.name)
            .field("joints", &self.joints.len())
            .field("channels", &self.channels.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> a -> b, root -> c; unit offsets along Y, `a` rotated 90° about Z.
    fn chain() -> Skeleton {
        let mut sk = Skeleton::new("test");
        let root = sk.add_joint(RotType::Quat, None, "root");
        let a = sk.add_joint(RotType::Quat, Some(root), "a");
        let b = sk.add_joint(RotType::Quat, Some(a), "b");
        let c = sk.add_joint(RotType::Quat, Some(root), "c");
        for id in [a, b, c] {
            sk.joint_mut(id).set_offset(Vec3::Y);
        }
        sk.joint_mut(a).rot_mut().thaw();
        sk.joint_mut(a)
            .rot_mut()
            .set_value(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        sk
    }

    #[test]
    fn global_positions_compose_down_the_tree() {
        let mut sk = chain();
        sk.update_global_matrices();
        let b = sk.joint_id("B").unwrap();
        assert!(sk.joint(b).gcenter().abs_diff_eq(Vec3::new(-1.0, 1.0, 0.0), 1e-6));
        assert!(sk.global_matrices_uptodate());
    }

    #[test]
    fn update_gmat_is_idempotent() {
        let mut sk = chain();
        let root = sk.root().unwrap();
        sk.update_gmat(root);
        let first: Vec<Mat4> = sk.joints().iter().map(|j| j.gmat()).collect();
        sk.update_gmat(root);
        let second: Vec<Mat4> = sk.joints().iter().map(|j| j.gmat()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn joint_mut_marks_matrices_stale() {
        let mut sk = chain();
        sk.update_global_matrices();
        let a = sk.joint_id("a").unwrap();
        sk.joint_mut(a).rot_mut().set_value(Quat::IDENTITY);
        assert!(!sk.global_matrices_uptodate());
        sk.update_global_matrices();
        let b = sk.joint_id("b").unwrap();
        assert!(sk.joint(b).gcenter().abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn bounded_update_stops_at_stop_joint() {
        let mut sk = chain();
        let root = sk.root().unwrap();
        let a = sk.joint_id("a").unwrap();
        let b = sk.joint_id("b").unwrap();
        sk.update_gmat_bounded(root, Some(a), None);
        assert!(sk.joint(a).gcenter().abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(sk.joint(b).gmat(), Mat4::IDENTITY);
    }

    #[test]
    fn update_up_skips_the_joint_itself() {
        let mut sk = chain();
        let a = sk.joint_id("a").unwrap();
        let b = sk.joint_id("b").unwrap();
        sk.update_gmat_up(b, None);
        assert!(sk.joint(a).gcenter().abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(sk.joint(b).gmat(), Mat4::IDENTITY);
        sk.update_branch_gmat(a, None);
        assert!(sk.joint(b).gcenter().abs_diff_eq(Vec3::new(-1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn lookup_and_subtree() {
        let sk = chain();
        let root = sk.root().unwrap();
        assert_eq!(sk.lsearch_joint("C"), sk.joint_id("c"));
        assert!(sk.joint_id("missing").is_none());
        let names: Vec<&str> = sk
            .subtree(root)
            .into_iter()
            .map(|id| sk.joint(id).name().as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn ik_calls_without_solver_are_undef() {
        let mut sk = chain();
        let b = sk.joint_id("b").unwrap();
        assert_eq!(sk.ik_solve_position(b, Vec3::ONE, GoalFrame::Global), IkResult::Undef);
    }
}
