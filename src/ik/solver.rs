use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::limb::{IkResult, LimbIk, LimbType};
use super::orbit::OrbitSearch;
use crate::collision::CollisionDetector;
use crate::joint::JointId;
use crate::math::Transform;
use crate::skeleton::Skeleton;

/// Frame a goal is expressed in: world space, or the limb's base frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoalFrame {
    #[default]
    Global,
    Local,
}

/// A per-joint IK solver, attached to an end joint and driven through
/// [`Skeleton::ik_solve_position`] and friends or by IK channels.
pub trait IkSolver {
    /// Solves for `goal` and applies the result to `sk`. Only the position
    /// is solved unless `with_rotation` is set.
    fn solve(&mut self, sk: &mut Skeleton, goal: Transform, frame: GoalFrame, with_rotation: bool) -> IkResult;

    /// Reads the end joint's current pose back into the goal, in the base
    /// frame.
    fn capture_goal(&mut self, sk: &mut Skeleton);

    /// Last goal, in the base frame.
    fn goal(&self) -> Transform;
}

/// [`LimbIk`] behind the [`IkSolver`] seam, with orbit handling and an
/// optional shared collision detector.
pub struct LimbSolver {
    ik: LimbIk,
    goal: Transform,
    search: OrbitSearch,
    orbit_search: bool,
    coldet: Option<Rc<RefCell<dyn CollisionDetector>>>,
}

impl LimbSolver {
    /// Solver for the limb ending at `end`, searching orbits by default.
    pub fn new(sk: &Skeleton, end: JointId, limb: LimbType) -> Option<Self> {
        LimbIk::init(sk, end, limb).map(Self::from_ik)
    }

    pub fn from_ik(ik: LimbIk) -> Self {
        Self {
            search: OrbitSearch::for_limb(ik.limb()),
            ik,
            goal: Transform::IDENTITY,
            orbit_search: true,
            coldet: None,
        }
    }

    pub fn ik(&self) -> &LimbIk {
        &self.ik
    }

    pub fn ik_mut(&mut self) -> &mut LimbIk {
        &mut self.ik
    }

    pub fn search(&self) -> &OrbitSearch {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut OrbitSearch {
        &mut self.search
    }

    pub fn orbit_search(&self) -> bool {
        self.orbit_search
    }

    /// Stops searching and always solves with orbit angle `oang`.
    pub fn set_fixed_orbit(&mut self, oang: f32) {
        self.orbit_search = false;
        self.search.init = oang;
    }

    pub fn set_search_orbit(&mut self) {
        self.orbit_search = true;
    }

    pub fn set_coldet(&mut self, coldet: Option<Rc<RefCell<dyn CollisionDetector>>>) {
        self.coldet = coldet;
    }

    /// Solves the stored goal with the current orbit mode.
    pub fn solve_goal(&mut self, sk: &mut Skeleton) -> IkResult {
        let goal = self.goal;
        let mut guard = self.coldet.as_ref().map(|c| c.borrow_mut());
        let coldet = guard.as_deref_mut();
        if self.orbit_search {
            self.ik.solve_search(sk, &goal, &mut self.search, coldet)
        } else {
            self.ik.solve_checked(sk, &goal, self.search.init, coldet)
        }
    }
}

impl IkSolver for LimbSolver {
    fn solve(&mut self, sk: &mut Skeleton, goal: Transform, frame: GoalFrame, with_rotation: bool) -> IkResult {
        self.ik.set_solve_rot_goal(with_rotation);
        self.goal = match frame {
            GoalFrame::Local => goal,
            GoalFrame::Global => {
                self.ik.update_base_up(sk);
                self.ik.to_local(sk, &goal)
            }
        };
        self.solve_goal(sk)
    }

    fn capture_goal(&mut self, sk: &mut Skeleton) {
        sk.update_global_matrices();
        let end = Transform::from_matrix(sk.joint(self.ik.end()).gmat());
        self.goal = self.ik.to_local(sk, &end);
    }

    fn goal(&self) -> Transform {
        self.goal
    }
}

impl fmt::Debug for LimbSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimbSolver")
            .field("limb", &self.ik.limb())
            .field("goal", &self.goal)
            .field("orbit_search", &self.orbit_search)
            .field("coldet", &self.coldet.is_some())
            .finish()
    }
}
