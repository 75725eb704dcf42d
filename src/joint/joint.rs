use std::fmt;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use super::limits::VecLimits;
use super::name::JointName;
use super::rotation::JointRotation;
use crate::ik::IkSolver;
use crate::skeleton::Model;

/// Index of a joint inside its [`Skeleton`](crate::Skeleton).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub(crate) usize);

impl JointId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Parameterization used to animate a joint's rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotType {
    #[default]
    Quat,
    SwingTwist,
    Euler,
    Undef,
}

impl RotType {
    pub fn name(self) -> &'static str {
        match self {
            RotType::Quat => "quat",
            RotType::SwingTwist => "st",
            RotType::Euler => "euler",
            RotType::Undef => "undef",
        }
    }
}

/// One node of a skeleton tree.
pub struct Joint {
    pub(crate) id: JointId,
    pub(crate) name: JointName,
    pub(crate) parent: Option<JointId>,
    pub(crate) children: Vec<JointId>,
    offset: Vec3,
    pos: VecLimits,
    rot: JointRotation,
    rot_type: RotType,
    lmat: Mat4,
    lmat_valid: bool,
    lmat_revision: u64,
    pub(crate) gmat: Mat4,
    visgeo: Option<Rc<Model>>,
    colgeo: Option<Rc<Model>>,
    pub(crate) coldet_id: Option<usize>,
    pub(crate) ik: Option<Box<dyn IkSolver>>,
}

impl Joint {
    pub(crate) fn new(id: JointId, name: JointName, parent: Option<JointId>, rot_type: RotType) -> Self {
        Self {
            id,
            name,
            parent,
            children: Vec::new(),
            offset: Vec3::ZERO,
            pos: VecLimits::new(),
            rot: JointRotation::new(),
            rot_type,
            lmat: Mat4::IDENTITY,
            lmat_valid: false,
            lmat_revision: 0,
            gmat: Mat4::IDENTITY,
            visgeo: None,
            colgeo: None,
            coldet_id: None,
            ik: None,
        }
    }

    pub fn id(&self) -> JointId {
        self.id
    }

    pub fn name(&self) -> &JointName {
        &self.name
    }

    pub fn parent(&self) -> Option<JointId> {
        self.parent
    }

    pub fn children(&self) -> &[JointId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Vec3) {
        self.offset = offset;
        self.lmat_valid = false;
    }

    pub fn pos(&self) -> &VecLimits {
        &self.pos
    }

    pub fn pos_mut(&mut self) -> &mut VecLimits {
        self.lmat_valid = false;
        &mut self.pos
    }

    pub fn rot(&self) -> &JointRotation {
        &self.rot
    }

    pub fn rot_mut(&mut self) -> &mut JointRotation {
        &mut self.rot
    }

    pub fn rot_type(&self) -> RotType {
        self.rot_type
    }

    pub fn set_rot_type(&mut self, rot_type: RotType) {
        self.rot_type = rot_type;
    }

    /// Rebuilds the local matrix if a DOF changed since the last call.
    pub fn update_lmat(&mut self) {
        if self.lmat_valid && self.lmat_revision == self.rot.revision() {
            return;
        }
        self.lmat = Mat4::from_rotation_translation(self.rot.full(), self.offset + self.pos.values());
        self.lmat_revision = self.rot.revision();
        self.lmat_valid = true;
    }

    pub fn lmat_uptodate(&self) -> bool {
        self.lmat_valid && self.lmat_revision == self.rot.revision()
    }

    pub fn lmat(&self) -> Mat4 {
        self.lmat
    }

    pub fn gmat(&self) -> Mat4 {
        self.gmat
    }

    /// Global position, read from the last propagated global matrix.
    pub fn gcenter(&self) -> Vec3 {
        self.gmat.w_axis.truncate()
    }

    /// Resets position to zero and rotation to its zero value.
    pub fn init_values(&mut self) {
        self.pos.set_values(Vec3::ZERO);
        self.rot.zero();
        self.lmat_valid = false;
    }

    pub fn visgeo(&self) -> Option<&Rc<Model>> {
        self.visgeo.as_ref()
    }

    pub fn set_visgeo(&mut self, model: Option<Rc<Model>>) {
        self.visgeo = model;
    }

    pub fn colgeo(&self) -> Option<&Rc<Model>> {
        self.colgeo.as_ref()
    }

    pub fn set_colgeo(&mut self, model: Option<Rc<Model>>) {
        self.colgeo = model;
    }

    pub fn coldet_id(&self) -> Option<usize> {
        self.coldet_id
    }

    pub fn ik(&self) -> Option<&dyn IkSolver> {
        self.ik.as_deref()
    }

    pub fn ik_mut(&mut self) -> Option<&mut (dyn IkSolver + 'static)> {
        self.ik.as_deref_mut()
    }
}

impl fmt::Debug for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Joint")
            .field("name", &self.name.as_str())
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("offset", &self.offset)
            .field("rot_type", &self.rot_type)
            .field("ik", &self.ik.is_some())
            .finish()
    }
}
