use std::fmt;
use std::str::FromStr;

use glam::{Quat, Vec3};
use rand::Rng;

use crate::error::{KinError, Result};
use crate::ik::GoalFrame;
use crate::io::{write_float, Tokens};
use crate::joint::{JointId, JointName};
use crate::math::{angle_lerp, quat_from_wxyz, quat_to_wxyz};
use crate::skeleton::Skeleton;

/// Kind of animation parameter carried by a [`Channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelType {
    XPos,
    YPos,
    ZPos,
    XRot,
    YRot,
    ZRot,
    /// Rotation as `[w, x, y, z]`.
    Quat,
    /// Swing axis-angle `[x, y]`.
    Swing,
    Twist,
    /// IK end-effector position.
    IKPos,
    /// IK position followed by a `[w, x, y, z]` orientation.
    IKGoal,
}

impl ChannelType {
    pub const ALL: [ChannelType; 11] = [
        ChannelType::XPos,
        ChannelType::YPos,
        ChannelType::ZPos,
        ChannelType::XRot,
        ChannelType::YRot,
        ChannelType::ZRot,
        ChannelType::Quat,
        ChannelType::Swing,
        ChannelType::Twist,
        ChannelType::IKPos,
        ChannelType::IKGoal,
    ];

    /// Number of floats the channel occupies.
    pub const fn size(self) -> usize {
        match self {
            ChannelType::Quat => 4,
            ChannelType::Swing => 2,
            ChannelType::IKPos => 3,
            ChannelType::IKGoal => 7,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelType::XPos => "XPos",
            ChannelType::YPos => "YPos",
            ChannelType::ZPos => "ZPos",
            ChannelType::XRot => "XRot",
            ChannelType::YRot => "YRot",
            ChannelType::ZRot => "ZRot",
            ChannelType::Quat => "Quat",
            ChannelType::Swing => "Swing",
            ChannelType::Twist => "Twist",
            ChannelType::IKPos => "IKPos",
            ChannelType::IKGoal => "IKGoal",
        }
    }

    /// Parses a type name, also accepting the BVH spellings (`Xrotation`,
    /// `Yposition`, ...). Case-insensitive.
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.to_ascii_lowercase();
        let t = match s.as_str() {
            "xpos" | "xposition" => ChannelType::XPos,
            "ypos" | "yposition" => ChannelType::YPos,
            "zpos" | "zposition" => ChannelType::ZPos,
            "xrot" | "xrotation" => ChannelType::XRot,
            "yrot" | "yrotation" => ChannelType::YRot,
            "zrot" | "zrotation" => ChannelType::ZRot,
            "quat" => ChannelType::Quat,
            "swing" => ChannelType::Swing,
            "twist" => ChannelType::Twist,
            "ikpos" => ChannelType::IKPos,
            "ikgoal" => ChannelType::IKGoal,
            _ => return None,
        };
        Some(t)
    }

    pub fn is_position(self) -> bool {
        matches!(self, ChannelType::XPos | ChannelType::YPos | ChannelType::ZPos)
    }

    pub fn is_euler(self) -> bool {
        matches!(self, ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot)
    }

    pub fn is_rotation(self) -> bool {
        self.is_euler() || matches!(self, ChannelType::Quat | ChannelType::Swing | ChannelType::Twist)
    }

    fn axis(self) -> usize {
        match self {
            ChannelType::XPos | ChannelType::XRot => 0,
            ChannelType::YPos | ChannelType::YRot => 1,
            _ => 2,
        }
    }

    /// Interpolates one channel's values: slerp for quaternions, shortest
    /// arc for angles, lerp otherwise. Returns the number of floats written.
    pub fn interp(self, v1: &[f32], v2: &[f32], t: f32, out: &mut [f32]) -> usize {
        let lerp = |a: f32, b: f32| a + (b - a) * t;
        match self {
            ChannelType::Quat => {
                let q = quat_from_wxyz(v1).slerp(quat_from_wxyz(v2), t);
                quat_to_wxyz(q, out);
            }
            ChannelType::IKGoal => {
                for i in 0..3 {
                    out[i] = lerp(v1[i], v2[i]);
                }
                let q = quat_from_wxyz(&v1[3..]).slerp(quat_from_wxyz(&v2[3..]), t);
                quat_to_wxyz(q, &mut out[3..]);
            }
            ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot | ChannelType::Twist => {
                out[0] = angle_lerp(v1[0], v2[0], t);
            }
            _ => {
                for i in 0..self.size() {
                    out[i] = lerp(v1[i], v2[i]);
                }
            }
        }
        self.size()
    }

    /// Weighted blend of several values of this channel type. Quaternion
    /// parts use a normalized weighted sum.
    pub fn interp_weighted(self, values: &[&[f32]], weights: &[f32], out: &mut [f32]) -> usize {
        let n = self.size();
        out[..n].fill(0.0);
        for (v, &w) in values.iter().zip(weights) {
            for i in 0..n {
                out[i] += v[i] * w;
            }
        }
        match self {
            ChannelType::Quat => {
                let q = quat_from_wxyz(out);
                quat_to_wxyz(q, out);
            }
            ChannelType::IKGoal => {
                let q = quat_from_wxyz(&out[3..]);
                quat_to_wxyz(q, &mut out[3..]);
            }
            _ => {}
        }
        n
    }

    /// Scales and offsets values in place. Quaternions get their rotation
    /// angle scaled by `mfactor` (when positive) and are then pre-multiplied
    /// by the `offset` quaternion.
    pub fn change_values(self, values: &mut [f32], mfactor: f32, offset: &[f32]) -> usize {
        match self {
            ChannelType::Quat => {
                let mut q = quat_from_wxyz(values);
                if mfactor > 0.0 {
                    let (axis, angle) = q.to_axis_angle();
                    q = Quat::from_axis_angle(axis, angle * mfactor);
                }
                quat_to_wxyz(quat_from_wxyz(offset) * q, values);
            }
            ChannelType::IKGoal => {
                ChannelType::IKPos.change_values(values, mfactor, offset);
                ChannelType::Quat.change_values(&mut values[3..], mfactor, &offset[3..]);
            }
            _ => {
                for i in 0..self.size() {
                    values[i] = values[i] * mfactor + offset[i];
                }
            }
        }
        self.size()
    }

    /// Appends the text form of one channel's values: positions as is,
    /// angles in degrees and quaternions as an axis-angle vector.
    pub fn save_values(self, values: &[f32], out: &mut String) -> usize {
        match self {
            ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot | ChannelType::Twist => {
                write_float(out, values[0].to_degrees());
            }
            ChannelType::Quat => {
                let v = quat_from_wxyz(values).to_scaled_axis();
                write_vec(out, &[v.x, v.y, v.z]);
            }
            ChannelType::IKGoal => {
                ChannelType::IKPos.save_values(values, out);
                out.push(' ');
                ChannelType::Quat.save_values(&values[3..], out);
            }
            _ => write_vec(out, &values[..self.size()]),
        }
        self.size()
    }

    /// Reads one channel's values in the form written by
    /// [`save_values`](Self::save_values).
    pub fn load_values(self, tokens: &mut Tokens, out: &mut [f32]) -> Result<usize> {
        match self {
            ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot | ChannelType::Twist => {
                out[0] = tokens.expect_f32("angle")?.to_radians();
            }
            ChannelType::Quat => {
                let v = Vec3::new(
                    tokens.expect_f32("axis-angle")?,
                    tokens.expect_f32("axis-angle")?,
                    tokens.expect_f32("axis-angle")?,
                );
                quat_to_wxyz(Quat::from_scaled_axis(v), out);
            }
            ChannelType::IKGoal => {
                ChannelType::IKPos.load_values(tokens, out)?;
                ChannelType::Quat.load_values(tokens, &mut out[3..])?;
            }
            _ => {
                for v in out.iter_mut().take(self.size()) {
                    *v = tokens.expect_f32("channel value")?;
                }
            }
        }
        Ok(self.size())
    }
}

fn write_vec(out: &mut String, values: &[f32]) {
    for (i, &v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_float(out, v);
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelType {
    type Err = KinError;

    fn from_str(s: &str) -> Result<Self> {
        ChannelType::from_name(s).ok_or_else(|| KinError::UnknownChannelType(s.to_string()))
    }
}

/// Where a channel's values go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connection {
    #[default]
    Disconnected,
    /// DOFs of a joint in the skeleton passed at apply time.
    Joint(JointId),
    /// Float offset inside a posture buffer.
    Buffer(usize),
    /// Float offset inside a caller-supplied base buffer.
    Index(usize),
}

/// Destination of [`Channel::apply`].
pub enum ChannelTarget<'a> {
    Skeleton(&'a mut Skeleton),
    Buffer(&'a mut [f32]),
    None,
}

/// Source of [`Channel::get`].
#[derive(Clone, Copy)]
pub enum ChannelSource<'a> {
    Skeleton(&'a Skeleton),
    Buffer(&'a [f32]),
    None,
}

/// A typed animation parameter bound to a joint name.
#[derive(Debug, Clone)]
pub struct Channel {
    name: JointName,
    ctype: ChannelType,
    connection: Connection,
}

impl PartialEq for Channel {
    /// Channels match on type and joint name, ignoring the connection.
    fn eq(&self, other: &Self) -> bool {
        self.ctype == other.ctype && self.name.as_str().eq_ignore_ascii_case(other.name.as_str())
    }
}

impl Channel {
    pub fn new(name: JointName, ctype: ChannelType) -> Self {
        Self {
            name,
            ctype,
            connection: Connection::Disconnected,
        }
    }

    pub fn name(&self) -> &JointName {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: JointName) {
        self.name = name;
    }

    pub fn ctype(&self) -> ChannelType {
        self.ctype
    }

    pub(crate) fn set_type(&mut self, ctype: ChannelType) {
        self.ctype = ctype;
    }

    pub fn size(&self) -> usize {
        self.ctype.size()
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection != Connection::Disconnected
    }

    pub fn connect_joint(&mut self, id: JointId) {
        self.connection = Connection::Joint(id);
    }

    pub fn connect_buffer(&mut self, offset: usize) {
        self.connection = Connection::Buffer(offset);
    }

    pub fn connect_index(&mut self, offset: usize) {
        self.connection = Connection::Index(offset);
    }

    pub fn disconnect(&mut self) {
        self.connection = Connection::Disconnected;
    }

    pub(crate) fn set_connection(&mut self, connection: Connection) {
        self.connection = connection;
    }

    /// Writes this channel's values from `src` into its connection. Returns
    /// the channel size whether or not anything was written.
    pub fn apply(&self, src: &[f32], target: &mut ChannelTarget<'_>) -> usize {
        let n = self.size();
        match (self.connection, target) {
            (Connection::Joint(id), ChannelTarget::Skeleton(sk)) => self.apply_joint(&src[..n], sk, id),
            (Connection::Buffer(off) | Connection::Index(off), ChannelTarget::Buffer(buf)) => {
                buf[off..off + n].copy_from_slice(&src[..n]);
            }
            _ => {}
        }
        n
    }

    fn apply_joint(&self, v: &[f32], sk: &mut Skeleton, id: JointId) {
        match self.ctype {
            ChannelType::XPos | ChannelType::YPos | ChannelType::ZPos => {
                sk.joint_mut(id).pos_mut().set_value(self.ctype.axis(), v[0]);
            }
            ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot => {
                sk.joint_mut(id).rot_mut().set_euler_value(self.ctype.axis(), v[0]);
            }
            ChannelType::Quat => sk.joint_mut(id).rot_mut().set_value(quat_from_wxyz(v)),
            ChannelType::Swing => sk.joint_mut(id).rot_mut().set_swing(v[0], v[1]),
            ChannelType::Twist => sk.joint_mut(id).rot_mut().set_twist(v[0]),
            ChannelType::IKPos => {
                sk.ik_solve_position(id, Vec3::new(v[0], v[1], v[2]), GoalFrame::Local);
            }
            ChannelType::IKGoal => {
                let p = Vec3::new(v[0], v[1], v[2]);
                sk.ik_solve_pose(id, p, quat_from_wxyz(&v[3..]), GoalFrame::Local);
            }
        }
    }

    /// Reads this channel's values from its connection into `dst`. Leaves
    /// `dst` untouched when disconnected. IK channels read the solver's last
    /// goal.
    pub fn get(&self, source: ChannelSource<'_>, dst: &mut [f32]) -> usize {
        let n = self.size();
        match (self.connection, source) {
            (Connection::Joint(id), ChannelSource::Skeleton(sk)) => self.get_joint(sk, id, &mut dst[..n]),
            (Connection::Buffer(off) | Connection::Index(off), ChannelSource::Buffer(buf)) => {
                dst[..n].copy_from_slice(&buf[off..off + n]);
            }
            _ => {}
        }
        n
    }

    fn get_joint(&self, sk: &Skeleton, id: JointId, dst: &mut [f32]) {
        let j = sk.joint(id);
        match self.ctype {
            ChannelType::XPos | ChannelType::YPos | ChannelType::ZPos => {
                dst[0] = j.pos().value(self.ctype.axis());
            }
            ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot => {
                dst[0] = j.rot().euler().value(self.ctype.axis());
            }
            ChannelType::Quat => quat_to_wxyz(j.rot().value(), dst),
            ChannelType::Swing => {
                let s = j.rot().swing_twist().swing();
                dst[0] = s.x;
                dst[1] = s.y;
            }
            ChannelType::Twist => dst[0] = j.rot().swing_twist().twist(),
            ChannelType::IKPos | ChannelType::IKGoal => {
                let goal = j.ik().map(|ik| ik.goal()).unwrap_or_default();
                dst[..3].copy_from_slice(&goal.position.to_array());
                if self.ctype == ChannelType::IKGoal {
                    quat_to_wxyz(goal.rotation, &mut dst[3..]);
                }
            }
        }
    }

    /// Like [`get`](Self::get), but joint-connected channels draw a random
    /// value inside the joint limits instead.
    pub fn get_random<R: Rng + ?Sized>(&self, source: ChannelSource<'_>, dst: &mut [f32], rng: &mut R) -> usize {
        let (Connection::Joint(id), ChannelSource::Skeleton(sk)) = (self.connection, source) else {
            return self.get(source, dst);
        };
        let j = sk.joint(id);
        match self.ctype {
            ChannelType::XPos | ChannelType::YPos | ChannelType::ZPos => {
                dst[0] = j.pos().random(self.ctype.axis(), rng);
            }
            ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot => {
                dst[0] = j.rot().euler().random(self.ctype.axis(), rng);
            }
            ChannelType::Quat => {
                let axis = Vec3::new(
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                    rng.random_range(-1.0..=1.0),
                )
                .try_normalize()
                .unwrap_or(Vec3::Z);
                let angle = rng.random_range(-std::f32::consts::PI..=std::f32::consts::PI);
                quat_to_wxyz(Quat::from_axis_angle(axis, angle), dst);
            }
            ChannelType::Swing => {
                let s = j.rot().swing_twist().random_swing(rng);
                dst[0] = s.x;
                dst[1] = s.y;
            }
            ChannelType::Twist => dst[0] = j.rot().swing_twist().random_twist(rng),
            ChannelType::IKPos | ChannelType::IKGoal => return self.get(source, dst),
        }
        self.size()
    }
}
