//! BVH import and export.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use glam::{EulerRot, Quat, Vec3};

use super::{InterpType, Motion, Posture};
use crate::channel::{ChannelTarget, ChannelType, Channels, Connection};
use crate::error::{KinError, Result};
use crate::io::{Token, Tokens};
use crate::joint::{JointId, NameTable, RotType};
use crate::math::quat_to_wxyz;
use crate::skeleton::Skeleton;

/// How leaf joints are written, for importers that are picky about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionBuilderMode {
    /// Leaves without animated DOFs become `End Site` blocks.
    #[default]
    Standard,
    /// Child-less joints are written without a CHANNELS line.
    OmitLeafChannels,
    /// Every child-less joint is written as `End Site`.
    EndSiteLeaves,
}

/// BVH export options.
///
/// Rotations are always written as `Zrotation Xrotation Yrotation`, whatever
/// order the motion was imported with. Joints animated only by translation
/// keep their three position channels.
#[derive(Debug, Clone, PartialEq)]
pub struct BvhExport {
    pub fps: f32,
    pub mode: MotionBuilderMode,
    /// Decimals written per value.
    pub precision: usize,
}

impl Default for BvhExport {
    fn default() -> Self {
        Self {
            fps: 30.0,
            mode: MotionBuilderMode::Standard,
            precision: 6,
        }
    }
}

impl BvhExport {
    pub fn with_fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_mode(mut self, mode: MotionBuilderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }
}

/// A skeleton and the motion read from the same BVH file. The motion's
/// channels are connected to the skeleton.
#[derive(Debug)]
pub struct Bvh {
    pub skeleton: Skeleton,
    pub motion: Motion,
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Pos(usize),
    Rot(usize),
}

struct JointColumns {
    joint: JointId,
    columns: Vec<Column>,
}

const AXES: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];

fn parse_columns(tokens: &mut Tokens) -> Result<Vec<Column>> {
    let n = tokens.expect_usize("channel count")?;
    let mut columns = Vec::with_capacity(n);
    for _ in 0..n {
        let line = tokens.line();
        let word = tokens.expect_word("channel type")?;
        let column = match ChannelType::from_name(&word) {
            Some(ChannelType::XPos) => Column::Pos(0),
            Some(ChannelType::YPos) => Column::Pos(1),
            Some(ChannelType::ZPos) => Column::Pos(2),
            Some(ChannelType::XRot) => Column::Rot(0),
            Some(ChannelType::YRot) => Column::Rot(1),
            Some(ChannelType::ZRot) => Column::Rot(2),
            _ => return Err(KinError::parse(line, format!("unsupported BVH channel '{word}'"))),
        };
        columns.push(column);
    }
    Ok(columns)
}

fn parse_offset(tokens: &mut Tokens) -> Result<Vec3> {
    tokens.expect_keyword("OFFSET")?;
    Ok(Vec3::new(
        tokens.expect_f32("offset")?,
        tokens.expect_f32("offset")?,
        tokens.expect_f32("offset")?,
    ))
}

/// Reads the joint name, joining multi-word names with `_`.
fn parse_joint_name(tokens: &mut Tokens) -> Result<String> {
    let mut parts = Vec::new();
    while let Some(Token::Word(w)) = tokens.peek() {
        parts.push(w.clone());
        tokens.next_token();
    }
    if parts.is_empty() {
        return Err(KinError::parse(tokens.line(), "missing joint name"));
    }
    Ok(parts.join("_"))
}

fn parse_joint(
    tokens: &mut Tokens,
    sk: &mut Skeleton,
    parent: Option<JointId>,
    layout: &mut Vec<JointColumns>,
) -> Result<()> {
    let name = parse_joint_name(tokens)?;
    let id = sk.add_joint(RotType::Quat, parent, &name);
    tokens.expect_delim('{')?;
    loop {
        if tokens.eat_delim('}') {
            return Ok(());
        }
        let line = tokens.line();
        let word = tokens.expect_word("joint section")?;
        match word.to_ascii_uppercase().as_str() {
            "OFFSET" => {
                tokens.unget();
                let offset = parse_offset(tokens)?;
                sk.joint_mut(id).set_offset(offset);
            }
            "CHANNELS" => {
                let columns = parse_columns(tokens)?;
                let j = sk.joint_mut(id);
                for c in &columns {
                    match *c {
                        Column::Pos(d) => j.pos_mut().thaw(d),
                        Column::Rot(_) => j.rot_mut().thaw(),
                    }
                }
                layout.push(JointColumns { joint: id, columns });
            }
            "JOINT" => parse_joint(tokens, sk, Some(id), layout)?,
            "END" => {
                tokens.expect_keyword("Site")?;
                let leaf = sk.add_joint(RotType::Quat, Some(id), "EndSite");
                tokens.expect_delim('{')?;
                let offset = parse_offset(tokens)?;
                sk.joint_mut(leaf).set_offset(offset);
                tokens.expect_delim('}')?;
            }
            _ => return Err(KinError::parse(line, format!("unexpected '{word}' in joint '{name}'"))),
        }
    }
}

/// Parses a BVH file into a skeleton and its motion.
///
/// Each joint's rotation columns collapse into one Quat channel placed at the
/// joint's last rotation column, composed in column order, so `Zrotation
/// Xrotation Yrotation` gives `qz * qx * qy`.
pub fn parse_bvh(text: &str, names: NameTable) -> Result<Bvh> {
    let mut tokens = Tokens::new(text);
    tokens.expect_keyword("HIERARCHY")?;
    tokens.expect_keyword("ROOT")?;
    let mut sk = Skeleton::with_names("bvhskel", names);
    let mut layout = Vec::new();
    parse_joint(&mut tokens, &mut sk, None, &mut layout)?;

    let mut chs = Channels::new(sk.names().clone());
    for jc in &layout {
        let last_rot = jc.columns.iter().rposition(|c| matches!(c, Column::Rot(_)));
        let name = sk.joint(jc.joint).name().as_str().to_string();
        for (k, c) in jc.columns.iter().enumerate() {
            match *c {
                Column::Pos(d) => {
                    chs.push(&name, [ChannelType::XPos, ChannelType::YPos, ChannelType::ZPos][d]);
                }
                Column::Rot(_) if Some(k) == last_rot => {
                    chs.push(&name, ChannelType::Quat);
                }
                Column::Rot(_) => {}
            }
        }
    }
    if chs.is_empty() {
        return Err(KinError::parse(tokens.line(), "BVH hierarchy declares no channels"));
    }

    tokens.expect_keyword("MOTION")?;
    let mut nframes = 0;
    let mut frame_time = 0.0;
    while let Some(word) = tokens.peek_word() {
        if tokens.peek_is_number() {
            break;
        }
        let word = word.to_ascii_lowercase();
        tokens.next_token();
        match word.as_str() {
            "frames" => {
                tokens.eat_delim(':');
                nframes = tokens.expect_usize("frame count")?;
            }
            "frame" => {
                tokens.expect_keyword("Time")?;
                tokens.eat_delim(':');
                frame_time = tokens.expect_f32("frame time")?;
            }
            _ => return Err(KinError::parse(tokens.line(), format!("unexpected '{word}' in MOTION header"))),
        }
    }

    let chs = chs.shared();
    let mut motion = Motion::new(Rc::clone(&chs));
    motion.set_name("bvh");
    if frame_time > 0.0 {
        motion.set_freq(1.0 / frame_time);
    }
    for f in 0..nframes {
        let mut p = Posture::new(Rc::clone(&chs));
        let values = p.values_mut();
        let mut fp = 0;
        for jc in &layout {
            let mut q = Quat::IDENTITY;
            let last_rot = jc.columns.iter().rposition(|c| matches!(c, Column::Rot(_)));
            for (k, c) in jc.columns.iter().enumerate() {
                let v = tokens.expect_f32("frame value")?;
                match *c {
                    Column::Pos(_) => {
                        values[fp] = v;
                        fp += 1;
                    }
                    Column::Rot(d) => {
                        q *= Quat::from_axis_angle(AXES[d], v.to_radians());
                        if Some(k) == last_rot {
                            let q = q.normalize();
                            quat_to_wxyz(if q.w < 0.0 { -q } else { q }, &mut values[fp..]);
                            fp += 4;
                        }
                    }
                }
            }
        }
        motion.add_frame(f as f32 * frame_time, Rc::new(p))?;
    }

    sk.make_channels();
    motion.connect_skeleton(&sk);
    Ok(Bvh { skeleton: sk, motion })
}

impl Skeleton {
    /// Reads the hierarchy of a BVH file, ignoring its motion.
    pub fn load_bvh(text: &str) -> Result<Skeleton> {
        Ok(parse_bvh(text, NameTable::new())?.skeleton)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Written {
    EndSite,
    NoChannels,
    Six,
    Three,
    Position,
}

struct Exporter<'a> {
    sk: &'a Skeleton,
    cfg: &'a BvhExport,
    has_rot: Vec<bool>,
    has_pos: Vec<bool>,
}

impl Exporter<'_> {
    fn kind(&self, id: JointId) -> Written {
        let j = self.sk.joint(id);
        let i = id.index();
        let animated = self.has_rot[i] || self.has_pos[i];
        match self.cfg.mode {
            _ if j.parent().is_none() => Written::Six,
            MotionBuilderMode::EndSiteLeaves if j.is_leaf() => Written::EndSite,
            MotionBuilderMode::OmitLeafChannels if j.is_leaf() => Written::NoChannels,
            MotionBuilderMode::Standard if j.is_leaf() && !animated => Written::EndSite,
            _ if self.has_rot[i] && self.has_pos[i] => Written::Six,
            _ if self.has_pos[i] => Written::Position,
            _ => Written::Three,
        }
    }

    fn write_joint(&self, out: &mut String, id: JointId, depth: usize) {
        let pad = "  ".repeat(depth);
        let j = self.sk.joint(id);
        let kind = self.kind(id);
        match kind {
            Written::EndSite => out.push_str(&format!("{pad}End Site\n")),
            _ if j.parent().is_none() => out.push_str(&format!("{pad}ROOT {}\n", j.name())),
            _ => out.push_str(&format!("{pad}JOINT {}\n", j.name())),
        }
        out.push_str(&format!("{pad}{{\n"));
        let o = j.offset();
        let p = self.cfg.precision;
        out.push_str(&format!("{pad}  OFFSET {:.p$} {:.p$} {:.p$}\n", o.x, o.y, o.z));
        match kind {
            Written::Six => out.push_str(&format!(
                "{pad}  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation\n"
            )),
            Written::Three => out.push_str(&format!("{pad}  CHANNELS 3 Zrotation Xrotation Yrotation\n")),
            Written::Position => out.push_str(&format!("{pad}  CHANNELS 3 Xposition Yposition Zposition\n")),
            Written::EndSite | Written::NoChannels => {}
        }
        if kind != Written::EndSite {
            for &c in j.children() {
                self.write_joint(out, c, depth + 1);
            }
        }
        out.push_str(&format!("{pad}}}\n"));
    }
}

impl Motion {
    /// Reads a BVH file's motion; see [`parse_bvh`].
    pub fn load_bvh(text: &str, names: NameTable) -> Result<Motion> {
        Ok(parse_bvh(text, names)?.motion)
    }

    pub fn load_bvh_file(path: impl AsRef<Path>) -> Result<Bvh> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut bvh = parse_bvh(&text, NameTable::new())?;
        if let Some(stem) = path.file_stem() {
            bvh.motion.set_name(stem.to_string_lossy());
        }
        log::info!(
            "loaded {} joints and {} frames from {}",
            bvh.skeleton.len(),
            bvh.motion.len(),
            path.display()
        );
        Ok(bvh)
    }

    /// Samples the motion on `sk` at `cfg.fps` and writes it as BVH text.
    ///
    /// The channels are connected to `sk`, which is left in the pose of the
    /// last row. The header frame count equals the number of rows written.
    pub fn save_bvh(&self, sk: &mut Skeleton, cfg: &BvhExport) -> Result<String> {
        let root = sk.root().ok_or(KinError::NoRoot)?;
        if self.is_empty() {
            return Err(KinError::EmptyMotion);
        }
        if cfg.fps.is_nan() || cfg.fps <= 0.0 {
            return Err(KinError::InvalidFrameRate(cfg.fps));
        }
        self.connect_skeleton(sk);

        let mut has_rot = vec![false; sk.len()];
        let mut has_pos = vec![false; sk.len()];
        for ch in self.channels().borrow().iter() {
            if let Connection::Joint(id) = ch.connection() {
                if ch.ctype().is_position() {
                    has_pos[id.index()] = true;
                } else if ch.ctype().is_rotation() {
                    has_rot[id.index()] = true;
                }
            }
        }

        let mut out = String::from("HIERARCHY\n");
        let kinds: Vec<(JointId, Written)> = {
            let ex = Exporter {
                sk: &*sk,
                cfg,
                has_rot,
                has_pos,
            };
            ex.write_joint(&mut out, root, 0);
            sk.dfs_order().into_iter().map(|id| (id, ex.kind(id))).collect()
        };

        let rows = (self.duration() * cfg.fps + 1.0e-3).floor() as usize + 1;
        out.push_str("MOTION\n");
        let _ = writeln!(out, "Frames: {rows}");
        let _ = writeln!(out, "Frame Time: {:.6}", 1.0 / cfg.fps);

        let p = cfg.precision;
        let start = self.keytime(0);
        let mut hint = 0;
        for i in 0..rows {
            let t = start + i as f32 / cfg.fps;
            self.apply(t, InterpType::Linear, Some(&mut hint), ChannelTarget::Skeleton(sk));
            let mut first = true;
            for &(id, kind) in &kinds {
                if !matches!(kind, Written::Six | Written::Three | Written::Position) {
                    continue;
                }
                let j = sk.joint(id);
                let mut vals = Vec::with_capacity(6);
                if matches!(kind, Written::Six | Written::Position) {
                    vals.extend(j.pos().values().to_array());
                }
                if kind != Written::Position {
                    let (z, x, y) = j.rot().value().to_euler(EulerRot::ZXY);
                    vals.extend([z.to_degrees(), x.to_degrees(), y.to_degrees()]);
                }
                for v in vals {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    let _ = write!(out, "{v:.p$}");
                }
            }
            out.push('\n');
        }
        Ok(out)
    }

    pub fn save_bvh_file(&self, path: impl AsRef<Path>, sk: &mut Skeleton, cfg: &BvhExport) -> Result<()> {
        let path = path.as_ref();
        let text = self.save_bvh(sk, cfg)?;
        fs::write(path, text)?;
        log::info!("saved BVH at {} fps to {}", cfg.fps, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::quat_from_wxyz;
    use approx::assert_abs_diff_eq;

    pub(crate) const SAMPLE: &str = "HIERARCHY
ROOT Hips
{
  OFFSET 0 0 0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Left Up Leg
  {
    OFFSET 1 0 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0 -2 0
    }
  }
}
MOTION
Frames: 2
Frame Time: 0.5
0 1 0 0 0 0 30 0 0
1 1 0 90 0 0 0 45 0
";

    #[test]
    fn loads_hierarchy_and_channels() {
        let bvh = parse_bvh(SAMPLE, NameTable::new()).unwrap();
        let sk = &bvh.skeleton;
        assert_eq!(sk.name(), "bvhskel");
        assert_eq!(sk.len(), 3);
        let leg = sk.joint_id("Left_Up_Leg").unwrap();
        assert_eq!(sk.joint(leg).offset(), Vec3::X);
        let end = sk.joint(leg).children()[0];
        assert_eq!(sk.joint(end).name().as_str(), "EndSite");
        assert!(sk.joint(end).rot().frozen());
        assert!(!sk.joint(sk.root().unwrap()).pos().frozen(1));

        let chs = bvh.motion.channels().borrow();
        let types: Vec<ChannelType> = chs.iter().map(|c| c.ctype()).collect();
        assert_eq!(
            types,
            [
                ChannelType::XPos,
                ChannelType::YPos,
                ChannelType::ZPos,
                ChannelType::Quat,
                ChannelType::Quat
            ]
        );
        assert_eq!(chs.count_connected(), 5);
    }

    #[test]
    fn composes_rotations_in_column_order() {
        let bvh = parse_bvh(SAMPLE, NameTable::new()).unwrap();
        let m = &bvh.motion;
        assert_eq!(m.len(), 2);
        assert_eq!(m.keytime(1), 0.5);
        assert_abs_diff_eq!(m.freq(), 2.0);
        let v0 = m.posture(0).values();
        assert!(quat_from_wxyz(&v0[7..11]).abs_diff_eq(Quat::from_rotation_z(30f32.to_radians()), 1e-5));
        let v1 = m.posture(1).values();
        let expected = Quat::from_rotation_z(90f32.to_radians());
        assert!(quat_from_wxyz(&v1[3..7]).abs_diff_eq(expected, 1e-5));
        let leg = Quat::from_rotation_x(45f32.to_radians());
        assert!(quat_from_wxyz(&v1[7..11]).abs_diff_eq(leg, 1e-5));
    }

    #[test]
    fn reports_bad_channels() {
        let bad = SAMPLE.replace("Zrotation Xrotation Yrotation\n    End", "Zrotation Wobble Yrotation\n    End");
        assert!(matches!(
            parse_bvh(&bad, NameTable::new()),
            Err(KinError::Parse { line: 9, .. })
        ));
    }

    #[test]
    fn export_modes_shape_the_leaves() {
        let Bvh { mut skeleton, motion } = parse_bvh(SAMPLE, NameTable::new()).unwrap();
        let std_text = motion.save_bvh(&mut skeleton, &BvhExport::default()).unwrap();
        assert!(std_text.contains("End Site"));
        assert!(std_text.contains("JOINT Left_Up_Leg"));
        assert!(std_text.contains("Frames: 16"));

        let omit = BvhExport::default().with_mode(MotionBuilderMode::OmitLeafChannels);
        let text = motion.save_bvh(&mut skeleton, &omit).unwrap();
        assert!(text.contains("JOINT EndSite"));
        assert_eq!(text.matches("CHANNELS").count(), 2);

        let ends = BvhExport::default().with_mode(MotionBuilderMode::EndSiteLeaves).with_fps(4.0);
        let out = motion.save_bvh(&mut skeleton, &ends).unwrap();
        assert!(out.contains("Frames: 3"));
        assert!(out.contains("Frame Time: 0.250000"));
    }

    #[test]
    fn empty_motion_is_an_error() {
        let Bvh { mut skeleton, motion } = parse_bvh(SAMPLE, NameTable::new()).unwrap();
        let empty = Motion::new(Rc::clone(motion.channels()));
        assert!(matches!(
            empty.save_bvh(&mut skeleton, &BvhExport::default()),
            Err(KinError::EmptyMotion)
        ));
        assert!(matches!(
            motion.save_bvh(&mut skeleton, &BvhExport::default().with_fps(0.0)),
            Err(KinError::InvalidFrameRate(_))
        ));
    }
}
