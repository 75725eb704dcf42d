use std::rc::Rc;

use glam::Quat;
use rand::Rng;

use crate::channel::{ChannelSource, ChannelTarget, ChannelType, Channels, SharedChannels};
use crate::error::{KinError, Result};
use crate::io::Tokens;
use crate::joint::NameTable;
use crate::math::quat_to_wxyz;
use crate::skeleton::Skeleton;

/// One pose: a float buffer laid out by a shared channel list.
#[derive(Debug, Clone)]
pub struct Posture {
    name: Option<String>,
    channels: SharedChannels,
    values: Vec<f32>,
}

fn identity_values(channels: &Channels) -> Vec<f32> {
    let mut values = vec![0.0; channels.floats()];
    let mut f = 0;
    for ch in channels.iter() {
        match ch.ctype() {
            ChannelType::Quat => quat_to_wxyz(Quat::IDENTITY, &mut values[f..]),
            ChannelType::IKGoal => quat_to_wxyz(Quat::IDENTITY, &mut values[f + 3..]),
            _ => {}
        }
        f += ch.size();
    }
    values
}

impl Posture {
    /// A neutral posture: zeros, with identity quaternions.
    pub fn new(channels: SharedChannels) -> Self {
        let values = identity_values(&channels.borrow());
        Self {
            name: None,
            channels,
            values,
        }
    }

    /// Snapshot of `sk` through its own channel list.
    pub fn from_skeleton(sk: &Skeleton) -> Self {
        let mut p = Self::new(Rc::clone(sk.channels()));
        p.get(sk);
        p
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn channels(&self) -> &SharedChannels {
        &self.channels
    }

    /// Rebinds the posture to another channel list of the same float size.
    pub fn set_channels(&mut self, channels: SharedChannels) {
        debug_assert_eq!(channels.borrow().floats(), self.values.len());
        self.channels = channels;
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads the values from the skeleton the channels are connected to.
    pub fn get(&mut self, sk: &Skeleton) {
        self.channels
            .borrow()
            .get(ChannelSource::Skeleton(sk), &mut self.values);
    }

    pub fn get_random<R: Rng + ?Sized>(&mut self, sk: &Skeleton, rng: &mut R) {
        self.channels
            .borrow()
            .get_random(ChannelSource::Skeleton(sk), &mut self.values, rng);
    }

    /// Writes the values into the skeleton the channels are connected to.
    pub fn apply(&self, sk: &mut Skeleton) {
        self.channels
            .borrow()
            .apply(&self.values, ChannelTarget::Skeleton(sk));
    }

    /// Copies values into `other` through channels matched by name and type.
    /// Returns the number of channels copied.
    pub fn apply_to(&self, other: &mut Posture) -> usize {
        if Rc::ptr_eq(&self.channels, &other.channels) {
            other.values.copy_from_slice(&self.values);
            return self.channels.borrow().len();
        }
        let mut map = self.channels.borrow().clone();
        let count = map.connect_posture(&other.channels.borrow());
        map.apply(&self.values, ChannelTarget::Buffer(&mut other.values));
        count
    }

    /// Inserts a channel at `pos` with the given values (zeros when `None`).
    /// The channel list is shared, so other postures over it must be
    /// extended too; see [`Motion::insert_channel`](super::Motion::insert_channel).
    pub fn insert(&mut self, pos: usize, name: &str, ctype: ChannelType, values: Option<&[f32]>) -> Result<()> {
        let mut chs = self.channels.borrow_mut();
        chs.insert(pos, name, ctype)?;
        let f = chs.floatpos(pos);
        let n = ctype.size();
        let new = values.map_or_else(|| vec![0.0; n], |v| v[..n].to_vec());
        drop(chs);
        self.splice_values(f, &new);
        Ok(())
    }

    pub(crate) fn splice_values(&mut self, at: usize, values: &[f32]) {
        self.values.splice(at..at, values.iter().copied());
    }

    /// Switches to a private copy of the channel list with every channel
    /// turned into Quat. Values are reset to identity rotations. Returns the
    /// number of channels that changed type.
    pub fn make_quat_channels(&mut self) -> usize {
        let mut chs = self.channels.borrow().clone();
        let changed = chs.force_quat_channels();
        self.values = identity_values(&chs);
        self.channels = chs.shared();
        changed
    }

    /// Mirrors the posture about the YZ plane using `sk`, swapping joints
    /// whose names contain `left` with the `right` counterparts.
    pub fn mirror(&mut self, sk: &mut Skeleton, left: &str, right: &str) {
        self.channels.borrow_mut().connect_skeleton(sk);
        self.apply(sk);

        let ids: Vec<_> = sk.joints().iter().map(|j| j.id()).collect();
        for &id in &ids {
            let q = sk.joint(id).rot().value();
            sk.joint_mut(id).rot_mut().set_value(Quat::from_xyzw(-q.x, q.y, q.z, -q.w));
        }

        for &id in &ids {
            let name = sk.joint(id).name().as_str().to_string();
            if !name.contains(left) {
                continue;
            }
            let other = name.replacen(left, right, 1);
            match sk.joint_id(&other) {
                Some(rid) => {
                    let ql = sk.joint(id).rot().value();
                    let qr = sk.joint(rid).rot().value();
                    sk.joint_mut(id).rot_mut().set_value(qr);
                    sk.joint_mut(rid).rot_mut().set_value(ql);
                }
                None => log::warn!("mirror: skeleton '{}' has no joint '{other}'", sk.name()),
            }
        }

        if let Some(root) = sk.root() {
            let x = sk.joint(root).pos().value(0);
            sk.joint_mut(root).pos_mut().set_value(0, -x);
        }
        self.get(sk);
    }

    /// Interpolates `a` and `b` channel by channel into this posture. All
    /// three must share one layout.
    pub fn interp(&mut self, a: &Posture, b: &Posture, t: f32) {
        let chs = self.channels.borrow();
        let mut f = 0;
        for ch in chs.iter() {
            f += ch
                .ctype()
                .interp(&a.values[f..], &b.values[f..], t, &mut self.values[f..]);
        }
    }

    /// Weighted blend of several postures sharing this layout.
    pub fn interp_weighted(&mut self, postures: &[&Posture], weights: &[f32]) {
        let chs = self.channels.borrow();
        let mut f = 0;
        for ch in chs.iter() {
            let slices: Vec<&[f32]> = postures.iter().map(|p| &p.values[f..]).collect();
            f += ch.ctype().interp_weighted(&slices, weights, &mut self.values[f..]);
        }
    }

    /// Largest distance between the global joint positions `sk` takes in
    /// the two postures. Leaves `sk` in the pose of `other`.
    pub fn dist(&self, other: &Posture, sk: &mut Skeleton) -> f32 {
        self.apply(sk);
        sk.update_global_matrices();
        let first: Vec<_> = sk.joints().iter().map(|j| j.gcenter()).collect();
        other.apply(sk);
        sk.update_global_matrices();
        sk.joints()
            .iter()
            .zip(first)
            .map(|(j, p)| j.gcenter().distance(p))
            .fold(0.0, f32::max)
    }

    /// Appends the text form: optional channel block and name, then values.
    pub fn write_text(&self, out: &mut String, with_channels: bool) {
        let chs = self.channels.borrow();
        if with_channels {
            chs.write_text(out);
        }
        if let Some(name) = &self.name {
            out.push_str(&format!("name \"{name}\"\n"));
        }
        let mut f = 0;
        for (i, ch) in chs.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            f += ch.ctype().save_values(&self.values[f..], out);
        }
        out.push('\n');
    }

    /// Reads a posture. A leading `channels` block defines a new list;
    /// otherwise `channels` must be given.
    pub fn parse(tokens: &mut Tokens, names: NameTable, channels: Option<SharedChannels>) -> Result<Posture> {
        let mut channels = channels;
        let mut name = None;
        while let Some(word) = tokens.peek_word() {
            if tokens.peek_is_number() {
                break;
            }
            if word.eq_ignore_ascii_case("channels") {
                channels = Some(Channels::parse(tokens, names.clone())?.shared());
            } else if tokens.eat("name") {
                name = Some(tokens.expect_word("posture name")?);
            } else {
                name = Some(tokens.expect_word("posture name")?);
            }
        }
        let channels = channels.ok_or_else(|| KinError::parse(tokens.line(), "posture without channels"))?;
        let mut p = Posture::new(channels);
        p.name = name;
        p.load_values(tokens)?;
        Ok(p)
    }

    pub(crate) fn load_values(&mut self, tokens: &mut Tokens) -> Result<()> {
        let chs = self.channels.borrow();
        let mut f = 0;
        for ch in chs.iter() {
            f += ch.ctype().load_values(tokens, &mut self.values[f..])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::RotType;
    use crate::math::quat_from_wxyz;
    use approx::assert_abs_diff_eq;
    use glam::Vec3;

    fn arm() -> Skeleton {
        let mut sk = Skeleton::new("arm");
        let root = sk.add_joint(RotType::Quat, None, "Hips");
        let l = sk.add_joint(RotType::Quat, Some(root), "LeftArm");
        let r = sk.add_joint(RotType::Quat, Some(root), "RightArm");
        sk.joint_mut(l).set_offset(Vec3::new(1.0, 0.0, 0.0));
        sk.joint_mut(r).set_offset(Vec3::new(-1.0, 0.0, 0.0));
        let lh = sk.add_joint(RotType::Quat, Some(l), "LeftHand");
        sk.joint_mut(lh).set_offset(Vec3::new(1.0, 0.0, 0.0));
        for id in [root, l, r] {
            sk.joint_mut(id).rot_mut().thaw();
        }
        sk.joint_mut(root).pos_mut().thaw(0);
        sk.make_channels();
        sk
    }

    #[test]
    fn new_posture_is_neutral() {
        let sk = arm();
        let p = Posture::new(Rc::clone(sk.channels()));
        assert_eq!(p.len(), sk.channels().borrow().floats());
        assert_eq!(&p.values()[1..5], &[1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn snapshot_and_apply_round_trip() {
        let mut sk = arm();
        let l = sk.joint_id("LeftArm").unwrap();
        sk.joint_mut(l).rot_mut().set_value(Quat::from_rotation_z(0.5));
        let p = Posture::from_skeleton(&sk);
        sk.init_values();
        assert!(sk.joint(l).rot().value().abs_diff_eq(Quat::IDENTITY, 1e-6));
        p.apply(&mut sk);
        assert!(sk.joint(l).rot().value().abs_diff_eq(Quat::from_rotation_z(0.5), 1e-6));
    }

    #[test]
    fn apply_to_matches_by_name() {
        let sk = arm();
        let mut src = Posture::from_skeleton(&sk);
        src.values_mut()[0] = 3.0;
        let mut other = Channels::new(NameTable::new());
        other.push("hips", ChannelType::XPos);
        other.push("Neck", ChannelType::ZRot);
        let mut dst = Posture::new(other.shared());
        assert_eq!(src.apply_to(&mut dst), 1);
        assert_eq!(dst.values(), &[3.0, 0.0]);
    }

    #[test]
    fn insert_splices_values() {
        let mut c = Channels::new(NameTable::new());
        c.push("a", ChannelType::XPos);
        c.push("b", ChannelType::YPos);
        let mut p = Posture::new(c.shared());
        p.values_mut().copy_from_slice(&[1.0, 2.0]);
        p.insert(1, "c", ChannelType::Swing, Some(&[7.0, 8.0])).unwrap();
        assert_eq!(p.values(), &[1.0, 7.0, 8.0, 2.0]);
        assert_eq!(p.channels().borrow().floats(), 4);
        assert!(p.insert(9, "d", ChannelType::XPos, None).is_err());
    }

    #[test]
    fn make_quat_channels_uses_private_copy() {
        let mut c = Channels::new(NameTable::new());
        c.push("a", ChannelType::XRot);
        c.push("b", ChannelType::Quat);
        let shared = c.shared();
        let mut p = Posture::new(Rc::clone(&shared));
        assert_eq!(p.make_quat_channels(), 1);
        assert_eq!(p.len(), 8);
        assert!(!Rc::ptr_eq(p.channels(), &shared));
        assert_eq!(shared.borrow().floats(), 5);
    }

    #[test]
    fn mirror_swaps_sides_and_flips_root() {
        let mut sk = arm();
        let l = sk.joint_id("LeftArm").unwrap();
        let r = sk.joint_id("RightArm").unwrap();
        let root = sk.root().unwrap();
        sk.joint_mut(l).rot_mut().set_value(Quat::from_rotation_z(0.4));
        sk.joint_mut(root).pos_mut().set_value(0, 2.0);
        let mut p = Posture::from_skeleton(&sk);
        p.mirror(&mut sk, "Left", "Right");
        assert_eq!(sk.joint(root).pos().value(0), -2.0);
        let qr = sk.joint(r).rot().value();
        // mirroring about YZ flips the sign of a Z rotation
        assert!(qr.dot(Quat::from_rotation_z(-0.4)).abs() > 1.0 - 1e-5);
        assert!(sk.joint(l).rot().value().dot(Quat::IDENTITY).abs() > 1.0 - 1e-5);
        let (_, f) = sk.channels().borrow().lsearch("RightArm", ChannelType::Quat).unwrap();
        assert!(quat_from_wxyz(&p.values()[f..]).dot(qr).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn interpolation_and_distance() {
        let mut sk = arm();
        let l = sk.joint_id("LeftArm").unwrap();
        let a = Posture::from_skeleton(&sk);
        sk.joint_mut(l).rot_mut().set_value(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let b = Posture::from_skeleton(&sk);

        let mut mid = a.clone();
        mid.interp(&a, &b, 0.5);
        let (_, f) = sk.channels().borrow().lsearch("LeftArm", ChannelType::Quat).unwrap();
        let q = quat_from_wxyz(&mid.values()[f..]);
        assert!(q.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4), 1e-5));

        let mut w = a.clone();
        w.interp_weighted(&[&a, &b], &[0.5, 0.5]);
        assert!(quat_from_wxyz(&w.values()[f..]).abs_diff_eq(q, 1e-5));

        // the hand moves from (2,0,0) to (1,1,0)
        assert_abs_diff_eq!(a.dist(&b, &mut sk), 2.0f32.sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn text_round_trip() {
        let sk = arm();
        let mut p = Posture::from_skeleton(&sk);
        p.values_mut()[0] = 1.5;
        p.set_name(Some("pose one".into()));
        let mut text = String::new();
        p.write_text(&mut text, true);
        let back = Posture::parse(&mut Tokens::new(&text), NameTable::new(), None).unwrap();
        assert_eq!(back.name(), Some("pose one"));
        assert_eq!(*back.channels().borrow(), *p.channels().borrow());
        for (a, b) in back.values().iter().zip(p.values()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }
}
