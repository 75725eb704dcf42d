use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::channel::{ChannelTarget, ChannelType, Channels, SharedChannels};
use crate::error::{KinError, Result};
use crate::joint::NameTable;
use crate::math::{quat_from_wxyz, quat_to_wxyz, wrap_angle};
use crate::skeleton::Skeleton;

use super::Posture;

/// How [`Motion::apply`] blends between key frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpType {
    #[default]
    Linear,
    /// Catmull-Rom through the neighbouring frames. Falls back to linear on
    /// the first and last segments.
    CubicSpline,
}

impl InterpType {
    pub fn name(self) -> &'static str {
        match self {
            InterpType::Linear => "Linear",
            InterpType::CubicSpline => "CubicSpline",
        }
    }

    /// Unknown names read as `Linear`.
    pub fn from_name(s: &str) -> Self {
        if s.eq_ignore_ascii_case("CubicSpline") {
            InterpType::CubicSpline
        } else {
            InterpType::Linear
        }
    }
}

impl fmt::Display for InterpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(InterpType::from_name(s))
    }
}

/// A key frame. Postures may be shared between frames and motions.
#[derive(Debug, Clone)]
pub struct Frame {
    pub keytime: f32,
    pub posture: Rc<Posture>,
}

/// Timed sequence of postures over one shared channel list.
pub struct Motion {
    name: String,
    channels: SharedChannels,
    frames: Vec<Frame>,
    freq: f32,
    last_frame: Cell<usize>,
}

fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (2.0 * p1 + (p2 - p0) * t + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2 + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

impl Motion {
    pub fn new(channels: SharedChannels) -> Self {
        Self {
            name: String::new(),
            channels,
            frames: Vec::new(),
            freq: 0.0,
            last_frame: Cell::new(0),
        }
    }

    /// An empty motion with an empty channel list over `names`.
    pub fn empty(names: NameTable) -> Self {
        Self::new(Channels::new(names).shared())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn channels(&self) -> &SharedChannels {
        &self.channels
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn posture(&self, f: usize) -> &Posture {
        &self.frames[f].posture
    }

    /// Mutable posture of frame `f`, detached first if it is shared.
    pub fn posture_mut(&mut self, f: usize) -> &mut Posture {
        Rc::make_mut(&mut self.frames[f].posture)
    }

    pub fn keytime(&self, f: usize) -> f32 {
        self.frames[f].keytime
    }

    pub fn set_keytime(&mut self, f: usize, kt: f32) {
        self.frames[f].keytime = kt;
    }

    /// Key time of the final frame. Panics on an empty motion.
    pub fn last_keytime(&self) -> f32 {
        self.frames[self.frames.len() - 1].keytime
    }

    pub fn duration(&self) -> f32 {
        match (self.frames.first(), self.frames.last()) {
            (Some(a), Some(b)) => b.keytime - a.keytime,
            _ => 0.0,
        }
    }

    /// Frames per second, as read from the source file (0 when unknown).
    pub fn freq(&self) -> f32 {
        self.freq
    }

    pub fn set_freq(&mut self, freq: f32) {
        self.freq = freq;
    }

    pub fn last_applied_frame(&self) -> usize {
        self.last_frame.get()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.last_frame.set(0);
    }

    fn adopt(&self, posture: Rc<Posture>) -> Result<Rc<Posture>> {
        if Rc::ptr_eq(posture.channels(), &self.channels) {
            return Ok(posture);
        }
        if *posture.channels().borrow() != *self.channels.borrow() {
            return Err(KinError::InconsistentPostures(
                "posture channels differ from the motion's".into(),
            ));
        }
        let mut p = Rc::unwrap_or_clone(posture);
        p.set_channels(Rc::clone(&self.channels));
        Ok(Rc::new(p))
    }

    /// Inserts a key frame at `pos`. A posture over an equal but distinct
    /// channel list is rebound to this motion's list.
    pub fn insert_frame(&mut self, pos: usize, keytime: f32, posture: Rc<Posture>) -> Result<()> {
        if pos > self.frames.len() {
            return Err(KinError::OutOfRange {
                index: pos,
                len: self.frames.len(),
            });
        }
        let posture = self.adopt(posture)?;
        let before = pos.checked_sub(1).map(|i| self.frames[i].keytime);
        let after = self.frames.get(pos).map(|f| f.keytime);
        if before.is_some_and(|b| keytime < b) || after.is_some_and(|a| keytime > a) {
            log::warn!("motion '{}': key time {keytime} inserted out of order at frame {pos}", self.name);
        }
        self.frames.insert(pos, Frame { keytime, posture });
        self.last_frame.set(0);
        Ok(())
    }

    pub fn add_frame(&mut self, keytime: f32, posture: Rc<Posture>) -> Result<()> {
        self.insert_frame(self.frames.len(), keytime, posture)
    }

    pub fn remove_frame(&mut self, pos: usize) -> Result<Frame> {
        if pos >= self.frames.len() {
            return Err(KinError::OutOfRange {
                index: pos,
                len: self.frames.len(),
            });
        }
        self.last_frame.set(0);
        Ok(self.frames.remove(pos))
    }

    /// Rebuilds the motion from postures that are kept by reference.
    pub fn make_as_reference(&mut self, postures: Vec<Rc<Posture>>, keytimes: &[f32]) -> Result<()> {
        let first = postures
            .first()
            .ok_or_else(|| KinError::InconsistentPostures("no postures".into()))?;
        if postures.len() != keytimes.len() {
            return Err(KinError::InconsistentPostures(format!(
                "{} postures for {} key times",
                postures.len(),
                keytimes.len()
            )));
        }
        self.channels = Rc::clone(first.channels());
        self.clear();
        for (p, &kt) in postures.into_iter().zip(keytimes) {
            self.add_frame(kt, p)?;
        }
        Ok(())
    }

    /// Rebuilds the motion keeping only the channels that vary across
    /// `postures`.
    pub fn make(&mut self, postures: &[Posture], keytimes: &[f32]) -> Result<()> {
        if postures.len() != keytimes.len() {
            return Err(KinError::InconsistentPostures(format!(
                "{} postures for {} key times",
                postures.len(),
                keytimes.len()
            )));
        }
        let (channels, index) = Channels::from_postures(postures)?;
        self.channels = channels.shared();
        self.clear();
        for (src, &kt) in postures.iter().zip(keytimes) {
            let mut p = Posture::new(Rc::clone(&self.channels));
            for (j, slot) in index.iter().enumerate() {
                if let Some(k) = slot {
                    p.values_mut()[*k] = src.values()[j];
                }
            }
            self.add_frame(kt, Rc::new(p))?;
        }
        log::debug!(
            "made motion with {} of {} channels",
            self.channels.borrow().len(),
            postures[0].channels().borrow().len()
        );
        Ok(())
    }

    /// Inserts a channel at `pos` in the shared list and in every frame.
    pub fn insert_channel(&mut self, pos: usize, name: &str, ctype: ChannelType, values: Option<&[f32]>) -> Result<()> {
        let f = {
            let mut chs = self.channels.borrow_mut();
            chs.insert(pos, name, ctype)?;
            chs.floatpos(pos)
        };
        let n = ctype.size();
        let new: Vec<f32> = values.map_or_else(|| vec![0.0; n], |v| v[..n].to_vec());
        // postures shared between frames are extended once
        let mut done: Vec<(Rc<Posture>, Rc<Posture>)> = Vec::new();
        for frame in &mut self.frames {
            if let Some((_, ext)) = done.iter().find(|(old, _)| Rc::ptr_eq(old, &frame.posture)) {
                frame.posture = Rc::clone(ext);
                continue;
            }
            let mut p = (*frame.posture).clone();
            p.splice_values(f, &new);
            let ext = Rc::new(p);
            done.push((Rc::clone(&frame.posture), Rc::clone(&ext)));
            frame.posture = ext;
        }
        Ok(())
    }

    pub fn connect_skeleton(&self, sk: &Skeleton) -> usize {
        self.channels.borrow_mut().connect_skeleton(sk)
    }

    /// Connects the channels to float offsets in `p`'s buffer.
    pub fn connect_posture(&self, p: &Posture) -> usize {
        if Rc::ptr_eq(p.channels(), &self.channels) {
            return self.channels.borrow_mut().connect_own_buffer();
        }
        let target = p.channels().borrow();
        self.channels.borrow_mut().connect_posture(&target)
    }

    pub fn disconnect(&self) {
        self.channels.borrow_mut().disconnect();
    }

    /// Applies frame `f`, clamped to the valid range.
    pub fn apply_frame(&self, f: usize, target: ChannelTarget<'_>) {
        if self.frames.is_empty() {
            return;
        }
        let f = f.min(self.frames.len() - 1);
        self.channels.borrow().apply(self.frames[f].posture.values(), target);
    }

    /// Finds the frame `f` with `keytime(f) <= t < keytime(f + 1)` and the
    /// blend factor inside that segment. Times before the first frame clamp
    /// to it; times at or past the last key time give `(last, 0.0)`.
    ///
    /// The scan starts after `lastframe` (or the last bracketing frame found)
    /// when `t` lies beyond it, which makes increasing playback times cheap.
    pub fn locate(&self, t: f32, mut lastframe: Option<&mut usize>) -> (usize, f32) {
        let n = self.frames.len();
        if n == 0 {
            return (0, 0.0);
        }
        let t = t.max(self.frames[0].keytime);
        let hint = lastframe.as_deref().copied().unwrap_or(self.last_frame.get());
        let start = if hint > 0 && hint < n && t > self.frames[hint].keytime {
            hint + 1
        } else {
            0
        };
        let mut f = start;
        while f < n && t >= self.frames[f].keytime {
            f += 1;
        }
        if f == n {
            return (n - 1, 0.0);
        }
        let f = f - 1;
        self.last_frame.set(f);
        if let Some(h) = lastframe.as_deref_mut() {
            *h = f;
        }
        let (k0, k1) = (self.frames[f].keytime, self.frames[f + 1].keytime);
        let u = if k1 > k0 { (t - k0) / (k1 - k0) } else { 0.0 };
        (f, u)
    }

    /// Evaluates the motion at `t` into `out`, interpolating only connected
    /// channels. Returns false for an empty motion.
    pub fn evaluate(&self, t: f32, itype: InterpType, lastframe: Option<&mut usize>, out: &mut Vec<f32>) -> bool {
        if self.frames.is_empty() {
            return false;
        }
        let (f, u) = self.locate(t, lastframe);
        out.clear();
        out.extend_from_slice(self.frames[f].posture.values());
        if f + 1 >= self.frames.len() {
            return true;
        }
        let v1 = self.frames[f].posture.values();
        let v2 = self.frames[f + 1].posture.values();
        let spline = itype == InterpType::CubicSpline && f > 0 && f + 2 < self.frames.len();
        let chs = self.channels.borrow();
        let mut fp = 0;
        for ch in chs.iter() {
            let n = ch.size();
            if ch.is_connected() {
                if spline {
                    let v0 = self.frames[f - 1].posture.values();
                    let v3 = self.frames[f + 2].posture.values();
                    spline_channel(ch.ctype(), [&v0[fp..], &v1[fp..], &v2[fp..], &v3[fp..]], u, &mut out[fp..]);
                } else {
                    ch.ctype().interp(&v1[fp..], &v2[fp..], u, &mut out[fp..]);
                }
            }
            fp += n;
        }
        true
    }

    /// Evaluates the motion at `t` and applies it through the channels.
    pub fn apply(&self, t: f32, itype: InterpType, lastframe: Option<&mut usize>, target: ChannelTarget<'_>) {
        let mut values = Vec::new();
        if self.evaluate(t, itype, lastframe, &mut values) {
            self.channels.borrow().apply(&values, target);
        }
    }

    /// Shifts all key times so the first frame starts at `startkt`.
    pub fn move_keytimes(&mut self, startkt: f32) {
        let Some(first) = self.frames.first() else {
            return;
        };
        let diff = first.keytime - startkt;
        if diff == 0.0 {
            return;
        }
        for f in &mut self.frames {
            f.keytime -= diff;
        }
    }

    /// Unwraps Euler channels by multiples of 2π so consecutive frames
    /// never jump by more than π. Returns the number of Euler channels.
    pub fn correct_euler_angles(&mut self) -> usize {
        if self.frames.len() <= 1 {
            return 0;
        }
        let positions: Vec<usize> = {
            let chs = self.channels.borrow();
            let mut fp = 0;
            let mut out = Vec::new();
            for ch in chs.iter() {
                if ch.ctype().is_euler() {
                    out.push(fp);
                }
                fp += ch.size();
            }
            out
        };
        for j in 1..self.frames.len() {
            for &p in &positions {
                let prev = self.frames[j - 1].posture.values()[p];
                let cur = self.frames[j].posture.values()[p];
                let fixed = prev + wrap_angle(cur - prev);
                if fixed != cur {
                    Rc::make_mut(&mut self.frames[j].posture).values_mut()[p] = fixed;
                }
            }
        }
        positions.len()
    }

    /// Scales and offsets channel `channel` in frames `f1..=f2` (both
    /// bounded to the motion).
    pub fn change_values(&mut self, f1: usize, f2: usize, channel: usize, mfactor: f32, offset: &[f32]) {
        if self.frames.is_empty() {
            return;
        }
        let f2 = f2.min(self.frames.len() - 1);
        let f1 = f1.min(f2);
        let (ctype, fp) = {
            let chs = self.channels.borrow();
            (chs.channel(channel).ctype(), chs.floatpos(channel))
        };
        for f in f1..=f2 {
            let p = Rc::make_mut(&mut self.frames[f].posture);
            ctype.change_values(&mut p.values_mut()[fp..], mfactor, offset);
        }
    }

    /// Mirrors every frame through `sk`. See [`Posture::mirror`].
    pub fn mirror(&mut self, sk: &mut Skeleton, left: &str, right: &str) {
        for f in 0..self.frames.len() {
            Rc::make_mut(&mut self.frames[f].posture).mirror(sk, left, right);
        }
    }

    /// Appends the frames of `other`, shifted to start `deltakt` after the
    /// last key time. Postures are shared with `other`.
    pub fn append(&mut self, other: &Motion, deltakt: f32) -> Result<()> {
        if self.frames.is_empty() {
            self.channels = Rc::clone(&other.channels);
        }
        let base = self.frames.last().map_or(0.0, |f| f.keytime) + deltakt;
        for f in &other.frames {
            self.add_frame(f.keytime + base, Rc::clone(&f.posture))?;
        }
        Ok(())
    }
}

fn spline_channel(ctype: ChannelType, v: [&[f32]; 4], t: f32, out: &mut [f32]) {
    match ctype {
        ChannelType::Quat => {
            quat_to_wxyz(quat_from_wxyz(v[1]).slerp(quat_from_wxyz(v[2]), t), out);
        }
        ChannelType::IKGoal => {
            for i in 0..3 {
                out[i] = catmull_rom(v[0][i], v[1][i], v[2][i], v[3][i], t);
            }
            let q = quat_from_wxyz(&v[1][3..]).slerp(quat_from_wxyz(&v[2][3..]), t);
            quat_to_wxyz(q, &mut out[3..]);
        }
        ChannelType::XRot | ChannelType::YRot | ChannelType::ZRot | ChannelType::Twist => {
            let p1 = v[1][0];
            let p0 = p1 + wrap_angle(v[0][0] - p1);
            let p2 = p1 + wrap_angle(v[2][0] - p1);
            let p3 = p2 + wrap_angle(v[3][0] - p2);
            out[0] = catmull_rom(p0, p1, p2, p3, t);
        }
        _ => {
            for i in 0..ctype.size() {
                out[i] = catmull_rom(v[0][i], v[1][i], v[2][i], v[3][i], t);
            }
        }
    }
}

impl fmt::Debug for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Motion")
            .field("name", &self.name)
            .field("channels", &self.channels.borrow().len())
            .field("frames", &self.frames.len())
            .field("freq", &self.freq)
            .finish()
    }
}
