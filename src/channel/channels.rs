use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use rand::Rng;

use super::{Channel, ChannelSource, ChannelTarget, ChannelType, Connection};
use crate::error::{KinError, Result};
use crate::io::{Token, Tokens};
use crate::joint::{JointName, NameTable, RotType};
use crate::motion::Posture;
use crate::skeleton::Skeleton;

/// Channel list shared by postures, motions and skeletons.
pub type SharedChannels = Rc<RefCell<Channels>>;

/// Ordered channel list with a cached float count and a lazily built
/// `(name, type)` lookup table.
#[derive(Clone)]
pub struct Channels {
    names: NameTable,
    list: Vec<Channel>,
    floats: usize,
    index: OnceCell<HashMap<(JointName, ChannelType), usize>>,
}

impl Channels {
    pub fn new(names: NameTable) -> Self {
        Self {
            names,
            list: Vec::new(),
            floats: 0,
            index: OnceCell::new(),
        }
    }

    /// Wraps a list for sharing.
    pub fn shared(self) -> SharedChannels {
        Rc::new(RefCell::new(self))
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Total number of floats a posture over this list holds.
    pub fn floats(&self) -> usize {
        self.floats
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Channel> {
        self.list.iter()
    }

    pub fn channel(&self, i: usize) -> &Channel {
        &self.list[i]
    }

    /// Mutable access for connection changes.
    pub fn channel_mut(&mut self, i: usize) -> &mut Channel {
        &mut self.list[i]
    }

    fn edited(&mut self) {
        self.floats = self.list.iter().map(Channel::size).sum();
        self.index.take();
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.edited();
    }

    /// Appends a channel, interning `name` into this list's table.
    pub fn push(&mut self, name: &str, ctype: ChannelType) -> usize {
        let name = self.names.intern(name);
        self.list.push(Channel::new(name, ctype));
        self.edited();
        self.list.len() - 1
    }

    /// Appends a copy of `ch` (connection included), re-interning its name.
    pub fn push_channel(&mut self, ch: &Channel) -> usize {
        let mut ch = ch.clone();
        ch.set_name(self.names.intern(ch.name().as_str()));
        self.list.push(ch);
        self.edited();
        self.list.len() - 1
    }

    pub fn insert(&mut self, pos: usize, name: &str, ctype: ChannelType) -> Result<()> {
        if pos > self.list.len() {
            return Err(KinError::OutOfRange {
                index: pos,
                len: self.list.len(),
            });
        }
        let name = self.names.intern(name);
        self.list.insert(pos, Channel::new(name, ctype));
        self.edited();
        Ok(())
    }

    pub fn remove(&mut self, i: usize) -> Channel {
        let ch = self.list.remove(i);
        self.edited();
        ch
    }

    /// Rebuilds the list from every non-frozen DOF of `sk`, joint-connected.
    pub fn make_from_skeleton(&mut self, sk: &Skeleton) {
        self.names = sk.names().clone();
        self.list.clear();
        for j in sk.joints() {
            let mut add = |t: ChannelType| {
                let mut ch = Channel::new(j.name().clone(), t);
                ch.connect_joint(j.id());
                self.list.push(ch);
            };
            for (d, t) in [ChannelType::XPos, ChannelType::YPos, ChannelType::ZPos].into_iter().enumerate() {
                if !j.pos().frozen(d) {
                    add(t);
                }
            }
            if j.rot().frozen() {
                continue;
            }
            match j.rot_type() {
                RotType::Quat => add(ChannelType::Quat),
                RotType::SwingTwist => {
                    add(ChannelType::Swing);
                    if !j.rot().swing_twist().twist_frozen() {
                        add(ChannelType::Twist);
                    }
                }
                RotType::Euler => {
                    let e = j.rot().euler();
                    for (d, t) in [ChannelType::XRot, ChannelType::YRot, ChannelType::ZRot].into_iter().enumerate() {
                        if !e.frozen(d) {
                            add(t);
                        }
                    }
                }
                RotType::Undef => {}
            }
        }
        self.edited();
        log::debug!("made {} channels ({} floats) from skeleton '{}'", self.len(), self.floats, sk.name());
    }

    /// Builds the minimal channel list for a posture sequence, keeping only
    /// channels whose values vary. All postures must share one channel list.
    ///
    /// The returned table maps each source float to its position in the new
    /// list, or `None` for dropped floats.
    pub fn from_postures(postures: &[Posture]) -> Result<(Channels, Vec<Option<usize>>)> {
        let first = postures
            .first()
            .ok_or_else(|| KinError::InconsistentPostures("no postures".into()))?;
        let nfloats = first.values().len();
        let mut used = vec![nfloats == 1; nfloats];
        for p in &postures[1..] {
            if !Rc::ptr_eq(p.channels(), first.channels()) {
                return Err(KinError::InconsistentPostures("postures do not share channels".into()));
            }
            if p.values().len() != nfloats {
                return Err(KinError::InconsistentPostures(format!(
                    "posture has {} values, expected {nfloats}",
                    p.values().len()
                )));
            }
            for (u, (a, b)) in used.iter_mut().zip(p.values().iter().zip(first.values())) {
                if a != b {
                    *u = true;
                }
            }
        }

        let src = first.channels().borrow();
        let mut out = Channels::new(src.names.clone());
        let mut index = vec![None; nfloats];
        let mut f = 0;
        for ch in &src.list {
            let n = ch.size();
            if used[f..f + n].iter().any(|&u| u) {
                for (k, slot) in index[f..f + n].iter_mut().enumerate() {
                    *slot = Some(out.floats + k);
                }
                out.list.push(Channel::new(ch.name().clone(), ch.ctype()));
                out.edited();
            }
            f += n;
        }
        Ok((out, index))
    }

    /// Float offset of channel `i`. Indices past the end clamp to the last
    /// channel.
    pub fn floatpos(&self, i: usize) -> usize {
        let i = i.min(self.list.len().saturating_sub(1));
        self.list[..i].iter().map(Channel::size).sum()
    }

    /// Linear search; returns the channel index and its float offset.
    pub fn lsearch(&self, name: &str, ctype: ChannelType) -> Option<(usize, usize)> {
        let mut f = 0;
        for (i, ch) in self.list.iter().enumerate() {
            if ch.ctype() == ctype && ch.name().as_str().eq_ignore_ascii_case(name) {
                return Some((i, f));
            }
            f += ch.size();
        }
        None
    }

    /// Hash lookup of a channel index by name and type.
    pub fn search(&self, name: &str, ctype: ChannelType) -> Option<usize> {
        let name = self.names.lookup(name)?;
        self.search_name(&name, ctype)
    }

    /// Hash lookup for a name interned in this list's table.
    pub fn search_name(&self, name: &JointName, ctype: ChannelType) -> Option<usize> {
        let index = self.index.get_or_init(|| {
            let mut map = HashMap::with_capacity(self.list.len() * 2);
            for (i, ch) in self.list.iter().enumerate() {
                map.entry((ch.name().clone(), ch.ctype())).or_insert(i);
            }
            map
        });
        index.get(&(name.clone(), ctype)).copied()
    }

    fn search_foreign(&self, ch: &Channel, from: &NameTable) -> Option<usize> {
        let name = self.names.translate(ch.name(), from)?;
        self.search_name(&name, ch.ctype())
    }

    /// Connects every channel to the joint of the same name in `sk`.
    /// Unmatched channels are disconnected. Returns the number matched.
    pub fn connect_skeleton(&mut self, sk: &Skeleton) -> usize {
        let mut count = 0;
        for ch in &mut self.list {
            match sk.names().translate(ch.name(), &self.names).and_then(|n| sk.joint_by_name(&n)) {
                Some(id) => {
                    ch.connect_joint(id);
                    count += 1;
                }
                None => ch.disconnect(),
            }
        }
        log::debug!("connected {count} of {} channels to skeleton '{}'", self.list.len(), sk.name());
        count
    }

    fn connect_offsets(&mut self, target: &Channels, make: fn(usize) -> Connection) -> usize {
        self.disconnect();
        let mut count = 0;
        let mut f = 0;
        for tch in &target.list {
            if let Some(i) = self.search_foreign(tch, &target.names) {
                self.list[i].set_connection(make(f));
                count += 1;
            }
            f += tch.size();
        }
        count
    }

    /// Binds channels to float offsets inside buffers laid out by `target`.
    pub fn connect_posture(&mut self, target: &Channels) -> usize {
        let count = self.connect_offsets(target, Connection::Buffer);
        log::debug!("connected {count} channels to posture buffer");
        count
    }

    /// Binds every channel to its own float offset. Used when the target
    /// buffer is laid out by this very list.
    pub fn connect_own_buffer(&mut self) -> usize {
        let mut f = 0;
        for ch in &mut self.list {
            ch.connect_buffer(f);
            f += ch.size();
        }
        self.list.len()
    }

    /// Like [`connect_posture`](Self::connect_posture) but records index
    /// connections, resolved against a caller-supplied base buffer.
    pub fn connect_indices(&mut self, target: &Channels) -> usize {
        self.connect_offsets(target, Connection::Index)
    }

    pub fn disconnect(&mut self) {
        for ch in &mut self.list {
            ch.disconnect();
        }
    }

    pub fn count_connected(&self) -> usize {
        self.list.iter().filter(|c| c.is_connected()).count()
    }

    pub fn count_disconnected(&self) -> usize {
        self.list.len() - self.count_connected()
    }

    /// Applies a posture buffer through every channel.
    pub fn apply(&self, values: &[f32], mut target: ChannelTarget<'_>) {
        let mut f = 0;
        for ch in &self.list {
            f += ch.apply(&values[f..], &mut target);
        }
    }

    /// Reads every connected channel into a posture buffer.
    pub fn get(&self, source: ChannelSource<'_>, values: &mut [f32]) {
        let mut f = 0;
        for ch in &self.list {
            f += ch.get(source, &mut values[f..]);
        }
    }

    pub fn get_random<R: Rng + ?Sized>(&self, source: ChannelSource<'_>, values: &mut [f32], rng: &mut R) {
        let mut f = 0;
        for ch in &self.list {
            f += ch.get_random(source, &mut values[f..], rng);
        }
    }

    /// Appends the channels of `other` missing here. Returns how many were
    /// added.
    pub fn merge(&mut self, other: &Channels) -> usize {
        let mut added = 0;
        for ch in &other.list {
            if self.search_foreign(ch, &other.names).is_none() {
                let name = self.names.intern(ch.name().as_str());
                self.list.push(Channel::new(name, ch.ctype()));
                self.edited();
                added += 1;
            }
        }
        added
    }

    pub fn only_quat_channels(&self) -> bool {
        self.list.iter().all(|c| c.ctype() == ChannelType::Quat)
    }

    /// Turns every channel into a Quat channel and drops buffer and index
    /// connections, whose offsets no longer hold. Returns how many changed.
    pub fn force_quat_channels(&mut self) -> usize {
        let mut changed = 0;
        for ch in &mut self.list {
            if ch.ctype() != ChannelType::Quat {
                ch.set_type(ChannelType::Quat);
                changed += 1;
            }
            if matches!(ch.connection(), Connection::Buffer(_) | Connection::Index(_)) {
                ch.disconnect();
            }
        }
        self.edited();
        changed
    }

    /// Appends the `channels N` text block.
    pub fn write_text(&self, out: &mut String) {
        out.push_str(&format!("channels {}\n", self.list.len()));
        for ch in &self.list {
            out.push_str(&format!("{} {}\n", ch.name(), ch.ctype()));
        }
    }

    /// Reads a `channels [N]` block. Without a count, pairs are read until a
    /// delimiter (consumed) or the end of input.
    pub fn parse(tokens: &mut Tokens, names: NameTable) -> Result<Channels> {
        tokens.expect_keyword("channels")?;
        let count = if tokens.peek_is_number() {
            Some(tokens.expect_usize("channel count")?)
        } else {
            None
        };
        let mut out = Channels::new(names);
        loop {
            match count {
                Some(n) if out.list.len() == n => break,
                None if tokens.at_end() => break,
                None if matches!(tokens.peek(), Some(Token::Delim(_))) => {
                    tokens.next_token();
                    break;
                }
                _ => {}
            }
            let name = tokens.expect_word("joint name")?;
            let line = tokens.line();
            let tname = tokens.expect_word("channel type")?;
            let ctype = ChannelType::from_name(&tname)
                .ok_or_else(|| KinError::parse(line, format!("unknown channel type '{tname}'")))?;
            let name = out.names.intern(&name);
            out.list.push(Channel::new(name, ctype));
        }
        out.edited();
        Ok(out)
    }
}

impl PartialEq for Channels {
    /// Same channels in the same order; connections are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.list == other.list
    }
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channels")
            .field("len", &self.list.len())
            .field("floats", &self.floats)
            .finish()
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        self.write_text(&mut s);
        f.write_str(&s)
    }
}
