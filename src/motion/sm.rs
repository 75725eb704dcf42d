//! The `.sm` motion text format.
//!
//! ```text
//! KnMotion
//! name walk
//! channels 2
//! Hips XPos
//! Hips Quat
//! startkt 0        # optional
//! frames 2         # optional
//! kt 0 fr 1.5 0 0 0
//! kt 0.033333 fr 1.6 0 0.1 0
//! ```

use std::fs;
use std::path::Path;
use std::rc::Rc;

use super::{Motion, Posture};
use crate::channel::Channels;
use crate::error::{KinError, Result};
use crate::io::{write_float, Tokens};
use crate::joint::NameTable;

impl Motion {
    /// Parses `.sm` text. Text starting with `HIERARCHY` is read as BVH.
    pub fn parse_sm(text: &str, names: NameTable) -> Result<Motion> {
        let mut tokens = Tokens::new(text);
        if tokens.peek_is("HIERARCHY") {
            return Motion::load_bvh(text, names);
        }
        let line = tokens.line();
        let header = tokens.expect_word("motion header")?;
        if !header.eq_ignore_ascii_case("KnMotion") {
            return Err(KinError::parse(line, format!("expected 'KnMotion', found '{header}'")));
        }

        let mut name = String::new();
        if tokens.eat("name") {
            name = tokens.expect_word("motion name")?;
        }
        let channels = Channels::parse(&mut tokens, names)?.shared();
        let mut motion = Motion::new(Rc::clone(&channels));
        motion.set_name(name);

        let mut startkt = None;
        if tokens.eat("startkt") || tokens.eat("start_kt") {
            startkt = Some(tokens.expect_f32("start key time")?);
        }
        let mut count = None;
        if tokens.eat("frames") {
            count = Some(tokens.expect_usize("frame count")?);
        }

        while !tokens.at_end() && count.map_or(true, |n| motion.len() < n) {
            tokens.expect_keyword("kt")?;
            let kt = tokens.expect_f32("key time")?;
            tokens.expect_keyword("fr")?;
            let mut p = Posture::new(Rc::clone(&channels));
            p.load_values(&mut tokens)?;
            motion.add_frame(kt, Rc::new(p))?;
        }
        if let Some(n) = count.filter(|&n| n != motion.len()) {
            log::warn!("motion '{}': header announces {n} frames, read {}", motion.name(), motion.len());
        }
        if let Some(kt) = startkt {
            motion.move_keytimes(kt);
        }
        Ok(motion)
    }

    /// Formats the motion as `.sm` text.
    pub fn to_sm_string(&self) -> String {
        let mut out = String::from("KnMotion\n\n");
        if !self.name().is_empty() {
            out.push_str(&format!("name \"{}\"\n\n", self.name()));
        }
        out.push_str("# Quat channels are stored in axis-angle format\n\n");
        let chs = self.channels().borrow();
        chs.write_text(&mut out);
        out.push('\n');
        out.push_str(&format!("frames {}\n", self.len()));
        for frame in self.frames() {
            out.push_str("kt ");
            write_float(&mut out, frame.keytime);
            out.push_str(" fr ");
            let values = frame.posture.values();
            let mut f = 0;
            for (i, ch) in chs.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                f += ch.ctype().save_values(&values[f..], &mut out);
            }
            out.push('\n');
        }
        out
    }

    pub fn load_sm(path: impl AsRef<Path>, names: NameTable) -> Result<Motion> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut motion = Motion::parse_sm(&text, names)?;
        if motion.name().is_empty() {
            if let Some(stem) = path.file_stem() {
                motion.set_name(stem.to_string_lossy());
            }
        }
        log::info!("loaded {} frames from {}", motion.len(), path.display());
        Ok(motion)
    }

    pub fn save_sm(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_sm_string())?;
        log::info!("saved {} frames to {}", self.len(), path.display());
        Ok(())
    }
}
