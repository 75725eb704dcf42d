//! Text input helpers shared by the file formats

mod tokens;

pub use tokens::{Token, Tokens};

/// Writes `v` as an integer when it has no fractional part, otherwise with
/// six decimals.
pub(crate) fn write_float(out: &mut String, v: f32) {
    use std::fmt::Write;
    if v.fract() == 0.0 && v.abs() < 1.0e9 {
        let _ = write!(out, "{}", v as i64);
    } else {
        let _ = write!(out, "{v:.6}");
    }
}
