//! Error types for loading and editing kinematic data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KinError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("unknown channel type '{0}'")]
    UnknownChannelType(String),

    #[error("joint not found: {0}")]
    JointNotFound(String),

    #[error("inconsistent postures: {0}")]
    InconsistentPostures(String),

    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("motion has no frames")]
    EmptyMotion,

    #[error("skeleton has no root joint")]
    NoRoot,

    #[error("invalid frame rate {0}")]
    InvalidFrameRate(f32),
}

pub type Result<T> = std::result::Result<T, KinError>;

impl KinError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        KinError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
