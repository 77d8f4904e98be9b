use std::io;

use thiserror::Error;

pub type LinkResult<T> = Result<T, LinkError>;

/// Why a candidate frame failed to parse, or why a codec call was rejected
/// outright. Mirrors the taxonomy in the wire specification: callers that
/// need to turn a failure into an `ERROR_RESP` byte should match on this.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    #[error("output buffer too small (need {needed}, have {available})")]
    BufferSmall { needed: usize, available: usize },

    #[error("frame is missing its start delimiter")]
    FormatStart,

    #[error("frame is missing its end delimiter")]
    FormatEnd,

    #[error("frame exceeds the maximum unescaped size")]
    Oversize,

    #[error("content exceeds 1500 bytes (got {0})")]
    ContentOversize(usize),

    #[error("illegal escape sequence in frame body")]
    Escape,

    #[error("frame shorter than the fixed header plus CRC")]
    Incomplete,

    #[error("CRC mismatch: expected {expected:#06x}, computed {actual:#06x}")]
    Crc { expected: u16, actual: u16 },

    #[error("network I/O error: {0}")]
    Network(String),
}

impl From<io::Error> for LinkError {
    fn from(err: io::Error) -> Self {
        LinkError::Network(err.to_string())
    }
}
