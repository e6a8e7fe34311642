//! Error types for the EDID decoder
//!
//! Only structural failures live here. Everything a real-world EDID gets
//! wrong that we can decode around is recorded as a [`Diagnostic`] instead.
//!
//! [`Diagnostic`]: crate::diagnostics::Diagnostic

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("EDID size {0} is not a non-zero multiple of 128 bytes")]
    InvalidSize(usize),

    #[error("invalid EDID header")]
    InvalidHeader,

    #[error("EDID declares {declared} extension blocks but only {present} are present")]
    Truncated { declared: usize, present: usize },

    #[error("read of {len} bytes at offset {offset} exceeds {size}-byte buffer")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    #[error("DisplayID section holds more than {max} data blocks")]
    TooManyDataBlocks { max: usize },

    #[error("DisplayID {kind} timing block holds {count} timings, at most {max} allowed")]
    TooManyTimings {
        kind: &'static str,
        count: usize,
        max: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error only invalidates the block being decoded.
    ///
    /// Out-of-bounds reads abort the current block; the parser resumes with
    /// the next sibling. Every other variant aborts the whole parse.
    pub fn is_block_local(&self) -> bool {
        matches!(self, Error::OutOfBounds { .. })
    }
}
