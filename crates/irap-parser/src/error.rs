//! Error types for the Irap codec.

use thiserror::Error;

/// Result type for Irap operations.
pub type IrapResult<T> = Result<T, IrapError>;

/// Errors from decoding or encoding Irap binary surfaces.
#[derive(Debug, Error)]
pub enum IrapError {
    /// Input ended before the expected field.
    #[error("input truncated reading {context}: {needed} more bytes needed")]
    Truncated {
        context: &'static str,
        needed: usize,
    },

    /// First header field was not the Irap magic value.
    #[error("bad magic: expected -996, got {0}")]
    BadMagic(i32),

    /// A Fortran record length marker did not match the expected value.
    #[error("record marker mismatch reading {context}: expected {expected}, got {got}")]
    RecordMismatch {
        context: &'static str,
        expected: i32,
        got: i32,
    },

    /// A data record length was not a positive multiple of four bytes.
    #[error("invalid data record length: {0}")]
    BadDataRecord(i32),

    /// Header dimensions were not positive.
    #[error("invalid grid dimensions: {nx} x {ny}")]
    InvalidDimensions { nx: i32, ny: i32 },

    /// Header increments were not positive.
    #[error("invalid grid increments: xinc {xinc}, yinc {yinc}")]
    InvalidIncrements { xinc: f32, yinc: f32 },

    /// Data section held a different node count than the header promised.
    #[error("node count mismatch: header says {expected}, data section holds {got}")]
    NodeCountMismatch { expected: usize, got: usize },
}
