//! Error types for the HEYKUBE core model
//!
//! Each concern (notation, move indices, the state codec and characteristic
//! payloads) has its own error enum. [`HeykubeError`] unifies them for callers
//! that do not care which layer failed.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors raised while reading move notation, face letters or facelet names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("Unrecognized move token '{token}' at offset {offset}")]
    UnknownToken { token: char, offset: usize },
    #[error("Unbalanced parenthesis at offset {offset}")]
    UnbalancedGroup { offset: usize },
    #[error("Unknown face '{0}'")]
    UnknownFace(String),
    #[error("Unknown facelet name '{0}'")]
    UnknownFacelet(String),
}

/// Errors raised when a numeric move index is outside the elementary move set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("Illegal move index {0}")]
    IllegalIndex(u8),
    #[error("Move {0} has no 4-bit wire encoding")]
    NotWireEncodable(&'static str),
}

/// Errors raised by the compact cube state codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Frame too short: {actual} bytes (need {expected})")]
    FrameTooShort { expected: usize, actual: usize },
    #[error("Facelet checksum mismatch: sum {sum}, expected 1431")]
    ChecksumMismatch { sum: u32 },
    #[error("Reserved position field is {0:#x}, expected zero")]
    ReservedPosition(u8),
    #[error("Permutation index {index} out of range for {pieces} pieces")]
    IndexOutOfRange { index: u32, pieces: usize },
    #[error("Corner orientation value {0} out of range")]
    OrientationOutOfRange(u32),
    #[error("Not a permutation of {pieces} elements")]
    InvalidPermutation { pieces: usize },
    #[error("Centers are displaced; reset the orientation before encoding")]
    CentersDisplaced,
}

/// Errors raised while decoding or building characteristic payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("{field} payload too short: {actual} bytes (need {expected})")]
    TooShort {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Too many instructions: {count} (max {max})")]
    TooManyInstructions { count: usize, max: usize },
    #[error("Invalid color code {0}")]
    InvalidColorCode(u8),
    #[error("Unknown pattern '{0}'")]
    UnknownPattern(String),
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the HEYKUBE model and codecs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeykubeError {
    #[error("Notation error: {0}")]
    Notation(#[from] NotationError),

    #[error("Move error: {0}")]
    Move(#[from] MoveError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
}

pub type Result<T> = core::result::Result<T, HeykubeError>;
