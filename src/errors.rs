use thiserror::Error;

use crate::common::BoxFormat;

/// Errors raised by the detection core. All of them are local and
/// recoverable; nothing in this crate aborts the process.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectError {
    #[error("invalid box geometry: width={width}, height={height}")]
    InvalidGeometry { width: f32, height: f32 },

    #[error("unsupported box conversion: {from:?} -> {to:?}")]
    UnsupportedFormat { from: BoxFormat, to: BoxFormat },

    #[error("anchor configuration: {0}")]
    AnchorConfig(String),

    #[error("expected {expected} feature levels, got {got}")]
    LevelCount { expected: usize, got: usize },

    #[error("level {level}: expected {expected} {kind} channels, got {got}")]
    ChannelMismatch {
        level: usize,
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("level {level}: expected a {expected_w}x{expected_h} map, got {got_w}x{got_h}")]
    MapSize {
        level: usize,
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },

    #[error("candidate set mismatch: {0}")]
    CandidateShape(String),
}
