//! Error types.
//!
//! Control-path failures are typed [`RecorderError`]s returned to the
//! caller, which decides whether to terminate. The real-time render path
//! uses the allocation-free [`RenderError`] instead.

use core::fmt;

use thiserror::Error;

use crate::graph::GraphState;

/// A raw status code reported by a platform audio backend.
///
/// Many audio backends encode errors as four-character codes. When every
/// byte of the value is printable ASCII the code is rendered as a quoted
/// tag (e.g. `'fmt?'`), otherwise as the raw number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendStatus(pub i32);

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| (0x20..=0x7e).contains(b)) {
            write!(
                f,
                "'{}{}{}{}'",
                bytes[0] as char, bytes[1] as char, bytes[2] as char, bytes[3] as char
            )
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Failures of the session-activation collaborator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session activation denied")]
    ActivationDenied,

    #[error("session backend status {0}")]
    Backend(BackendStatus),
}

/// Control-path errors from construction, start/stop, and teardown.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("graph is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: GraphState,
        actual: GraphState,
    },

    #[error("invalid configuration: {0}")]
    Config(&'static str),

    #[error("format mismatch between {from} output and {to} input")]
    FormatMismatch {
        from: &'static str,
        to: &'static str,
    },

    #[error("missing connection into {to}")]
    MissingConnection { to: &'static str },

    #[error("mixer element {element} out of range (element count is {count})")]
    ElementOutOfRange { element: u32, count: u32 },

    #[error("destination file error: {0}")]
    File(#[from] hound::Error),

    #[error("file writer already closed")]
    WriterClosed,

    #[error("audio session error: {0}")]
    Session(#[from] SessionError),

    #[error("capture backend error: {0}")]
    Capture(String),

    #[error("capture feeder already taken")]
    FeederTaken,

    #[error("render clock thread panicked")]
    ClockPanicked,
}

/// Real-time render-path errors. `Copy` and allocation-free; forwarded to
/// the render clock as the callback's return status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderError {
    /// The graph is not in the Running state.
    GraphNotRunning,
    /// The writer queue had no room for the rendered block.
    WriterFull,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::GraphNotRunning => write!(f, "graph not running"),
            RenderError::WriterFull => write!(f, "writer queue full"),
        }
    }
}

impl std::error::Error for RenderError {}
