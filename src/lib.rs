//! Microphone recording through a small pull-model audio graph.
//!
//! A [`Recorder`] owns a three-stage signal path - input, format
//! converter, mixer - rendered block by block on a clock thread and
//! streamed to a WAV file by a dedicated writer thread. Audio enters
//! through a lock-free [`CaptureFeeder`]; with the `cpal_input` feature a
//! [`capture::MicInput`] drives the feeder from the default microphone,
//! and without it any code (a test, another backend) can push frames.
//!
//! ```no_run
//! use aufnahme::{DefaultSession, Recorder};
//!
//! # fn main() -> Result<(), aufnahme::RecorderError> {
//! let mut recorder = Recorder::new("take.wav", DefaultSession)?;
//! let feeder = recorder.take_feeder()?;
//! // hand `feeder` to a capture backend, then:
//! recorder.start()?;
//! // ... record ...
//! recorder.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod session;
pub mod stages;

mod graph;
mod recorder;
mod render;
mod writer;

#[cfg(feature = "cpal_input")]
pub mod capture;

pub use config::RecorderConfig;
pub use error::{BackendStatus, RecorderError, RenderError, SessionError};
pub use format::{negotiate, NegotiatedFormats, SampleKind, StreamFormat};
pub use graph::GraphState;
pub use recorder::{Diagnostics, Recorder};
pub use session::{AudioSession, DefaultSession, InterruptionEvent};
pub use stages::{CaptureFeeder, CaptureFrame};
