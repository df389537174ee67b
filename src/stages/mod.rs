//! The three processing stages of the signal path.
//!
//! - [`input::InputStage`] - pops captured hardware-format frames off the
//!   capture queue
//! - [`converter::ConverterStage`] - fixed point to normalized float
//! - [`mixer::MixerStage`] - sums its (single) input at the pinned session
//!   rate
//!
//! Stages exchange non-interleaved float blocks; the fixed-point hardware
//! boundary lives between the capture queue and the converter.

pub mod input;

pub(crate) mod converter;
pub(crate) mod mixer;

pub use input::{CaptureFeeder, CaptureFrame};
