//! Recorder configuration.

use crate::error::RecorderError;
use crate::graph::BLOCK_FRAMES;

/// Session parameters, fixed for the lifetime of a recorder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecorderConfig {
    /// Session sample rate in Hz. All negotiated formats carry this rate.
    pub sample_rate: f64,
    /// Channel count. The pipeline is stereo end to end.
    pub channels: u32,
    /// Capacity of the capture queue between the microphone backend and
    /// the input stage, in frames.
    pub capture_queue_frames: usize,
    /// Capacity of the queue between the render callback and the file
    /// writer, in frames.
    pub writer_queue_frames: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            channels: 2,
            capture_queue_frames: 16_384,
            writer_queue_frames: 65_536,
        }
    }
}

impl RecorderConfig {
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_capture_queue_frames(mut self, frames: usize) -> Self {
        self.capture_queue_frames = frames;
        self
    }

    pub fn with_writer_queue_frames(mut self, frames: usize) -> Self {
        self.writer_queue_frames = frames;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), RecorderError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(RecorderError::Config("sample rate must be positive"));
        }
        if self.channels != 2 {
            return Err(RecorderError::Config("the signal path is stereo only"));
        }
        if self.capture_queue_frames < BLOCK_FRAMES || self.writer_queue_frames < BLOCK_FRAMES {
            return Err(RecorderError::Config(
                "queues must hold at least one render block",
            ));
        }
        Ok(())
    }
}
