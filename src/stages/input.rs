//! Input stage - the capture end of the graph.
//!
//! Captured audio arrives as hardware-format frames (Q8.24 fixed point,
//! one value per channel) through a lock-free ring. The producer half is
//! handed out as a [`CaptureFeeder`]; a microphone backend or a test pushes
//! frames through it, the graph pops them during rendering.

use dasp_graph::{Buffer, Input};
use rtrb::{Consumer, Producer};

use crate::error::RecorderError;
use crate::format::{self, StreamFormat};

/// One captured stereo frame in the hardware fixed-point format.
pub type CaptureFrame = [i32; 2];

/// Producer half of the capture queue.
///
/// Pushing never blocks; frames that don't fit are rejected. Safe to drive
/// from an audio callback.
pub struct CaptureFeeder {
    producer: Producer<CaptureFrame>,
}

impl CaptureFeeder {
    pub(crate) fn new(producer: Producer<CaptureFrame>) -> Self {
        Self { producer }
    }

    /// Push stereo float frames, converting to the hardware fixed-point
    /// format. Returns how many frames were accepted.
    pub fn push(&mut self, frames: &[(f32, f32)]) -> usize {
        let mut accepted = 0;
        for &(l, r) in frames {
            let frame = [format::float_to_fixed(l), format::float_to_fixed(r)];
            if self.producer.push(frame).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Push one frame already in the hardware format.
    pub fn push_raw(&mut self, frame: CaptureFrame) -> bool {
        self.producer.push(frame).is_ok()
    }

    /// Free slots remaining in the queue.
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

pub(crate) struct InputStage {
    consumer: Consumer<CaptureFrame>,
    capture_enabled: bool,
    max_frames_per_block: u32,
    underrun_frames: u64,
    /// Format of the render leg handed back to the render callback.
    pub(crate) input_format: Option<StreamFormat>,
    /// Format of the capture output (hardware fixed point).
    pub(crate) output_format: Option<StreamFormat>,
}

impl InputStage {
    pub fn new(consumer: Consumer<CaptureFrame>) -> Self {
        Self {
            consumer,
            capture_enabled: false,
            max_frames_per_block: 4096,
            underrun_frames: 0,
            input_format: None,
            output_format: None,
        }
    }

    /// Enable or disable the capture leg. Best-effort: the graph treats a
    /// failure here as non-fatal.
    pub fn set_capture_enabled(&mut self, enabled: bool) -> Result<(), RecorderError> {
        self.capture_enabled = enabled;
        Ok(())
    }

    /// Upper bound on frames rendered per block. Applied as an unchecked
    /// hint.
    pub fn set_max_frames_per_block(&mut self, frames: u32) {
        self.max_frames_per_block = frames;
    }

    /// Frames substituted with silence because the capture queue was empty.
    pub fn underrun_frames(&self) -> u64 {
        self.underrun_frames
    }

    /// Pop one block of captured frames into the output buffers.
    ///
    /// The buffers carry the fixed-point sample values widened to f32,
    /// unscaled; the converter stage downstream normalizes them. An empty
    /// queue yields silence and bumps the underrun counter.
    pub fn process(&mut self, _inputs: &[Input], output: &mut [Buffer]) {
        let frames = output
            .first()
            .map(|b| b.len())
            .unwrap_or(0)
            .min(self.max_frames_per_block as usize);

        if !self.capture_enabled {
            for buffer in output.iter_mut() {
                buffer.silence();
            }
            return;
        }

        for i in 0..frames {
            match self.consumer.pop() {
                Ok(frame) => {
                    for (ch, buffer) in output.iter_mut().enumerate() {
                        buffer[i] = frame[ch.min(1)] as f32;
                    }
                }
                Err(_) => {
                    self.underrun_frames += 1;
                    for buffer in output.iter_mut() {
                        buffer[i] = 0.0;
                    }
                }
            }
        }
    }
}
