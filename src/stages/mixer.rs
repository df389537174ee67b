//! Mixer stage - sums its inputs at the pinned session rate.

use dasp_graph::{Buffer, Input};

use crate::format::StreamFormat;

/// Sums all connected inputs with equal weight. The element count is fixed
/// at construction (one for this recorder - a single source path), and the
/// output sample rate is pinned to the session rate.
pub(crate) struct MixerStage {
    element_count: u32,
    sample_rate: f64,
    pub(crate) input_format: Option<StreamFormat>,
    pub(crate) output_format: Option<StreamFormat>,
}

impl MixerStage {
    pub fn new(element_count: u32, sample_rate: f64) -> Self {
        Self {
            element_count,
            sample_rate,
            input_format: None,
            output_format: None,
        }
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        for buffer in output.iter_mut() {
            buffer.silence();
        }

        for input in inputs {
            let in_buffers = input.buffers();
            if in_buffers.is_empty() {
                continue;
            }

            for (ch, out_buffer) in output.iter_mut().enumerate() {
                // Mono inputs feed every output channel; extra input
                // channels beyond the output width are ignored.
                let in_ch = ch.min(in_buffers.len() - 1);
                let in_buffer = &in_buffers[in_ch];
                for (out_sample, &in_sample) in out_buffer.iter_mut().zip(in_buffer.iter()) {
                    *out_sample += in_sample;
                }
            }
        }
    }
}
