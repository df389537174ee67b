//! Converter stage - hardware fixed point to client float.

use dasp_graph::{Buffer, Input};

use crate::format::{StreamFormat, FIXED_ONE};

const FIXED_SCALE: f32 = 1.0 / FIXED_ONE;

/// Rescales Q8.24 sample values (carried as unscaled f32) into normalized
/// float, bridging the hardware format and the client format.
pub(crate) struct ConverterStage {
    pub(crate) input_format: Option<StreamFormat>,
    pub(crate) output_format: Option<StreamFormat>,
}

impl ConverterStage {
    pub fn new() -> Self {
        Self {
            input_format: None,
            output_format: None,
        }
    }

    pub fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        let Some(input) = inputs.first() else {
            for buffer in output.iter_mut() {
                buffer.silence();
            }
            return;
        };
        let in_buffers = input.buffers();

        for (ch, out_buffer) in output.iter_mut().enumerate() {
            let in_ch = ch.min(in_buffers.len().saturating_sub(1));
            let in_buffer = &in_buffers[in_ch];
            for (out_sample, &in_sample) in out_buffer.iter_mut().zip(in_buffer.iter()) {
                *out_sample = in_sample * FIXED_SCALE;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::float_to_fixed;
    use dasp_graph::{Buffer, Input, Node, NodeData};

    type Graph = petgraph::graph::Graph<NodeData<Probe>, ()>;

    // Minimal node wrapper to drive the converter through dasp_graph.
    enum Probe {
        Fill(f32),
        Converter(ConverterStage),
    }

    impl Node for Probe {
        fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
            match self {
                Probe::Fill(v) => {
                    for buffer in output.iter_mut() {
                        buffer.iter_mut().for_each(|s| *s = *v);
                    }
                }
                Probe::Converter(c) => c.process(inputs, output),
            }
        }
    }

    #[test]
    fn rescales_fixed_point_to_unit_range() {
        let mut graph = Graph::with_capacity(4, 4);
        let mut processor = dasp_graph::Processor::with_capacity(4);

        let raw = float_to_fixed(0.25) as f32;
        let source = graph.add_node(NodeData::new2(Probe::Fill(raw)));
        let converter = graph.add_node(NodeData::new2(Probe::Converter(ConverterStage::new())));
        graph.add_edge(source, converter, ());

        processor.process(&mut graph, converter);

        for buffer in &graph[converter].buffers {
            assert!(buffer.iter().all(|&s| (s - 0.25).abs() < 1e-6));
        }
    }

    #[test]
    fn no_input_is_silence() {
        let mut converter = ConverterStage::new();
        let mut output = [Buffer::SILENT, Buffer::SILENT];
        output[0][0] = 1.0;
        converter.process(&[], &mut output);
        assert!(output[0].iter().all(|&s| s == 0.0));
    }
}
