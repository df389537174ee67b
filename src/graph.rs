//! The recording graph - stages, wiring, formats, and lifecycle.
//!
//! Three stages form a single signal path: input -> converter -> mixer.
//! The mixer is the terminal node; the render callback pulls blocks out of
//! it rather than connecting a downstream edge. Lifecycle transitions are
//! explicit and checked: `Uninitialized -> Open -> Initialized -> Running
//! <-> Stopped -> Closed`.

use dasp_graph::{Buffer, Input, Node, NodeData, Processor};
use petgraph::graph::NodeIndex;
use tracing::{debug, warn};

use crate::config::RecorderConfig;
use crate::error::{RecorderError, RenderError};
use crate::format::{negotiate, NegotiatedFormats, StreamFormat};
use crate::stages::converter::ConverterStage;
use crate::stages::input::InputStage;
use crate::stages::mixer::MixerStage;
use crate::stages::CaptureFeeder;

/// Frames per render block, fixed by the graph substrate.
pub(crate) const BLOCK_FRAMES: usize = Buffer::LEN;

/// The input stage exposes its captured audio on this output port.
const INPUT_CAPTURE_PORT: u32 = 1;

/// Lifecycle state of the recording graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Open,
    Initialized,
    Running,
    Stopped,
    Closed,
}

pub(crate) enum StageKind {
    Input(InputStage),
    Converter(ConverterStage),
    Mixer(MixerStage),
}

impl StageKind {
    fn name(&self) -> &'static str {
        match self {
            StageKind::Input(_) => "input",
            StageKind::Converter(_) => "converter",
            StageKind::Mixer(_) => "mixer",
        }
    }
}

impl Node for StageKind {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        match self {
            StageKind::Input(stage) => stage.process(inputs, output),
            StageKind::Converter(stage) => stage.process(inputs, output),
            StageKind::Mixer(stage) => stage.process(inputs, output),
        }
    }
}

type SignalGraph = petgraph::graph::Graph<NodeData<StageKind>, ()>;

/// A recorded wiring between two stage ports, kept alongside the petgraph
/// edge so initialization can validate formats port by port.
struct Connection {
    from: NodeIndex,
    from_port: u32,
    to: NodeIndex,
    to_port: u32,
}

pub(crate) struct RecorderGraph {
    graph: SignalGraph,
    processor: Processor<SignalGraph>,
    state: GraphState,
    input: NodeIndex,
    converter: NodeIndex,
    mixer: NodeIndex,
    /// Stages in acquisition order; teardown walks this in reverse.
    stage_order: Vec<NodeIndex>,
    connections: Vec<Connection>,
    formats: NegotiatedFormats,
    feeder: Option<CaptureFeeder>,
}

impl RecorderGraph {
    pub fn new(config: &RecorderConfig) -> Self {
        let formats = negotiate(config.sample_rate, config.channels);
        let (producer, consumer) = rtrb::RingBuffer::new(config.capture_queue_frames);

        let mut graph = SignalGraph::with_capacity(8, 8);
        let input = graph.add_node(NodeData::new2(StageKind::Input(InputStage::new(consumer))));
        let converter = graph.add_node(NodeData::new2(StageKind::Converter(ConverterStage::new())));
        let mixer = graph.add_node(NodeData::new2(StageKind::Mixer(MixerStage::new(
            1,
            config.sample_rate,
        ))));

        Self {
            graph,
            processor: Processor::with_capacity(8),
            state: GraphState::Uninitialized,
            input,
            converter,
            mixer,
            stage_order: vec![input, converter, mixer],
            connections: Vec::new(),
            formats,
            feeder: Some(CaptureFeeder::new(producer)),
        }
    }

    /// Construct, open, configure, wire, and initialize in one step.
    pub fn build(config: &RecorderConfig) -> Result<Self, RecorderError> {
        let mut graph = Self::new(config);
        graph.open()?;
        graph.apply_formats()?;
        graph.connect()?;
        graph.initialize()?;
        Ok(graph)
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn formats(&self) -> &NegotiatedFormats {
        &self.formats
    }

    /// Hand out the producer half of the capture queue. Available once.
    pub fn take_feeder(&mut self) -> Option<CaptureFeeder> {
        self.feeder.take()
    }

    fn expect_state(&self, expected: GraphState) -> Result<(), RecorderError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RecorderError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Instantiate the stages. No audio flows yet.
    pub fn open(&mut self) -> Result<(), RecorderError> {
        self.expect_state(GraphState::Uninitialized)?;
        self.state = GraphState::Open;
        debug!("graph opened");
        Ok(())
    }

    /// Stamp the negotiated formats onto every stage port and enable the
    /// capture leg.
    pub fn apply_formats(&mut self) -> Result<(), RecorderError> {
        self.expect_state(GraphState::Open)?;

        let formats = self.formats;
        {
            let input = self.input_mut();
            input.output_format = Some(formats.hardware);
            input.input_format = Some(formats.client);
            if let Err(e) = input.set_capture_enabled(true) {
                warn!(error = %e, "could not enable capture on the input stage");
            }
            input.set_max_frames_per_block(4096);
        }
        {
            let converter = self.converter_mut();
            converter.input_format = Some(formats.hardware);
            converter.output_format = Some(formats.client);
        }
        {
            let mixer = self.mixer_mut();
            mixer.input_format = Some(formats.client);
            mixer.output_format = Some(formats.client);
        }

        debug!(
            sample_rate = self.mixer_ref().sample_rate(),
            elements = self.mixer_ref().element_count(),
            channels = formats.client.channels,
            "formats applied"
        );
        Ok(())
    }

    /// Wire the fixed signal path.
    ///
    /// The render leg is not an edge: the render callback pulls from the
    /// mixer terminal directly, so only input -> converter -> mixer are
    /// connected here.
    pub fn connect(&mut self) -> Result<(), RecorderError> {
        self.expect_state(GraphState::Open)?;
        self.add_connection(self.input, INPUT_CAPTURE_PORT, self.converter, 0)?;
        self.add_connection(self.converter, 0, self.mixer, 0)?;
        Ok(())
    }

    fn add_connection(
        &mut self,
        from: NodeIndex,
        from_port: u32,
        to: NodeIndex,
        to_port: u32,
    ) -> Result<(), RecorderError> {
        if to == self.mixer {
            let count = self.mixer_ref().element_count();
            if to_port >= count {
                return Err(RecorderError::ElementOutOfRange {
                    element: to_port,
                    count,
                });
            }
        }
        self.graph.add_edge(from, to, ());
        self.connections.push(Connection {
            from,
            from_port,
            to,
            to_port,
        });
        debug!(
            from = self.graph[from].node.name(),
            from_port,
            to = self.graph[to].node.name(),
            to_port,
            "connected"
        );
        Ok(())
    }

    /// Validate the wiring and the formats across every connection, then
    /// mark the graph ready to run.
    pub fn initialize(&mut self) -> Result<(), RecorderError> {
        self.expect_state(GraphState::Open)?;

        for &(node, name) in &[(self.converter, "converter"), (self.mixer, "mixer")] {
            if !self.connections.iter().any(|c| c.to == node) {
                return Err(RecorderError::MissingConnection { to: name });
            }
        }

        for connection in &self.connections {
            let from_format = self.output_format_of(connection.from);
            let to_format = self.input_format_of(connection.to);
            match (from_format, to_format) {
                (Some(a), Some(b)) if a == b => {
                    debug!(
                        from = self.graph[connection.from].node.name(),
                        from_port = connection.from_port,
                        to = self.graph[connection.to].node.name(),
                        to_port = connection.to_port,
                        "connection format validated"
                    );
                }
                _ => {
                    return Err(RecorderError::FormatMismatch {
                        from: self.graph[connection.from].node.name(),
                        to: self.graph[connection.to].node.name(),
                    });
                }
            }
        }

        self.state = GraphState::Initialized;
        debug!("graph initialized");
        Ok(())
    }

    /// Start the graph. Valid from Initialized or after a stop.
    pub fn activate(&mut self) -> Result<(), RecorderError> {
        match self.state {
            GraphState::Initialized | GraphState::Stopped => {
                self.state = GraphState::Running;
                debug!("graph running");
                Ok(())
            }
            actual => Err(RecorderError::InvalidState {
                expected: GraphState::Initialized,
                actual,
            }),
        }
    }

    pub fn deactivate(&mut self) -> Result<(), RecorderError> {
        self.expect_state(GraphState::Running)?;
        self.state = GraphState::Stopped;
        debug!("graph stopped");
        Ok(())
    }

    /// Tear the graph down, removing stages in reverse acquisition order.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.state == GraphState::Closed {
            return;
        }
        // Reverse order keeps earlier node indices stable across the
        // swap-removals petgraph performs.
        while let Some(index) = self.stage_order.pop() {
            self.graph.remove_node(index);
        }
        self.connections.clear();
        self.state = GraphState::Closed;
        debug!("graph closed");
    }

    /// Render one block by pulling the mixer terminal.
    pub fn pull_block(&mut self) -> Result<(), RenderError> {
        if self.state != GraphState::Running {
            return Err(RenderError::GraphNotRunning);
        }
        self.processor.process(&mut self.graph, self.mixer);
        Ok(())
    }

    /// Output buffers of the mixer terminal, valid after [`pull_block`].
    ///
    /// [`pull_block`]: RecorderGraph::pull_block
    pub fn mixer_buffers(&self) -> &[Buffer] {
        &self.graph[self.mixer].buffers
    }

    pub fn mixer_output_format(&self) -> Option<StreamFormat> {
        self.output_format_of(self.mixer)
    }

    pub fn input_underruns(&self) -> u64 {
        match &self.graph[self.input].node {
            StageKind::Input(stage) => stage.underrun_frames(),
            _ => unreachable!("the input index always holds the input stage"),
        }
    }

    fn input_mut(&mut self) -> &mut InputStage {
        match &mut self.graph[self.input].node {
            StageKind::Input(stage) => stage,
            _ => unreachable!("the input index always holds the input stage"),
        }
    }

    fn converter_mut(&mut self) -> &mut ConverterStage {
        match &mut self.graph[self.converter].node {
            StageKind::Converter(stage) => stage,
            _ => unreachable!("the converter index always holds the converter stage"),
        }
    }

    fn mixer_mut(&mut self) -> &mut MixerStage {
        match &mut self.graph[self.mixer].node {
            StageKind::Mixer(stage) => stage,
            _ => unreachable!("the mixer index always holds the mixer stage"),
        }
    }

    fn mixer_ref(&self) -> &MixerStage {
        match &self.graph[self.mixer].node {
            StageKind::Mixer(stage) => stage,
            _ => unreachable!("the mixer index always holds the mixer stage"),
        }
    }

    fn output_format_of(&self, index: NodeIndex) -> Option<StreamFormat> {
        match &self.graph[index].node {
            StageKind::Input(stage) => stage.output_format,
            StageKind::Converter(stage) => stage.output_format,
            StageKind::Mixer(stage) => stage.output_format,
        }
    }

    fn input_format_of(&self, index: NodeIndex) -> Option<StreamFormat> {
        match &self.graph[index].node {
            StageKind::Input(stage) => stage.input_format,
            StageKind::Converter(stage) => stage.input_format,
            StageKind::Mixer(stage) => stage.input_format,
        }
    }

    #[cfg(test)]
    fn force_converter_output_format(&mut self, format: StreamFormat) {
        self.converter_mut().output_format = Some(format);
    }

    #[cfg(test)]
    pub(crate) fn force_mixer_output_format(&mut self, format: StreamFormat) {
        self.mixer_mut().output_format = Some(format);
    }
}

impl Drop for RecorderGraph {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RecorderConfig {
        RecorderConfig::default()
    }

    #[test]
    fn build_reaches_initialized() {
        let graph = RecorderGraph::build(&config()).unwrap();
        assert_eq!(graph.state(), GraphState::Initialized);
    }

    #[test]
    fn format_application_requires_open() {
        let mut graph = RecorderGraph::new(&config());
        let err = graph.apply_formats().unwrap_err();
        assert!(matches!(
            err,
            RecorderError::InvalidState {
                expected: GraphState::Open,
                actual: GraphState::Uninitialized,
            }
        ));
    }

    #[test]
    fn initialize_rejects_missing_connections() {
        let mut graph = RecorderGraph::new(&config());
        graph.open().unwrap();
        graph.apply_formats().unwrap();

        let err = graph.initialize().unwrap_err();
        assert!(matches!(
            err,
            RecorderError::MissingConnection { to: "converter" }
        ));
    }

    #[test]
    fn initialize_rejects_format_mismatch() {
        let mut graph = RecorderGraph::new(&config());
        graph.open().unwrap();
        graph.apply_formats().unwrap();
        graph.connect().unwrap();
        graph.force_converter_output_format(StreamFormat::hardware(44_100.0, 2));

        let err = graph.initialize().unwrap_err();
        assert!(matches!(
            err,
            RecorderError::FormatMismatch {
                from: "converter",
                to: "mixer",
            }
        ));
    }

    #[test]
    fn mixer_has_a_single_element() {
        let mut graph = RecorderGraph::new(&config());
        graph.open().unwrap();
        graph.apply_formats().unwrap();

        let err = graph
            .add_connection(graph.converter, 0, graph.mixer, 1)
            .unwrap_err();
        assert!(matches!(
            err,
            RecorderError::ElementOutOfRange {
                element: 1,
                count: 1,
            }
        ));
    }

    #[test]
    fn activation_cycle() {
        let mut graph = RecorderGraph::build(&config()).unwrap();

        assert_eq!(graph.pull_block(), Err(RenderError::GraphNotRunning));

        graph.activate().unwrap();
        assert_eq!(graph.state(), GraphState::Running);
        graph.pull_block().unwrap();

        graph.deactivate().unwrap();
        assert_eq!(graph.state(), GraphState::Stopped);

        // A stopped graph restarts.
        graph.activate().unwrap();
        assert_eq!(graph.state(), GraphState::Running);
    }

    #[test]
    fn deactivate_requires_running() {
        let mut graph = RecorderGraph::build(&config()).unwrap();
        assert!(graph.deactivate().is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let mut graph = RecorderGraph::build(&config()).unwrap();
        graph.close();
        assert_eq!(graph.state(), GraphState::Closed);
        graph.close();
        assert_eq!(graph.state(), GraphState::Closed);
    }

    #[test]
    fn exposes_the_live_mixer_output_format() {
        let graph = RecorderGraph::build(&config()).unwrap();
        assert_eq!(graph.mixer_output_format(), Some(graph.formats().client));
    }

    #[test]
    fn feeder_is_taken_once() {
        let mut graph = RecorderGraph::build(&config()).unwrap();
        assert!(graph.take_feeder().is_some());
        assert!(graph.take_feeder().is_none());
    }

    #[test]
    fn pulls_captured_audio_through_all_stages() {
        let mut graph = RecorderGraph::build(&config()).unwrap();
        let mut feeder = graph.take_feeder().unwrap();
        graph.activate().unwrap();

        let frames = vec![(0.5f32, -0.25f32); BLOCK_FRAMES];
        assert_eq!(feeder.push(&frames), BLOCK_FRAMES);

        graph.pull_block().unwrap();
        let buffers = graph.mixer_buffers();
        assert!(buffers[0].iter().all(|&s| (s - 0.5).abs() < 1e-5));
        assert!(buffers[1].iter().all(|&s| (s + 0.25).abs() < 1e-5));

        // Queue is drained: the next block is silence and counts underruns.
        graph.pull_block().unwrap();
        let buffers = graph.mixer_buffers();
        assert!(buffers[0].iter().all(|&s| s == 0.0));
        assert_eq!(graph.input_underruns(), BLOCK_FRAMES as u64);
    }
}
