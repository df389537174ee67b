//! The render leg: pulls blocks from the graph terminal and forwards them
//! to the file writer.
//!
//! A [`RenderHead`] bundles the graph with the writer queue's producer so
//! the whole render path can move into the clock thread and come back out
//! at stop, together with its counters.

use crate::error::RenderError;
use crate::graph::RecorderGraph;
use crate::writer::WriterHandle;

/// Counters accumulated over one run of the render clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RenderStats {
    pub blocks_rendered: u64,
    pub write_failures: u64,
}

pub(crate) struct RenderHead {
    graph: RecorderGraph,
    writer: WriterHandle,
    stats: RenderStats,
}

impl RenderHead {
    pub fn new(graph: RecorderGraph, writer: WriterHandle) -> Self {
        Self {
            graph,
            writer,
            stats: RenderStats::default(),
        }
    }

    /// Pull one block out of the mixer terminal and enqueue it for the
    /// writer. A full writer queue drops the block and is counted, not
    /// escalated.
    pub fn render_block(&mut self) -> Result<(), RenderError> {
        self.graph.pull_block()?;
        self.stats.blocks_rendered += 1;

        let buffers = self.graph.mixer_buffers();
        match self.writer.write_planar(&buffers[0][..], &buffers[1][..]) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stats.write_failures += 1;
                Err(e)
            }
        }
    }

    /// Dismantle the head, returning the graph and the run's counters.
    pub fn into_parts(self) -> (RecorderGraph, RenderStats) {
        (self.graph, self.stats)
    }
}
