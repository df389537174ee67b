//! The recorder - owns the graph, the destination writer, and the render
//! clock, and sequences them through start, stop, and interruptions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::graph::{GraphState, RecorderGraph, BLOCK_FRAMES};
use crate::render::{RenderHead, RenderStats};
use crate::session::{AudioSession, InterruptionEvent};
use crate::stages::CaptureFeeder;
use crate::writer::FileWriter;

/// Counters describing the health of the last runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Blocks pulled through the graph across all runs.
    pub blocks_rendered: u64,
    /// Frames replaced by silence because the capture queue ran dry.
    pub input_underrun_frames: u64,
    /// Rendered blocks dropped because the writer queue was full.
    pub write_failures: u64,
}

/// The thread pacing the render callback against wall-clock time.
struct RenderClock {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<(RecorderGraph, RenderStats)>,
}

/// Records the microphone into a WAV file at `destination`.
///
/// Construction builds and initializes the signal graph; [`start`] opens
/// the destination (erasing any previous take) and spins up the render
/// clock; [`stop`] winds everything back down and finalizes the file. A
/// recorder can start again after a stop, overwriting the destination.
///
/// [`start`]: Recorder::start
/// [`stop`]: Recorder::stop
pub struct Recorder<S: AudioSession> {
    destination: PathBuf,
    config: RecorderConfig,
    session: S,
    graph: Option<RecorderGraph>,
    writer: Option<FileWriter>,
    clock: Option<RenderClock>,
    feeder: Option<CaptureFeeder>,
    diagnostics: Diagnostics,
}

impl<S: AudioSession> fmt::Debug for Recorder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("destination", &self.destination)
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

impl<S: AudioSession> Recorder<S> {
    pub fn new(destination: impl Into<PathBuf>, session: S) -> Result<Self, RecorderError> {
        Self::with_config(destination, session, RecorderConfig::default())
    }

    pub fn with_config(
        destination: impl Into<PathBuf>,
        mut session: S,
        config: RecorderConfig,
    ) -> Result<Self, RecorderError> {
        config.validate()?;
        session.activate()?;

        let mut graph = RecorderGraph::build(&config)?;
        let feeder = graph.take_feeder();

        let destination = destination.into();
        info!(path = %destination.display(), sample_rate = config.sample_rate, "recorder ready");

        Ok(Self {
            destination,
            config,
            session,
            graph: Some(graph),
            writer: None,
            clock: None,
            feeder,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Producer half of the capture queue. Available once; the microphone
    /// backend (or a test) keeps it for the recorder's lifetime.
    pub fn take_feeder(&mut self) -> Result<CaptureFeeder, RecorderError> {
        self.feeder.take().ok_or(RecorderError::FeederTaken)
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_some()
    }

    pub fn state(&self) -> GraphState {
        if self.clock.is_some() {
            GraphState::Running
        } else {
            self.graph
                .as_ref()
                .map(|g| g.state())
                .unwrap_or(GraphState::Closed)
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Begin recording. A no-op when already running.
    ///
    /// The destination is opened before the graph is activated, so a file
    /// that cannot be created leaves the recorder stopped and intact.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.clock.is_some() {
            debug!("start requested while already recording");
            return Ok(());
        }
        let mut graph = self.graph.take().ok_or(RecorderError::InvalidState {
            expected: GraphState::Initialized,
            actual: GraphState::Closed,
        })?;
        let formats = *graph.formats();
        // The writer's client format comes from the live mixer stage, not
        // the negotiated bundle, so the file layout agrees bit-exactly with
        // what the render callback will deliver.
        let Some(client) = graph.mixer_output_format() else {
            self.graph = Some(graph);
            return Err(RecorderError::Config("mixer output format not applied"));
        };

        let mut writer = match FileWriter::open(
            &self.destination,
            formats.destination,
            client,
            self.config.writer_queue_frames,
        ) {
            Ok(writer) => writer,
            Err(e) => {
                self.graph = Some(graph);
                return Err(e);
            }
        };

        if let Err(e) = graph.activate() {
            self.graph = Some(graph);
            return Err(e);
        }

        let handle = match writer.take_handle() {
            Ok(handle) => handle,
            Err(e) => {
                let _ = graph.deactivate();
                self.graph = Some(graph);
                return Err(e);
            }
        };

        let mut head = RenderHead::new(graph, handle);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let sample_rate = client.sample_rate;

        let thread = thread::Builder::new()
            .name("render-clock".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut rendered: u64 = 0;
                while !thread_stop.load(Ordering::Acquire) {
                    let target_blocks = (started.elapsed().as_secs_f64() * sample_rate
                        / BLOCK_FRAMES as f64) as u64
                        + 1;
                    while rendered < target_blocks {
                        if let Err(e) = head.render_block() {
                            warn!(error = %e, "render block dropped");
                        }
                        rendered += 1;
                    }
                    thread::sleep(Duration::from_micros(500));
                }
                head.into_parts()
            })
            .map_err(|e| RecorderError::Capture(format!("could not spawn render clock: {e}")))?;

        self.writer = Some(writer);
        self.clock = Some(RenderClock { stop, thread });
        info!(path = %self.destination.display(), "recording started");
        Ok(())
    }

    /// Stop recording and finalize the destination file. A no-op when not
    /// running.
    ///
    /// Joining the render clock guarantees no render callback is in flight
    /// once this returns.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        let Some(clock) = self.clock.take() else {
            debug!("stop requested while not recording");
            return Ok(());
        };

        clock.stop.store(true, Ordering::Release);
        let (mut graph, stats) = clock
            .thread
            .join()
            .map_err(|_| RecorderError::ClockPanicked)?;

        self.diagnostics.blocks_rendered += stats.blocks_rendered;
        self.diagnostics.write_failures += stats.write_failures;
        self.diagnostics.input_underrun_frames = graph.input_underruns();

        // Put the graph back and finalize the file even when deactivation
        // reports an error; the graph must survive for the next take.
        let deactivated = graph.deactivate();
        self.graph = Some(graph);

        if let Some(writer) = self.writer.take() {
            let frames = writer.close()?;
            info!(frames, "recording stopped");
        }
        deactivated?;
        Ok(())
    }

    /// React to a platform interruption: pause on `Began`, reclaim the
    /// session and resume on `Ended`.
    pub fn on_interruption(&mut self, event: InterruptionEvent) -> Result<(), RecorderError> {
        match event {
            InterruptionEvent::Began => {
                info!("interruption began");
                self.stop()
            }
            InterruptionEvent::Ended => {
                info!("interruption ended");
                self.session.activate()?;
                self.start()
            }
        }
    }
}

impl<S: AudioSession> Drop for Recorder<S> {
    fn drop(&mut self) {
        if self.clock.is_some() {
            if let Err(e) = self.stop() {
                warn!(error = %e, "stop during recorder teardown failed");
            }
        }
        if let Some(mut graph) = self.graph.take() {
            graph.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::session::DefaultSession;

    struct DenyingSession;

    impl AudioSession for DenyingSession {
        fn activate(&mut self) -> Result<(), SessionError> {
            Err(SessionError::ActivationDenied)
        }
    }

    #[test]
    fn construction_requires_an_active_session() {
        let dir = tempfile::tempdir().unwrap();
        let err = Recorder::new(dir.path().join("out.wav"), DenyingSession).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::Session(SessionError::ActivationDenied)
        ));
    }

    #[test]
    fn construction_validates_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::default().with_sample_rate(-1.0);
        let err =
            Recorder::with_config(dir.path().join("out.wav"), DefaultSession, config).unwrap_err();
        assert!(matches!(err, RecorderError::Config(_)));
    }

    #[test]
    fn feeder_is_taken_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path().join("out.wav"), DefaultSession).unwrap();
        assert!(recorder.take_feeder().is_ok());
        assert!(matches!(
            recorder.take_feeder(),
            Err(RecorderError::FeederTaken)
        ));
    }

    #[test]
    fn fresh_recorder_is_initialized_and_idle() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path().join("out.wav"), DefaultSession).unwrap();
        assert!(!recorder.is_running());
        assert_eq!(recorder.state(), GraphState::Initialized);
        assert_eq!(recorder.diagnostics(), Diagnostics::default());
    }

    #[test]
    fn start_uses_the_live_mixer_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(dir.path().join("out.wav"), DefaultSession).unwrap();

        // Push the mixer's live output off the negotiated client format;
        // the writer must see the divergence and refuse to open.
        recorder
            .graph
            .as_mut()
            .unwrap()
            .force_mixer_output_format(crate::format::StreamFormat::hardware(44_100.0, 2));

        let err = recorder.start().unwrap_err();
        assert!(matches!(
            err,
            RecorderError::FormatMismatch {
                from: "mixer",
                to: "file",
            }
        ));
        assert!(!recorder.is_running());
        assert_eq!(recorder.state(), GraphState::Initialized);
    }

    #[test]
    fn stop_restores_the_graph_for_another_take() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut recorder = Recorder::new(&path, DefaultSession).unwrap();

        recorder.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        recorder.stop().unwrap();

        // The graph is back in place and the file is finalized, so a new
        // take can begin immediately.
        assert_eq!(recorder.state(), GraphState::Stopped);
        assert!(hound::WavReader::open(&path).is_ok());
        recorder.start().unwrap();
        recorder.stop().unwrap();
    }

    #[test]
    fn start_fails_cleanly_when_the_destination_is_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        let mut recorder = Recorder::new(path, DefaultSession).unwrap();

        assert!(recorder.start().is_err());
        assert!(!recorder.is_running());
        // The graph survives a failed start and can try again later.
        assert_eq!(recorder.state(), GraphState::Initialized);
    }
}
