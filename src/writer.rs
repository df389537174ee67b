//! Destination file writing.
//!
//! The render callback must never touch the filesystem, so rendered blocks
//! cross a lock-free queue to a dedicated writer thread. The thread
//! converts the client float samples to interleaved 16-bit PCM and streams
//! them into a WAV file; opening the destination truncates any existing
//! file, and closing finalizes the header.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, warn};

use crate::error::{RecorderError, RenderError};
use crate::format::{SampleKind, StreamFormat};

/// Producer half of the writer queue, owned by the render callback.
pub(crate) struct WriterHandle {
    producer: Producer<(f32, f32)>,
}

impl WriterHandle {
    /// Enqueue one planar block for writing. All-or-nothing: if the queue
    /// cannot hold the whole block no frame is enqueued. An empty block is
    /// a no-op, used to prime the path before the graph starts.
    pub fn write_planar(&mut self, left: &[f32], right: &[f32]) -> Result<(), RenderError> {
        if left.is_empty() {
            return Ok(());
        }
        if self.producer.slots() < left.len() {
            return Err(RenderError::WriterFull);
        }
        for (&l, &r) in left.iter().zip(right.iter()) {
            if self.producer.push((l, r)).is_err() {
                return Err(RenderError::WriterFull);
            }
        }
        Ok(())
    }
}

fn sample_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn drain(
    mut writer: hound::WavWriter<std::io::BufWriter<std::fs::File>>,
    mut consumer: Consumer<(f32, f32)>,
    stop: Arc<AtomicBool>,
) -> Result<u64, hound::Error> {
    let mut frames: u64 = 0;
    loop {
        match consumer.pop() {
            Ok((l, r)) => {
                writer.write_sample(sample_to_i16(l))?;
                writer.write_sample(sample_to_i16(r))?;
                frames += 1;
            }
            Err(_) => {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
    writer.finalize()?;
    Ok(frames)
}

/// Owns the destination file and the writer thread.
pub(crate) struct FileWriter {
    handle: Option<WriterHandle>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<u64, hound::Error>>>,
}

impl fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWriter").finish_non_exhaustive()
    }
}

impl FileWriter {
    /// Open the destination for writing, erasing any previous recording,
    /// and start the writer thread.
    ///
    /// `client` is the format of the blocks the render callback delivers,
    /// `target` the archival format of the file; the pair is validated up
    /// front so a bad combination fails before any audio flows.
    pub(crate) fn open(
        path: &Path,
        target: StreamFormat,
        client: StreamFormat,
        queue_frames: usize,
    ) -> Result<Self, RecorderError> {
        let target_ok = target.sample_kind == SampleKind::SignedInteger
            && target.bits_per_channel == 16
            && target.interleaved;
        let client_ok = client.sample_kind == SampleKind::Float && !client.interleaved;
        if !target_ok || !client_ok || target.sample_rate != client.sample_rate {
            return Err(RecorderError::FormatMismatch {
                from: "mixer",
                to: "file",
            });
        }

        let spec = hound::WavSpec {
            channels: target.channels as u16,
            sample_rate: target.sample_rate as u32,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        debug!(path = %path.display(), sample_rate = spec.sample_rate, "destination opened");

        let (producer, consumer) = RingBuffer::new(queue_frames);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("file-writer".to_string())
            .spawn(move || drain(writer, consumer, thread_stop))
            .map_err(|e| RecorderError::Capture(format!("could not spawn writer thread: {e}")))?;

        let mut file_writer = Self {
            handle: Some(WriterHandle { producer }),
            stop,
            thread: Some(thread),
        };

        // Prime the write path with an empty block.
        if let Some(handle) = file_writer.handle.as_mut() {
            let _ = handle.write_planar(&[], &[]);
        }

        Ok(file_writer)
    }

    /// Hand the queue's producer half to the render callback. Available
    /// once.
    pub(crate) fn take_handle(&mut self) -> Result<WriterHandle, RecorderError> {
        self.handle.take().ok_or(RecorderError::WriterClosed)
    }

    /// Drain the queue, finalize the file, and return the frame count.
    pub(crate) fn close(mut self) -> Result<u64, RecorderError> {
        self.stop.store(true, Ordering::Release);
        self.handle = None;
        let thread = self.thread.take().ok_or(RecorderError::WriterClosed)?;
        let frames = thread
            .join()
            .map_err(|_| RecorderError::WriterClosed)??;
        debug!(frames, "destination finalized");
        Ok(frames)
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.handle = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("writer thread panicked during teardown");
            }
        }
    }
}
