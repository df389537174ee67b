//! End-to-end recorder tests: real clock thread, real writer thread, real
//! files. Audio is fed through the capture queue instead of a microphone.

use std::path::Path;
use std::thread;
use std::time::Duration;

use aufnahme::{DefaultSession, GraphState, InterruptionEvent, Recorder, RecorderConfig};
use dasp_signal::{self as signal, Signal};

fn left_channel(path: &Path) -> Vec<i16> {
    let mut reader = hound::WavReader::open(path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert_eq!(reader.spec().bits_per_sample, 16);
    reader
        .samples::<i16>()
        .map(|s| s.unwrap())
        .step_by(2)
        .collect()
}

#[test]
fn stop_without_start_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let mut recorder = Recorder::new(&path, DefaultSession).unwrap();

    recorder.stop().unwrap();
    recorder.stop().unwrap();

    assert!(!recorder.is_running());
    assert_eq!(recorder.state(), GraphState::Initialized);
    assert!(!path.exists());
}

#[test]
fn restarting_overwrites_the_previous_take() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let mut recorder = Recorder::new(&path, DefaultSession).unwrap();

    recorder.start().unwrap();
    thread::sleep(Duration::from_millis(400));
    recorder.stop().unwrap();
    let first_take = left_channel(&path).len();

    recorder.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    recorder.stop().unwrap();
    let second_take = left_channel(&path).len();

    // The destination holds only the shorter second take.
    assert!(second_take > 0);
    assert!(second_take < first_take);

    // Both takes landed in the same single file.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert!(recorder.diagnostics().blocks_rendered > 0);
}

#[test]
fn records_a_tone_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let config = RecorderConfig::default().with_capture_queue_frames(1 << 16);
    let mut recorder = Recorder::with_config(&path, DefaultSession, config).unwrap();
    let mut feeder = recorder.take_feeder().unwrap();

    // One second of 440 Hz at half amplitude, queued before the clock runs
    // so the take starts with the tone.
    let mut sine = signal::rate(44_100.0).const_hz(440.0).sine();
    let frames: Vec<(f32, f32)> = (0..44_100)
        .map(|_| {
            let s = (sine.next() * 0.5) as f32;
            (s, s)
        })
        .collect();
    assert_eq!(feeder.push(&frames), frames.len());

    recorder.start().unwrap();
    thread::sleep(Duration::from_millis(1_300));
    recorder.stop().unwrap();

    let left = left_channel(&path);
    assert!(left.len() >= 44_100, "short take: {} frames", left.len());

    let crossings = left[..44_100]
        .windows(2)
        .filter(|w| (w[0] < 0) != (w[1] < 0))
        .count();
    assert!(
        (870..=890).contains(&crossings),
        "expected ~880 zero crossings, found {crossings}"
    );
}

#[test]
fn interruption_pauses_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let mut recorder = Recorder::new(&path, DefaultSession).unwrap();
    let mut feeder = recorder.take_feeder().unwrap();

    recorder.start().unwrap();
    thread::sleep(Duration::from_millis(150));

    recorder.on_interruption(InterruptionEvent::Began).unwrap();
    assert!(!recorder.is_running());
    // The interrupted take is already a finalized, readable file.
    let interrupted = left_channel(&path);
    assert!(!interrupted.is_empty());

    recorder.on_interruption(InterruptionEvent::Ended).unwrap();
    assert!(recorder.is_running());

    // A ramp climbing two 16-bit quanta per frame, starting above zero so
    // it stands apart from underrun silence on readback.
    let ramp_len = 8_820usize;
    let frames: Vec<(f32, f32)> = (1..=ramp_len)
        .map(|k| {
            let v = k as f32 * 2.0 / 32_767.0;
            (v, v)
        })
        .collect();
    assert_eq!(feeder.push(&frames), frames.len());
    thread::sleep(Duration::from_millis(300));
    recorder.stop().unwrap();

    // The resumed take replaced the interrupted one and carries every fed
    // frame exactly once, in order (silence may pad around the ramp, never
    // inside a reordering).
    let resumed = left_channel(&path);
    let ramp: Vec<i16> = resumed.iter().copied().filter(|&s| s > 0).collect();
    assert_eq!(ramp.len(), ramp_len, "ramp frames lost or duplicated");
    for window in ramp.windows(2) {
        let step = window[1] - window[0];
        assert!(
            (1..=3).contains(&step),
            "ramp broke order across the resume: {} -> {}",
            window[0],
            window[1]
        );
    }

    let diagnostics = recorder.diagnostics();
    assert!(diagnostics.blocks_rendered > 0);
    assert!(diagnostics.input_underrun_frames > 0);
}
