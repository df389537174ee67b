//! Records five seconds from the default microphone into `recording.wav`.
//!
//! ```sh
//! cargo run --example record_mic --features cpal_input
//! ```

use std::thread;
use std::time::Duration;

use aufnahme::capture::MicInput;
use aufnahme::{DefaultSession, Recorder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut recorder = Recorder::new("recording.wav", DefaultSession)?;
    let feeder = recorder.take_feeder()?;
    let _mic = MicInput::open(feeder, 44_100.0)?;

    println!("recording 5 seconds...");
    recorder.start()?;
    thread::sleep(Duration::from_secs(5));
    recorder.stop()?;

    let diagnostics = recorder.diagnostics();
    println!(
        "wrote recording.wav ({} blocks rendered, {} underrun frames)",
        diagnostics.blocks_rendered, diagnostics.input_underrun_frames
    );
    Ok(())
}
