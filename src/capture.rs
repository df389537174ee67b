//! Microphone capture through cpal.
//!
//! Bridges the platform input device to the recorder's capture queue: the
//! stream callback converts whatever the device delivers to stereo float
//! frames and pushes them through the [`CaptureFeeder`]. No resampling is
//! performed; pick a session rate the device supports.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample};
use tracing::{info, warn};

use crate::error::RecorderError;
use crate::stages::CaptureFeeder;

/// An open microphone stream feeding the capture queue. Capture stops when
/// this is dropped.
pub struct MicInput {
    _stream: cpal::Stream,
}

impl MicInput {
    /// Open the default input device and start streaming into `feeder`.
    pub fn open(feeder: CaptureFeeder, sample_rate: f64) -> Result<Self, RecorderError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| RecorderError::Capture("no input device available".to_string()))?;
        let config = device
            .default_input_config()
            .map_err(|e| RecorderError::Capture(e.to_string()))?;

        if config.sample_rate().0 as f64 != sample_rate {
            warn!(
                device_rate = config.sample_rate().0,
                session_rate = sample_rate,
                "device rate differs from the session rate; audio will play back off-speed"
            );
        }
        info!(
            device = device.name().unwrap_or_else(|_| "unknown".to_string()),
            rate = config.sample_rate().0,
            channels = config.channels(),
            format = ?config.sample_format(),
            "opening input stream"
        );

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), feeder)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), feeder)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), feeder)?,
            other => {
                return Err(RecorderError::Capture(format!(
                    "unsupported sample format {other}"
                )))
            }
        };
        stream
            .play()
            .map_err(|e| RecorderError::Capture(e.to_string()))?;

        Ok(Self { _stream: stream })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut feeder: CaptureFeeder,
) -> Result<cpal::Stream, RecorderError>
where
    T: cpal::SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let err_fn = |err| warn!(error = %err, "input stream error");

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for chunk in data.chunks(channels) {
                    let left = f32::from_sample(chunk[0]);
                    let right = chunk.get(1).map(|&s| f32::from_sample(s)).unwrap_or(left);
                    // A full queue drops the frame; the graph reports the
                    // gap as an underrun on the other side.
                    feeder.push(&[(left, right)]);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| RecorderError::Capture(e.to_string()))?;

    Ok(stream)
}
