//! Stream format negotiation.
//!
//! Every boundary in the pipeline carries a canonical [`StreamFormat`]:
//! the hardware capture leg uses 32-bit fixed-point samples, the stages
//! between converter and mixer exchange 32-bit float (the mixer works in
//! float), and the destination file stores interleaved 16-bit signed PCM.
//! Formats are derived once per session and reused at every port that must
//! agree with them; a mismatch between adjacent ports is a configuration
//! error caught at graph initialization.

/// Fraction bits of the fixed-point hardware sample format (Q8.24).
pub const SAMPLE_FRACTION_BITS: u32 = 24;

/// Value of 1.0 in the fixed-point hardware format.
pub(crate) const FIXED_ONE: f32 = (1u32 << SAMPLE_FRACTION_BITS) as f32;

/// Convert a normalized float sample to the hardware fixed-point format.
#[inline]
pub(crate) fn float_to_fixed(sample: f32) -> i32 {
    (sample * FIXED_ONE) as i32
}

/// How samples are encoded within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    SignedInteger,
    Float,
}

/// Full description of a PCM buffer layout at one graph boundary.
///
/// Immutable once applied to a stage port. All formats produced here are
/// packed uncompressed PCM, so `frames_per_packet` is always 1 and
/// `bytes_per_frame == bits_per_channel / 8 * channels`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channels: u32,
    pub bits_per_channel: u32,
    pub interleaved: bool,
    pub sample_kind: SampleKind,
    pub bytes_per_frame: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
}

impl StreamFormat {
    fn packed(
        sample_rate: f64,
        channels: u32,
        bits_per_channel: u32,
        sample_kind: SampleKind,
        interleaved: bool,
    ) -> Self {
        let bytes_per_frame = bits_per_channel / 8 * channels;
        Self {
            sample_rate,
            channels,
            bits_per_channel,
            interleaved,
            sample_kind,
            bytes_per_frame,
            bytes_per_packet: bytes_per_frame,
            frames_per_packet: 1,
        }
    }

    /// Hardware-facing capture format: non-interleaved 32-bit fixed point
    /// (Q8.24), native endian, packed.
    pub fn hardware(sample_rate: f64, channels: u32) -> Self {
        Self::packed(sample_rate, channels, 32, SampleKind::SignedInteger, false)
    }

    /// Internal client format between converter and mixer: non-interleaved
    /// 32-bit float, packed.
    pub fn client(sample_rate: f64, channels: u32) -> Self {
        Self::packed(sample_rate, channels, 32, SampleKind::Float, false)
    }

    /// Destination archival format: interleaved 16-bit signed PCM, packed.
    pub fn destination(sample_rate: f64, channels: u32) -> Self {
        Self::packed(sample_rate, channels, 16, SampleKind::SignedInteger, true)
    }
}

/// The three boundary formats of one recorder session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NegotiatedFormats {
    pub hardware: StreamFormat,
    pub client: StreamFormat,
    pub destination: StreamFormat,
}

/// Derive the formats for every boundary in the pipeline from the session
/// sample rate and channel count.
pub fn negotiate(sample_rate: f64, channels: u32) -> NegotiatedFormats {
    NegotiatedFormats {
        hardware: StreamFormat::hardware(sample_rate, channels),
        client: StreamFormat::client(sample_rate, channels),
        destination: StreamFormat::destination(sample_rate, channels),
    }
}
