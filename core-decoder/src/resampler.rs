//! # Sample Format Normalizer
//!
//! Converts interleaved native samples into the canonical signed 16-bit
//! representation. Channel count and sample rate pass through unchanged; only
//! the sample representation is normalized.
//!
//! Conversions follow Symphonia's `FromSample` rules: floating-point input is
//! clamped to [-1.0, 1.0] and scaled, wider integers keep their most
//! significant bits and unsigned 8-bit input is re-centered on zero.

use crate::backend::{NativeFormat, SampleFormat};
use crate::error::{DecoderError, Result};
use bytes::Buf;
use symphonia::core::conv::FromSample;

/// Largest channel count the normalizer accepts.
pub const MAX_CHANNELS: u16 = 64;

/// Conversion context bound to one decoder's native output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    sample_rate: u32,
    channels: u16,
}

impl Resampler {
    /// Build a conversion context for `native`.
    ///
    /// Input and output rate and channel count are identical.
    pub fn new(native: NativeFormat) -> Result<Self> {
        if native.channels == 0 {
            return Err(DecoderError::ResamplerInitFailure(
                "decoder reports no channels".to_string(),
            ));
        }

        if native.channels > MAX_CHANNELS {
            return Err(DecoderError::ResamplerInitFailure(format!(
                "{} channels exceeds the supported maximum of {}",
                native.channels, MAX_CHANNELS
            )));
        }

        if native.sample_rate == 0 {
            return Err(DecoderError::ResamplerInitFailure(
                "decoder reports a zero sample rate".to_string(),
            ));
        }

        Ok(Self {
            sample_rate: native.sample_rate,
            channels: native.channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Convert a block of native samples, appending to `out`.
    ///
    /// Returns the number of samples appended, always equal to the number of
    /// input samples. Fails if `input` does not hold a whole number of
    /// frames.
    pub fn convert(&self, format: SampleFormat, input: &[u8], out: &mut Vec<i16>) -> Result<usize> {
        let width = format.bytes_per_sample();
        if input.len() % width != 0 {
            return Err(DecoderError::ResampleFailure(format!(
                "{} bytes is not a whole number of {} samples",
                input.len(),
                format
            )));
        }

        let count = input.len() / width;
        if count % usize::from(self.channels) != 0 {
            return Err(DecoderError::ResampleFailure(format!(
                "{} samples is not a whole number of {}-channel frames",
                count, self.channels
            )));
        }

        out.reserve(count);
        let mut cursor = input;
        match format {
            SampleFormat::U8 => drain(&mut cursor, out, |buf| i16::from_sample(buf.get_u8())),
            SampleFormat::S16 => drain(&mut cursor, out, |buf| buf.get_i16_ne()),
            SampleFormat::S32 => drain(&mut cursor, out, |buf| i16::from_sample(buf.get_i32_ne())),
            SampleFormat::F32 => drain(&mut cursor, out, |buf| i16::from_sample(buf.get_f32_ne())),
            SampleFormat::F64 => drain(&mut cursor, out, |buf| i16::from_sample(buf.get_f64_ne())),
        }

        Ok(count)
    }
}

/// Copy samples already in the canonical representation, appending to `out`.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn copy_canonical(input: &[u8], out: &mut Vec<i16>) -> usize {
    let before = out.len();
    out.extend(
        input
            .chunks_exact(2)
            .map(|pair| i16::from_ne_bytes([pair[0], pair[1]])),
    );
    out.len() - before
}

fn drain<F>(cursor: &mut &[u8], out: &mut Vec<i16>, mut read: F)
where
    F: FnMut(&mut &[u8]) -> i16,
{
    while cursor.has_remaining() {
        out.push(read(cursor));
    }
}
