//! # Decoded Audio Records
//!
//! Append-only sample store handed to downstream analysis.

use std::time::Duration;

/// Decoded, channel-interleaved audio with its stream metadata.
///
/// Samples can only be appended. The write position always sits at the end
/// of the current content.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    frame_rate: u32,
    channels: u16,
    samples: Vec<f32>,
    write_pos: usize,
}

impl AudioData {
    pub fn new(frame_rate: u32, channels: u16) -> Self {
        Self {
            frame_rate,
            channels,
            samples: Vec::new(),
            write_pos: 0,
        }
    }

    /// Create an empty record with room for `capacity` samples.
    pub fn with_capacity(frame_rate: u32, channels: u16, capacity: usize) -> Self {
        Self {
            frame_rate,
            channels,
            samples: Vec::with_capacity(capacity),
            write_pos: 0,
        }
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Append one sample at the write position.
    pub fn append(&mut self, sample: f32) {
        self.samples.push(sample);
        self.write_pos += 1;
        debug_assert_eq!(self.write_pos, self.samples.len());
    }

    /// Append canonical signed 16-bit samples, widened to `f32` unscaled.
    pub fn extend_from_i16(&mut self, samples: &[i16]) {
        self.samples.reserve(samples.len());
        for &sample in samples {
            self.append(f32::from(sample));
        }
    }

    /// Append every sample of `other`.
    ///
    /// Used to concatenate successive records of one session, so the stream
    /// metadata of both records is expected to match.
    pub fn append_record(&mut self, other: &AudioData) {
        debug_assert_eq!(self.frame_rate, other.frame_rate);
        debug_assert_eq!(self.channels, other.channels);

        self.samples.reserve(other.samples.len());
        for &sample in &other.samples {
            self.append(sample);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of whole frames (one sample per channel) held.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    /// Playback duration of the held frames.
    pub fn duration(&self) -> Duration {
        if self.frame_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.frame_rate))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<f32> {
        self.samples.get(index).copied()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_advances_write_position() {
        let mut data = AudioData::new(44100, 2);
        assert!(data.is_empty());

        data.append(1.0);
        data.append(-1.0);
        data.append(0.5);

        assert_eq!(data.sample_count(), 3);
        assert_eq!(data.frame_count(), 1);
        assert_eq!(data.sample(2), Some(0.5));
        assert_eq!(data.sample(3), None);
    }

    #[test]
    fn test_extend_from_i16_is_unscaled() {
        let mut data = AudioData::new(8000, 1);
        data.extend_from_i16(&[i16::MIN, 0, i16::MAX]);
        assert_eq!(data.samples(), &[-32768.0, 0.0, 32767.0]);
    }

    #[test]
    fn test_append_record_concatenates() {
        let mut first = AudioData::new(48000, 2);
        first.extend_from_i16(&[1, 2]);
        let mut second = AudioData::new(48000, 2);
        second.extend_from_i16(&[3, 4, 5, 6]);

        first.append_record(&second);

        assert_eq!(first.into_samples(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_duration() {
        let mut data = AudioData::with_capacity(4, 2, 16);
        data.extend_from_i16(&[0; 16]);
        assert_eq!(data.frame_count(), 8);
        assert_eq!(data.duration(), Duration::from_secs(2));

        let silent = AudioData::new(0, 0);
        assert_eq!(silent.frame_count(), 0);
        assert_eq!(silent.duration(), Duration::ZERO);
    }
}
