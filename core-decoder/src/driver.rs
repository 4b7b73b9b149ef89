//! # Packet Driver
//!
//! Feeds one coded packet at a time through the opened decoder and the
//! format normalizer, enforcing the session's bad-packet budget.
//!
//! ## Packet loop
//!
//! A packet may hold several codec frames. The decoder is called on the
//! remaining payload until every byte is consumed:
//!
//! ```text
//! payload ──decode──> (consumed, samples) ──normalize──> i16 ──> AudioData
//!    ▲                     │
//!    └──── advance(consumed)
//! ```
//!
//! A step that emits no samples is not an error. A failing step aborts the
//! packet: it counts against the budget and the packet contributes nothing.

use crate::audio_data::AudioData;
use crate::backend::{BackendError, BackendResult, DecodeStep, StreamDecoder};
use crate::error::{DecoderError, Result};
use crate::resampler::{self, Resampler};
use bytes::{Buf, Bytes, BytesMut};
use tracing::{trace, warn};

/// Consecutive steps that emit samples without consuming input before the
/// packet is treated as stalled.
pub const MAX_STALLED_STEPS: u32 = 64;

/// Result of driving one packet through the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// The whole payload decoded; `samples` were appended to the record.
    Decoded { samples: usize },
    /// A decode step failed within budget. Nothing was appended.
    Recovered { bad_packets: u32 },
}

/// Cumulative count of failed packets against a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadPacketTracker {
    count: u32,
    threshold: u32,
}

impl BadPacketTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            count: 0,
            threshold,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Count one more bad packet. Fails once the count exceeds the threshold.
    pub fn record(&mut self) -> Result<u32> {
        self.count = self.count.saturating_add(1);
        if self.count > self.threshold {
            return Err(DecoderError::TooManyBadPackets {
                threshold: self.threshold,
            });
        }
        Ok(self.count)
    }
}

/// Drives packets through an opened decoder.
///
/// Owns the decoder and the scratch buffers, which are sized once and reused
/// for every packet.
pub struct PacketDriver {
    decoder: Box<dyn StreamDecoder>,
    resampler: Resampler,
    /// Native samples of the current decode step
    scratch: BytesMut,
    /// Canonical samples of the current packet
    converted: Vec<i16>,
    bad_packets: BadPacketTracker,
}

impl PacketDriver {
    pub fn new(
        decoder: Box<dyn StreamDecoder>,
        resampler: Resampler,
        bad_packet_threshold: u32,
    ) -> Self {
        let scratch = BytesMut::with_capacity(decoder.max_frame_bytes());
        Self {
            decoder,
            resampler,
            scratch,
            converted: Vec::new(),
            bad_packets: BadPacketTracker::new(bad_packet_threshold),
        }
    }

    pub fn bad_packets(&self) -> &BadPacketTracker {
        &self.bad_packets
    }

    /// An empty record in the normalizer's output layout.
    pub fn new_record(&self) -> AudioData {
        AudioData::new(self.resampler.sample_rate(), self.resampler.channels())
    }

    /// Decode every frame in `payload`, appending canonical samples to
    /// `record`.
    ///
    /// Returns `TooManyBadPackets` when a failure exceeds the budget and
    /// `ResampleFailure` when normalization fails. Neither is recoverable.
    pub fn decode_packet(
        &mut self,
        payload: Bytes,
        record: &mut AudioData,
    ) -> Result<PacketOutcome> {
        let mut remaining = payload;
        let mut stalled = 0;
        self.converted.clear();

        while remaining.has_remaining() {
            self.scratch.clear();

            let step = match self.decode_step(remaining.chunk(), &mut stalled) {
                Ok(step) => step,
                Err(err) => {
                    let bad_packets = self.bad_packets.record()?;
                    warn!(
                        error = %err,
                        "Bad packet ({}/{})",
                        bad_packets,
                        self.bad_packets.threshold()
                    );
                    return Ok(PacketOutcome::Recovered { bad_packets });
                }
            };

            if step.samples > 0 {
                self.normalize(&step)?;
            }

            trace!(consumed = step.consumed, samples = step.samples, "Decode step");
            remaining.advance(step.consumed);
        }

        record.extend_from_i16(&self.converted);
        Ok(PacketOutcome::Decoded {
            samples: self.converted.len(),
        })
    }

    /// One decoder call, with steps that cannot make progress reported as
    /// failures.
    fn decode_step(&mut self, payload: &[u8], stalled: &mut u32) -> BackendResult<DecodeStep> {
        let step = self.decoder.decode(payload, &mut self.scratch)?;

        if step.consumed > payload.len() {
            return Err(BackendError::Other(format!(
                "decoder consumed {} bytes of {} remaining",
                step.consumed,
                payload.len()
            )));
        }

        if step.consumed == 0 && step.samples == 0 {
            return Err(BackendError::Other("decoder made no progress".to_string()));
        }

        if step.consumed == 0 {
            *stalled += 1;
            if *stalled > MAX_STALLED_STEPS {
                return Err(BackendError::Other(format!(
                    "decoder consumed nothing for {} steps",
                    stalled
                )));
            }
        } else {
            *stalled = 0;
        }

        Ok(step)
    }

    fn normalize(&mut self, step: &DecodeStep) -> Result<()> {
        let expected = step.samples * step.format.bytes_per_sample();
        if self.scratch.len() != expected {
            return Err(DecoderError::ResampleFailure(format!(
                "decoder reported {} {} samples but wrote {} bytes",
                step.samples,
                step.format,
                self.scratch.len()
            )));
        }

        if step.format.is_canonical() {
            resampler::copy_canonical(&self.scratch, &mut self.converted);
        } else {
            self.resampler
                .convert(step.format, &self.scratch, &mut self.converted)?;
        }

        Ok(())
    }

    /// Release the decoder. Callers must hold the codec lock.
    pub fn close(&mut self) -> BackendResult<()> {
        self.decoder.close()
    }
}
