//! # Stream Selection and Validation
//!
//! Picks the audio stream a session decodes and applies the maximum-duration
//! policy before any decoder is opened.

use crate::backend::StreamInfo;
use crate::config::DecoderConfig;
use crate::error::{DecoderError, Result};
use std::time::Duration;

/// First audio stream in declaration order.
pub fn select_audio_stream(streams: &[StreamInfo]) -> Option<&StreamInfo> {
    streams.iter().find(|stream| stream.is_audio())
}

/// Apply the maximum-duration policy to a container's reported duration.
///
/// Durations of `duration_sanity_ceiling_minutes` or more are accepted
/// unchecked: some encoders grossly overestimate duration in their headers.
/// An unknown duration is accepted as well.
pub fn check_duration(duration: Option<Duration>, config: &DecoderConfig) -> Result<()> {
    let Some(duration) = duration else {
        return Ok(());
    };

    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    let max_seconds = u64::from(config.max_duration_minutes) * 60;

    if minutes < u64::from(config.duration_sanity_ceiling_minutes) && seconds > max_seconds {
        return Err(DecoderError::DurationExceeded {
            minutes,
            seconds,
            max_minutes: config.max_duration_minutes,
        });
    }

    Ok(())
}
