//! # Decoder Configuration
//!
//! Limits applied to every decoder session.

use crate::error::{DecoderError, Result};
use serde::{Deserialize, Serialize};

/// Decoder session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Longest file, in minutes, a session agrees to decode.
    ///
    /// Default: 60 minutes.
    #[serde(default = "default_max_duration_minutes")]
    pub max_duration_minutes: u32,

    /// Number of packet decode failures tolerated per session.
    ///
    /// The failure that pushes the count above this value is fatal.
    ///
    /// Default: 100.
    #[serde(default = "default_bad_packet_threshold")]
    pub bad_packet_threshold: u32,

    /// Reported durations of this many minutes or more bypass the
    /// maximum-duration check.
    ///
    /// Some encoders write wildly overestimated durations into container
    /// headers; this heuristic keeps such files decodable.
    ///
    /// Default: 720 minutes (12 hours).
    #[serde(default = "default_duration_sanity_ceiling_minutes")]
    pub duration_sanity_ceiling_minutes: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_duration_minutes: default_max_duration_minutes(),
            bad_packet_threshold: default_bad_packet_threshold(),
            duration_sanity_ceiling_minutes: default_duration_sanity_ceiling_minutes(),
        }
    }
}

impl DecoderConfig {
    pub fn new(max_duration_minutes: u32) -> Self {
        Self {
            max_duration_minutes,
            ..Default::default()
        }
    }

    pub fn with_max_duration_minutes(mut self, minutes: u32) -> Self {
        self.max_duration_minutes = minutes;
        self
    }

    pub fn with_bad_packet_threshold(mut self, threshold: u32) -> Self {
        self.bad_packet_threshold = threshold;
        self
    }

    pub fn with_duration_sanity_ceiling_minutes(mut self, minutes: u32) -> Self {
        self.duration_sanity_ceiling_minutes = minutes;
        self
    }

    /// Validate configuration values.
    ///
    /// A zero maximum duration is accepted: every file with a known,
    /// non-zero duration under the sanity ceiling is then rejected.
    pub fn validate(&self) -> Result<()> {
        if self.duration_sanity_ceiling_minutes == 0 {
            return Err(DecoderError::Config(
                "duration_sanity_ceiling_minutes must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_max_duration_minutes() -> u32 {
    60
}

fn default_bad_packet_threshold() -> u32 {
    100
}

fn default_duration_sanity_ceiling_minutes() -> u32 {
    720 // 12 hours
}
