//! # Decoder Error Types
//!
//! Typed failures for decoder sessions. Every variant carries the context a
//! caller needs to render a message (backend status code, measured values),
//! but no user-facing text beyond the `Display` summary.

use crate::backend::{BackendError, CodecId};
use thiserror::Error;

/// Errors that can occur while opening or driving a decoder session.
#[derive(Error, Debug)]
pub enum DecoderError {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// The file could not be opened or is not a recognized container.
    #[error("Could not open file {path} ({code})")]
    OpenFailure {
        path: String,
        code: i32,
        #[source]
        source: BackendError,
    },

    /// Stream metadata could not be read from the container.
    #[error("Could not find stream information for file {path}")]
    ProbeFailure {
        path: String,
        #[source]
        source: BackendError,
    },

    /// The container declares no audio stream.
    #[error("Could not find an audio stream in file {path}")]
    NoAudioStream { path: String },

    /// The reported duration is longer than the configured maximum.
    ///
    /// `seconds` is the whole duration in seconds, `minutes` the same
    /// duration truncated to whole minutes.
    #[error(
        "Duration {minutes}:{:02} exceeds specified maximum ({max_minutes}:00)",
        .seconds % 60
    )]
    DurationExceeded {
        minutes: u64,
        seconds: u64,
        max_minutes: u32,
    },

    /// No decoder is registered for the selected stream's codec.
    #[error("Audio stream has unsupported codec {codec}")]
    UnsupportedCodec { codec: CodecId },

    /// A decoder exists but refused to open.
    #[error("Could not open audio codec {codec} ({code})")]
    CodecOpenFailure {
        codec: String,
        code: i32,
        #[source]
        source: BackendError,
    },

    /// The sample format conversion context could not be built.
    #[error("Could not create resample context: {0}")]
    ResamplerInitFailure(String),

    // ========================================================================
    // Decode Errors
    // ========================================================================
    /// More packets failed to decode than the session tolerates.
    #[error("Too many bad packets (threshold {threshold})")]
    TooManyBadPackets { threshold: u32 },

    /// Decoded samples could not be converted to signed 16-bit.
    ///
    /// Not counted against the bad-packet budget.
    #[error("Could not resample decoded audio: {0}")]
    ResampleFailure(String),

    /// The container failed with an unrecoverable read error.
    #[error("Could not read packet: {source}")]
    ReadFailure {
        #[source]
        source: BackendError,
    },

    /// The session already failed fatally and cannot decode further.
    #[error("Decoder session already terminated")]
    SessionTerminated,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Decoder configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DecoderError {
    /// Returns `true` if this error can only be raised while opening a session.
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            DecoderError::OpenFailure { .. }
                | DecoderError::ProbeFailure { .. }
                | DecoderError::NoAudioStream { .. }
                | DecoderError::DurationExceeded { .. }
                | DecoderError::UnsupportedCodec { .. }
                | DecoderError::CodecOpenFailure { .. }
                | DecoderError::ResamplerInitFailure(_)
        )
    }

    /// Returns `true` if this error ends an already opened session.
    pub fn terminates_session(&self) -> bool {
        matches!(
            self,
            DecoderError::TooManyBadPackets { .. }
                | DecoderError::ResampleFailure(_)
                | DecoderError::ReadFailure { .. }
                | DecoderError::SessionTerminated
        )
    }

    /// Returns `true` if no further audio can be obtained from the file.
    pub fn is_fatal(&self) -> bool {
        self.is_construction_failure() || self.terminates_session()
    }

    /// Returns `true` if this error is related to the file's format or codec.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            DecoderError::OpenFailure { .. }
                | DecoderError::ProbeFailure { .. }
                | DecoderError::NoAudioStream { .. }
                | DecoderError::UnsupportedCodec { .. }
        )
    }

    /// Backend status code carried by the error, if any.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            DecoderError::OpenFailure { code, .. }
            | DecoderError::CodecOpenFailure { code, .. } => Some(*code),
            DecoderError::ProbeFailure { source, .. } | DecoderError::ReadFailure { source } => {
                Some(source.status_code())
            }
            _ => None,
        }
    }
}

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, DecoderError>;
