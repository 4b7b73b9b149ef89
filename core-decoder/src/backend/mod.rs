//! # Codec Backend Adapter
//!
//! Thin call boundary between decoder sessions and the library that actually
//! demuxes containers and decodes codecs.
//!
//! ## Contract
//!
//! A backend is split into three capabilities, each a trait object so that a
//! session never depends on a concrete library:
//!
//! 1. [`CodecBackend`]: opens and recognizes containers
//! 2. [`Container`]: probes streams, resolves codecs by id, opens decoders and
//!    reads coded packets
//! 3. [`StreamDecoder`]: turns packet bytes into native PCM
//!
//! ```text
//! path → CodecBackend::open_container → Container ─┬─ read_next_packet → Packet
//!                                                  └─ open_decoder → StreamDecoder
//! ```
//!
//! `close()` on both [`Container`] and [`StreamDecoder`] must be idempotent and
//! safe on partially initialized state.
//!
//! ## Shared codec lock
//!
//! Backends keep process-global codec registration state. Opening and closing
//! decoders must therefore be serialized across every session in the process
//! by holding [`codec_lock()`]. Packet reads, decode steps and sample
//! conversion run without the lock and may proceed in parallel across
//! sessions.

mod format_detector;
mod symphonia;

pub use self::format_detector::FormatDetector;
pub use self::symphonia::SymphoniaBackend;

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Process-wide lock around codec open/close.
static CODEC_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Acquire the process-wide codec lock.
///
/// Hold the guard for the duration of any decoder open or close. Never hold
/// it across packet decoding.
pub fn codec_lock() -> MutexGuard<'static, ()> {
    CODEC_LOCK.lock()
}

/// Returns `true` while some thread holds the codec lock.
pub fn codec_lock_held() -> bool {
    CODEC_LOCK.is_locked()
}

/// Result type for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Failures reported by a codec backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Negative errno-style status code for this failure.
    pub fn status_code(&self) -> i32 {
        match self {
            BackendError::Io(err) => -err.raw_os_error().unwrap_or(5),
            BackendError::Unsupported(_) => -38,
            BackendError::Malformed(_) => -22,
            BackendError::Other(_) => -1,
        }
    }
}

// ============================================================================
// Stream Types
// ============================================================================

/// Media type a stream is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    Subtitle,
    Data,
    Unknown,
}

/// Backend-specific codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodecId(pub u32);

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// One stream as declared by the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Position of the stream in declaration order
    pub index: usize,
    pub media_type: MediaType,
    pub codec: CodecId,
}

impl StreamInfo {
    pub fn new(index: usize, media_type: MediaType, codec: CodecId) -> Self {
        Self {
            index,
            media_type,
            codec,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == MediaType::Audio
    }
}

/// A decoder the backend has registered for some codec id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub id: CodecId,
    /// Short name, e.g. "mp3"
    pub name: String,
    /// Human-readable name, e.g. "MPEG Audio Layer 3"
    pub long_name: String,
}

/// One coded packet read from the container.
///
/// Transient: the session consumes it immediately and drops it.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream_index: usize,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(stream_index: usize, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_index,
            payload: payload.into(),
        }
    }
}

// ============================================================================
// Sample Types
// ============================================================================

/// Native representation of decoded samples.
///
/// Samples are always interleaved and stored in native byte order. Backends
/// widen exotic widths (8-bit signed, 24-bit, unsigned 16/32-bit) into the
/// nearest listed representation without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// The canonical output representation.
    pub const CANONICAL: SampleFormat = SampleFormat::S16;

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "flt",
            SampleFormat::F64 => "dbl",
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self == Self::CANONICAL
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Native output parameters of an opened decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFormat {
    /// Sample representation, if the codec declares it before decoding
    pub sample_format: Option<SampleFormat>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Outcome of one decode call on a (possibly partial) packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStep {
    /// Payload bytes consumed by this call
    pub consumed: usize,
    /// Interleaved samples written to the scratch buffer (may be zero)
    pub samples: usize,
    /// Representation of the samples written
    pub format: SampleFormat,
}

// ============================================================================
// Backend Traits
// ============================================================================

/// Entry point of a codec backend.
pub trait CodecBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Open and recognize the container at `path`.
    fn open_container(&self, path: &Path) -> BackendResult<Box<dyn Container>>;
}

/// An opened container.
pub trait Container: Send {
    /// List streams in declaration order.
    fn probe_streams(&mut self) -> BackendResult<Vec<StreamInfo>>;

    /// Container duration, if the metadata declares one.
    fn duration(&self) -> Option<Duration>;

    /// Look up the decoder registered for `codec`.
    fn find_codec(&self, codec: CodecId) -> Option<CodecDescriptor>;

    /// Open a decoder for the stream at `stream_index`.
    ///
    /// Callers must hold [`codec_lock()`].
    fn open_decoder(
        &mut self,
        stream_index: usize,
        codec: &CodecDescriptor,
    ) -> BackendResult<Box<dyn StreamDecoder>>;

    /// Read the next coded packet. `Ok(None)` marks end of stream; errors are
    /// reserved for unrecoverable I/O.
    fn read_next_packet(&mut self) -> BackendResult<Option<Packet>>;

    /// Release the container. Idempotent.
    fn close(&mut self);
}

/// An opened decoder for one stream.
pub trait StreamDecoder: Send {
    fn native_format(&self) -> NativeFormat;

    /// Largest decoded output, in bytes, a single decode call may produce.
    fn max_frame_bytes(&self) -> usize;

    /// Decode a prefix of `payload`, appending interleaved native samples to
    /// `out`.
    ///
    /// May be called repeatedly on the remainder of the same packet. Emitting
    /// zero samples is valid and means "keep feeding".
    fn decode(&mut self, payload: &[u8], out: &mut BytesMut) -> BackendResult<DecodeStep>;

    /// Release the decoder. Idempotent. Callers must hold [`codec_lock()`].
    fn close(&mut self) -> BackendResult<()>;
}
