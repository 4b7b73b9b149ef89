//! # Decoder Session
//!
//! One session decodes one file from start to end.
//!
//! ## Lifecycle
//!
//! ```text
//! open ──> Ready ──decode_next_audio_packet──> Ready ... ──> Exhausted
//!            │                                   │
//!            └──────────── fatal error ──────────┴──> Failed
//! ```
//!
//! Opening validates the file completely before returning: container,
//! stream metadata, audio stream, duration policy, codec and format
//! normalization. Any failure releases whatever was acquired so far.
//!
//! Backend resources are released exactly once, either by [`DecoderSession::close`]
//! or on drop, with the process-wide codec lock held.

use crate::audio_data::AudioData;
use crate::backend::{
    codec_lock, BackendError, CodecBackend, Container, NativeFormat, SymphoniaBackend,
};
use crate::config::DecoderConfig;
use crate::driver::{BadPacketTracker, PacketDriver};
use crate::error::{DecoderError, Result};
use crate::resampler::Resampler;
use crate::selector;
use core_runtime::logging::strip_path;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Decoding state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// More packets may be available.
    Ready,
    /// The container reported end of stream.
    Exhausted,
    /// A fatal error ended decoding.
    Failed,
}

/// Backend handles owned by a session.
///
/// Every field starts released, so a partially built set can always be torn
/// down.
#[derive(Default)]
struct SessionResources {
    container: Option<Box<dyn Container>>,
    driver: Option<PacketDriver>,
    /// Name of the codec held by `driver`
    codec_name: String,
}

impl SessionResources {
    fn is_released(&self) -> bool {
        self.container.is_none() && self.driver.is_none()
    }

    /// Release everything still held. Callers must hold the codec lock.
    fn release(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if let Err(err) = driver.close() {
                log_close_failure(&err, &self.codec_name);
            }
        }

        if let Some(mut container) = self.container.take() {
            container.close();
        }
    }
}

/// Everything learned while opening a file.
struct Prepared {
    stream_index: usize,
    codec_name: String,
    native: NativeFormat,
    duration: Option<Duration>,
}

/// Decoder for a single audio file.
///
/// Produces one [`AudioData`] record per coded packet of the selected audio
/// stream. Records carry canonical signed 16-bit samples widened to `f32`.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = DecoderSession::new("song.flac", 60)?;
/// while let Some(record) = session.decode_next_audio_packet()? {
///     analyse(record.samples());
/// }
/// ```
pub struct DecoderSession {
    path: String,
    stream_index: usize,
    codec_name: String,
    native: NativeFormat,
    duration: Option<Duration>,
    bad_packets: BadPacketTracker,
    resources: SessionResources,
    state: SessionState,
}

impl DecoderSession {
    /// Open `path` with the default backend, rejecting files longer than
    /// `max_duration_minutes`.
    pub fn new(path: impl AsRef<Path>, max_duration_minutes: u32) -> Result<Self> {
        Self::open(path, &DecoderConfig::new(max_duration_minutes))
    }

    /// Open `path` with the default backend.
    pub fn open(path: impl AsRef<Path>, config: &DecoderConfig) -> Result<Self> {
        Self::open_with(&SymphoniaBackend::new(), path, config)
    }

    /// Open `path` through `backend`.
    ///
    /// Holds the codec lock for the whole construction.
    #[instrument(skip_all, fields(backend = backend.name()))]
    pub fn open_with(
        backend: &dyn CodecBackend,
        path: impl AsRef<Path>,
        config: &DecoderConfig,
    ) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref().to_string_lossy().into_owned();
        let _guard = codec_lock();

        let mut resources = SessionResources::default();
        let prepared = match Self::prepare(backend, &path, config, &mut resources) {
            Ok(prepared) => prepared,
            Err(err) => {
                resources.release();
                return Err(err);
            }
        };

        info!(
            file = strip_path(&path),
            stream = prepared.stream_index,
            codec = %prepared.codec_name,
            "Opened audio stream"
        );

        Ok(Self {
            path,
            stream_index: prepared.stream_index,
            codec_name: prepared.codec_name,
            native: prepared.native,
            duration: prepared.duration,
            bad_packets: BadPacketTracker::new(config.bad_packet_threshold),
            resources,
            state: SessionState::Ready,
        })
    }

    /// Run every construction step, storing acquired handles in `resources`.
    fn prepare(
        backend: &dyn CodecBackend,
        path: &str,
        config: &DecoderConfig,
        resources: &mut SessionResources,
    ) -> Result<Prepared> {
        let file = strip_path(path);

        let container = backend.open_container(Path::new(path)).map_err(|source| {
            let code = source.status_code();
            warn!(file, code, "Could not open file: {}", source);
            DecoderError::OpenFailure {
                path: path.to_string(),
                code,
                source,
            }
        })?;
        let container = resources.container.insert(container);

        let streams = container.probe_streams().map_err(|source| {
            warn!(file, "Could not find stream information: {}", source);
            DecoderError::ProbeFailure {
                path: path.to_string(),
                source,
            }
        })?;

        let stream = selector::select_audio_stream(&streams)
            .cloned()
            .ok_or_else(|| {
                warn!(file, streams = streams.len(), "Could not find an audio stream");
                DecoderError::NoAudioStream {
                    path: path.to_string(),
                }
            })?;

        let duration = container.duration();
        selector::check_duration(duration, config).map_err(|err| {
            warn!(file, "{}", err);
            err
        })?;

        let codec = container.find_codec(stream.codec).ok_or_else(|| {
            warn!(file, codec = %stream.codec, "Audio stream has unsupported codec");
            DecoderError::UnsupportedCodec {
                codec: stream.codec,
            }
        })?;

        let mut decoder = container
            .open_decoder(stream.index, &codec)
            .map_err(|source| {
                let code = source.status_code();
                warn!(file, code, "Could not open audio codec {}: {}", codec.long_name, source);
                DecoderError::CodecOpenFailure {
                    codec: codec.long_name.clone(),
                    code,
                    source,
                }
            })?;

        let native = decoder.native_format();
        let resampler = match Resampler::new(native) {
            Ok(resampler) => resampler,
            Err(err) => {
                warn!(file, "{}", err);
                if let Err(close_err) = decoder.close() {
                    log_close_failure(&close_err, &codec.long_name);
                }
                return Err(err);
            }
        };

        resources.driver = Some(PacketDriver::new(
            decoder,
            resampler,
            config.bad_packet_threshold,
        ));
        resources.codec_name = codec.long_name.clone();

        debug!(
            file,
            format = native.sample_format.map(|f| f.name()).unwrap_or("unknown"),
            sample_rate = native.sample_rate,
            channels = native.channels,
            "Decoder prepared"
        );

        Ok(Prepared {
            stream_index: stream.index,
            codec_name: codec.long_name,
            native,
            duration,
        })
    }

    /// Decode the next packet of the selected audio stream.
    ///
    /// Returns `Ok(None)` once the stream is exhausted, on this and every
    /// later call. A packet that fails to decode within the bad-packet budget
    /// yields an empty record. After a fatal error every call fails with
    /// [`DecoderError::SessionTerminated`].
    pub fn decode_next_audio_packet(&mut self) -> Result<Option<AudioData>> {
        match self.state {
            SessionState::Exhausted => return Ok(None),
            SessionState::Failed => return Err(DecoderError::SessionTerminated),
            SessionState::Ready => {}
        }

        let result = self.decode_next();
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(file = strip_path(&self.path), "End of audio stream");
                self.state = SessionState::Exhausted;
            }
            Err(err) => {
                self.state = SessionState::Failed;
                if let DecoderError::TooManyBadPackets { .. } = err {
                    warn!(
                        file = strip_path(&self.path),
                        "Too many bad packets ({})",
                        self.bad_packets.count()
                    );
                } else {
                    warn!(file = strip_path(&self.path), "Decoding failed: {}", err);
                }
            }
        }
        result
    }

    fn decode_next(&mut self) -> Result<Option<AudioData>> {
        let (Some(container), Some(driver)) = (
            self.resources.container.as_mut(),
            self.resources.driver.as_mut(),
        ) else {
            return Err(DecoderError::SessionTerminated);
        };

        let packet = loop {
            match container.read_next_packet() {
                Ok(Some(packet)) if packet.stream_index == self.stream_index => break packet,
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(None),
                Err(source) => return Err(DecoderError::ReadFailure { source }),
            }
        };

        let mut record = driver.new_record();
        let outcome = driver.decode_packet(packet.payload, &mut record);
        self.bad_packets = *driver.bad_packets();

        // A recovered packet leaves the record empty
        outcome?;
        Ok(Some(record))
    }

    /// Decode every remaining packet into a single record.
    pub fn decode_to_end(&mut self) -> Result<AudioData> {
        let mut audio = AudioData::new(self.native.sample_rate, self.native.channels);
        while let Some(record) = self.decode_next_audio_packet()? {
            audio.append_record(&record);
        }
        Ok(audio)
    }

    /// Release all backend resources. Idempotent.
    ///
    /// Later decode calls fail with [`DecoderError::SessionTerminated`]
    /// unless the stream was already exhausted.
    pub fn close(&mut self) {
        if self.resources.is_released() {
            return;
        }

        let _guard = codec_lock();
        self.resources.release();
        debug!(file = strip_path(&self.path), "Decoder closed");
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Index of the decoded stream in the container's declaration order.
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    pub fn native_format(&self) -> NativeFormat {
        self.native
    }

    pub fn frame_rate(&self) -> u32 {
        self.native.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.native.channels
    }

    /// Duration reported by the container, if any.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn bad_packet_count(&self) -> u32 {
        self.bad_packets.count()
    }

    pub fn bad_packet_threshold(&self) -> u32 {
        self.bad_packets.threshold()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl Iterator for DecoderSession {
    type Item = Result<AudioData>;

    /// Yields records until end of stream, or a single error after which
    /// iteration ends.
    fn next(&mut self) -> Option<Self::Item> {
        if self.state != SessionState::Ready {
            return None;
        }
        self.decode_next_audio_packet().transpose()
    }
}

impl Drop for DecoderSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DecoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSession")
            .field("path", &self.path)
            .field("stream_index", &self.stream_index)
            .field("codec_name", &self.codec_name)
            .field("native", &self.native)
            .field("bad_packets", &self.bad_packets)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn log_close_failure(err: &BackendError, codec_name: &str) {
    error!(
        codec = codec_name,
        code = err.status_code(),
        "Error closing audio codec: {}",
        err
    );
}
