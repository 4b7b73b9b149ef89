//! # Symphonia Backend Implementation
//!
//! Default codec backend built on the pure-Rust Symphonia library.
//!
//! Symphonia's three layers map onto the adapter traits:
//!
//! ```text
//! MediaSourceStream → FormatReader (Container) → Decoder (StreamDecoder)
//! ```
//!
//! Symphonia decodes whole packets, so every decode step reports the full
//! payload as consumed. Planar output is interleaved into the session scratch
//! buffer, widening exotic sample widths as documented on [`SampleFormat`].

use super::format_detector::FormatDetector;
use super::{
    BackendError, BackendResult, CodecBackend, CodecDescriptor, CodecId, Container, DecodeStep,
    NativeFormat, Packet, SampleFormat, StreamDecoder, StreamInfo,
};
use bytes::{BufMut, BytesMut};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet as SymphoniaPacket, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::sample::Sample;
use tracing::{debug, instrument, warn};

/// Scratch size used when a codec does not bound its packet size.
const DEFAULT_FRAME_BUFFER_BYTES: usize = 288_000;

/// Upper bound on the scratch size derived from stream headers.
const MAX_FRAME_BUFFER_BYTES: usize = 16 * 1024 * 1024;

/// Scratch bytes for `frames` of `channels` samples at the widest format.
fn frame_buffer_bytes(frames: u64, channels: u16) -> usize {
    usize::try_from(frames)
        .unwrap_or(usize::MAX)
        .saturating_mul(usize::from(channels.max(1)))
        .saturating_mul(SampleFormat::F64.bytes_per_sample())
        .min(MAX_FRAME_BUFFER_BYTES)
}

impl From<SymphoniaError> for BackendError {
    fn from(err: SymphoniaError) -> Self {
        match err {
            SymphoniaError::IoError(e) => BackendError::Io(e),
            SymphoniaError::DecodeError(msg) => BackendError::Malformed(msg.to_string()),
            SymphoniaError::Unsupported(what) => BackendError::Unsupported(what.to_string()),
            SymphoniaError::LimitError(msg) => BackendError::Other(format!("limit: {}", msg)),
            SymphoniaError::SeekError(kind) => BackendError::Other(format!("seek: {:?}", kind)),
            SymphoniaError::ResetRequired => BackendError::Other("reset required".to_string()),
        }
    }
}

/// Codec backend backed by Symphonia's default probe and codec registries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaBackend;

impl SymphoniaBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CodecBackend for SymphoniaBackend {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    #[instrument(skip(self), level = "debug")]
    fn open_container(&self, path: &Path) -> BackendResult<Box<dyn Container>> {
        let file = File::open(path)?;
        let hint = FormatDetector::hint_from_path(path);
        let media_source = Box::new(file) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(media_source, Default::default());

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;

        Ok(Box::new(SymphoniaContainer::new(probed.format)))
    }
}

/// An opened Symphonia format reader.
struct SymphoniaContainer {
    reader: Option<Box<dyn FormatReader>>,
    /// Symphonia track ids in declaration order
    track_ids: Vec<u32>,
}

impl SymphoniaContainer {
    fn new(reader: Box<dyn FormatReader>) -> Self {
        let track_ids = reader.tracks().iter().map(|t| t.id).collect();
        Self {
            reader: Some(reader),
            track_ids,
        }
    }

    fn tracks(&self) -> &[Track] {
        self.reader.as_ref().map(|r| r.tracks()).unwrap_or(&[])
    }

    fn track_duration(params: &CodecParameters) -> Option<Duration> {
        let n_frames = params.n_frames?;

        if let Some(time_base) = params.time_base {
            let time = time_base.calc_time(n_frames);
            return Some(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
        }

        params
            .sample_rate
            .filter(|rate| *rate > 0)
            .map(|rate| Duration::from_secs_f64(n_frames as f64 / rate as f64))
    }
}

impl Container for SymphoniaContainer {
    fn probe_streams(&mut self) -> BackendResult<Vec<StreamInfo>> {
        let tracks = self.tracks();
        if tracks.is_empty() {
            return Err(BackendError::Malformed(
                "container declares no streams".to_string(),
            ));
        }

        Ok(tracks
            .iter()
            .enumerate()
            .map(|(index, track)| {
                StreamInfo::new(
                    index,
                    FormatDetector::media_type(&track.codec_params),
                    FormatDetector::codec_id(track.codec_params.codec),
                )
            })
            .collect())
    }

    fn duration(&self) -> Option<Duration> {
        self.tracks()
            .iter()
            .filter_map(|track| Self::track_duration(&track.codec_params))
            .max()
    }

    fn find_codec(&self, codec: CodecId) -> Option<CodecDescriptor> {
        self.tracks()
            .iter()
            .map(|track| track.codec_params.codec)
            .find(|codec_type| FormatDetector::codec_id(*codec_type) == codec)
            .and_then(FormatDetector::codec_descriptor)
    }

    fn open_decoder(
        &mut self,
        stream_index: usize,
        codec: &CodecDescriptor,
    ) -> BackendResult<Box<dyn StreamDecoder>> {
        let track = self.tracks().get(stream_index).ok_or_else(|| {
            BackendError::Other(format!("no stream at index {}", stream_index))
        })?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        debug!(codec = %codec.name, track_id = track.id, "Opened Symphonia decoder");

        Ok(Box::new(SymphoniaStreamDecoder::new(
            track.id,
            decoder,
            &track.codec_params,
        )?))
    }

    fn read_next_packet(&mut self) -> BackendResult<Option<Packet>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained streams (e.g. concatenated Ogg) change the track
                    // list; the selected stream has ended.
                    warn!("Track list changed mid-stream, treating as end of stream");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            // Drop any metadata revisions read along with this packet
            while !reader.metadata().is_latest() {
                reader.metadata().pop();
            }

            match self.track_ids.iter().position(|id| *id == packet.track_id()) {
                Some(index) => return Ok(Some(Packet::new(index, packet.data))),
                None => {
                    debug!(track_id = packet.track_id(), "Skipping packet for undeclared track");
                    continue;
                }
            }
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed Symphonia format reader");
        }
    }
}

/// An opened Symphonia codec decoder.
struct SymphoniaStreamDecoder {
    decoder: Option<Box<dyn Decoder>>,
    track_id: u32,
    native: NativeFormat,
    max_frame_bytes: usize,
}

impl SymphoniaStreamDecoder {
    fn new(
        track_id: u32,
        decoder: Box<dyn Decoder>,
        track_params: &CodecParameters,
    ) -> BackendResult<Self> {
        // Decoders may fill in parameters the container left out (e.g. AAC
        // channel layout), so prefer theirs.
        let params = decoder.codec_params();

        let sample_rate = params
            .sample_rate
            .or(track_params.sample_rate)
            .ok_or_else(|| BackendError::Malformed("missing sample rate".to_string()))?;

        let channels = params
            .channels
            .or(track_params.channels)
            .map(|ch| ch.count() as u16)
            .unwrap_or(0);

        // PCM decoders leave the sample format unset
        let sample_format = params
            .sample_format
            .or(track_params.sample_format)
            .map(FormatDetector::sample_format)
            .or_else(|| FormatDetector::sample_format_for_codec(params.codec))
            .or_else(|| FormatDetector::sample_format_for_codec(track_params.codec));

        let max_frame_bytes = params
            .max_frames_per_packet
            .or(track_params.max_frames_per_packet)
            .map(|frames| frame_buffer_bytes(frames, channels))
            .unwrap_or(DEFAULT_FRAME_BUFFER_BYTES);

        Ok(Self {
            decoder: Some(decoder),
            track_id,
            native: NativeFormat {
                sample_format,
                sample_rate,
                channels,
            },
            max_frame_bytes,
        })
    }
}

impl StreamDecoder for SymphoniaStreamDecoder {
    fn native_format(&self) -> NativeFormat {
        self.native
    }

    fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    fn decode(&mut self, payload: &[u8], out: &mut BytesMut) -> BackendResult<DecodeStep> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| BackendError::Other("decoder already closed".to_string()))?;

        let packet = SymphoniaPacket::new_from_slice(self.track_id, 0, 0, payload);
        let decoded = decoder.decode(&packet)?;

        let samples = decoded.frames() * decoded.spec().channels.count();
        let format = interleave_into(&decoded, out);

        Ok(DecodeStep {
            consumed: payload.len(),
            samples,
            format,
        })
    }

    fn close(&mut self) -> BackendResult<()> {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.reset();
        }
        Ok(())
    }
}

/// Interleave a decoded buffer into `out`, returning the representation used.
fn interleave_into(buffer: &AudioBufferRef<'_>, out: &mut BytesMut) -> SampleFormat {
    match buffer {
        AudioBufferRef::U8(buf) => {
            interleave(&**buf, out, |s: u8, out| out.put_u8(s));
            SampleFormat::U8
        }
        AudioBufferRef::S8(buf) => {
            interleave(&**buf, out, |s: i8, out| out.put_u8(u8::from_sample(s)));
            SampleFormat::U8
        }
        AudioBufferRef::U16(buf) => {
            interleave(&**buf, out, |s: u16, out| out.put_i16_ne(i16::from_sample(s)));
            SampleFormat::S16
        }
        AudioBufferRef::S16(buf) => {
            interleave(&**buf, out, |s: i16, out| out.put_i16_ne(s));
            SampleFormat::S16
        }
        AudioBufferRef::U24(buf) => {
            interleave(&**buf, out, |s, out| out.put_i32_ne(i32::from_sample(s)));
            SampleFormat::S32
        }
        AudioBufferRef::S24(buf) => {
            interleave(&**buf, out, |s, out| out.put_i32_ne(i32::from_sample(s)));
            SampleFormat::S32
        }
        AudioBufferRef::U32(buf) => {
            interleave(&**buf, out, |s: u32, out| out.put_i32_ne(i32::from_sample(s)));
            SampleFormat::S32
        }
        AudioBufferRef::S32(buf) => {
            interleave(&**buf, out, |s: i32, out| out.put_i32_ne(s));
            SampleFormat::S32
        }
        AudioBufferRef::F32(buf) => {
            interleave(&**buf, out, |s: f32, out| out.put_f32_ne(s));
            SampleFormat::F32
        }
        AudioBufferRef::F64(buf) => {
            interleave(&**buf, out, |s: f64, out| out.put_f64_ne(s));
            SampleFormat::F64
        }
    }
}

/// Write planar samples frame by frame (LLLL...RRRR... → LRLR...).
fn interleave<T, F>(buf: &AudioBuffer<T>, out: &mut BytesMut, mut put: F)
where
    T: Sample,
    F: FnMut(T, &mut BytesMut),
{
    let num_channels = buf.spec().channels.count();
    let num_frames = buf.frames();
    out.reserve(num_frames * num_channels * std::mem::size_of::<T>());

    for frame_idx in 0..num_frames {
        for chan_idx in 0..num_channels {
            put(buf.chan(chan_idx)[frame_idx], out);
        }
    }
}
