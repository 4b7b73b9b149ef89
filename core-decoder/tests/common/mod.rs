//! Scripted in-memory codec backend shared by the session tests.
//!
//! A [`ScriptedFile`] describes everything the backend reports for one file:
//! its streams, duration, registered codecs, native format and packets.
//! Decoding defaults to reading native-endian `i16` samples straight out of
//! the payload, `frame_bytes` at a time, so a packet of several frames is
//! decoded in several steps. Individual decode calls can be overridden with
//! [`DecodeAction`]s.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use core_decoder::backend::{
    codec_lock_held, BackendError, BackendResult, CodecBackend, CodecDescriptor, CodecId,
    Container, DecodeStep, MediaType, NativeFormat, Packet, SampleFormat, StreamDecoder,
    StreamInfo,
};
use core_runtime::logging::{LogEntry, LogLevel, LoggerSink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const PCM_CODEC: CodecId = CodecId(0x0100);
pub const VIDEO_CODEC: CodecId = CodecId(0x9000);

/// Override for a single decode call.
#[derive(Debug, Clone)]
pub enum DecodeAction {
    /// Consume the whole remaining payload without emitting samples.
    Silence,
    /// Fail the call.
    Fail,
    /// Consume the whole remaining payload and emit these `f32` samples.
    Float(Vec<f32>),
    /// Claim to consume `n` bytes and emit nothing.
    Consume(usize),
    /// Consume the whole remaining payload, write one s16 sample and report
    /// `n` samples.
    Overreport(usize),
}

/// Backend calls observed across every container and decoder of a backend.
#[derive(Debug, Default)]
pub struct Counters {
    pub container_opens: AtomicUsize,
    pub container_closes: AtomicUsize,
    pub decoder_opens: AtomicUsize,
    pub decoder_closes: AtomicUsize,
    pub decode_calls: AtomicUsize,
    pub lock_held_during_open: AtomicBool,
}

impl Counters {
    pub fn container_opens(&self) -> usize {
        self.container_opens.load(Ordering::SeqCst)
    }

    pub fn container_closes(&self) -> usize {
        self.container_closes.load(Ordering::SeqCst)
    }

    pub fn decoder_opens(&self) -> usize {
        self.decoder_opens.load(Ordering::SeqCst)
    }

    pub fn decoder_closes(&self) -> usize {
        self.decoder_closes.load(Ordering::SeqCst)
    }

    /// Everything that was opened has been closed exactly once.
    pub fn all_released(&self) -> bool {
        self.container_opens() == self.container_closes()
            && self.decoder_opens() == self.decoder_closes()
    }
}

/// What the scripted backend reports for a file.
#[derive(Debug, Clone)]
pub struct ScriptedFile {
    pub streams: Vec<StreamInfo>,
    pub duration: Option<Duration>,
    pub registered_codecs: Vec<CodecId>,
    pub native: NativeFormat,
    pub frame_bytes: usize,
    pub packets: Vec<Packet>,
    pub actions: VecDeque<DecodeAction>,
    pub fail_open: bool,
    pub fail_probe: bool,
    pub fail_codec_open: bool,
    pub fail_codec_close: bool,
    /// Read error raised instead of the packet at this position
    pub fail_read_at: Option<usize>,
}

impl ScriptedFile {
    /// A 44.1 kHz stereo file with a single PCM audio stream and no packets.
    pub fn stereo() -> Self {
        Self {
            streams: vec![StreamInfo::new(0, MediaType::Audio, PCM_CODEC)],
            duration: Some(Duration::from_secs(180)),
            registered_codecs: vec![PCM_CODEC],
            native: NativeFormat {
                sample_format: Some(SampleFormat::S16),
                sample_rate: 44100,
                channels: 2,
            },
            frame_bytes: 4,
            packets: Vec::new(),
            actions: VecDeque::new(),
            fail_open: false,
            fail_probe: false,
            fail_codec_open: false,
            fail_codec_close: false,
            fail_read_at: None,
        }
    }

    pub fn with_streams(mut self, streams: Vec<StreamInfo>) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_native(mut self, native: NativeFormat) -> Self {
        self.native = native;
        self
    }

    /// Append a packet whose payload holds `samples` in native byte order.
    pub fn with_samples(mut self, stream_index: usize, samples: &[i16]) -> Self {
        let mut payload = BytesMut::new();
        for sample in samples {
            payload.put_i16_ne(*sample);
        }
        self.packets.push(Packet::new(stream_index, payload.freeze()));
        self
    }

    /// Append a packet with an arbitrary payload.
    pub fn with_packet(mut self, stream_index: usize, payload: &'static [u8]) -> Self {
        self.packets.push(Packet::new(stream_index, payload));
        self
    }

    pub fn with_action(mut self, action: DecodeAction) -> Self {
        self.actions.push_back(action);
        self
    }
}

/// Backend serving one [`ScriptedFile`] for every path.
pub struct ScriptedBackend {
    file: ScriptedFile,
    counters: Arc<Counters>,
}

impl ScriptedBackend {
    pub fn new(file: ScriptedFile) -> Self {
        Self {
            file,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

impl CodecBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open_container(&self, _path: &Path) -> BackendResult<Box<dyn Container>> {
        self.counters
            .lock_held_during_open
            .store(codec_lock_held(), Ordering::SeqCst);

        if self.file.fail_open {
            return Err(BackendError::Io(std::io::Error::from_raw_os_error(2)));
        }

        self.counters.container_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContainer {
            file: self.file.clone(),
            next_packet: 0,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedContainer {
    file: ScriptedFile,
    next_packet: usize,
    counters: Arc<Counters>,
}

impl Container for ScriptedContainer {
    fn probe_streams(&mut self) -> BackendResult<Vec<StreamInfo>> {
        if self.file.fail_probe {
            return Err(BackendError::Malformed("truncated header".to_string()));
        }
        Ok(self.file.streams.clone())
    }

    fn duration(&self) -> Option<Duration> {
        self.file.duration
    }

    fn find_codec(&self, codec: CodecId) -> Option<CodecDescriptor> {
        self.file
            .registered_codecs
            .contains(&codec)
            .then(|| CodecDescriptor {
                id: codec,
                name: "pcm".to_string(),
                long_name: "Scripted PCM".to_string(),
            })
    }

    fn open_decoder(
        &mut self,
        _stream_index: usize,
        _codec: &CodecDescriptor,
    ) -> BackendResult<Box<dyn StreamDecoder>> {
        if self.file.fail_codec_open {
            return Err(BackendError::Unsupported("profile".to_string()));
        }

        self.counters.decoder_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDecoder {
            native: self.file.native,
            frame_bytes: self.file.frame_bytes,
            actions: self.file.actions.clone(),
            fail_close: self.file.fail_codec_close,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn read_next_packet(&mut self) -> BackendResult<Option<Packet>> {
        if self.file.fail_read_at == Some(self.next_packet) {
            return Err(BackendError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }

        let packet = self.file.packets.get(self.next_packet).cloned();
        if packet.is_some() {
            self.next_packet += 1;
        }
        Ok(packet)
    }

    fn close(&mut self) {
        self.counters.container_closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedDecoder {
    native: NativeFormat,
    frame_bytes: usize,
    actions: VecDeque<DecodeAction>,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl StreamDecoder for ScriptedDecoder {
    fn native_format(&self) -> NativeFormat {
        self.native
    }

    fn max_frame_bytes(&self) -> usize {
        self.frame_bytes * 4
    }

    fn decode(&mut self, payload: &[u8], out: &mut BytesMut) -> BackendResult<DecodeStep> {
        self.counters.decode_calls.fetch_add(1, Ordering::SeqCst);

        match self.actions.pop_front() {
            Some(DecodeAction::Silence) => Ok(DecodeStep {
                consumed: payload.len(),
                samples: 0,
                format: SampleFormat::S16,
            }),
            Some(DecodeAction::Fail) => Err(BackendError::Malformed("corrupt frame".to_string())),
            Some(DecodeAction::Float(samples)) => {
                for sample in &samples {
                    out.put_f32_ne(*sample);
                }
                Ok(DecodeStep {
                    consumed: payload.len(),
                    samples: samples.len(),
                    format: SampleFormat::F32,
                })
            }
            Some(DecodeAction::Consume(n)) => Ok(DecodeStep {
                consumed: n,
                samples: 0,
                format: SampleFormat::S16,
            }),
            Some(DecodeAction::Overreport(n)) => {
                out.put_i16_ne(0);
                Ok(DecodeStep {
                    consumed: payload.len(),
                    samples: n,
                    format: SampleFormat::S16,
                })
            }
            None => {
                let consumed = payload.len().min(self.frame_bytes);
                let frame = &payload[..consumed - consumed % 2];
                out.extend_from_slice(frame);
                Ok(DecodeStep {
                    consumed,
                    samples: frame.len() / 2,
                    format: SampleFormat::S16,
                })
            }
        }
    }

    fn close(&mut self) -> BackendResult<()> {
        self.counters.decoder_closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(BackendError::Other("codec busy".to_string()));
        }
        Ok(())
    }
}

/// Logger sink keeping every entry at or above `min_level`.
pub struct CollectingSink {
    min_level: LogLevel,
    entries: Mutex<Vec<LogEntry>>,
}

impl CollectingSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.level == level && entry.message.contains(needle))
    }
}

impl LoggerSink for CollectingSink {
    fn log(&self, entry: LogEntry) -> core_runtime::Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
