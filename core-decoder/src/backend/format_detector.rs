//! # Format Detection Module
//!
//! Translates between Symphonia's codec/sample vocabulary and the backend
//! adapter types.

use super::{CodecDescriptor, CodecId, MediaType, SampleFormat};
use std::path::Path;
use symphonia::core::codecs::*;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Output representation of the PCM codecs, which leave `sample_format`
/// unset in their parameters.
const PCM_OUTPUT_FORMATS: &[(CodecType, SampleFormat)] = &[
    (CODEC_TYPE_PCM_U8, SampleFormat::U8),
    (CODEC_TYPE_PCM_S8, SampleFormat::U8),
    (CODEC_TYPE_PCM_U16LE, SampleFormat::S16),
    (CODEC_TYPE_PCM_U16BE, SampleFormat::S16),
    (CODEC_TYPE_PCM_S16LE, SampleFormat::S16),
    (CODEC_TYPE_PCM_S16BE, SampleFormat::S16),
    (CODEC_TYPE_PCM_ALAW, SampleFormat::S16),
    (CODEC_TYPE_PCM_MULAW, SampleFormat::S16),
    (CODEC_TYPE_PCM_U24LE, SampleFormat::S32),
    (CODEC_TYPE_PCM_U24BE, SampleFormat::S32),
    (CODEC_TYPE_PCM_S24LE, SampleFormat::S32),
    (CODEC_TYPE_PCM_S24BE, SampleFormat::S32),
    (CODEC_TYPE_PCM_U32LE, SampleFormat::S32),
    (CODEC_TYPE_PCM_U32BE, SampleFormat::S32),
    (CODEC_TYPE_PCM_S32LE, SampleFormat::S32),
    (CODEC_TYPE_PCM_S32BE, SampleFormat::S32),
    (CODEC_TYPE_PCM_F32LE, SampleFormat::F32),
    (CODEC_TYPE_PCM_F32BE, SampleFormat::F32),
    (CODEC_TYPE_PCM_F64LE, SampleFormat::F64),
    (CODEC_TYPE_PCM_F64BE, SampleFormat::F64),
];

/// Format detector for Symphonia streams.
pub struct FormatDetector;

impl FormatDetector {
    /// Create a probe hint from file path.
    ///
    /// Extracts the file extension and creates a Symphonia `Hint` to guide
    /// format detection.
    pub fn hint_from_path(path: &Path) -> Hint {
        let mut hint = Hint::new();

        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            debug!("Setting probe hint extension: {}", extension);
            hint.with_extension(extension);
        } else {
            debug!("No file extension found, probe will auto-detect");
        }

        hint
    }

    /// Classify a Symphonia track by its codec parameters.
    ///
    /// Symphonia only demuxes tracks it can describe as audio; anything with a
    /// null codec or no sample rate is reported as unknown.
    pub fn media_type(params: &CodecParameters) -> MediaType {
        if params.codec == CODEC_TYPE_NULL {
            MediaType::Unknown
        } else if params.sample_rate.is_some() {
            MediaType::Audio
        } else {
            MediaType::Data
        }
    }

    /// Backend-neutral id of a Symphonia codec type.
    ///
    /// Symphonia renders codec types as their hexadecimal registry value.
    pub fn codec_id(codec_type: CodecType) -> CodecId {
        let rendered = codec_type.to_string();
        let digits = rendered.trim_start_matches("0x");
        CodecId(u32::from_str_radix(digits, 16).unwrap_or(0))
    }

    /// Look up the registered Symphonia decoder for `codec_type`.
    pub fn codec_descriptor(codec_type: CodecType) -> Option<CodecDescriptor> {
        symphonia::default::get_codecs()
            .get_codec(codec_type)
            .map(|descriptor| CodecDescriptor {
                id: Self::codec_id(codec_type),
                name: descriptor.short_name.to_string(),
                long_name: descriptor.long_name.to_string(),
            })
    }

    /// Representation Symphonia samples are widened to.
    pub fn sample_format(format: symphonia::core::sample::SampleFormat) -> SampleFormat {
        use symphonia::core::sample::SampleFormat as Native;

        match format {
            Native::U8 | Native::S8 => SampleFormat::U8,
            Native::U16 | Native::S16 => SampleFormat::S16,
            Native::U24 | Native::S24 | Native::U32 | Native::S32 => SampleFormat::S32,
            Native::F32 => SampleFormat::F32,
            Native::F64 => SampleFormat::F64,
        }
    }

    /// Representation a codec is known to decode to, for codecs whose
    /// parameters do not say.
    pub fn sample_format_for_codec(codec_type: CodecType) -> Option<SampleFormat> {
        PCM_OUTPUT_FORMATS
            .iter()
            .find(|(codec, _)| *codec == codec_type)
            .map(|(_, format)| *format)
    }
}
