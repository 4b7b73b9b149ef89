//! # Audio Decoder Module
//!
//! Decodes an audio file into a flat sequence of canonical PCM samples for
//! key analysis.
//!
//! ## Overview
//!
//! This module handles:
//! - Opening and validating a file (audio stream selection, duration limit)
//! - Driving packets through a codec backend, tolerating a bounded number of
//!   bad packets
//! - Normalizing every native sample representation to signed 16-bit
//! - Accumulating decoded samples into [`AudioData`] records
//!
//! The default backend is Symphonia; any [`backend::CodecBackend`] can be
//! plugged in through [`DecoderSession::open_with`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_decoder::DecoderSession;
//!
//! let mut session = DecoderSession::new("/music/track.flac", 60)?;
//! let audio = session.decode_to_end()?;
//! println!("{} frames at {} Hz", audio.frame_count(), audio.frame_rate());
//! ```

pub mod audio_data;
pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod resampler;
pub mod selector;
pub mod session;

pub use audio_data::AudioData;
pub use config::DecoderConfig;
pub use error::{DecoderError, Result};
pub use session::{DecoderSession, SessionState};
