//! Decode an audio file and print a summary of the result.
//!
//! Run with:
//! ```bash
//! cargo run -p core-decoder --example decode_file -- /path/to/track.flac
//!
//! # Custom maximum duration (minutes) and JSON logs
//! cargo run -p core-decoder --example decode_file -- track.mp3 90 json
//! ```

use anyhow::{bail, Context, Result};
use core_decoder::{DecoderConfig, DecoderSession};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use std::env;
use tracing::info;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let Some(path) = args.get(1) else {
        bail!("usage: decode_file <path> [max-minutes] [pretty|json|compact]");
    };

    let max_minutes = match args.get(2) {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid maximum duration: {value}"))?,
        None => DecoderConfig::default().max_duration_minutes,
    };

    let format = match args.get(3).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let config = DecoderConfig::default().with_max_duration_minutes(max_minutes);
    let mut session = DecoderSession::open(path, &config)
        .with_context(|| format!("failed to open {path}"))?;

    info!(
        codec = session.codec_name(),
        stream = session.stream_index(),
        "Decoding"
    );

    let audio = session.decode_to_end()?;

    println!("file:        {path}");
    println!("codec:       {}", session.codec_name());
    println!("frame rate:  {} Hz", audio.frame_rate());
    println!("channels:    {}", audio.channels());
    println!("samples:     {}", audio.sample_count());
    println!("duration:    {:.2} s", audio.duration().as_secs_f64());
    println!("bad packets: {}", session.bad_packet_count());

    Ok(())
}
