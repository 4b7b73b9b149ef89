//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the decoding core:
//! - Logging and tracing infrastructure
//! - Host log forwarding through [`logging::LoggerSink`]
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the pipeline crates depend
//! on. It establishes the logging conventions used throughout the workspace:
//! every component emits `tracing` events and the host decides where they go.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
