//! Workspace facade crate.
//!
//! Exposes a single `decoder` feature that maps to the workspace crates
//! (`core-runtime`, `core-decoder`). Hosts that run key analysis can depend on
//! `keyscan-workspace` and reach the decoding pipeline without wiring each
//! crate individually.

#[cfg(feature = "decoder")]
pub use core_decoder as decoder;

#[cfg(feature = "decoder")]
pub use core_runtime as runtime;
