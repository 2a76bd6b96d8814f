//! `tierscribe` — voice activity detection and speaker diarization for ELAN.
//!
//! This crate implements an ELAN "local recognizer": ELAN launches the
//! `tierscribe-recognizer` binary, feeds it parameters as
//! `<param name="...">value</param>` lines on stdin, and reads
//! `PROGRESS:`/`RESULT:` lines back on stdout while the recognizer writes an
//! AVATech tier XML file with the detected speech turns.
//!
//! The crate provides:
//! - The ELAN parameter and progress protocols
//! - Media decoding into the PCM format the inference pipelines expect
//! - Pipeline driving (segmentation, embedding, clustering) via `pyannote-rs`
//! - Optional nearest-neighbor speaker identification against a roster
//! - The AVATech tier XML encoder
//!
//! The library is designed so the recognizer binary stays a thin shell, and
//! everything under it can be exercised from tests or other frontends.

// High-level API (most consumers should start here).
pub mod opts;
pub mod recognizer;

// The ELAN recognizer wire protocols.
pub mod params;
pub mod progress;

// Speaker turn data structures and post-filtering.
pub mod turns;

// Audio decoding into pipeline input.
pub mod audio;

// Speaker identification against a user-supplied roster.
pub mod verify;

// Output encoding into AVATech tier XML.
pub mod tier_encoder;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub mod error;

pub use error::{Error, Result};
