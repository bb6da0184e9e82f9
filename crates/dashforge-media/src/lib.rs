//! ISO BMFF atom codec, track model, fragmented-MP4 segment builder, and MPD
//! manifest writer.
//!
//! # Modules
//!
//! - [`atom`] — atom header reading and placeholder-then-backpatch writing
//!   (C1).
//! - [`track`] — per-track timing/codec/encryption state and sample history
//!   (C2).
//! - [`fmp4`] — bit-exact initialization and media segment synthesis,
//!   including Common Encryption (C3).
//! - [`manifest`] — DASH MPD XML generation (C5).

pub mod atom;
pub mod error;
pub mod fmp4;
pub mod manifest;
pub mod track;

pub use error::{Error, Result};
