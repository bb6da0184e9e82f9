//! Shared types and utilities used across the dashforge workspace.
//!
//! - **Error handling**: the abstract error kinds shared by the media,
//!   demux, and application layers.
//! - **Core types**: `Protocol` and `AssetState`, the small closed enums the
//!   cache index and HTTP API exchange.
//! - **Path utilities**: detecting local media files by extension.

pub mod error;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
