//! Re-exports the shared error kinds as this crate's `Result`.

pub use dashforge_common::Error;

/// Result type for dashforge-media operations.
pub type Result<T> = std::result::Result<T, Error>;
