//! Re-exports the shared error kinds as this crate's `Result`.

pub use dashforge_common::Error;

pub type Result<T> = std::result::Result<T, Error>;
