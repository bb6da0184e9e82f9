//! The error kinds shared by every layer of dashforge.
//!
//! Library crates (`dashforge-media`, `dashforge-demux`) and the application
//! crate all surface failures as one of these variants so that the HTTP layer
//! can map them to a status code without inspecting crate-private types.

use thiserror::Error;

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for dashforge.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested asset is unknown to the cache index.
    #[error("not found: {0}")]
    NotFound(String),

    /// A generation run is already in progress for this asset.
    #[error("conflict: {0} is already generating")]
    Conflict(String),

    /// `Proto` did not match `file`, `dash`, or `smooth`.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// A stream is neither H.264 video nor AAC-LC audio.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A manifest, atom, or client-manifest document could not be parsed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A fetch over HTTP failed.
    #[error("network error: {0}")]
    Network(String),

    /// A disk I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An atom or manifest failed to parse for a reason not covered by
    /// `MalformedInput` (e.g. an unexpected but well-formed structure).
    #[error("parse error: {0}")]
    ParseError(String),

    /// A demux produced no usable audio or video tracks.
    #[error("no usable tracks")]
    EmptyTrackSet,
}

impl Error {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn conflict(name: impl Into<String>) -> Self {
        Self::Conflict(name.into())
    }

    pub fn unsupported_protocol(proto: impl Into<String>) -> Self {
        Self::UnsupportedProtocol(proto.into())
    }

    pub fn unsupported_codec(msg: impl Into<String>) -> Self {
        Self::UnsupportedCodec(msg.into())
    }

    pub fn malformed_input(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether this error kind maps to a 4xx HTTP status (vs. 5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::UnsupportedProtocol(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_the_documented_three() {
        assert!(Error::not_found("foo").is_client_error());
        assert!(Error::conflict("foo").is_client_error());
        assert!(Error::unsupported_protocol("ftp").is_client_error());
        assert!(!Error::unsupported_codec("vp9").is_client_error());
        assert!(!Error::malformed_input("bad atom").is_client_error());
        assert!(!Error::EmptyTrackSet.is_client_error());
    }

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(Error::not_found("foo").to_string(), "not found: foo");
        assert_eq!(
            Error::conflict("foo").to_string(),
            "conflict: foo is already generating"
        );
    }
}
