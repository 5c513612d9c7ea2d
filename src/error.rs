//! Error types for Reel

use std::io;
use thiserror::Error;

/// Result type for Reel operations
pub type Result<T> = std::result::Result<T, ReelError>;

/// Errors that can occur in Reel
#[derive(Debug, Error)]
pub enum ReelError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `rec()` called while a previous recording session is still open
    #[error("recording already in progress")]
    AlreadyRecording,

    /// A missing chunk was written to a request body
    #[error("request body chunk was missing")]
    MissingBodyData,

    /// Mock-serving mode received a request no definition matches
    #[error("no recorded exchange matched {method} {uri}")]
    UnmatchedRequest {
        /// Method of the unmatched request
        method: String,
        /// Full URI of the unmatched request
        uri: String,
    },

    /// `done()` called on a mock that was never matched
    #[error("mock was never matched: {0}")]
    MockNotMatched(String),

    /// Malformed or non-absolute request URI
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// Outbound transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Exchange definition that cannot be installed as a mock
    #[error("invalid exchange definition: {0}")]
    InvalidDefinition(String),
}
