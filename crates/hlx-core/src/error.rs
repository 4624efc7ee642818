//! Typed error definitions for the streaming client.
//!
//! Every public operation of the engine returns [`HlxError`]. Variants map
//! one-to-one onto the failure modes a caller can observe: transport trouble,
//! calling while disconnected, a request that never got an answer, an answer
//! that was an explicit error, and a request cancelled by `disconnect`.

use std::time::Duration;

use thiserror::Error;

/// Domain-specific errors for the streaming client.
#[derive(Debug, Error)]
pub enum HlxError {
    /// Transport open, read, write or close failure. The connection is left
    /// disconnected.
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation needs a live connection and will not open one implicitly.
    #[error("not connected")]
    NotConnected,

    /// No response arrived for a post request within the timeout window.
    #[error("request {id} timed out after {timeout:?}")]
    RequestTimeout { id: u64, timeout: Duration },

    /// The venue answered a post request with an error response.
    #[error("remote error: {0}")]
    Remote(String),

    /// The request was still pending when the connection was torn down.
    #[error("request cancelled: connection closed")]
    Cancelled,

    /// An inbound frame could not be parsed. Only ever logged by the reader.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// An outbound message could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for HlxError {
    fn from(e: serde_json::Error) -> Self {
        HlxError::Encode(e.to_string())
    }
}

/// Result alias used across the library crates.
pub type Result<T> = std::result::Result<T, HlxError>;
