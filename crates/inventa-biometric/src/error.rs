//! Bridge error types.

use std::time::Duration;

/// Failures talking to the reader service.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Every connection attempt failed and simulation is disabled.
    #[error("fingerprint service at {url} unavailable after {attempts} attempt(s): {reason}")]
    Unavailable {
        /// Endpoint that was tried.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },

    /// The capture did not complete within the deadline.
    #[error("fingerprint capture timed out after {0:?}")]
    Timeout(Duration),

    /// The reader reported an error.
    #[error("fingerprint reader error: {message}")]
    Device {
        /// Message from the reader service.
        message: String,
        /// Vendor code, if any.
        code: Option<String>,
    },

    /// The connection closed and could not be re-established.
    #[error("connection to fingerprint service closed")]
    Closed,

    /// A frame could not be encoded or the reader returned inconsistent data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// WebSocket transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
