//! Client-side error types.

/// Errors from the realtime client and the ticket REST API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The ticket API answered with a non-success status.
    #[error("ticket API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A base URL could not be used to build a request URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to establish the WebSocket connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// An action was emitted while no connection is open.
    #[error("not connected")]
    NotConnected,
}
