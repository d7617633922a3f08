//! Domain-specific error types for the Lighthouse adapter.
//!
//! All fallible operations return `Result<T, LighthouseError>`.
//! Configuration mistakes fail at the call that introduced them; transport
//! failures are fatal to the current connection only.

use std::time::Duration;
use thiserror::Error;

use crate::canvas::IMAGE_LEN;

/// The canonical error type for the Lighthouse adapter.
#[derive(Debug, Error)]
pub enum LighthouseError {
    // ── Configuration Errors ─────────────────────────────────────
    /// Frame rate outside of `(0, 60]` Hz.
    #[error("invalid frame rate {0}: must be greater than 0 and at most 60")]
    InvalidFrameRate(f64),

    /// An image did not contain exactly `ROWS * COLS * CHANNELS` elements.
    #[error("invalid image shape: expected {expected} elements, got {actual}")]
    InvalidImageShape { expected: usize, actual: usize },

    /// A pixel coordinate lies outside of the canvas.
    #[error("pixel ({row}, {col}) is outside of the 14x28 canvas")]
    PixelOutOfBounds { row: usize, col: usize },

    /// The endpoint address could not be used for a WebSocket handshake.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// A zero connection timeout, which would fail every handshake.
    #[error("invalid timeout: must be greater than zero")]
    InvalidTimeout,

    // ── Connection Errors ────────────────────────────────────────
    /// A send was attempted while no connection is open.
    #[error("not connected")]
    NotConnected,

    /// The receive task observed a transport failure; the connection is gone.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The WebSocket layer reported an error.
    #[error("transport error: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),

    /// TLS client configuration could not be built.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// An operation exceeded the per-connection timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Serialization Errors ─────────────────────────────────────
    /// An outbound envelope could not be encoded.
    #[error("encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// An inbound frame could not be decoded.
    #[error("decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    // ── Task Errors ──────────────────────────────────────────────
    /// The frame scheduler task panicked or was aborted.
    #[error("frame scheduler task failed: {0}")]
    Scheduler(String),
}

impl LighthouseError {
    /// Shape error for an image with `actual` elements.
    pub fn shape(actual: usize) -> Self {
        LighthouseError::InvalidImageShape {
            expected: IMAGE_LEN,
            actual,
        }
    }

    /// Whether the error ends the current connection.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LighthouseError::NotConnected
                | LighthouseError::ConnectionLost(_)
                | LighthouseError::Transport(_)
                | LighthouseError::Timeout(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<tokio_tungstenite::tungstenite::Error> for LighthouseError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        LighthouseError::Transport(Box::new(e))
    }
}

impl From<tokio::task::JoinError> for LighthouseError {
    fn from(e: tokio::task::JoinError) -> Self {
        LighthouseError::Scheduler(e.to_string())
    }
}
