//! Session configuration.
//!
//! Every field has a default, so a partial TOML or JSON section is enough.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::ConnectorConfig;
use crate::protocol::Auth;
use crate::reply::Verbosity;
use crate::scheduler::DEFAULT_FRAME_RATE;

/// Public Lighthouse endpoint.
pub const DEFAULT_URL: &str = "wss://lighthouse.uni-kiel.de/websocket";

/// Default handshake and write deadline, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Settings for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lighthouse account name. Also selects the model path.
    pub username: String,
    /// API token for the account.
    pub token: String,
    pub url: String,
    /// Frames per second, in `(0, 60]`. Validated by `Session::new`.
    pub frame_rate: f64,
    pub verbosity: Verbosity,
    pub verify_certificates: bool,
    /// Send a STREAM request on connect and feed remote key events to the
    /// frame source.
    pub stream_remote_inputs: bool,
    /// Handshake and write deadline in milliseconds. Must be non-zero.
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: String::new(),
            url: DEFAULT_URL.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            verbosity: Verbosity::default(),
            verify_certificates: true,
            stream_remote_inputs: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_frame_rate(mut self, hz: f64) -> Self {
        self.frame_rate = hz;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    pub fn with_stream_remote_inputs(mut self, stream: bool) -> Self {
        self.stream_remote_inputs = stream;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Connection settings derived from this config.
    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig {
            url: self.url.clone(),
            auth: Auth::new(&self.username, &self.token),
            timeout: self.timeout(),
            verify_certificates: self.verify_certificates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.frame_rate, 30.0);
        assert_eq!(config.verbosity, Verbosity::WarnOnce);
        assert!(config.verify_certificates);
        assert!(!config.stream_remote_inputs);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn builder_overrides() {
        let config = SessionConfig::new("alice", "API-TOK")
            .with_url("ws://127.0.0.1:9000")
            .with_frame_rate(10.0)
            .with_verbosity(Verbosity::Silent)
            .with_verify_certificates(false)
            .with_stream_remote_inputs(true)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.username, "alice");
        assert_eq!(config.frame_rate, 10.0);
        assert!(config.stream_remote_inputs);

        let connector = config.connector_config();
        assert_eq!(connector.url, "ws://127.0.0.1:9000");
        assert_eq!(connector.auth, Auth::new("alice", "API-TOK"));
        assert_eq!(connector.timeout, Duration::from_secs(5));
        assert!(!connector.verify_certificates);
    }

    #[test]
    fn sub_second_timeout_is_kept() {
        let config = SessionConfig::default().with_timeout(Duration::from_millis(200));
        assert_eq!(config.timeout_ms, 200);
        assert_eq!(config.timeout(), Duration::from_millis(200));
        assert_eq!(config.connector_config().timeout, Duration::from_millis(200));
    }
}
