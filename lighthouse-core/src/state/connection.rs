//! Connection lifecycle state machine.
//!
//! Transitions are validated and return `Result` instead of panicking.
//! The connector publishes the current state on a `watch` channel.

use std::time::Instant;

use crate::error::LighthouseError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current phase of the display connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected ──► Closing
///       ▲               │              │            │
///       └───────────────┴──────────────┴────────────┘
/// ```
///
/// A failed handshake returns from `Connecting`; a transport failure in
/// the receive task forces `Disconnected` from any state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection. Initial and terminal state.
    #[default]
    Disconnected,

    /// WebSocket handshake in progress.
    Connecting,

    /// Handshake complete; frames may be sent.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },

    /// Close frame sent, tearing down.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the connection has been up. `None` unless `Connected`.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), LighthouseError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            other => Err(invalid("connect", other)),
        }
    }

    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), LighthouseError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            other => Err(invalid("complete connect", other)),
        }
    }

    /// Valid from: `Connected`.
    pub fn begin_close(&mut self) -> Result<(), LighthouseError> {
        match self {
            Self::Connected { .. } => {
                *self = Self::Closing;
                Ok(())
            }
            other => Err(invalid("close", other)),
        }
    }

    /// Valid from: `Closing`, `Connecting` (handshake failure).
    pub fn finish_close(&mut self) -> Result<(), LighthouseError> {
        match self {
            Self::Closing | Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            other => Err(invalid("finish close", other)),
        }
    }

    /// Reset to `Disconnected` regardless of the current state.
    ///
    /// Used when the transport fails underneath an open connection.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

fn invalid(action: &str, state: &ConnectionState) -> LighthouseError {
    LighthouseError::ConnectionLost(format!("cannot {action} while {state}"))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = ConnectionState::Disconnected;

        state.begin_connect().unwrap();
        assert_eq!(state, ConnectionState::Connecting);

        state.complete_connect().unwrap();
        assert!(state.is_connected());
        assert!(state.connected_duration().is_some());

        state.begin_close().unwrap();
        assert_eq!(state, ConnectionState::Closing);

        state.finish_close().unwrap();
        assert!(state.is_disconnected());
    }

    #[test]
    fn cannot_connect_twice() {
        let mut state = ConnectionState::Connected {
            since: Instant::now(),
        };
        assert!(state.begin_connect().is_err());
    }

    #[test]
    fn cannot_close_while_disconnected() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.begin_close().is_err());
        assert!(state.finish_close().is_err());
    }

    #[test]
    fn failed_handshake_returns_to_disconnected() {
        let mut state = ConnectionState::Connecting;
        state.finish_close().unwrap();
        assert!(state.is_disconnected());
    }

    #[test]
    fn force_disconnect_from_any_state() {
        for mut state in [
            ConnectionState::Connecting,
            ConnectionState::Connected {
                since: Instant::now(),
            },
            ConnectionState::Closing,
        ] {
            state.force_disconnect();
            assert!(state.is_disconnected());
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Closing.to_string(), "Closing");
        assert_eq!(
            ConnectionState::Connected {
                since: Instant::now()
            }
            .to_string(),
            "Connected"
        );
    }

    #[test]
    fn default_state_is_disconnected() {
        assert!(ConnectionState::default().is_disconnected());
    }
}
