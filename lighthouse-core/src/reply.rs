//! Server acknowledgement handling under a verbosity policy.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::protocol::ServerMessage;

// ── Verbosity ────────────────────────────────────────────────────

/// How many server replies are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Report nothing.
    Silent,
    /// Report only the first warning of each connection. Usually enough to
    /// spot an invalid token.
    #[default]
    WarnOnce,
    /// Report every warning.
    WarnAlways,
    /// Report every reply, successes included.
    Verbose,
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Silent => write!(f, "silent"),
            Self::WarnOnce => write!(f, "warn_once"),
            Self::WarnAlways => write!(f, "warn_always"),
            Self::Verbose => write!(f, "verbose"),
        }
    }
}

// ── ReplyHandler ─────────────────────────────────────────────────

/// Applies a [`Verbosity`] policy to decoded server replies.
#[derive(Debug)]
pub struct ReplyHandler {
    verbosity: Verbosity,
    /// Sticky flag for [`Verbosity::WarnOnce`].
    warned: AtomicBool,
    reported: AtomicU64,
}

impl ReplyHandler {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            warned: AtomicBool::new(false),
            reported: AtomicU64::new(0),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Total replies reported since construction.
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::SeqCst)
    }

    /// Re-arm the one-shot warning. Called once per new connection.
    pub fn reset(&self) {
        self.warned.store(false, Ordering::SeqCst);
    }

    /// Report `msg` if the policy allows it. Returns whether it was reported.
    pub fn handle(&self, msg: &ServerMessage) -> bool {
        if msg.is_ok() {
            if self.verbosity == Verbosity::Verbose {
                info!(reid = ?msg.reid, "reply: {msg}");
                self.reported.fetch_add(1, Ordering::SeqCst);
                return true;
            }
            return false;
        }

        let report = match self.verbosity {
            Verbosity::Silent => false,
            Verbosity::WarnAlways | Verbosity::Verbose => true,
            Verbosity::WarnOnce => !self.warned.swap(true, Ordering::SeqCst),
        };
        if report {
            warn!(reid = ?msg.reid, "server warning: {msg}");
            self.reported.fetch_add(1, Ordering::SeqCst);
        }
        report
    }
}

impl Default for ReplyHandler {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

// ── Tests ────────────────────────────────────────────────────────
