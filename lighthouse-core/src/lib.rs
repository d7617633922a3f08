//! # lighthouse-core
//!
//! Client library for the Lighthouse light-matrix display (14 x 28 RGB).
//!
//! This crate contains:
//! - **Canvas**: the in-memory image and its shape rules
//! - **Protocol**: MessagePack request envelopes and server replies
//! - **Network**: `Connector`, one WebSocket connection with a receive task
//! - **Scheduler**: `FrameScheduler`, a fixed-rate, wall-clock aligned send loop
//! - **Events**: remote input queue
//! - **Reply**: server warning reporting under a verbosity policy
//! - **Session**: the facade tying the above together
//! - **Error**: `LighthouseError`, a `thiserror`-based error hierarchy

pub mod canvas;
pub mod config;
pub mod error;
pub mod event;
pub mod network;
pub mod protocol;
pub mod reply;
pub mod scheduler;
pub mod session;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use canvas::{COLS, Canvas, IMAGE_LEN, ImageData, NestedImage, ROWS, Rgb};
pub use config::{DEFAULT_URL, SessionConfig};
pub use error::LighthouseError;
pub use event::{Event, EventQueue};
pub use network::{Connector, ConnectorConfig, MessageHandler};
pub use protocol::{Auth, Envelope, ServerMessage};
pub use reply::{ReplyHandler, Verbosity};
pub use scheduler::{FrameRate, FrameScheduler, FrameSource, MAX_FRAME_RATE};
pub use session::Session;
pub use state::ConnectionState;
