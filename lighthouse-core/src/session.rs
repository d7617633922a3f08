//! The user-facing session: one canvas shown on one display.
//!
//! A [`Session`] composes the [`Canvas`], the [`Connector`], the
//! [`FrameScheduler`], the [`ReplyHandler`] and the [`EventQueue`]. Each
//! is usable on its own; the session wires them together and owns the
//! lifecycle:
//!
//! ```text
//! new ──► connect ──► start ──► stop ──► close
//!             ▲         │ ▲       │
//!             └─────────┘ └───────┘
//! ```
//!
//! No signal handler is installed. Call [`Session::close`] on shutdown.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, info, warn};

use crate::canvas::{self, Canvas, ImageData, NestedImage, Rgb};
use crate::config::SessionConfig;
use crate::error::LighthouseError;
use crate::event::{Event, EventQueue};
use crate::network::{Connector, MessageHandler};
use crate::protocol::ServerMessage;
use crate::reply::ReplyHandler;
use crate::scheduler::{FrameRate, FrameScheduler, FrameSource, Schedule, SchedulerContext};
use crate::state::ConnectionState;

/// Routes inbound messages: remote input to the queue, then the reply
/// policy.
struct Dispatcher {
    events: Arc<EventQueue>,
    replies: Arc<ReplyHandler>,
}

impl MessageHandler for Dispatcher {
    fn handle(&self, msg: ServerMessage) {
        if let Some(event) = msg.event() {
            self.events.push(event);
        }
        self.replies.handle(&msg);
    }
}

/// A display session.
pub struct Session {
    config: SessionConfig,
    canvas: Arc<Mutex<Canvas>>,
    schedule: Arc<Mutex<Schedule>>,
    connector: Arc<Connector>,
    replies: Arc<ReplyHandler>,
    events: Arc<EventQueue>,
    scheduler: Mutex<Option<FrameScheduler>>,
}

impl Session {
    /// Build a session. Does not connect.
    ///
    /// Fails on an out-of-range frame rate, a zero timeout or an unusable
    /// endpoint URL.
    pub fn new(config: SessionConfig) -> Result<Self, LighthouseError> {
        let rate = FrameRate::new(config.frame_rate)?;
        if config.timeout_ms == 0 {
            return Err(LighthouseError::InvalidTimeout);
        }
        config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| LighthouseError::InvalidUrl(format!("{}: {e}", config.url)))?;

        let events = Arc::new(EventQueue::new());
        let replies = Arc::new(ReplyHandler::new(config.verbosity));
        let dispatcher = Dispatcher {
            events: Arc::clone(&events),
            replies: Arc::clone(&replies),
        };
        let connector = Connector::new(config.connector_config(), Arc::new(dispatcher));

        Ok(Self {
            canvas: Arc::new(Mutex::new(Canvas::new())),
            schedule: Arc::new(Mutex::new(Schedule::new(rate))),
            connector: Arc::new(connector),
            replies,
            events,
            scheduler: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the connection without starting the frame loop.
    ///
    /// Replaces any open connection. Sends a STREAM request when remote
    /// input streaming is enabled.
    pub async fn connect(&self) -> Result<(), LighthouseError> {
        self.connector.start().await?;
        self.replies.reset();
        if self.config.stream_remote_inputs {
            let reid = self.connector.request_stream().await?;
            debug!(reid, "subscribed to remote input");
        }
        Ok(())
    }

    /// Start (or restart) sending frames.
    ///
    /// Connects first if needed. A running frame loop is stopped and
    /// replaced; its exit error, if any, is logged.
    pub async fn start(&self) -> Result<(), LighthouseError> {
        let mut scheduler = self.scheduler.lock().await;
        if let Some(previous) = scheduler.take() {
            if let Err(e) = previous.stop().await {
                warn!("previous frame loop ended with error: {e}");
            }
        }

        if !self.connector.is_connected() {
            self.connect().await?;
        }
        self.replies.reset();

        let rate = self.schedule.lock().await.rate;
        *scheduler = Some(FrameScheduler::spawn(SchedulerContext {
            canvas: Arc::clone(&self.canvas),
            schedule: Arc::clone(&self.schedule),
            connector: Arc::clone(&self.connector),
            events: Arc::clone(&self.events),
            stream_events: self.config.stream_remote_inputs,
        }));
        info!("sending frames at {rate}");
        Ok(())
    }

    /// Stop the frame loop, keeping the connection open.
    ///
    /// Returns the number of frames the loop sent, or the error that ended
    /// it. `Ok(0)` when no loop was running.
    pub async fn stop(&self) -> Result<u64, LighthouseError> {
        let previous = self.scheduler.lock().await.take();
        match previous {
            Some(scheduler) => scheduler.stop().await,
            None => Ok(0),
        }
    }

    /// Stop the frame loop and close the connection. Safe to call repeatedly.
    ///
    /// The connection is closed even when the frame loop had failed; that
    /// failure is still returned.
    pub async fn close(&self) -> Result<u64, LighthouseError> {
        let result = self.stop().await;
        self.connector.stop().await;
        result
    }

    /// Whether a frame loop is running.
    pub async fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(FrameScheduler::is_running)
    }

    // ── Image ────────────────────────────────────────────────────

    /// Replace the canvas. The next tick sends it.
    pub async fn set_image(&self, image: impl Into<ImageData>) -> Result<(), LighthouseError> {
        self.canvas.lock().await.set_image(image)
    }

    /// The canvas as `ROWS x COLS` RGB triples.
    pub async fn image(&self) -> NestedImage {
        self.canvas.lock().await.to_nested()
    }

    /// The canvas as flat row-major bytes.
    pub async fn image_raw(&self) -> Vec<u8> {
        self.canvas.lock().await.to_bytes()
    }

    pub async fn set_pixel(&self, row: usize, col: usize, rgb: Rgb) -> Result<(), LighthouseError> {
        self.canvas.lock().await.set_pixel(row, col, rgb)
    }

    /// An all-black image of the display's shape.
    pub fn empty_image() -> NestedImage {
        canvas::empty_image()
    }

    /// An all-black flat image of the display's size.
    pub fn empty_image_raw() -> Vec<u8> {
        canvas::empty_image_raw()
    }

    // ── Schedule ─────────────────────────────────────────────────

    /// Produce each frame from `source`. Takes effect on the next tick.
    pub async fn set_frame_source(&self, source: impl FrameSource) {
        self.schedule.lock().await.source = Some(Box::new(source));
    }

    /// Go back to sending the canvas as set by [`set_image`](Self::set_image).
    pub async fn clear_frame_source(&self) {
        self.schedule.lock().await.source = None;
    }

    /// Change the frame rate. Rejected (never clamped) outside `(0, 60]`.
    pub async fn set_frame_rate(&self, hz: f64) -> Result<(), LighthouseError> {
        let rate = FrameRate::new(hz)?;
        self.schedule.lock().await.rate = rate;
        debug!("frame rate set to {rate}");
        Ok(())
    }

    pub async fn frame_rate(&self) -> f64 {
        self.schedule.lock().await.rate.hz()
    }

    // ── Events & state ───────────────────────────────────────────

    /// Oldest pending remote input event.
    pub fn event(&self) -> Option<Event> {
        self.events.pop()
    }

    /// Every pending remote input event, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connector.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connector.subscribe()
    }

    /// Server replies reported under the configured verbosity so far.
    pub fn reported_replies(&self) -> u64 {
        self.replies.reported()
    }

    /// Why the last connection failed, if it did.
    pub fn last_error(&self) -> Option<String> {
        self.connector.last_error()
    }
}
