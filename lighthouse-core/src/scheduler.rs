//! Fixed-rate frame scheduler.
//!
//! One Tokio task per running session. Each tick:
//!
//! 1. Sleeps until the next wall-clock multiple of the frame interval.
//! 2. Asks the [`FrameSource`] (if any) for a new image and writes it into
//!    the canvas.
//! 3. Sends the canvas through the [`Connector`] while holding the canvas
//!    lock.
//! 4. Checks the cooperative stop flag.
//!
//! The whole tick runs under the schedule lock, so a frame-rate or source
//! change never lands in the middle of a tick. Ticks that overrun the
//! interval wake at the next boundary after completion: frames are dropped,
//! never queued. A slow frame source delays the loop; it is not preempted.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::canvas::{Canvas, ImageData};
use crate::error::LighthouseError;
use crate::event::{Event, EventQueue};
use crate::network::Connector;

/// Highest accepted frame rate in Hz.
pub const MAX_FRAME_RATE: f64 = 60.0;

/// Frame rate used when none is configured.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

// ── FrameRate ────────────────────────────────────────────────────

/// A validated frame rate in `(0, 60]` Hz.
///
/// The tick interval is computed once at construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct FrameRate {
    hz: f64,
    interval: Duration,
}

impl FrameRate {
    /// Fails with [`LighthouseError::InvalidFrameRate`] outside `(0, 60]`,
    /// including NaN, and for rates so low their interval does not fit a
    /// [`Duration`]. Never clamps.
    pub fn new(hz: f64) -> Result<Self, LighthouseError> {
        if !(hz > 0.0 && hz <= MAX_FRAME_RATE) {
            return Err(LighthouseError::InvalidFrameRate(hz));
        }
        let interval = Duration::try_from_secs_f64(1.0 / hz)
            .map_err(|_| LighthouseError::InvalidFrameRate(hz))?;
        Ok(Self { hz, interval })
    }

    pub fn hz(self) -> f64 {
        self.hz
    }

    /// Time between ticks.
    pub fn interval(self) -> Duration {
        self.interval
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self {
            hz: DEFAULT_FRAME_RATE,
            interval: Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE),
        }
    }
}

impl TryFrom<f64> for FrameRate {
    type Error = LighthouseError;

    fn try_from(hz: f64) -> Result<Self, Self::Error> {
        Self::new(hz)
    }
}

impl From<FrameRate> for f64 {
    fn from(rate: FrameRate) -> Self {
        rate.hz
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz)
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// Produces the image for each tick.
///
/// `events` holds the remote input received since the previous tick when
/// the session streams remote input, and is empty otherwise. Closures
/// `FnMut(&[Event]) -> impl Into<ImageData>` implement this trait.
pub trait FrameSource: Send + 'static {
    fn next_frame(&mut self, events: &[Event]) -> ImageData;
}

impl<F, I> FrameSource for F
where
    F: FnMut(&[Event]) -> I + Send + 'static,
    I: Into<ImageData>,
{
    fn next_frame(&mut self, events: &[Event]) -> ImageData {
        self(events).into()
    }
}

// ── Schedule ─────────────────────────────────────────────────────

/// Settings guarded by the schedule lock.
pub struct Schedule {
    pub rate: FrameRate,
    pub source: Option<Box<dyn FrameSource>>,
}

impl Schedule {
    pub fn new(rate: FrameRate) -> Self {
        Self { rate, source: None }
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("rate", &self.rate)
            .field("source", &self.source.is_some())
            .finish()
    }
}

// ── Timing ───────────────────────────────────────────────────────

/// Time since the Unix epoch.
pub fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Delay from `now` to the next multiple of `interval`, in `(0, interval]`.
///
/// Aligning to absolute boundaries keeps tick spacing at `interval` no
/// matter how long the previous tick's work took.
pub fn phase_delay(now: Duration, interval: Duration) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    let interval_ns = interval.as_nanos().max(1);
    let delay = interval_ns - now.as_nanos() % interval_ns;
    // `delay <= interval`, so the seconds part fits whenever `interval` does.
    let secs = u64::try_from(delay / NANOS_PER_SEC).unwrap_or(u64::MAX);
    let nanos = u32::try_from(delay % NANOS_PER_SEC).unwrap_or(0);
    Duration::new(secs, nanos)
}

// ── FrameScheduler ───────────────────────────────────────────────

/// Shared state the scheduler task works on.
#[derive(Clone)]
pub struct SchedulerContext {
    pub canvas: Arc<Mutex<Canvas>>,
    pub schedule: Arc<Mutex<Schedule>>,
    pub connector: Arc<Connector>,
    pub events: Arc<EventQueue>,
    /// Hand drained remote input to the frame source each tick.
    pub stream_events: bool,
}

/// Handle to a running scheduler task.
///
/// Dropping the handle requests a stop; [`stop`](Self::stop) also waits
/// for the task and returns how it ended.
pub struct FrameScheduler {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<u64, LighthouseError>>>,
}

impl FrameScheduler {
    /// Spawn the tick loop on the current Tokio runtime.
    pub fn spawn(ctx: SchedulerContext) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            let result = run(ctx, flag).await;
            match &result {
                Ok(frames) => debug!("frame scheduler stopped after {frames} frames"),
                Err(e) => warn!("frame scheduler stopped: {e}"),
            }
            result
        });
        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Whether the loop is still ticking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request a stop and wait for the loop to exit.
    ///
    /// Returns the number of frames sent, or the error that ended the loop.
    /// Latency is bounded by one interval plus one frame-source call.
    pub async fn stop(mut self) -> Result<u64, LighthouseError> {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle.await?,
            None => Ok(0),
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn run(ctx: SchedulerContext, running: Arc<AtomicBool>) -> Result<u64, LighthouseError> {
    let mut frames: u64 = 0;

    loop {
        let mut schedule = ctx.schedule.lock().await;

        let interval = schedule.rate.interval();
        tokio::time::sleep(phase_delay(wall_clock(), interval)).await;

        if let Some(source) = schedule.source.as_mut() {
            let events = if ctx.stream_events {
                ctx.events.drain()
            } else {
                Vec::new()
            };
            let image = source.next_frame(&events);
            ctx.canvas.lock().await.set_image(image)?;
        }

        {
            let canvas = ctx.canvas.lock().await;
            ctx.connector.send(canvas.as_bytes()).await?;
        }
        frames += 1;
        drop(schedule);

        if !running.load(Ordering::SeqCst) {
            return Ok(frames);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
