//! Remote input events and the queue that buffers them.
//!
//! The connector's receive task pushes events as they arrive; caller code
//! (or the frame source, in streaming mode) drains them. The queue is
//! unbounded and never blocks the producer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

// ── Event ────────────────────────────────────────────────────────

/// A remote input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// A key changed state on a remote input device.
    Key {
        /// Key code as reported by the remote client (JavaScript key codes).
        code: i32,
        /// `true` on press, `false` on release.
        down: bool,
    },
}

impl Event {
    pub fn key(code: i32, down: bool) -> Self {
        Event::Key { code, down }
    }

    /// `Some(code)` for a key press, `None` otherwise.
    pub fn pressed_key(&self) -> Option<i32> {
        match *self {
            Event::Key { code, down: true } => Some(code),
            Event::Key { .. } => None,
        }
    }
}

// ── EventQueue ───────────────────────────────────────────────────

/// Unbounded, internally synchronised FIFO of [`Event`]s.
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&self, event: Event) {
        self.lock().push_back(event);
    }

    /// Append a key event.
    pub fn push_key(&self, code: i32, down: bool) {
        self.push(Event::key(code, down));
    }

    /// Take the oldest event, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<Event> {
        self.lock().pop_front()
    }

    /// Take every event present right now, oldest first.
    ///
    /// Events pushed after the call returns are left for the next drain.
    pub fn drain(&self) -> Vec<Event> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        // A panicking pusher cannot leave a VecDeque half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────
