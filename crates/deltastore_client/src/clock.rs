//! Wall-clock abstraction for local write timestamps.

use deltastore_protocol::Timestamp;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of timestamps for local writes.
///
/// Abstracted so conflict-resolution behavior is testable with controlled
/// time. Production code uses [`SystemClock`].
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// A manually advanced clock for tests.
///
/// Clones share the same underlying time, so a test can keep a handle while
/// the client owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Creates a clock starting at the given time.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Advances the clock by `millis`.
    pub fn advance(&self, millis: Timestamp) {
        *self.now.lock() += millis;
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Timestamp {
        *self.now.lock()
    }
}
