//! Clock abstraction for review-session expiry.
//!
//! Production code uses [`SystemClock`]; tests drive a [`MockClock`] forward
//! by hand instead of sleeping.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }
}

/// Real monotonic time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests.
///
/// Starts at the instant it was created and only moves on [`advance`].
///
/// [`advance`]: MockClock::advance
#[derive(Debug)]
pub struct MockClock {
    current: Mutex<Instant>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Creates a stopped clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Instant::now()),
        }
    }

    /// Creates a clock that a test can keep a handle to after handing it
    /// to a session.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    fn lock(&self) -> MutexGuard<'_, Instant> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.lock()
    }
}

impl Clock for Arc<MockClock> {
    fn now(&self) -> Instant {
        self.as_ref().now()
    }
}
