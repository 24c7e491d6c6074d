//! Monotonic millisecond clock for server-stamped record fields.
//!
//! `created_at` / `updated_at` stamps come from a [`MonotonicClock`], which
//! combines wall-clock time with a floor of "last issued + 1". Successive
//! stamps from one clock are strictly increasing even when the system clock
//! stalls within a millisecond or is stepped backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Backwards clock steps larger than this are logged.
const DRIFT_WARN_MS: u64 = 1_000;

/// Abstraction over the system clock for dependency injection.
///
/// Allows deterministic testing by replacing the real clock with a fixed or
/// scripted one.
pub trait ClockSource: Send + Sync {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now(&self) -> u64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Issues strictly increasing millisecond stamps.
pub struct MonotonicClock {
    last: AtomicU64,
    source: Box<dyn ClockSource>,
}

impl MonotonicClock {
    #[must_use]
    pub fn new(source: Box<dyn ClockSource>) -> Self {
        Self {
            last: AtomicU64::new(0),
            source,
        }
    }

    /// Clock backed by [`SystemClock`].
    #[must_use]
    pub fn system() -> Self {
        Self::new(Box::new(SystemClock))
    }

    /// Returns a stamp greater than every stamp previously returned.
    pub fn now(&self) -> u64 {
        let physical = self.source.now();
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let next = if physical > prev {
                physical
            } else {
                if prev - physical > DRIFT_WARN_MS {
                    warn!(
                        physical,
                        last = prev,
                        "system clock is behind the last issued stamp"
                    );
                }
                prev + 1
            };
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonotonicClock")
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
