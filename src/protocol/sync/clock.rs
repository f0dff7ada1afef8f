//! Monotonic nanosecond clock for wire timestamps.

use std::time::Duration;

use tokio::time::Instant;

/// Monotonic local clock, read as signed nanoseconds since an arbitrary
/// per-session origin.
///
/// Wire timestamps (`play`, ping rounds) are raw readings of each device's
/// own clock; the offset estimate translates between domains, so the origin
/// never needs to be shared. Built on the runtime clock so paused-time tests
/// drive it deterministically.
#[derive(Debug, Clone)]
pub struct LocalClock {
    origin: Instant,
}

impl LocalClock {
    /// Create a clock anchored at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Current reading in nanoseconds since the origin
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn now_nanos(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
    }

    /// Map a nanosecond reading back to a runtime instant.
    ///
    /// Readings at or before the current instant map to "now", so a deadline
    /// sleep on the result returns immediately rather than underflowing.
    #[must_use]
    pub fn deadline(&self, target_nanos: i64) -> Instant {
        if target_nanos <= 0 {
            return Instant::now();
        }
        #[allow(clippy::cast_sign_loss)]
        let offset = Duration::from_nanos(target_nanos as u64);
        self.origin + offset
    }

    /// Suspend until the clock reads `target_nanos`.
    ///
    /// A deadline-based sleep: already-elapsed targets return immediately,
    /// and the wait is cancellable from a `select!`.
    pub async fn sleep_until_nanos(&self, target_nanos: i64) {
        let deadline = self.deadline(target_nanos);
        if deadline > Instant::now() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new()
    }
}
