//! Shared per-session timing state.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Per-session timing context shared read-only across components.
///
/// Replaces ad-hoc session globals: the sync engine is the sole writer of
/// the clock offset, the steering interface the sole writer of the phase
/// delay, and the scheduler reads both when resolving a trigger instant.
#[derive(Debug, Default)]
pub struct SessionContext {
    clock_offset: AtomicI64,
    offset_set: AtomicBool,
    phase_delay: AtomicI64,
    phase_set: AtomicBool,
    /// Last confirmed steering angle, stored as bits for atomic access
    angle_bits: AtomicU64,
    angle_set: AtomicBool,
}

impl SessionContext {
    /// Create a context with no offset, delay, or angle set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest clock offset estimate for the remote peer, nanoseconds
    #[must_use]
    pub fn clock_offset(&self) -> Option<i64> {
        if self.offset_set.load(Ordering::Acquire) {
            Some(self.clock_offset.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Publish a new clock offset estimate
    pub fn set_clock_offset(&self, offset: i64) {
        self.clock_offset.store(offset, Ordering::Release);
        self.offset_set.store(true, Ordering::Release);
    }

    /// Standing phase delay, nanoseconds, if one has been confirmed
    #[must_use]
    pub fn phase_delay(&self) -> Option<i64> {
        if self.phase_set.load(Ordering::Acquire) {
            Some(self.phase_delay.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Publish a new phase delay
    pub fn set_phase_delay(&self, delay: i64) {
        self.phase_delay.store(delay, Ordering::Release);
        self.phase_set.store(true, Ordering::Release);
    }

    /// Last confirmed steering angle in degrees
    #[must_use]
    pub fn angle_degrees(&self) -> Option<f64> {
        if self.angle_set.load(Ordering::Acquire) {
            Some(f64::from_bits(self.angle_bits.load(Ordering::Acquire)))
        } else {
            None
        }
    }

    /// Record the confirmed steering angle
    pub fn set_angle_degrees(&self, degrees: f64) {
        self.angle_bits.store(degrees.to_bits(), Ordering::Release);
        self.angle_set.store(true, Ordering::Release);
    }

    /// Forget all timing state (used when a session ends)
    pub fn reset(&self) {
        self.offset_set.store(false, Ordering::Release);
        self.phase_set.store(false, Ordering::Release);
        self.angle_set.store(false, Ordering::Release);
    }
}
