//! Steering-angle to phase-delay conversion.

use crate::types::{BeamSyncConfig, SteeringAngle};

/// Convert a steering angle into a per-peer trigger delay in nanoseconds.
///
/// `delay = coefficient * time_delay_nanos * cos(angle)`
///
/// With the default coefficient of -3/4 this sweeps from
/// `-(3/4)*C` at 0° through 0 at broadside to `+(3/4)*C` at 180°.
/// Deterministic and side-effect free; the caller validates the angle and
/// caches the result for subsequent scheduling messages.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compute_delay(angle: SteeringAngle, coefficient: f64, time_delay_nanos: f64) -> i64 {
    (coefficient * time_delay_nanos * angle.radians().cos()) as i64
}

/// Delay calculator bound to a session's array constants
#[derive(Debug, Clone, Copy)]
pub struct PhaseDelayCalculator {
    coefficient: f64,
    time_delay_nanos: f64,
}

impl PhaseDelayCalculator {
    /// Create a calculator from session configuration
    #[must_use]
    pub fn new(config: &BeamSyncConfig) -> Self {
        Self {
            coefficient: config.steering_coefficient,
            time_delay_nanos: config.array_time_delay_nanos,
        }
    }

    /// Delay for a confirmed angle, in nanoseconds
    #[must_use]
    pub fn delay_for(&self, angle: SteeringAngle) -> i64 {
        compute_delay(angle, self.coefficient, self.time_delay_nanos)
    }
}
