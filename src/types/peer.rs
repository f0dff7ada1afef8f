use rand::Rng;

use crate::error::BeamSyncError;

/// Index of a peer link within the group-owner role.
///
/// Peer indices are assigned by the connection manager in accept order and
/// are not reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub usize);

impl PeerId {
    /// Get the raw index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

/// Unique identifier for a coordination session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random session ID
    #[must_use]
    pub fn new() -> Self {
        let id: u128 = rand::thread_rng().r#gen();
        Self(format!("{id:032X}"))
    }

    /// Create from string
    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A validated steering angle in degrees.
///
/// The beam cannot point behind the array: only [0, 180] is accepted, and
/// non-finite input is rejected before it reaches the delay calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringAngle(f64);

impl SteeringAngle {
    /// Broadside (perpendicular) steering
    pub const BROADSIDE: SteeringAngle = SteeringAngle(90.0);

    /// Validate and wrap an angle in degrees
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the angle is not a finite value in
    /// [0, 180].
    pub fn new(degrees: f64) -> Result<Self, BeamSyncError> {
        if !degrees.is_finite() {
            return Err(BeamSyncError::MalformedInput {
                input: degrees.to_string(),
                reason: "angle must be a finite number".to_string(),
            });
        }
        if !(0.0..=180.0).contains(&degrees) {
            return Err(BeamSyncError::MalformedInput {
                input: degrees.to_string(),
                reason: "angle cannot point behind the array".to_string(),
            });
        }
        Ok(Self(degrees))
    }

    /// Parse and validate an angle from user-supplied text
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` for non-numeric or out-of-range text.
    pub fn parse(text: &str) -> Result<Self, BeamSyncError> {
        let degrees: f64 = text
            .trim()
            .parse()
            .map_err(|_| BeamSyncError::MalformedInput {
                input: text.to_string(),
                reason: "angle must be numeric".to_string(),
            })?;
        Self::new(degrees)
    }

    /// The angle in degrees
    #[must_use]
    pub fn degrees(self) -> f64 {
        self.0
    }

    /// The angle in radians
    #[must_use]
    pub fn radians(self) -> f64 {
        self.0.to_radians()
    }
}
