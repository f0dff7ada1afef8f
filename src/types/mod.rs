//! Core types shared across the crate

mod config;
mod peer;

#[cfg(test)]
mod tests;

pub use config::{BeamSyncConfig, BeamSyncConfigBuilder};
pub use peer::{PeerId, SessionId, SteeringAngle};
