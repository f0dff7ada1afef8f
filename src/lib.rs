//! # beamsync
//!
//! Synchronized multi-speaker playback with phased-array beam steering over
//! a local network.
//!
//! Two or more devices on a local link coordinate so each can trigger an
//! audio event at the same physical instant; the device acting as group
//! owner can additionally stagger each peer's trigger by a delay computed
//! from a steering angle, emulating a steered phased array of speakers.
//!
//! ## What the crate does
//!
//! - Estimates per-peer link lag and wall-clock offset over an unreliable
//!   point-to-point link using round-trip timestamp exchange (no shared
//!   clock required).
//! - Schedules future trigger instants against the local monotonic clock
//!   with deadline-based suspension, translated through the offset estimate.
//! - Manages the multi-role connection lifecycle: listener, outgoing
//!   connector, single-peer client, or bounded multi-peer group owner.
//!
//! Discovery/pairing, UI, and audio rendering stay outside: the core only
//! decides *when* to call the platform trigger callbacks.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use beamsync::{ArraySession, AudioTrigger, BeamSyncConfig};
//!
//! struct Tone;
//!
//! #[async_trait::async_trait]
//! impl AudioTrigger for Tone {
//!     async fn on_trigger_start(&self) { /* start the tone */ }
//!     async fn on_trigger_stop(&self) { /* stop the tone */ }
//! }
//!
//! # async fn example() -> Result<(), beamsync::BeamSyncError> {
//! let session = ArraySession::new(BeamSyncConfig::default(), Arc::new(Tone));
//! session.accept_as_server().await?;
//! // ...peers join...
//! session.send_synch().await?;
//! session.set_angle(45.0).await?;
//! session.send_play().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

// Internal modules
pub mod connection;
pub mod control;
pub mod net;
pub mod protocol;
mod session;

// Re-exports
pub use connection::{ArrayEvent, ConnectionManager, ConnectionState, DisconnectReason};
pub use control::{AudioTrigger, PlaybackScheduler, SessionContext, compute_delay};
pub use error::BeamSyncError;
pub use protocol::{ClockSyncEngine, LocalClock, SyncSample, WireMessage};
pub use session::ArraySession;
pub use types::{BeamSyncConfig, PeerId, SessionId, SteeringAngle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        ArrayEvent, ArraySession, AudioTrigger, BeamSyncConfig, BeamSyncError, ConnectionState,
        PeerId, SteeringAngle,
    };
}
