use std::io;
use thiserror::Error;

/// Errors that can occur during array coordination
#[derive(Debug, Error)]
pub enum BeamSyncError {
    // ===== Link Errors =====
    /// Stream read/write failure on a single peer link
    ///
    /// Terminal for that link only; the manager tears the peer down and
    /// reverts to listening. Never fatal to the process.
    #[error("link I/O error on peer {peer}: {source}")]
    LinkIo {
        /// Index of the affected peer link
        peer: usize,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Outbound connect attempt was rejected or timed out
    #[error("connect attempt to {address} failed: {message}")]
    ConnectAttemptFailed {
        /// The address that was dialed
        address: String,
        /// Description of the failure
        message: String,
        /// The underlying source of the error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Server role refused a connection beyond the peer limit
    #[error("peer limit of {limit} reached")]
    PeerLimitReached {
        /// Maximum number of simultaneous peers
        limit: usize,
    },

    // ===== Input Errors =====
    /// Non-numeric or out-of-range user input (e.g. a steering angle)
    ///
    /// Reported to the user; component state is unchanged.
    #[error("malformed input {input:?}: {reason}")]
    MalformedInput {
        /// The offending input, as received
        input: String,
        /// Why it was rejected
        reason: String,
    },

    // ===== Sync Errors =====
    /// A sync round completed with fewer than four timestamps
    ///
    /// Silently discarded; the round is retried.
    #[error("incomplete sync round {round} in window slot {window}")]
    IncompleteSyncRound {
        /// Window slot the round was targeting
        window: u8,
        /// Round counter within that slot
        round: u32,
    },

    // ===== Protocol Errors =====
    /// Wire message encoding/decoding failed
    #[error("codec error: {message}")]
    CodecError {
        /// Description of the error
        message: String,
    },

    // ===== State Errors =====
    /// Operation not valid in the current connection state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },

    /// Internal channel to the handling context closed
    #[error("session channel closed")]
    ChannelClosed,

    // ===== I/O Errors =====
    /// Network I/O error not attributable to a single peer link
    #[error("network error: {0}")]
    NetworkError(#[from] io::Error),

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,
}

impl BeamSyncError {
    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::LinkIo { .. }
                | Self::ConnectAttemptFailed { .. }
                | Self::IncompleteSyncRound { .. }
                | Self::NetworkError(_)
        )
    }

    /// Check if this error tears down a peer link
    #[must_use]
    pub fn is_link_fatal(&self) -> bool {
        matches!(self, Self::LinkIo { .. } | Self::ChannelClosed)
    }
}

/// Result type alias for array coordination operations
pub type Result<T> = std::result::Result<T, BeamSyncError>;
