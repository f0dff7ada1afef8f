//! Connection state management

use std::time::Instant;

use crate::types::PeerId;

/// Connection state
///
/// The local device occupies exactly one role at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Doing nothing
    Idle,
    /// Waiting for a peer or a role decision
    Listening,
    /// Outgoing connection attempt in flight
    Connecting,
    /// Connected to the group owner (client role)
    ConnectedPeer,
    /// Acting as group owner with one or more inbound peers
    ConnectedServer,
}

impl ConnectionState {
    /// Check if a connection exists or is being established
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::ConnectedPeer
                | ConnectionState::ConnectedServer
        )
    }

    /// Check if at least one peer link is open
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectedPeer | ConnectionState::ConnectedServer
        )
    }

    /// Check if this device is the group owner
    #[must_use]
    pub fn is_server(self) -> bool {
        matches!(self, ConnectionState::ConnectedServer)
    }
}

/// Reason a peer link went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Local `stop()` or role change
    UserRequested,
    /// Stream I/O failed
    LinkError(String),
    /// Peer closed the stream cleanly
    PeerClosed,
}

/// Events delivered asynchronously to the session's observer
#[derive(Debug, Clone)]
pub enum ArrayEvent {
    /// Role/state transition
    StateChanged {
        /// The previous state
        old: ConnectionState,
        /// The new state
        new: ConnectionState,
    },
    /// A peer link opened
    PeerJoined {
        /// The new peer
        peer: PeerId,
        /// Open links after the join
        peers: usize,
    },
    /// A peer link closed
    PeerLeft {
        /// The departed peer
        peer: PeerId,
        /// Open links after the departure
        peers: usize,
        /// Why the link closed
        reason: DisconnectReason,
    },
    /// A wire message was written to a peer
    WriteCompleted {
        /// Destination peer
        peer: PeerId,
        /// Local send nanotime
        timestamp: i64,
    },
    /// A peer completed its first full sync window
    SyncCompleted {
        /// The synchronized peer
        peer: PeerId,
    },
    /// Toast-style user message
    Notice {
        /// Text to surface to the user
        message: String,
    },
    /// Error surfaced to the observer
    Error {
        /// The error message
        message: String,
        /// Whether retrying may help
        recoverable: bool,
    },
}

/// Per-session link statistics
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Time the first link of the session opened
    pub connected_at: Option<Instant>,
    /// Number of bytes sent
    pub bytes_sent: u64,
    /// Number of bytes received
    pub bytes_received: u64,
    /// Wire messages sent
    pub messages_sent: u64,
    /// Wire messages received
    pub messages_received: u64,
    /// Last error message
    pub last_error: Option<String>,
}

impl LinkStats {
    /// Get time since the first link opened
    #[must_use]
    pub fn uptime(&self) -> Option<std::time::Duration> {
        self.connected_at.map(|t| t.elapsed())
    }

    /// Record bytes sent
    pub fn record_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.messages_sent += 1;
    }

    /// Record bytes received
    pub fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.messages_received += 1;
    }
}
