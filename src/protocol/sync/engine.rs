//! Per-peer sync round state machine.
//!
//! Owns one [`SampleWindow`] per peer and the bookkeeping for the round in
//! flight. The engine never performs I/O and never blocks: it returns
//! [`SyncAction`]s for the session loop to execute, and the loop calls back
//! in when a reply arrives or the retry deadline passes.

use std::collections::HashMap;

use crate::error::BeamSyncError;
use crate::types::PeerId;

use super::sample::SyncSample;
use super::window::SampleWindow;

/// An I/O action the session loop must perform for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Write a ping round marker to the peer and arm the retry deadline
    SendPing {
        /// Peer to ping
        peer: PeerId,
        /// Window slot the round targets
        window: u8,
        /// Round counter within that slot
        round: u32,
    },
}

/// What a ping reply did to the engine's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply did not match the round in flight and was ignored
    Stale,
    /// A round completed; the next round's ping should be sent
    Sampled {
        /// The derived sample
        sample: SyncSample,
        /// Ping for the next window slot
        next: SyncAction,
    },
    /// A round completed and filled the window; pinging pauses until the
    /// next `synch` request
    WindowComplete {
        /// The derived sample
        sample: SyncSample,
        /// Whether this was the peer's first completed window
        first: bool,
    },
}

/// The ping in flight for one peer
#[derive(Debug, Clone, Copy)]
struct OutstandingPing {
    window: u8,
    round: u32,
    client_sent: i64,
}

/// Sync state for one peer
struct PeerSync {
    window: SampleWindow,
    /// Round counter within the current slot, bumped on every retry
    round: u32,
    outstanding: Option<OutstandingPing>,
}

impl PeerSync {
    fn new(window_size: usize) -> Self {
        Self {
            window: SampleWindow::new(window_size),
            round: 0,
            outstanding: None,
        }
    }
}

/// Clock synchronization engine: lag/offset estimation over all peers.
///
/// Sole mutator of per-peer sample windows. Peers are created lazily on
/// first use and dropped when their link closes.
pub struct ClockSyncEngine {
    peers: HashMap<PeerId, PeerSync>,
    window_size: usize,
}

impl ClockSyncEngine {
    /// Create an engine producing windows of `window_size` samples
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            peers: HashMap::new(),
            window_size: window_size.max(1),
        }
    }

    /// Begin (or restart) pinging a peer in response to a `synch` request.
    ///
    /// Any round already in flight is abandoned; the new round starts at
    /// the window's current slot with a fresh counter.
    pub fn begin(&mut self, peer: PeerId) -> SyncAction {
        let state = self
            .peers
            .entry(peer)
            .or_insert_with(|| PeerSync::new(self.window_size));
        state.round = 0;
        state.outstanding = None;
        SyncAction::SendPing {
            peer,
            window: state.window.slot(),
            round: 0,
        }
    }

    /// Record that a ping was written, capturing the client send time.
    ///
    /// Must be called once per executed [`SyncAction::SendPing`].
    pub fn note_ping_sent(&mut self, peer: PeerId, window: u8, round: u32, client_sent: i64) {
        let state = self
            .peers
            .entry(peer)
            .or_insert_with(|| PeerSync::new(self.window_size));
        state.window.note_transmission();
        state.outstanding = Some(OutstandingPing {
            window,
            round,
            client_sent,
        });
    }

    /// Process a binary ping reply.
    ///
    /// A reply is matched to the round in flight by its `(window, round)`
    /// pair; anything else is stale and ignored. A matching reply completes
    /// the round, records a sample, and either advances to the next slot or
    /// completes the window.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteSyncRound` if the matching round is missing a
    /// timestamp; the round stays armed for retry and no sample is recorded.
    pub fn on_reply(
        &mut self,
        peer: PeerId,
        window: u8,
        round: u32,
        server_received: i64,
        server_sent: i64,
        client_received: i64,
    ) -> Result<ReplyOutcome, BeamSyncError> {
        let Some(state) = self.peers.get_mut(&peer) else {
            return Ok(ReplyOutcome::Stale);
        };
        let Some(outstanding) = state.outstanding else {
            return Ok(ReplyOutcome::Stale);
        };
        if outstanding.window != window || outstanding.round != round {
            tracing::debug!(
                %peer,
                got_window = window,
                got_round = round,
                want_window = outstanding.window,
                want_round = outstanding.round,
                "ignoring stale ping reply"
            );
            return Ok(ReplyOutcome::Stale);
        }

        let sample = SyncSample::try_from_parts(
            window,
            round,
            Some(outstanding.client_sent),
            Some(client_received),
            Some(server_received),
            Some(server_sent),
        )?;

        state.outstanding = None;
        state.round = 0;
        let filled = state.window.record(sample);

        if filled {
            let first = state.window.completed_windows() == 1;
            Ok(ReplyOutcome::WindowComplete { sample, first })
        } else {
            Ok(ReplyOutcome::Sampled {
                sample,
                next: SyncAction::SendPing {
                    peer,
                    window: state.window.slot(),
                    round: 0,
                },
            })
        }
    }

    /// Handle a retry deadline: if the round in flight is still unanswered,
    /// retransmit with an incremented round counter.
    ///
    /// Returns `None` when nothing is outstanding (the reply won the race).
    pub fn on_retry_deadline(&mut self, peer: PeerId) -> Option<SyncAction> {
        let state = self.peers.get_mut(&peer)?;
        let outstanding = state.outstanding.take()?;

        state.round = outstanding.round + 1;
        tracing::debug!(
            %peer,
            window = outstanding.window,
            round = state.round,
            "ping unanswered, retransmitting"
        );
        Some(SyncAction::SendPing {
            peer,
            window: outstanding.window,
            round: state.round,
        })
    }

    /// Latest offset estimate for a peer, if any round has completed
    #[must_use]
    pub fn clock_offset(&self, peer: PeerId) -> Option<i64> {
        self.peers.get(&peer)?.window.latest().map(|s| s.offset)
    }

    /// Latest lag estimate for a peer, if any round has completed
    #[must_use]
    pub fn lag(&self, peer: PeerId) -> Option<i64> {
        self.peers.get(&peer)?.window.latest().map(|s| s.lag)
    }

    /// Whether the peer has completed at least one full window
    #[must_use]
    pub fn has_completed_window(&self, peer: PeerId) -> bool {
        self.peers
            .get(&peer)
            .is_some_and(|s| s.window.completed_windows() > 0)
    }

    /// Whether a ping is currently unanswered for the peer
    #[must_use]
    pub fn has_outstanding(&self, peer: PeerId) -> bool {
        self.peers
            .get(&peer)
            .is_some_and(|s| s.outstanding.is_some())
    }

    /// Drop all state for a closed peer link.
    ///
    /// Any round in flight is abandoned as lost, so no deadline or wait can
    /// hang on the departed peer.
    pub fn remove_peer(&mut self, peer: PeerId) {
        self.peers.remove(&peer);
    }
}
