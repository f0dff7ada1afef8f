//! Top-level coordination session.
//!
//! [`ArraySession`] wires the connection manager, sync engine, steering
//! calculator, and playback scheduler together and runs the single
//! message-handling context all shared state is mutated on. Messages from
//! one peer are processed in arrival order; ping retransmission deadlines
//! and shutdown are folded into the same `select!` loop, so nothing in the
//! handling context ever busy-waits or blocks on a stream.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::connection::{
    ArrayEvent, ConnectionManager, ConnectionState, InboundFrame, SendTarget,
};
use crate::control::{
    AudioTrigger, PhaseDelayCalculator, PlaybackScheduler, SessionContext,
};
use crate::error::{BeamSyncError, Result};
use crate::protocol::codec::WireMessage;
use crate::protocol::sync::{ClockSyncEngine, LocalClock, ReplyOutcome, SyncAction};
use crate::types::{BeamSyncConfig, PeerId, SessionId, SteeringAngle};

/// A running coordination session.
///
/// One per device. The session holds the device's role (via the connection
/// manager), the per-session timing context that replaces any global state,
/// and the dispatcher task that handles every inbound message.
pub struct ArraySession {
    id: SessionId,
    config: BeamSyncConfig,
    clock: LocalClock,
    connection: Arc<ConnectionManager>,
    context: Arc<SessionContext>,
    scheduler: Arc<PlaybackScheduler>,
    calculator: PhaseDelayCalculator,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ArraySession {
    /// Create a session and start its handling context.
    ///
    /// `trigger` receives the platform start/stop callbacks.
    #[must_use]
    pub fn new(config: BeamSyncConfig, trigger: Arc<dyn AudioTrigger>) -> Arc<Self> {
        let id = SessionId::new();
        let clock = LocalClock::new();
        let (connection, inbound_rx) = ConnectionManager::new(config.clone(), clock.clone());
        let context = Arc::new(SessionContext::new());
        let scheduler = Arc::new(PlaybackScheduler::new(
            trigger,
            Arc::clone(&context),
            clock.clone(),
            config.play_lead_nanos(),
        ));
        let calculator = PhaseDelayCalculator::new(&config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(session = id.as_str(), "session starting");

        let dispatcher = Dispatcher {
            connection: Arc::clone(&connection),
            scheduler: Arc::clone(&scheduler),
            context: Arc::clone(&context),
            clock: clock.clone(),
            engine: ClockSyncEngine::new(config.sync_window),
            retry_interval: config.ping_retry_interval,
            deadlines: BTreeMap::new(),
            play_source: None,
        };
        let events = connection.subscribe();
        let handle = tokio::spawn(dispatcher.run(inbound_rx, events, shutdown_rx));

        Arc::new(Self {
            id,
            config,
            clock,
            connection,
            context,
            scheduler,
            calculator,
            dispatcher: Mutex::new(Some(handle)),
            shutdown_tx,
        })
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &BeamSyncConfig {
        &self.config
    }

    /// Shared timing context (offset, phase delay, angle)
    #[must_use]
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// The session's local clock
    #[must_use]
    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    /// Number of open peer links
    pub async fn peer_count(&self) -> usize {
        self.connection.peer_count().await
    }

    /// Address the server role is bound to, once accepting
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.connection.local_addr().await
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ArrayEvent> {
        self.connection.subscribe()
    }

    /// Enter listening mode
    pub async fn start_listening(&self) {
        self.connection.start_listening().await;
    }

    /// Dial the group owner at `addr` (client role)
    pub async fn connect(&self, addr: SocketAddr) {
        self.connection.connect(addr).await;
    }

    /// Take the group-owner role and accept peers.
    ///
    /// # Errors
    ///
    /// Returns an error if the server port cannot be bound.
    pub async fn accept_as_server(&self) -> Result<SocketAddr> {
        self.connection.accept_as_server().await
    }

    /// Confirm a steering angle.
    ///
    /// Validates the angle, recomputes the phase delay, caches both, and
    /// (in the group-owner role) broadcasts the delay to every peer.
    /// Returns the computed delay in nanoseconds.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` for non-finite or out-of-range angles; the
    /// previous angle and delay stay in effect.
    pub async fn set_angle(&self, degrees: f64) -> Result<i64> {
        let angle = SteeringAngle::new(degrees)?;
        let delay = self.calculator.delay_for(angle);
        self.context.set_angle_degrees(angle.degrees());
        self.context.set_phase_delay(delay);
        tracing::info!(degrees = angle.degrees(), delay, "steering angle confirmed");

        if self.state().await.is_server() && self.peer_count().await > 0 {
            if let Err(e) = self
                .connection
                .send(SendTarget::All, &WireMessage::Phase { delay })
                .await
            {
                tracing::warn!(error = %e, "failed to broadcast phase delay");
            }
        }
        Ok(delay)
    }

    /// Broadcast a synchronized start anchored to the local nanotime.
    ///
    /// Returns the timestamp embedded in the message.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when not in the group-owner role, or the send
    /// error if every write failed.
    pub async fn send_play(&self) -> Result<i64> {
        self.require_server().await?;
        let timestamp = self.clock.now_nanos();
        self.connection
            .send(SendTarget::All, &WireMessage::Play { timestamp })
            .await?;
        Ok(timestamp)
    }

    /// Broadcast an immediate stop to every open link.
    ///
    /// # Errors
    ///
    /// Returns the send error if every write failed.
    pub async fn send_stop(&self) -> Result<()> {
        self.connection
            .send(SendTarget::All, &WireMessage::Stop)
            .await?;
        Ok(())
    }

    /// Request a sync round from every peer (group-owner role).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when not in the group-owner role, or the send
    /// error if every write failed.
    pub async fn send_synch(&self) -> Result<()> {
        self.require_server().await?;
        self.connection
            .send(SendTarget::All, &WireMessage::Synch)
            .await?;
        Ok(())
    }

    /// End the session: stop the handling context, cancel any pending
    /// trigger, close every link, and forget the timing state.
    pub async fn shutdown(&self) {
        tracing::info!(session = self.id.as_str(), "session shutting down");
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.dispatcher.lock().await.take() {
            let _ = handle.await;
        }
        self.scheduler.cancel_pending().await;
        self.connection.stop().await;
        self.context.reset();
    }

    async fn require_server(&self) -> Result<()> {
        let state = self.state().await;
        if state.is_server() {
            Ok(())
        } else {
            self.connection.notify(ArrayEvent::Notice {
                message: "not connected as group owner".to_string(),
            });
            Err(BeamSyncError::InvalidState {
                message: "operation requires the group-owner role".to_string(),
                current_state: format!("{state:?}"),
            })
        }
    }
}

/// The single message-handling context.
///
/// All mutation of the sync engine, retry deadlines, and scheduling flows
/// through `run`, so no lock is ever needed around them.
struct Dispatcher {
    connection: Arc<ConnectionManager>,
    scheduler: Arc<PlaybackScheduler>,
    context: Arc<SessionContext>,
    clock: LocalClock,
    engine: ClockSyncEngine,
    retry_interval: Duration,
    /// Retransmission deadline per peer with a ping in flight
    deadlines: BTreeMap<PeerId, Instant>,
    /// Peer whose timestamps the pending trigger depends on
    play_source: Option<PeerId>,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut inbound: mpsc::Receiver<InboundFrame>,
        mut events: broadcast::Receiver<ArrayEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let next_deadline = self.deadlines.values().min().copied();

            tokio::select! {
                frame = inbound.recv() => {
                    match frame {
                        Some(frame) => self.handle_frame(frame).await,
                        None => break,
                    }
                }

                () = async {
                    match next_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.handle_deadlines().await;
                }

                event = events.recv() => {
                    match event {
                        Ok(ArrayEvent::PeerLeft { peer, .. }) => self.handle_peer_left(peer).await,
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                changed = shutdown.changed() => {
                    // A dropped sender means the session itself is gone.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("handling context finished");
    }

    async fn handle_frame(&mut self, frame: InboundFrame) {
        match frame.message {
            WireMessage::Synch => {
                let action = self.engine.begin(frame.peer);
                self.perform(action).await;
            }
            WireMessage::Ping { window, round } => {
                // Group-owner side: answer with our receive time and a
                // send stamp taken at encode time.
                let reply = WireMessage::PingReply {
                    server_received: frame.received_at,
                    server_sent: self.clock.now_nanos(),
                    window,
                    round,
                };
                if let Err(e) = self.connection.send(SendTarget::Peer(frame.peer), &reply).await {
                    tracing::warn!(peer = %frame.peer, error = %e, "failed to answer ping");
                }
            }
            WireMessage::PingReply {
                server_received,
                server_sent,
                window,
                round,
            } => {
                self.handle_reply(
                    frame.peer,
                    window,
                    round,
                    server_received,
                    server_sent,
                    frame.received_at,
                )
                .await;
            }
            WireMessage::Play { timestamp } => {
                self.play_source = Some(frame.peer);
                self.scheduler.schedule_play(timestamp).await;
            }
            WireMessage::Phase { delay } => {
                self.scheduler.apply_phase(delay).await;
            }
            WireMessage::Stop => {
                self.play_source = None;
                self.scheduler.stop().await;
            }
            WireMessage::Unrecognized => {
                tracing::debug!(peer = %frame.peer, "ignoring unrecognized message");
            }
        }
    }

    async fn handle_reply(
        &mut self,
        peer: PeerId,
        window: u8,
        round: u32,
        server_received: i64,
        server_sent: i64,
        client_received: i64,
    ) {
        let outcome = match self.engine.on_reply(
            peer,
            window,
            round,
            server_received,
            server_sent,
            client_received,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                // Round discarded; the armed retry deadline re-sends it.
                tracing::debug!(%peer, error = %e, "discarding sync round");
                return;
            }
        };

        match outcome {
            ReplyOutcome::Stale => {}
            ReplyOutcome::Sampled { sample, next } => {
                self.deadlines.remove(&peer);
                self.context.set_clock_offset(sample.offset);
                self.perform(next).await;
            }
            ReplyOutcome::WindowComplete { sample, first } => {
                self.deadlines.remove(&peer);
                self.context.set_clock_offset(sample.offset);
                if first {
                    self.connection.mark_synced(peer).await;
                    self.connection.notify(ArrayEvent::SyncCompleted { peer });
                }
            }
        }
    }

    async fn handle_deadlines(&mut self) {
        let now = Instant::now();
        let due: Vec<PeerId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(peer, _)| *peer)
            .collect();

        for peer in due {
            self.deadlines.remove(&peer);
            if let Some(action) = self.engine.on_retry_deadline(peer) {
                self.perform(action).await;
            }
        }
    }

    async fn handle_peer_left(&mut self, peer: PeerId) {
        self.engine.remove_peer(peer);
        self.deadlines.remove(&peer);
        if self.play_source == Some(peer) {
            // The pending instant depended on the departed peer's
            // timestamps; abandon it like a lost sync round.
            tracing::debug!(%peer, "cancelling pending trigger for lost peer");
            self.scheduler.cancel_pending().await;
            self.play_source = None;
        }
    }

    async fn perform(&mut self, action: SyncAction) {
        match action {
            SyncAction::SendPing {
                peer,
                window,
                round,
            } => {
                let ping = WireMessage::Ping { window, round };
                match self.connection.send(SendTarget::Peer(peer), &ping).await {
                    Ok(sent_at) => {
                        self.engine.note_ping_sent(peer, window, round, sent_at);
                        self.deadlines.insert(peer, Instant::now() + self.retry_interval);
                    }
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "failed to send ping");
                        self.deadlines.remove(&peer);
                    }
                }
            }
        }
    }
}
