//! Connection manager for the coordination link.
//!
//! Single authority over which role the local device occupies and over every
//! peer byte stream. Each accepted or dialed stream gets a dedicated read
//! task that classifies inbound bytes and forwards them to the session's
//! single handling context; writes go through a lock scoped to the one
//! stream being written. Stream errors tear down that peer only and the
//! state machine falls back to listening when no peers remain.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::{BeamSyncError, Result};
use crate::net::{self, Runtime, TcpListener, TcpStream};
use crate::protocol::codec::WireMessage;
use crate::protocol::sync::LocalClock;
use crate::types::{BeamSyncConfig, PeerId};

use super::state::{ArrayEvent, ConnectionState, DisconnectReason, LinkStats};

/// Capacity of the inbound frame channel; read loops apply backpressure
/// when the handling context falls behind.
const INBOUND_CHANNEL_CAPACITY: usize = 64;

/// A classified message as handed to the session's handling context
#[derive(Debug, Clone)]
pub struct InboundFrame {
    /// Peer the bytes arrived from
    pub peer: PeerId,
    /// The classified message
    pub message: WireMessage,
    /// Local clock at read completion, nanoseconds
    pub received_at: i64,
}

/// Destination of an outbound write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTarget {
    /// One specific peer link
    Peer(PeerId),
    /// Every open peer link
    All,
}

/// One owned peer byte stream
struct PeerLink {
    peer: PeerId,
    addr: SocketAddr,
    /// Write half behind its own lock; writes to different peers never
    /// serialize against each other
    writer: Arc<Mutex<OwnedWriteHalf>>,
    read_task: JoinHandle<()>,
    /// Set once the peer completes its first full sync window
    synced: Arc<AtomicBool>,
}

/// The device's current role, as tagged variants over shared link handling
enum ActiveRole {
    /// Single outbound link to the group owner
    Client {
        /// The one link
        link: PeerLink,
    },
    /// Group owner with inbound peer links
    Server {
        /// Accepted links, keyed by peer index
        links: BTreeMap<PeerId, PeerLink>,
    },
}

impl ActiveRole {
    fn peer_count(&self) -> usize {
        match self {
            Self::Client { .. } => 1,
            Self::Server { links } => links.len(),
        }
    }

    fn link(&self, peer: PeerId) -> Option<&PeerLink> {
        match self {
            Self::Client { link } if link.peer == peer => Some(link),
            Self::Client { .. } => None,
            Self::Server { links } => links.get(&peer),
        }
    }

    fn links(&self) -> Vec<&PeerLink> {
        match self {
            Self::Client { link } => vec![link],
            Self::Server { links } => links.values().collect(),
        }
    }
}

/// Connection manager: owns every peer link and the role state machine
pub struct ConnectionManager {
    /// Configuration
    config: BeamSyncConfig,
    /// Session clock for send/receive timestamps
    clock: LocalClock,
    /// Current state
    state: RwLock<ConnectionState>,
    /// Current role and its links
    role: Mutex<Option<ActiveRole>>,
    /// Next peer index to assign
    next_peer: AtomicUsize,
    /// In-flight outbound connect attempt
    connect_task: Mutex<Option<JoinHandle<()>>>,
    /// Server accept loop
    accept_task: Mutex<Option<JoinHandle<()>>>,
    /// Bound listener address (server role)
    listener_addr: Mutex<Option<SocketAddr>>,
    /// Frames forwarded to the handling context
    inbound_tx: mpsc::Sender<InboundFrame>,
    /// Event sender
    event_tx: broadcast::Sender<ArrayEvent>,
    /// Link statistics
    stats: RwLock<LinkStats>,
}

impl ConnectionManager {
    /// Create a manager and the inbound frame channel its read loops feed.
    ///
    /// The receiver belongs to the session's single handling context.
    #[must_use]
    pub fn new(
        config: BeamSyncConfig,
        clock: LocalClock,
    ) -> (Arc<Self>, mpsc::Receiver<InboundFrame>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(100);

        let manager = Arc::new(Self {
            config,
            clock,
            state: RwLock::new(ConnectionState::Idle),
            role: Mutex::new(None),
            next_peer: AtomicUsize::new(0),
            connect_task: Mutex::new(None),
            accept_task: Mutex::new(None),
            listener_addr: Mutex::new(None),
            inbound_tx,
            event_tx,
            stats: RwLock::new(LinkStats::default()),
        });
        (manager, inbound_rx)
    }

    /// Get current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get link statistics
    pub async fn stats(&self) -> LinkStats {
        self.stats.read().await.clone()
    }

    /// Number of open peer links
    pub async fn peer_count(&self) -> usize {
        self.role
            .lock()
            .await
            .as_ref()
            .map_or(0, ActiveRole::peer_count)
    }

    /// Address the server role is listening on, once bound
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.listener_addr.lock().await
    }

    /// Subscribe to connection events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ArrayEvent> {
        self.event_tx.subscribe()
    }

    /// Emit an event on the session's event channel
    pub(crate) fn notify(&self, event: ArrayEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Whether the peer has completed a full sync window
    pub async fn is_synced(&self, peer: PeerId) -> bool {
        self.role
            .lock()
            .await
            .as_ref()
            .and_then(|r| r.link(peer))
            .is_some_and(|l| l.synced.load(Ordering::Acquire))
    }

    /// Mark a peer as having completed its first sync window
    pub async fn mark_synced(&self, peer: PeerId) {
        if let Some(link) = self.role.lock().await.as_ref().and_then(|r| r.link(peer)) {
            link.synced.store(true, Ordering::Release);
        }
    }

    /// Enter listening mode, tearing down any active links first
    pub async fn start_listening(self: &Arc<Self>) {
        tracing::debug!("start listening");
        self.abort_connect().await;
        self.teardown_links(DisconnectReason::UserRequested).await;
        self.set_state(ConnectionState::Listening).await;
    }

    /// Dial the group owner at `addr`.
    ///
    /// Spawns the attempt and returns immediately; a stale attempt still in
    /// flight is cancelled first. Success transitions to `ConnectedPeer` and
    /// starts the read loop; failure is reported through the event channel
    /// and the state reverts to `Listening`.
    pub async fn connect(self: &Arc<Self>, addr: SocketAddr) {
        self.abort_connect().await;
        self.teardown_links(DisconnectReason::UserRequested).await;
        self.set_state(ConnectionState::Connecting).await;

        let manager = Arc::clone(self);
        let task = net::spawn(async move {
            match Runtime::timeout(manager.config.connect_timeout, TcpStream::connect(addr)).await
            {
                Ok(Ok(stream)) => manager.install_client(stream, addr).await,
                Ok(Err(e)) => manager.connect_failed(addr, &e.to_string()).await,
                Err(_) => manager.connect_failed(addr, "timed out").await,
            }
        });
        *self.connect_task.lock().await = Some(task);
    }

    /// Take the group-owner role: bind the well-known port and accept peers
    /// up to the configured limit.
    ///
    /// Returns the bound address (useful when configured with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn accept_as_server(self: &Arc<Self>) -> Result<SocketAddr> {
        self.abort_connect().await;
        self.abort_accept().await;
        self.teardown_links(DisconnectReason::UserRequested).await;

        let listener = net::bind_listener(self.config.server_port).await?;
        let local = listener.local_addr()?;
        *self.listener_addr.lock().await = Some(local);
        self.set_state(ConnectionState::Listening).await;
        tracing::info!(%local, limit = self.config.max_peers, "accepting peers");

        let manager = Arc::clone(self);
        let task = net::spawn(async move { manager.accept_loop(listener).await });
        *self.accept_task.lock().await = Some(task);
        Ok(local)
    }

    /// Write a message to one peer or to all peers.
    ///
    /// Returns the local send nanotime of the last successful write; a write
    /// event is emitted per peer. A failed write is logged and left for that
    /// peer's read loop to surface as a lost link.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when no matching link exists, or the I/O error
    /// when every targeted write failed.
    pub async fn send(&self, target: SendTarget, message: &WireMessage) -> Result<i64> {
        let encoded = message.encode()?;

        let writers: Vec<(PeerId, Arc<Mutex<OwnedWriteHalf>>)> = {
            let guard = self.role.lock().await;
            let Some(role) = guard.as_ref() else {
                return Err(BeamSyncError::InvalidState {
                    message: "no active peer links".to_string(),
                    current_state: format!("{:?}", *self.state.read().await),
                });
            };
            match target {
                SendTarget::Peer(peer) => {
                    let Some(link) = role.link(peer) else {
                        return Err(BeamSyncError::InvalidState {
                            message: format!("no link for {peer}"),
                            current_state: format!("{:?}", *self.state.read().await),
                        });
                    };
                    vec![(peer, Arc::clone(&link.writer))]
                }
                SendTarget::All => role
                    .links()
                    .into_iter()
                    .map(|l| (l.peer, Arc::clone(&l.writer)))
                    .collect(),
            }
        };

        let mut last_sent = None;
        let mut first_err = None;
        for (peer, writer) in writers {
            let mut stream = writer.lock().await;
            let timestamp = self.clock.now_nanos();
            let result = match stream.write_all(&encoded).await {
                Ok(()) => stream.flush().await,
                Err(e) => Err(e),
            };
            drop(stream);

            match result {
                Ok(()) => {
                    self.stats.write().await.record_sent(encoded.len());
                    let _ = self
                        .event_tx
                        .send(ArrayEvent::WriteCompleted { peer, timestamp });
                    last_sent = Some(timestamp);
                }
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "write failed");
                    first_err.get_or_insert(BeamSyncError::LinkIo {
                        peer: peer.index(),
                        source: e,
                    });
                }
            }
        }

        match (last_sent, first_err) {
            (Some(ts), _) => Ok(ts),
            (None, Some(err)) => Err(err),
            (None, None) => Err(BeamSyncError::InvalidState {
                message: "no peers to write to".to_string(),
                current_state: format!("{:?}", *self.state.read().await),
            }),
        }
    }

    /// Tear everything down and go idle: closes all streams, cancels any
    /// in-flight connect attempt, and stops accepting.
    pub async fn stop(self: &Arc<Self>) {
        tracing::debug!("stop");
        self.abort_connect().await;
        self.abort_accept().await;
        self.teardown_links(DisconnectReason::UserRequested).await;
        *self.listener_addr.lock().await = None;
        self.set_state(ConnectionState::Idle).await;
    }

    /// Handle the loss of one peer link.
    ///
    /// Invoked by the peer's read loop on stream failure or clean close.
    /// Removes the link, reports it, and re-enters listening once no peers
    /// remain.
    pub async fn connection_lost(self: &Arc<Self>, peer: PeerId, reason: DisconnectReason) {
        let remaining = {
            let mut guard = self.role.lock().await;
            let removed = match guard.take() {
                Some(ActiveRole::Client { link }) if link.peer == peer => true,
                Some(ActiveRole::Client { link }) => {
                    *guard = Some(ActiveRole::Client { link });
                    false
                }
                Some(ActiveRole::Server { mut links }) => {
                    let removed = links.remove(&peer).is_some();
                    if !links.is_empty() {
                        *guard = Some(ActiveRole::Server { links });
                    }
                    removed
                }
                None => false,
            };
            if !removed {
                return;
            }
            guard.as_ref().map_or(0, ActiveRole::peer_count)
        };

        if let DisconnectReason::LinkError(ref message) = reason {
            self.stats.write().await.last_error = Some(message.clone());
        }
        tracing::info!(%peer, ?reason, remaining, "peer link lost");
        let _ = self.event_tx.send(ArrayEvent::PeerLeft {
            peer,
            peers: remaining,
            reason,
        });

        if remaining == 0 {
            self.set_state(ConnectionState::Listening).await;
        }
    }

    // ===== internals =====

    async fn set_state(&self, new: ConnectionState) {
        let old = {
            let mut guard = self.state.write().await;
            let old = *guard;
            *guard = new;
            old
        };
        if old == new {
            return;
        }
        tracing::debug!(?old, ?new, "state change");
        let _ = self.event_tx.send(ArrayEvent::StateChanged { old, new });
    }

    async fn abort_connect(&self) {
        if let Some(task) = self.connect_task.lock().await.take() {
            task.abort();
        }
    }

    async fn abort_accept(&self) {
        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }
    }

    /// Close every link. Read tasks are aborted; each departure is reported.
    async fn teardown_links(&self, reason: DisconnectReason) {
        let Some(role) = self.role.lock().await.take() else {
            return;
        };
        let links = match role {
            ActiveRole::Client { link } => vec![link],
            ActiveRole::Server { links } => links.into_values().collect(),
        };
        let total = links.len();
        for (i, link) in links.into_iter().enumerate() {
            tracing::debug!(peer = %link.peer, addr = %link.addr, "closing link");
            link.read_task.abort();
            let _ = self.event_tx.send(ArrayEvent::PeerLeft {
                peer: link.peer,
                peers: total - i - 1,
                reason: reason.clone(),
            });
        }
    }

    async fn connect_failed(&self, addr: SocketAddr, message: &str) {
        tracing::warn!(%addr, message, "connect attempt failed");
        let _ = self.event_tx.send(ArrayEvent::Error {
            message: format!("connect to {addr} failed: {message}"),
            recoverable: true,
        });
        let _ = self.event_tx.send(ArrayEvent::Notice {
            message: "Unable to connect device".to_string(),
        });
        // Runs inside the connect task itself, so take the handle without
        // aborting and restart listening directly.
        self.connect_task.lock().await.take();
        self.set_state(ConnectionState::Listening).await;
    }

    async fn install_client(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let peer = PeerId(self.next_peer.fetch_add(1, Ordering::Relaxed));
        let link = self.spawn_link(peer, stream, addr);
        *self.role.lock().await = Some(ActiveRole::Client { link });
        self.connect_task.lock().await.take();
        self.note_connected().await;
        self.set_state(ConnectionState::ConnectedPeer).await;
        tracing::info!(%peer, %addr, "connected to group owner");
        let _ = self.event_tx.send(ArrayEvent::PeerJoined { peer, peers: 1 });
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let at_capacity = self.peer_count().await >= self.config.max_peers;
                    if at_capacity {
                        tracing::warn!(%addr, limit = self.config.max_peers, "refusing peer");
                        let _ = self.event_tx.send(ArrayEvent::Notice {
                            message: format!(
                                "peer limit of {} reached, refusing {addr}",
                                self.config.max_peers
                            ),
                        });
                        drop(stream);
                        continue;
                    }
                    self.install_server_peer(stream, addr).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    let _ = self.event_tx.send(ArrayEvent::Error {
                        message: format!("accept failed: {e}"),
                        recoverable: true,
                    });
                }
            }
        }
    }

    async fn install_server_peer(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let peer = PeerId(self.next_peer.fetch_add(1, Ordering::Relaxed));
        let link = self.spawn_link(peer, stream, addr);
        let peers = {
            let mut guard = self.role.lock().await;
            let mut links = match guard.take() {
                Some(ActiveRole::Server { links }) => links,
                _ => BTreeMap::new(),
            };
            links.insert(peer, link);
            let count = links.len();
            *guard = Some(ActiveRole::Server { links });
            count
        };
        self.note_connected().await;
        self.set_state(ConnectionState::ConnectedServer).await;
        tracing::info!(%peer, %addr, peers, "peer joined");
        let _ = self.event_tx.send(ArrayEvent::PeerJoined { peer, peers });
    }

    fn spawn_link(self: &Arc<Self>, peer: PeerId, stream: TcpStream, addr: SocketAddr) -> PeerLink {
        let (read_half, write_half) = stream.into_split();
        let manager = Arc::clone(self);
        let read_task = net::spawn(async move { manager.read_loop(peer, read_half).await });
        PeerLink {
            peer,
            addr,
            writer: Arc::new(Mutex::new(write_half)),
            read_task,
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Blocking read loop for one peer stream.
    ///
    /// Owns the read half for the life of the link; every read is stamped
    /// with the local clock, classified, and forwarded in arrival order.
    async fn read_loop(self: Arc<Self>, peer: PeerId, mut reader: OwnedReadHalf) {
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];
        tracing::debug!(%peer, "read loop started");

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    self.connection_lost(peer, DisconnectReason::PeerClosed).await;
                    break;
                }
                Ok(n) => {
                    let received_at = self.clock.now_nanos();
                    self.stats.write().await.record_received(n);
                    let message = WireMessage::decode(&buf[..n]);
                    if message == WireMessage::Unrecognized {
                        tracing::warn!(%peer, bytes = n, "unrecognized message");
                    }
                    let frame = InboundFrame {
                        peer,
                        message,
                        received_at,
                    };
                    if self.inbound_tx.send(frame).await.is_err() {
                        tracing::debug!(%peer, "handling context gone, closing read loop");
                        break;
                    }
                }
                Err(e) => {
                    self.connection_lost(peer, DisconnectReason::LinkError(e.to_string()))
                        .await;
                    break;
                }
            }
        }
    }

    async fn note_connected(&self) {
        let mut stats = self.stats.write().await;
        if stats.connected_at.is_none() {
            stats.connected_at = Some(Instant::now());
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("server_port", &self.config.server_port)
            .field("max_peers", &self.config.max_peers)
            .finish_non_exhaustive()
    }
}
