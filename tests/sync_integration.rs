//! End-to-end loopback tests: a group owner and a peer session complete a
//! sync window, steer the beam, and fire a synchronized start.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use beamsync::{
    ArrayEvent, ArraySession, AudioTrigger, BeamSyncConfig, ConnectionState,
};

#[derive(Default)]
struct CountingTrigger {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

#[async_trait]
impl AudioTrigger for CountingTrigger {
    async fn on_trigger_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_trigger_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_config() -> BeamSyncConfig {
    BeamSyncConfig::builder()
        .server_port(0)
        .connect_timeout(Duration::from_secs(2))
        .play_lead(Duration::from_millis(300))
        .build()
}

async fn wait_event<F>(events: &mut broadcast::Receiver<ArrayEvent>, mut matcher: F) -> ArrayEvent
where
    F: FnMut(&ArrayEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(event) if matcher(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("expected event did not arrive")
}

/// Spin up an owner and one connected peer session.
async fn connected_pair() -> (
    Arc<ArraySession>,
    Arc<ArraySession>,
    Arc<CountingTrigger>,
) {
    let owner = ArraySession::new(test_config(), Arc::new(CountingTrigger::default()));
    let addr = owner.accept_as_server().await.unwrap();

    let peer_trigger = Arc::new(CountingTrigger::default());
    let peer = ArraySession::new(
        test_config(),
        Arc::clone(&peer_trigger) as Arc<dyn AudioTrigger>,
    );
    let mut peer_events = peer.subscribe();
    peer.connect(addr).await;
    wait_event(&mut peer_events, |e| {
        matches!(e, ArrayEvent::PeerJoined { .. })
    })
    .await;

    let mut owner_events = owner.subscribe();
    // The owner may have seen the join before we subscribed.
    if owner.peer_count().await == 0 {
        wait_event(&mut owner_events, |e| {
            matches!(e, ArrayEvent::PeerJoined { .. })
        })
        .await;
    }

    assert_eq!(owner.state().await, ConnectionState::ConnectedServer);
    assert_eq!(peer.state().await, ConnectionState::ConnectedPeer);
    (owner, peer, peer_trigger)
}

#[tokio::test]
async fn test_sync_window_completes_over_loopback() {
    let (owner, peer, _trigger) = connected_pair().await;
    let mut peer_events = peer.subscribe();

    owner.send_synch().await.unwrap();
    wait_event(&mut peer_events, |e| {
        matches!(e, ArrayEvent::SyncCompleted { .. })
    })
    .await;

    // Both endpoints share a host, so the estimated offset is bounded by
    // loopback latency, far under 100ms.
    let offset = peer.context().clock_offset().expect("no offset estimate");
    assert!(
        offset.abs() < 100_000_000,
        "loopback offset implausibly large: {offset}ns"
    );

    peer.shutdown().await;
    owner.shutdown().await;
}

#[tokio::test]
async fn test_angle_confirmation_reaches_peer() {
    let (owner, peer, _trigger) = connected_pair().await;

    // 0 degrees with the default constants: -(3/4) * 1_000_000 * cos(0)
    let delay = owner.set_angle(0.0).await.unwrap();
    assert_eq!(delay, -750_000);

    // The peer is idle, so the broadcast phase lands as its standing delay.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if peer.context().phase_delay() == Some(-750_000) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("phase delay never reached the peer");

    peer.shutdown().await;
    owner.shutdown().await;
}

#[tokio::test]
async fn test_rejected_angle_changes_nothing() {
    let (owner, peer, _trigger) = connected_pair().await;

    owner.set_angle(45.0).await.unwrap();
    assert!(owner.set_angle(181.0).await.is_err());
    assert!(owner.set_angle(f64::NAN).await.is_err());
    assert_eq!(owner.context().angle_degrees(), Some(45.0));

    peer.shutdown().await;
    owner.shutdown().await;
}

#[tokio::test]
async fn test_play_triggers_peer_exactly_once() {
    let (owner, peer, trigger) = connected_pair().await;
    let mut peer_events = peer.subscribe();

    // Sync first so the peer can translate the owner's timestamp.
    owner.send_synch().await.unwrap();
    wait_event(&mut peer_events, |e| {
        matches!(e, ArrayEvent::SyncCompleted { .. })
    })
    .await;

    owner.send_play().await.unwrap();

    // The start fires after the 300ms lead (give scheduling slack).
    tokio::time::timeout(Duration::from_secs(5), async {
        while trigger.starts.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer trigger never fired");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(trigger.starts.load(Ordering::SeqCst), 1);

    peer.shutdown().await;
    owner.shutdown().await;
}

#[tokio::test]
async fn test_stop_reaches_peer_immediately() {
    let (owner, peer, trigger) = connected_pair().await;

    owner.send_stop().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while trigger.stops.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer stop never fired");

    peer.shutdown().await;
    owner.shutdown().await;
}

#[tokio::test]
async fn test_play_requires_group_owner_role() {
    let peer = ArraySession::new(test_config(), Arc::new(CountingTrigger::default()));
    assert!(peer.send_play().await.is_err());
    assert!(peer.send_synch().await.is_err());
    peer.shutdown().await;
}
