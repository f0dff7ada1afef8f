//! Playback trigger scheduling.
//!
//! Translates inbound `play`/`phase`/`stop` messages into platform trigger
//! calls at concrete local-clock instants. All waits are deadline-based
//! sleeps on a spawned task, so the message-handling context is never
//! blocked and a pending trigger can be cancelled when its peer goes away.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::protocol::sync::LocalClock;

use super::context::SessionContext;

/// Platform playback callbacks.
///
/// The core only decides *when* to fire; rendering belongs to the embedder.
#[async_trait]
pub trait AudioTrigger: Send + Sync {
    /// Start (or resume) tone playback now
    async fn on_trigger_start(&self);
    /// Stop tone playback now
    async fn on_trigger_stop(&self);
}

/// Schedules at most one future trigger instant at a time.
///
/// A newly scheduled instant replaces any pending one; a pending instant
/// fires exactly once and never before its target.
pub struct PlaybackScheduler {
    trigger: Arc<dyn AudioTrigger>,
    context: Arc<SessionContext>,
    clock: LocalClock,
    lead_nanos: i64,
    playing: Arc<AtomicBool>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackScheduler {
    /// Create a scheduler firing into `trigger`
    #[must_use]
    pub fn new(
        trigger: Arc<dyn AudioTrigger>,
        context: Arc<SessionContext>,
        clock: LocalClock,
        lead_nanos: i64,
    ) -> Self {
        Self {
            trigger,
            context,
            clock,
            lead_nanos,
            playing: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(None),
        }
    }

    /// Whether the last trigger fired was a start
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Handle a `play` message: fire "start" at the sender's timestamp plus
    /// the lead, translated into the local clock domain and advanced by the
    /// standing phase delay.
    ///
    /// Returns the resolved local target instant in nanoseconds.
    pub async fn schedule_play(&self, sender_timestamp: i64) -> i64 {
        let offset = self.context.clock_offset().unwrap_or_else(|| {
            tracing::warn!("play received before any sync round completed, assuming zero offset");
            0
        });

        let mut target = sender_timestamp + self.lead_nanos - offset;
        if let Some(delay) = self.context.phase_delay() {
            target -= delay;
        }

        tracing::debug!(
            sender_timestamp,
            offset,
            target,
            now = self.clock.now_nanos(),
            "scheduling synchronized start"
        );

        let clock = self.clock.clone();
        let trigger = Arc::clone(&self.trigger);
        let playing = Arc::clone(&self.playing);
        self.replace_pending(tokio::spawn(async move {
            clock.sleep_until_nanos(target).await;
            trigger.on_trigger_start().await;
            playing.store(true, Ordering::Release);
        }))
        .await;

        target
    }

    /// Handle a `phase` message.
    ///
    /// During playback the tone is restarted after `delay` nanoseconds so
    /// this device falls behind its peers by exactly the requested phase.
    /// While idle, the delay is recorded as the standing phase delay for
    /// future `play` messages instead.
    pub async fn apply_phase(&self, delay: i64) {
        if !self.is_playing() {
            tracing::debug!(delay, "storing standing phase delay");
            self.context.set_phase_delay(delay);
            return;
        }

        tracing::debug!(delay, "re-phasing active playback");
        self.trigger.on_trigger_stop().await;
        self.playing.store(false, Ordering::Release);

        #[allow(clippy::cast_sign_loss)]
        let pause = Duration::from_nanos(delay.max(0) as u64);
        let trigger = Arc::clone(&self.trigger);
        let playing = Arc::clone(&self.playing);
        self.replace_pending(tokio::spawn(async move {
            tokio::time::sleep(pause).await;
            trigger.on_trigger_start().await;
            playing.store(true, Ordering::Release);
        }))
        .await;
    }

    /// Handle a `stop` message: cancel any pending start and fire "stop"
    /// immediately.
    pub async fn stop(&self) {
        self.cancel_pending().await;
        self.trigger.on_trigger_stop().await;
        self.playing.store(false, Ordering::Release);
    }

    /// Cancel a pending trigger without firing anything.
    ///
    /// Used when the peer whose timestamps the instant depends on is lost:
    /// the wait is abandoned like a failed sync round rather than left to
    /// fire with stale timing.
    pub async fn cancel_pending(&self) {
        if let Some(handle) = self.pending.lock().await.take() {
            handle.abort();
        }
    }

    /// Install a new pending trigger task, aborting the previous one
    async fn replace_pending(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().await;
        if let Some(old) = pending.replace(handle) {
            old.abort();
        }
    }
}
