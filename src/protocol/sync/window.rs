//! Cyclic per-peer sample window.

use super::sample::SyncSample;

/// Fixed-capacity cyclic buffer of sync samples for one peer.
///
/// Slots fill in order; when the last slot is written the full lag/offset
/// series and the accumulated ping-transmission count are logged, then the
/// window restarts from slot zero.
#[derive(Debug)]
pub struct SampleWindow {
    samples: Vec<Option<SyncSample>>,
    slot: usize,
    /// Survives window restarts so offset/lag stay readable
    latest: Option<SyncSample>,
    /// Ping transmissions (including retries) since the window last restarted
    iterations: u64,
    /// Windows completed so far this session
    completed: u64,
}

impl SampleWindow {
    /// Create an empty window with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![None; capacity.max(1)],
            slot: 0,
            latest: None,
            iterations: 0,
            completed: 0,
        }
    }

    /// Slot the next sample will land in
    #[must_use]
    pub fn slot(&self) -> u8 {
        u8::try_from(self.slot).unwrap_or(u8::MAX)
    }

    /// Window capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Number of filled slots in the current window
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no slot is filled yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Windows completed so far
    #[must_use]
    pub fn completed_windows(&self) -> u64 {
        self.completed
    }

    /// Ping transmissions since the window last restarted
    #[must_use]
    pub fn transmissions(&self) -> u64 {
        self.iterations
    }

    /// Account one ping transmission (first send or retry)
    pub fn note_transmission(&mut self) {
        self.iterations += 1;
    }

    /// Most recent sample from any completed round, across restarts
    #[must_use]
    pub fn latest(&self) -> Option<&SyncSample> {
        self.latest.as_ref()
    }

    /// Record a completed round's sample in the current slot.
    ///
    /// Returns `true` when this sample filled the window; the series is
    /// logged and the window restarts.
    pub fn record(&mut self, sample: SyncSample) -> bool {
        self.samples[self.slot] = Some(sample);
        self.latest = Some(sample);
        self.slot += 1;

        if self.slot < self.capacity() {
            return false;
        }

        self.completed += 1;
        self.log_series();
        self.samples.fill(None);
        self.slot = 0;
        self.iterations = 0;
        true
    }

    /// Dump the full lag/offset series for diagnostics
    fn log_series(&self) {
        let lags: Vec<i64> = self.samples.iter().flatten().map(|s| s.lag).collect();
        let offsets: Vec<i64> = self.samples.iter().flatten().map(|s| s.offset).collect();
        tracing::debug!(
            window = self.completed,
            transmissions = self.iterations,
            ?lags,
            ?offsets,
            "sync window complete"
        );
    }
}
