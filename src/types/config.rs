use std::time::Duration;

/// Configuration for an array coordination session
#[derive(Debug, Clone)]
pub struct BeamSyncConfig {
    /// Well-known TCP port for the group-owner role (default: 8988).
    ///
    /// Tests may set 0 to bind an ephemeral port and read it back from the
    /// connection manager.
    pub server_port: u16,

    /// Maximum simultaneous peers in the group-owner role (default: 5)
    pub max_peers: usize,

    /// Timeout for outbound connection attempts (default: 5 seconds)
    pub connect_timeout: Duration,

    /// Samples per sync window before the series is logged and the window
    /// restarts (default: 10)
    pub sync_window: usize,

    /// How long to wait for a ping reply before retransmitting with an
    /// incremented round counter (default: 10ms)
    pub ping_retry_interval: Duration,

    /// Lead time added to a `play` sender timestamp so every device has the
    /// message in hand before the trigger instant (default: 1 second)
    pub play_lead: Duration,

    /// Array time-delay constant in nanoseconds, the `C` in
    /// `delay = k * C * cos(angle)` (default: `1_000_000.0`)
    pub array_time_delay_nanos: f64,

    /// Steering coefficient `k` (default: -0.75)
    pub steering_coefficient: f64,

    /// Read buffer size per peer stream; wire messages are small
    /// (default: 32 bytes)
    pub read_buffer_size: usize,
}

impl Default for BeamSyncConfig {
    fn default() -> Self {
        Self {
            server_port: 8988,
            max_peers: 5,
            connect_timeout: Duration::from_secs(5),
            sync_window: 10,
            ping_retry_interval: Duration::from_millis(10),
            play_lead: Duration::from_secs(1),
            array_time_delay_nanos: 1_000_000.0,
            steering_coefficient: -0.75,
            read_buffer_size: 32,
        }
    }
}

impl BeamSyncConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> BeamSyncConfigBuilder {
        BeamSyncConfigBuilder::default()
    }

    /// Lead time as whole nanoseconds
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn play_lead_nanos(&self) -> i64 {
        self.play_lead.as_nanos() as i64
    }
}

/// Builder for `BeamSyncConfig`
#[derive(Debug, Clone, Default)]
pub struct BeamSyncConfigBuilder {
    config: BeamSyncConfig,
}

impl BeamSyncConfigBuilder {
    /// Set the group-owner TCP port
    #[must_use]
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    /// Set the peer limit for the group-owner role
    #[must_use]
    pub fn max_peers(mut self, max: usize) -> Self {
        self.config.max_peers = max.max(1);
        self
    }

    /// Set the outbound connect timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the number of samples per sync window
    #[must_use]
    pub fn sync_window(mut self, samples: usize) -> Self {
        self.config.sync_window = samples.max(1);
        self
    }

    /// Set the ping retransmission interval
    #[must_use]
    pub fn ping_retry_interval(mut self, interval: Duration) -> Self {
        self.config.ping_retry_interval = interval;
        self
    }

    /// Set the scheduling lead applied to `play` timestamps
    #[must_use]
    pub fn play_lead(mut self, lead: Duration) -> Self {
        self.config.play_lead = lead;
        self
    }

    /// Set the array time-delay constant in nanoseconds
    #[must_use]
    pub fn array_time_delay_nanos(mut self, nanos: f64) -> Self {
        self.config.array_time_delay_nanos = nanos;
        self
    }

    /// Set the steering coefficient
    #[must_use]
    pub fn steering_coefficient(mut self, coefficient: f64) -> Self {
        self.config.steering_coefficient = coefficient;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> BeamSyncConfig {
        self.config
    }
}
