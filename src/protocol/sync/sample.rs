//! A single timing sample from one completed ping round.

use crate::error::BeamSyncError;

/// The four timestamps of one round and the lag/offset derived from them.
///
/// All values are nanoseconds. Client timestamps are in the pinging device's
/// clock domain, server timestamps in the group owner's; `lag` and `offset`
/// are well-defined signed durations despite the mixed domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSample {
    /// Client clock when the ping was written
    pub client_sent: i64,
    /// Client clock when the reply was read
    pub client_received: i64,
    /// Server clock when the ping was read
    pub server_received: i64,
    /// Server clock when the reply was written
    pub server_sent: i64,
    /// Estimated one-way propagation delay
    pub lag: i64,
    /// Estimated difference between the two clocks (server minus client,
    /// net of lag)
    pub offset: i64,
}

impl SyncSample {
    /// Derive a sample from a complete timestamp quadruple.
    ///
    /// ```text
    /// lag    = ((clientReceived - clientSent) - (serverSent - serverReceived)) / 2
    /// offset = serverReceived - clientSent - lag
    /// ```
    #[must_use]
    pub fn from_round(
        client_sent: i64,
        client_received: i64,
        server_received: i64,
        server_sent: i64,
    ) -> Self {
        let lag = ((client_received - client_sent) - (server_sent - server_received)) / 2;
        let offset = server_received - client_sent - lag;
        Self {
            client_sent,
            client_received,
            server_received,
            server_sent,
            lag,
            offset,
        }
    }

    /// Derive a sample only if all four timestamps are present.
    ///
    /// Partial rounds are discarded, never averaged in.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteSyncRound` if any timestamp is missing.
    pub fn try_from_parts(
        window: u8,
        round: u32,
        client_sent: Option<i64>,
        client_received: Option<i64>,
        server_received: Option<i64>,
        server_sent: Option<i64>,
    ) -> Result<Self, BeamSyncError> {
        match (client_sent, client_received, server_received, server_sent) {
            (Some(cs), Some(cr), Some(sr), Some(ss)) => Ok(Self::from_round(cs, cr, sr, ss)),
            _ => Err(BeamSyncError::IncompleteSyncRound { window, round }),
        }
    }
}
