//! Round-trip clock synchronization.
//!
//! Estimates per-peer link lag and wall-clock offset from a four-timestamp
//! exchange, NTP-style. The device that receives a `synch` request starts
//! pinging; the group owner answers each ping with its receive and send
//! nanotimes; each completed round yields one sample:
//!
//! ```text
//! Client                         Group owner
//!   |--- ping (window, round) ------->|  (owner records serverReceived)
//!   |<-- reply (recv, sent, marker) --|  (owner stamps serverSent)
//!   |                                 |
//!   |  lag    = ((cr - cs) - (ss - sr)) / 2
//!   |  offset = sr - cs - lag         |
//! ```
//!
//! Samples accumulate in a fixed cyclic window per peer; a filled window is
//! logged for diagnostics and restarted. The engine itself performs no I/O:
//! it is a state machine that tells the session loop which ping to send next,
//! and the retransmission wait is a deadline sleep owned by that loop.

mod clock;
mod engine;
mod sample;
mod window;

#[cfg(test)]
mod tests;

pub use clock::LocalClock;
pub use engine::{ClockSyncEngine, ReplyOutcome, SyncAction};
pub use sample::SyncSample;
pub use window::SampleWindow;
