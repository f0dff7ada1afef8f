//! Wire protocol: message codec and clock synchronization.

pub mod codec;
pub mod sync;

#[cfg(test)]
mod tests;

pub use codec::WireMessage;
pub use sync::{ClockSyncEngine, LocalClock, ReplyOutcome, SampleWindow, SyncAction, SyncSample};
