//! Per-session chunk accounting.

use serde::Serialize;

/// Chunks fired by the source, received here and echoed back.
///
/// `fired` and `received` move together on every accepted frame, `echoed` on
/// every successful acknowledgment, so `echoed <= fired == received` holds
/// after every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounters {
    pub fired: u64,
    pub received: u64,
    pub echoed: u64,
}

impl EventCounters {
    /// Counts one accepted inbound chunk.
    pub fn record_arrival(&mut self) {
        self.fired += 1;
        self.received += 1;
    }

    /// Counts one completed acknowledgment.
    pub fn record_echo(&mut self) {
        debug_assert!(self.echoed < self.fired, "echo without a matching arrival");
        self.echoed = (self.echoed + 1).min(self.fired);
    }

    /// Every received chunk has been acknowledged.
    pub fn caught_up(&self) -> bool {
        self.fired > 0 && self.echoed == self.fired
    }

    /// Acknowledgments still owed, including lost ones.
    pub fn outstanding(&self) -> u64 {
        self.fired - self.echoed
    }

    pub fn holds_invariant(&self) -> bool {
        self.echoed <= self.fired && self.fired == self.received
    }
}
