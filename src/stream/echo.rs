//! Single-flight acknowledgment queue.
//!
//! Holds one pending entry per received chunk and hands them out one at a
//! time. While an acknowledgment is outstanding nothing else is released;
//! arrivals only queue up behind it.

use std::collections::VecDeque;
use std::time::Duration;

/// One chunk waiting to be acknowledged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEcho {
    /// Latest cross time known when the chunk arrived
    pub duration: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct EchoDispatcher {
    queue: VecDeque<PendingEcho>,
    in_flight: bool,
    lost: u64,
}

impl EchoDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, entry: PendingEcho) {
        self.queue.push_back(entry);
    }

    /// Takes the next entry if the slot is free, marking it taken.
    pub fn next_dispatch(&mut self) -> Option<PendingEcho> {
        if self.in_flight {
            return None;
        }
        let entry = self.queue.pop_front()?;
        self.in_flight = true;
        Some(entry)
    }

    /// Releases the slot after a call finished.
    ///
    /// A failed entry is dropped, not re-queued.
    pub fn complete(&mut self, success: bool) {
        debug_assert!(self.in_flight, "completion without a call in flight");
        self.in_flight = false;
        if !success {
            self.lost += 1;
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Nothing queued and nothing outstanding.
    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.queue.is_empty()
    }

    /// Entries whose acknowledgment failed and will never be retried.
    pub fn lost(&self) -> u64 {
        self.lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ms: u64) -> PendingEcho {
        PendingEcho {
            duration: Some(Duration::from_millis(ms)),
        }
    }

    #[test]
    fn test_only_one_entry_released_at_a_time() {
        let mut dispatcher = EchoDispatcher::new();
        dispatcher.enqueue(entry(1));
        dispatcher.enqueue(entry(2));

        assert_eq!(dispatcher.next_dispatch(), Some(entry(1)));
        assert_eq!(dispatcher.next_dispatch(), None);
        dispatcher.enqueue(entry(3));
        assert_eq!(dispatcher.next_dispatch(), None);

        dispatcher.complete(true);
        assert_eq!(dispatcher.next_dispatch(), Some(entry(2)));
        dispatcher.complete(true);
        assert_eq!(dispatcher.next_dispatch(), Some(entry(3)));
        dispatcher.complete(true);
        assert!(dispatcher.is_idle());
    }

    #[test]
    fn test_failed_entry_is_not_requeued() {
        let mut dispatcher = EchoDispatcher::new();
        dispatcher.enqueue(entry(1));
        dispatcher.enqueue(entry(2));

        dispatcher.next_dispatch();
        dispatcher.complete(false);
        assert_eq!(dispatcher.lost(), 1);
        assert_eq!(dispatcher.pending(), 1);
        assert_eq!(dispatcher.next_dispatch(), Some(entry(2)));
    }
}
