//! Aggregate counter
//!
//! Tracks the backend-side count for the current mode. Every refresh gets a
//! sequence number; only the latest issued refresh may update the value.

#[derive(Debug, Default)]
pub struct AggregateCounter {
    issued: u64,
    value: Option<u64>,
}

impl AggregateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a refresh and return its sequence number
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.issued
    }

    /// Apply a result. Returns `false` if a newer refresh was issued since.
    pub fn complete(&mut self, seq: u64, count: u64) -> bool {
        if !self.is_current(seq) {
            tracing::debug!(seq, latest = self.issued, "Dropping stale count");
            return false;
        }
        self.value = Some(count);
        true
    }

    pub fn value(&self) -> Option<u64> {
        self.value
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}
