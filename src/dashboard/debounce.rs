//! Search input debouncer
//!
//! One pending timer. Every keystroke restarts it; only the value present
//! when the quiet period elapses is committed.

use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct SearchDebouncer {
    quiet_period: Duration,
    seq: u64,
    latest: Option<String>,
    pending: Option<JoinHandle<()>>,
}

impl SearchDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            seq: 0,
            latest: None,
            pending: None,
        }
    }

    /// Record a keystroke and (re)start the timer
    ///
    /// `on_expiry` runs with the timer's sequence number once the quiet
    /// period passes without further input. Feed that number back into
    /// [`SearchDebouncer::take_expired`].
    pub fn on_input<F>(&mut self, raw: String, on_expiry: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.abort_timer();
        self.seq += 1;
        self.latest = Some(raw);

        let seq = self.seq;
        let quiet_period = self.quiet_period;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            on_expiry(seq);
        }));
    }

    /// Value to commit for an expired timer
    ///
    /// `None` when a later keystroke superseded this timer.
    pub fn take_expired(&mut self, seq: u64) -> Option<String> {
        if seq != self.seq {
            return None;
        }
        self.pending = None;
        self.latest.take()
    }

    /// Uncommitted input, if a timer is running
    pub fn pending_input(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Drop any pending input without committing it
    pub fn cancel(&mut self) {
        self.abort_timer();
        self.latest = None;
    }

    fn abort_timer(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.abort_timer();
    }
}
