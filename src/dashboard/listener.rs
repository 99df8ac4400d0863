//! Generation-tagged listener slots
//!
//! Each view owns at most one live subscription. Installing a new one
//! cancels the previous one first and bumps the generation; snapshots
//! tagged with an older generation are dropped.

use crate::backend::Subscription;
use crate::metrics::{LISTENER_INSTALLS_TOTAL, LISTENERS_ACTIVE, STALE_SNAPSHOTS_DROPPED_TOTAL};

pub type Generation = u64;

#[derive(Debug)]
pub struct ListenerSlot {
    view: &'static str,
    generation: Generation,
    subscription: Option<Subscription>,
}

impl ListenerSlot {
    pub fn new(view: &'static str) -> Self {
        Self {
            view,
            generation: 0,
            subscription: None,
        }
    }

    /// Replace the current subscription
    ///
    /// `subscribe` receives the generation the new subscription must tag
    /// its snapshots with.
    pub fn install(&mut self, subscribe: impl FnOnce(Generation) -> Subscription) -> Generation {
        self.cancel();
        self.generation += 1;
        self.subscription = Some(subscribe(self.generation));

        LISTENER_INSTALLS_TOTAL.with_label_values(&[self.view]).inc();
        LISTENERS_ACTIVE.with_label_values(&[self.view]).inc();
        tracing::debug!(view = self.view, generation = self.generation, "Listener installed");

        self.generation
    }

    /// Detach the current subscription, if any
    pub fn cancel(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            LISTENERS_ACTIVE.with_label_values(&[self.view]).dec();
        }
    }

    pub fn is_installed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Whether a snapshot tagged `generation` may be applied
    pub fn accept(&self, generation: Generation) -> bool {
        if self.is_installed() && generation == self.generation {
            return true;
        }

        STALE_SNAPSHOTS_DROPPED_TOTAL
            .with_label_values(&[self.view])
            .inc();
        tracing::debug!(
            view = self.view,
            generation,
            current = self.generation,
            "Dropping stale snapshot"
        );
        false
    }
}

impl Drop for ListenerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
