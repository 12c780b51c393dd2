use chrono::{Datelike, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Monthly request quota gate.
///
/// Once a source signals that its quota is exhausted the gate stays closed
/// until the first day of a month, when any call re-opens it.
#[derive(Debug, Default)]
pub struct RequestLimit {
    enabled: bool,
    reached: AtomicBool,
}

impl RequestLimit {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn monthly() -> Self {
        Self {
            enabled: true,
            reached: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_reached(&self) -> bool {
        self.reached.load(Ordering::SeqCst)
    }

    /// Checked at the entry of every provider call. Returns false when the
    /// call must be skipped without touching the network.
    pub fn allows(&self, provider: &str, today: NaiveDate) -> bool {
        if !self.enabled {
            return true;
        }
        if today.day() == 1 && self.reached.swap(false, Ordering::SeqCst) {
            info!(provider, %today, "New month, requests limit reset");
        }
        if self.is_reached() {
            warn!(provider, "Requests limit exceeded, call skipped");
            return false;
        }
        true
    }

    pub fn mark_reached(&self, provider: &str) {
        if !self.enabled {
            return;
        }
        self.reached.store(true, Ordering::SeqCst);
        warn!(provider, "Requests limit exceeded");
    }
}
