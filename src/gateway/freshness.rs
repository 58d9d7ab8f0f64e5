//! Telemetry freshness tracking.
//!
//! The gateway decides "is the outdoor node alive" from one number: the
//! age of the last received packet. Crossing the staleness threshold
//! must produce exactly one edge (the connection-good flag and the UI
//! react to edges, not levels), so the tracker keeps the previous
//! verdict and reports only transitions.

/// Edge reported by [`FreshnessTracker::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessChange {
    BecameFresh,
    BecameStale,
}

/// Level-to-edge converter over the mailbox arrival stamp. Starts out
/// stale; no packet ever received means no edges at all.
pub struct FreshnessTracker {
    threshold_ms: u64,
    fresh: bool,
}

impl FreshnessTracker {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            fresh: false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Re-evaluate against the current time. `last_received_ms` is the
    /// mailbox stamp (`None` until the first packet). A packet exactly
    /// `threshold_ms` old counts as stale.
    pub fn check(&mut self, last_received_ms: Option<u64>, now_ms: u64) -> Option<FreshnessChange> {
        let Some(last) = last_received_ms else {
            return None;
        };
        let stale = now_ms.saturating_sub(last) >= self.threshold_ms;
        match (self.fresh, stale) {
            (true, true) => {
                self.fresh = false;
                Some(FreshnessChange::BecameStale)
            }
            (false, false) => {
                self.fresh = true;
                Some(FreshnessChange::BecameFresh)
            }
            _ => None,
        }
    }
}
