//! Single-slot delivery-confirmation signal.
//!
//! The ESP-NOW send callback runs in radio-task context, concurrently
//! with the main loop. Instead of a pair of `volatile` flags, the
//! outcome is latched into one atomic slot that the burst transmitter
//! polls with a bounded wait — the race is explicit and unit-testable.
//!
//! ```text
//! main loop:  arm() ── transmit ── poll() poll() poll() ─▶ status
//! radio task:                └────────▶ complete(ok) ┘
//! ```
//!
//! Single writer per phase: the main loop writes `Pending` via `arm`,
//! the callback writes exactly one terminal state via `complete`.

use core::sync::atomic::{AtomicU8, Ordering};

/// Observable state of the in-flight transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// No transmission armed since the last terminal state was consumed.
    Idle,
    /// Transmit started, confirmation not yet received.
    Pending,
    /// Link-layer acknowledgement received.
    Confirmed,
    /// The driver reported delivery failure.
    Failed,
}

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const CONFIRMED: u8 = 2;
const FAILED: u8 = 3;

/// Interrupt-safe single-slot condition. Shared by reference between
/// the burst transmitter and the radio send callback.
pub struct DeliverySignal {
    state: AtomicU8,
}

impl DeliverySignal {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(IDLE),
        }
    }

    /// Arm the slot before a transmit. Clears any stale outcome from a
    /// previous attempt so a late callback cannot satisfy a new wait.
    pub fn arm(&self) {
        self.state.store(PENDING, Ordering::Release);
    }

    /// Record the delivery outcome. Called from the radio callback.
    pub fn complete(&self, success: bool) {
        let terminal = if success { CONFIRMED } else { FAILED };
        // Only a pending transmission may complete; a callback that
        // fires after the waiter gave up and re-armed must not clobber
        // the new attempt's state.
        let _ = self.state.compare_exchange(
            PENDING,
            terminal,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// Current state, without consuming it.
    pub fn status(&self) -> DeliveryStatus {
        match self.state.load(Ordering::Acquire) {
            PENDING => DeliveryStatus::Pending,
            CONFIRMED => DeliveryStatus::Confirmed,
            FAILED => DeliveryStatus::Failed,
            _ => DeliveryStatus::Idle,
        }
    }

    /// Reset to idle after the waiter has consumed a terminal state.
    pub fn clear(&self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

impl Default for DeliverySignal {
    fn default() -> Self {
        Self::new()
    }
}
