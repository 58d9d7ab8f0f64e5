//! Single-slot telemetry mailbox.
//!
//! The ESP-NOW receive callback runs in WiFi-task context, concurrently
//! with the gateway's main loop. It must do nothing but copy the frame
//! and stamp the arrival time, so the mailbox is a lock-free single
//! slot: the whole 6-byte frame packs into one `AtomicU64`, and each
//! flag is a separate atomic with exactly one writer side.
//!
//! ```text
//! RX callback:  publish(packet, now) ──▶ ┌─────────────┐
//!                                        │   mailbox   │ ──▶ take_new()
//!                                        └─────────────┘     main loop
//! ```
//!
//! Only the latest value matters: a packet arriving while the previous
//! one is still unconsumed overwrites it. Readers see single-field
//! eventual consistency — packet and timestamp are separate atomics and
//! are not read transactionally.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::packet::TelemetryPacket;

/// Interrupt-safe mailbox shared between the receive callback and the
/// main loop. Construct once and inject into both sides.
pub struct TelemetryMailbox {
    /// Latest frame, packed into the low 48 bits.
    packet: AtomicU64,
    /// Monotonic arrival stamp of the latest frame.
    last_received_ms: AtomicU64,
    /// At least one frame has ever arrived.
    has_data: AtomicBool,
    /// Set on every arrival, cleared by [`take_new`](Self::take_new).
    new_data: AtomicBool,
    /// Set on every arrival, cleared by [`take_ui_dirty`](Self::take_ui_dirty).
    ui_dirty: AtomicBool,
}

impl TelemetryMailbox {
    pub const fn new() -> Self {
        Self {
            packet: AtomicU64::new(0),
            last_received_ms: AtomicU64::new(0),
            has_data: AtomicBool::new(false),
            new_data: AtomicBool::new(false),
            ui_dirty: AtomicBool::new(false),
        }
    }

    /// Store an arrived packet. Callback context: copy, stamp, flag —
    /// no other I/O.
    pub fn publish(&self, packet: &TelemetryPacket, now_ms: u64) {
        self.packet.store(packet.pack_u64(), Ordering::Relaxed);
        self.last_received_ms.store(now_ms, Ordering::Relaxed);
        // Release so a consumer that observes the flags also observes
        // the packet and stamp stores above.
        self.has_data.store(true, Ordering::Release);
        self.new_data.store(true, Ordering::Release);
        self.ui_dirty.store(true, Ordering::Release);
    }

    /// Consume the "new data" edge. Returns the latest packet if one
    /// arrived since the last call.
    pub fn take_new(&self) -> Option<TelemetryPacket> {
        if self.new_data.swap(false, Ordering::Acquire) {
            Some(TelemetryPacket::unpack_u64(self.packet.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    /// Latest packet regardless of the new-data edge, if any ever arrived.
    pub fn latest(&self) -> Option<TelemetryPacket> {
        if self.has_data.load(Ordering::Acquire) {
            Some(TelemetryPacket::unpack_u64(self.packet.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    /// Arrival stamp of the latest packet, if any ever arrived.
    pub fn last_received_ms(&self) -> Option<u64> {
        if self.has_data.load(Ordering::Acquire) {
            Some(self.last_received_ms.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Consume the UI redraw edge.
    pub fn take_ui_dirty(&self) -> bool {
        self.ui_dirty.swap(false, Ordering::Acquire)
    }
}

impl Default for TelemetryMailbox {
    fn default() -> Self {
        Self::new()
    }
}
