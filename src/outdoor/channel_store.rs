//! Cross-sleep channel memory.
//!
//! One integer radio channel, persisted through the storage port so it
//! survives the outdoor node's deep-sleep cycles. The persistence
//! boundary is explicit: it survives sleep (RTC-domain or NVS backed,
//! the adapter decides), not necessarily a full power loss or reflash —
//! in that case the documented default of channel 1 applies and the
//! next wake cycle simply re-scans.

use log::warn;

use crate::app::ports::StoragePort;
use crate::config::MAX_WIFI_CHANNEL;

const NAMESPACE: &str = "radio";
const KEY: &str = "chan";

/// Channel the node assumes when nothing is stored.
pub const DEFAULT_CHANNEL: u8 = 1;

/// Load the remembered channel, clamped to 1..=13.
///
/// Any read failure or out-of-range value degrades to the default —
/// a wrong channel only costs one sweep, never a lost cycle.
pub fn load(storage: &impl StoragePort) -> u8 {
    // Two-byte buffer so an unexpectedly sized blob is detected rather
    // than silently truncated to a plausible-looking value.
    let mut buf = [0u8; 2];
    match storage.read(NAMESPACE, KEY, &mut buf) {
        Ok(1) => buf[0].clamp(1, MAX_WIFI_CHANNEL),
        Ok(_) | Err(_) => DEFAULT_CHANNEL,
    }
}

/// Persist a newly discovered channel.
pub fn save(storage: &mut impl StoragePort, channel: u8) {
    let ch = channel.clamp(1, MAX_WIFI_CHANNEL);
    if let Err(e) = storage.write(NAMESPACE, KEY, &[ch]) {
        // Not fatal: the next wake falls back to a full sweep.
        warn!("ChannelStore: save failed ({}), next wake will re-scan", e);
    }
}
