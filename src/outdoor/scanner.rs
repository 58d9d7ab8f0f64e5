//! Channel scanner — find the receiver, remember where it was.
//!
//! The gateway's active channel floats with its own station/AP state
//! and is unknown a priori, so the node tries the remembered channel
//! first (steady state: one channel, one burst) and only sweeps
//! 1..=13 when that fails. The first channel that confirms delivery is
//! persisted, amortising the sweep cost across future wake cycles.
//!
//! Sweep order is deterministic ascending; only the intra-burst delay
//! provides jitter. There is no per-channel backoff — the whole
//! operation is bounded by one total deadline, and a failed cycle is
//! dropped, not retried before the next scheduled wake.

use log::{debug, info};

use crate::app::ports::{ClockPort, DelayPort, RadioPort, StoragePort};
use crate::config::{MAX_WIFI_CHANNEL, SystemConfig};
use crate::packet::TelemetryPacket;

use super::burst::BurstTransmitter;
use super::channel_store;

/// Pause between full sweeps, from config at construction.
#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    pub max_total_ms: u32,
    pub sweep_pause_ms: u32,
}

impl From<&SystemConfig> for ScanParams {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            max_total_ms: cfg.scan_budget_ms,
            sweep_pause_ms: cfg.sweep_pause_ms,
        }
    }
}

/// Orchestrates "remembered channel, else sweep" on top of the burst
/// transmitter, updating the channel store on sweep success.
pub struct ChannelScanner<'a> {
    tx: BurstTransmitter<'a>,
    params: ScanParams,
}

impl<'a> ChannelScanner<'a> {
    pub fn new(tx: BurstTransmitter<'a>, params: ScanParams) -> Self {
        Self { tx, params }
    }

    /// Deliver `packet`, discovering the receiver's channel if needed.
    ///
    /// 1. Burst on the remembered channel; success returns without
    ///    touching the store.
    /// 2. Otherwise sweep channels 1..=13 ascending, repeating the full
    ///    sweep until `max_total_ms` elapses; the first confirming
    ///    channel is persisted and reported as success.
    /// 3. Deadline with no success returns `false`; the caller proceeds
    ///    to sleep regardless.
    pub fn discover_and_send(
        &self,
        packet: &TelemetryPacket,
        storage: &mut impl StoragePort,
        radio: &mut impl RadioPort,
        clock: &impl ClockPort,
        delay: &mut impl DelayPort,
    ) -> bool {
        let start = clock.now_ms();
        let deadline = start + u64::from(self.params.max_total_ms);

        let remembered = channel_store::load(storage);
        debug!("Scanner: trying remembered channel {}", remembered);
        if self.tx.send(packet, remembered, radio, clock, delay) {
            info!("Scanner: delivered on remembered channel {}", remembered);
            return true;
        }

        debug!("Scanner: remembered channel failed, sweeping");
        while clock.now_ms() < deadline {
            for ch in 1..=MAX_WIFI_CHANNEL {
                if clock.now_ms() >= deadline {
                    break;
                }
                if self.tx.send(packet, ch, radio, clock, delay) {
                    info!("Scanner: found receiver on channel {}", ch);
                    channel_store::save(storage, ch);
                    return true;
                }
            }
            if clock.now_ms() < deadline {
                delay.delay_ms(self.params.sweep_pause_ms);
            }
        }

        info!("Scanner: no receiver found within {} ms", self.params.max_total_ms);
        false
    }
}
