//! Burst transmitter — bounded send-and-confirm on one channel.
//!
//! A burst is up to `burst_size` fire-and-wait attempts of the same
//! frame: transmit to the fixed peer, then poll the shared
//! [`DeliverySignal`] for up to `per_packet_timeout_ms`. The first
//! confirmed delivery wins and the burst returns immediately. No
//! handshake precedes the burst — pure best-effort broadcast with
//! link-layer acknowledgement only.
//!
//! Two fixed short delays are part of the protocol: one after retuning
//! (the radio needs settle time before the first frame) and one between
//! consecutive attempts (desynchronises repeats from the receiver's
//! duty cycle).
//!
//! Worst-case blocking time is
//! `tune_settle + burst_size * (per_packet_timeout + inter_packet_delay)`.

use log::{debug, trace};

use crate::app::ports::{ClockPort, DelayPort, RadioPort};
use crate::config::SystemConfig;
use crate::packet::TelemetryPacket;

use super::delivery::{DeliverySignal, DeliveryStatus};

/// Burst timing parameters, lifted out of [`SystemConfig`] so the
/// transmitter can be driven directly in tests.
#[derive(Debug, Clone, Copy)]
pub struct BurstParams {
    pub burst_size: u8,
    pub per_packet_timeout_ms: u32,
    pub inter_packet_delay_ms: u32,
    pub tune_settle_ms: u32,
}

impl From<&SystemConfig> for BurstParams {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            burst_size: cfg.burst_size,
            per_packet_timeout_ms: cfg.per_packet_timeout_ms,
            inter_packet_delay_ms: cfg.inter_packet_delay_ms,
            tune_settle_ms: cfg.tune_settle_ms,
        }
    }
}

/// Sends one packet as a confirmation-gated burst on a single channel.
pub struct BurstTransmitter<'a> {
    signal: &'a DeliverySignal,
    params: BurstParams,
}

impl<'a> BurstTransmitter<'a> {
    /// `signal` is the same slot the radio adapter's send callback
    /// completes into.
    pub fn new(signal: &'a DeliverySignal, params: BurstParams) -> Self {
        Self { signal, params }
    }

    pub fn params(&self) -> BurstParams {
        self.params
    }

    /// Tune to `channel` and burst `packet` at the receiver.
    ///
    /// Returns `true` on the first confirmed delivery; `false` once the
    /// burst budget is exhausted. Never blocks beyond the worst-case
    /// bound documented at module level.
    pub fn send(
        &self,
        packet: &TelemetryPacket,
        channel: u8,
        radio: &mut impl RadioPort,
        clock: &impl ClockPort,
        delay: &mut impl DelayPort,
    ) -> bool {
        if radio.tune(channel).is_err() {
            return false;
        }
        delay.delay_ms(self.params.tune_settle_ms);

        let frame = packet.encode();

        for attempt in 0..self.params.burst_size {
            self.signal.arm();

            if radio.transmit(&frame).is_ok() {
                if self.wait_for_confirmation(clock, delay) {
                    debug!(
                        "Burst: delivered on channel {} (attempt {})",
                        channel,
                        attempt + 1
                    );
                    self.signal.clear();
                    return true;
                }
            } else {
                trace!("Burst: transmit rejected on channel {}", channel);
            }

            // Short fixed delay before the retry to avoid colliding with
            // the receiver's duty cycle again.
            delay.delay_ms(self.params.inter_packet_delay_ms);
        }

        self.signal.clear();
        false
    }

    /// Poll the delivery slot until a terminal state or the per-packet
    /// timeout. The node has nothing else to do during this window, so
    /// a blocking 1 ms poll cadence is deliberate.
    fn wait_for_confirmation(&self, clock: &impl ClockPort, delay: &mut impl DelayPort) -> bool {
        let deadline = clock.now_ms() + u64::from(self.params.per_packet_timeout_ms);
        loop {
            match self.signal.status() {
                DeliveryStatus::Confirmed => return true,
                DeliveryStatus::Failed => return false,
                _ => {
                    if clock.now_ms() >= deadline {
                        return false;
                    }
                    delay.delay_ms(1);
                }
            }
        }
    }
}
