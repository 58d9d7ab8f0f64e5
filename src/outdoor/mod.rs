//! Outdoor sensor node.
//!
//! The node lives in a wake/sample/deliver/sleep loop: every wake it
//! builds one fresh [`TelemetryPacket`], hands it to the channel
//! scanner, and goes back to deep sleep no matter what happened. A
//! failed cycle is dropped — the data is stale by the next wake anyway,
//! and the battery budget does not allow retrying outside the scan
//! deadline.

pub mod burst;
pub mod channel_store;
pub mod delivery;
pub mod scanner;

use log::{info, warn};

use crate::app::ports::{
    ClockPort, DelayPort, RadioPort, SleepPort, StoragePort, WeatherSensorPort,
};
use crate::config::SystemConfig;
use crate::packet::TelemetryPacket;

use burst::{BurstParams, BurstTransmitter};
use delivery::DeliverySignal;
use scanner::{ChannelScanner, ScanParams};

/// Read the sensors and build the wire packet for this cycle.
///
/// A missing barometric sensor degrades to zero readings rather than
/// skipping the cycle — the gateway still learns the node is alive and
/// gets the UV value.
pub fn build_measurement(sensors: &mut impl WeatherSensorPort) -> TelemetryPacket {
    let uv_raw = sensors.read_uv_raw();
    match sensors.read_barometric() {
        Some(s) => {
            info!(
                "Sample: {:.1} C, {:.0} %, {:.1} hPa, uv={}",
                s.temp_c, s.humidity_pct, s.pressure_hpa, uv_raw
            );
            TelemetryPacket::from_readings(s.humidity_pct, s.temp_c, s.pressure_hpa, uv_raw)
        }
        None => {
            warn!("Sample: barometric sensor unavailable, sending zeros");
            TelemetryPacket::from_readings(0.0, 0.0, 0.0, uv_raw)
        }
    }
}

/// One full wake cycle: sample, deliver, sleep.
///
/// Returns the delivery outcome for host tests; on hardware the final
/// [`SleepPort::deep_sleep`] never returns.
pub fn run_wake_cycle(
    cfg: &SystemConfig,
    signal: &DeliverySignal,
    sensors: &mut impl WeatherSensorPort,
    storage: &mut impl StoragePort,
    radio: &mut impl RadioPort,
    clock: &impl ClockPort,
    delay: &mut impl DelayPort,
    sleep: &mut impl SleepPort,
) -> bool {
    let packet = build_measurement(sensors);

    let tx = BurstTransmitter::new(signal, BurstParams::from(cfg));
    let sc = ChannelScanner::new(tx, ScanParams::from(cfg));
    let delivered = sc.discover_and_send(&packet, storage, radio, clock, delay);

    if !delivered {
        warn!("Cycle: delivery failed, dropping sample");
    }
    info!("Cycle: entering deep sleep for {} s", cfg.sleep_secs);
    sleep.deep_sleep(cfg.sleep_secs);
    delivered
}
