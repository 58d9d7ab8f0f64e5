//! MeteoLink outdoor node — entry point.
//!
//! Every boot IS a wake cycle: sample the sensors, deliver one packet,
//! deep sleep. Nothing here loops — `run_wake_cycle` ends in
//! `esp_deep_sleep`, and the next wake starts over from reset with only
//! NVS (the remembered channel) carried across.

use anyhow::{Context, Result};
use log::{error, info};

use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::FromValueType;

use meteolink::adapters::clock::{MonotonicClock, SystemDelay};
use meteolink::adapters::espnow::{DEFAULT_PEER_MAC, EspNowRadio};
use meteolink::adapters::nvs::NvsAdapter;
use meteolink::adapters::sensors::WeatherSensors;
use meteolink::adapters::sleep::DeepSleep;
use meteolink::adapters::wifi::WifiAdapter;
use meteolink::config::SystemConfig;
use meteolink::outdoor::delivery::DeliverySignal;
use meteolink::outdoor::run_wake_cycle;

/// UV photodiode on ADC1 channel 4 (GPIO32).
const UV_ADC_CHANNEL: u32 = 4;

/// Shared with the ESP-NOW send callback.
static DELIVERY: DeliverySignal = DeliverySignal::new();

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("MeteoLink outdoor v{}", env!("CARGO_PKG_VERSION"));

    // Storage carries the remembered channel; without it every wake
    // pays the full sweep. Init failure is fatal — halt and let the
    // watchdog reset us into a hopefully healthier boot.
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            error!("NVS init failed: {e} — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };

    // No provisioning surface on this node; the compiled defaults are
    // the configuration.
    let cfg = SystemConfig::default();

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(400.kHz().into()),
    )
    .context("I2C bring-up failed")?;
    let mut sensors = WeatherSensors::new(i2c, UV_ADC_CHANNEL);

    // The WiFi driver must be up (station, unassociated) before ESP-NOW.
    let _wifi = WifiAdapter::new().context("WiFi driver bring-up failed")?;
    let mut radio =
        EspNowRadio::new(&DELIVERY, DEFAULT_PEER_MAC).context("ESP-NOW bring-up failed")?;

    let clock = MonotonicClock::new();
    let mut delay = SystemDelay;
    let mut sleep = DeepSleep::new();

    // Does not return on hardware — ends in deep sleep.
    run_wake_cycle(
        &cfg,
        &DELIVERY,
        &mut sensors,
        &mut nvs,
        &mut radio,
        &clock,
        &mut delay,
        &mut sleep,
    );
    Ok(())
}
