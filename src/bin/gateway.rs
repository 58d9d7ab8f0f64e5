//! MeteoLink indoor gateway — entry point.
//!
//! Boot order matters: storage first (everything hangs off it), then
//! the WiFi driver, then ESP-NOW receive, then the connectivity
//! manager decides the posture (portal vs receive-only). After that
//! the whole gateway is the service loop at the bottom.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{error, info, warn};

use meteolink::adapters::cert_store;
use meteolink::adapters::clock::{MonotonicClock, RtcClock, SystemDelay};
use meteolink::adapters::device_id;
use meteolink::adapters::espnow::EspNowReceiver;
use meteolink::adapters::log_sink::LogEventSink;
use meteolink::adapters::mqtt::MqttSession;
use meteolink::adapters::nvs::NvsAdapter;
use meteolink::adapters::portal::CaptivePortal;
use meteolink::adapters::rng::HwRng;
use meteolink::adapters::sensors::IndoorNtcSensor;
use meteolink::adapters::wifi::WifiAdapter;
use meteolink::app::ports::{ClockPort, ConfigPort, DelayPort};
use meteolink::gateway::cloud::CertBundle;
use meteolink::gateway::connectivity::ConnectivityManager;
use meteolink::gateway::mailbox::TelemetryMailbox;

/// Indoor NTC thermistor on ADC1 channel 6 (GPIO34).
const INDOOR_ADC_CHANNEL: u32 = 6;

/// Service loop cadence.
const TICK_MS: u32 = 100;

/// Shared with the ESP-NOW receive callback.
static MAILBOX: TelemetryMailbox = TelemetryMailbox::new();

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("MeteoLink gateway v{}", env!("CARGO_PKG_VERSION"));

    // Credentials, ownership, certificates, channel memory — all live
    // in NVS. A gateway without storage cannot do anything safely.
    let nvs = match NvsAdapter::new() {
        Ok(n) => Arc::new(Mutex::new(n)),
        Err(e) => {
            error!("NVS init failed: {e} — halting");
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };

    let (mut cfg, certs) = {
        let storage = nvs.lock().map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        let cfg = storage.load().context("config load failed")?;
        let certs = cert_store::load_bundle(&*storage).unwrap_or_else(|| {
            warn!("No certificate bundle — cloud publishing disabled");
            CertBundle::empty()
        });
        (cfg, certs)
    };

    let mac = device_id::read_mac();
    cfg.thing_name = device_id::thing_name(&mac);
    info!("Thing name: {}", cfg.thing_name);

    // Shared with the portal's scan handler.
    let wifi = Arc::new(Mutex::new(
        WifiAdapter::new().context("WiFi driver bring-up failed")?,
    ));
    let _receiver = EspNowReceiver::start(&MAILBOX).context("ESP-NOW bring-up failed")?;

    let mut session = MqttSession::new();
    let mut indoor = IndoorNtcSensor::new(INDOOR_ADC_CHANNEL);
    let rtc = RtcClock;
    let mut rng = HwRng::new();
    let clock = MonotonicClock::new();
    let mut delay = SystemDelay;
    let mut sink = LogEventSink;
    let mut portal = CaptivePortal::new(Arc::clone(&nvs), Arc::clone(&wifi));

    let mut manager = ConnectivityManager::new(cfg);
    {
        let (Ok(mut storage), Ok(mut wifi_guard)) = (nvs.lock(), wifi.lock()) else {
            anyhow::bail!("storage or wifi lock poisoned");
        };
        manager.begin(&mut *storage, &mut *wifi_guard, &mut portal, &mut sink);
    }

    info!("Gateway up, entering service loop");
    loop {
        {
            let (Ok(mut storage), Ok(mut wifi_guard)) = (nvs.lock(), wifi.lock()) else {
                warn!("shared lock poisoned, skipping tick");
                delay.delay_ms(TICK_MS);
                continue;
            };
            manager.service(
                clock.now_ms(),
                &MAILBOX,
                &mut *storage,
                &mut *wifi_guard,
                &mut session,
                &certs,
                &mut indoor,
                &rtc,
                &mut rng,
                &mut sink,
            );
        }
        delay.delay_ms(TICK_MS);
    }
}
