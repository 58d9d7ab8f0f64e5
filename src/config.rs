//! System configuration parameters
//!
//! All tunable parameters for the MeteoLink nodes. The gateway persists
//! its config as a postcard blob in NVS; the outdoor node uses the
//! defaults compiled in (it has no provisioning surface to change them).

use serde::{Deserialize, Serialize};

/// Highest WiFi channel the link may use (EU regulatory domain).
pub const MAX_WIFI_CHANNEL: u8 = 13;

/// Core system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Burst transmitter ---
    /// Packets per burst on a single channel.
    pub burst_size: u8,
    /// Per-packet delivery-confirmation wait (milliseconds).
    pub per_packet_timeout_ms: u32,
    /// Delay between consecutive attempts within a burst (milliseconds).
    pub inter_packet_delay_ms: u32,
    /// Settle time after retuning the radio (milliseconds).
    pub tune_settle_ms: u32,

    // --- Channel scanner ---
    /// Total budget for finding the receiver before giving up (milliseconds).
    pub scan_budget_ms: u32,
    /// Pause between full channel sweeps (milliseconds).
    pub sweep_pause_ms: u32,

    // --- Outdoor node ---
    /// Deep sleep between measurements (seconds).
    pub sleep_secs: u64,

    // --- Gateway link ---
    /// Telemetry age after which the link is considered stale (milliseconds).
    pub staleness_threshold_ms: u64,
    /// Channel the gateway radio parks on while in receive-only mode.
    pub fallback_channel: u8,

    // --- Gateway WiFi ---
    /// Station association timeout at boot (milliseconds).
    pub boot_connect_timeout_ms: u32,
    /// Station association timeout for publish cycles (milliseconds).
    pub publish_connect_timeout_ms: u32,

    // --- Cloud ---
    /// MQTT broker hostname.
    pub cloud_endpoint: heapless::String<64>,
    /// MQTT broker port (TLS).
    pub cloud_port: u16,
    /// Device/thing name used for topics and the client id.
    pub thing_name: heapless::String<32>,
    /// Offset subtracted from the RTC before scaling to ms (seconds).
    /// The deployed RTC is set to local time; the cloud expects UTC.
    pub rtc_utc_offset_secs: i64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut endpoint = heapless::String::new();
        let _ = endpoint.push_str("an7hi8lzvqru3-ats.iot.eu-north-1.amazonaws.com");
        let mut thing = heapless::String::new();
        let _ = thing.push_str("station-001");

        Self {
            // Burst
            burst_size: 5,
            per_packet_timeout_ms: 50,
            inter_packet_delay_ms: 10,
            tune_settle_ms: 20,

            // Scanner
            scan_budget_ms: 20_000,
            sweep_pause_ms: 100,

            // Outdoor node
            sleep_secs: 60,

            // Gateway link
            staleness_threshold_ms: 120_000,
            fallback_channel: 1,

            // Gateway WiFi
            boot_connect_timeout_ms: 1_000,
            publish_connect_timeout_ms: 3_000,

            // Cloud
            cloud_endpoint: endpoint,
            cloud_port: 8883,
            thing_name: thing,
            rtc_utc_offset_secs: 3600,
        }
    }
}
