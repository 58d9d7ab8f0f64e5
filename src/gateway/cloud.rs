//! Cloud data plane — certificates, topics, and the publish payload.
//!
//! The gateway speaks MQTT over mutually-authenticated TLS to a fixed
//! broker endpoint. This module holds the pure half of that contract:
//! the certificate bundle shape, topic construction, and payload
//! serialization. The session itself lives behind
//! [`CloudPort`](crate::app::ports::CloudPort).
//!
//! ## Topics
//!
//! | Purpose        | Topic                                        |
//! |----------------|----------------------------------------------|
//! | Data (claimed) | `users/{ownerId}/stations/{thingName}/data`  |
//! | Data (orphan)  | `stations/{thingName}/data`                  |
//! | Claim request  | `devices/{thingName}/claim/request`          |
//! | Claim reply    | `devices/{thingName}/claim/reply`            |

use core::fmt::Write as _;

use serde::Serialize;

use crate::packet::TelemetryPacket;

/// Maximum certificate size (PEM format, includes headers).
const MAX_CERT_SIZE: usize = 4096;

/// Maximum private key size.
const MAX_KEY_SIZE: usize = 2048;

/// X.509 material for the mutually-authenticated broker session.
///
/// Loaded from persistent storage at session setup. The session fails
/// closed: an incomplete bundle never produces a connection attempt.
pub struct CertBundle {
    /// CA certificate chain (PEM-encoded, NUL-terminated for mbedTLS).
    pub ca_cert: heapless::Vec<u8, MAX_CERT_SIZE>,
    /// Device certificate (PEM-encoded, NUL-terminated for mbedTLS).
    pub device_cert: heapless::Vec<u8, MAX_CERT_SIZE>,
    /// Device private key (PEM-encoded, NUL-terminated for mbedTLS).
    pub device_key: heapless::Vec<u8, MAX_KEY_SIZE>,
}

impl CertBundle {
    pub const fn empty() -> Self {
        Self {
            ca_cert: heapless::Vec::new(),
            device_cert: heapless::Vec::new(),
            device_key: heapless::Vec::new(),
        }
    }

    /// All three pieces present. Anything less is unusable.
    pub fn is_complete(&self) -> bool {
        !self.ca_cert.is_empty() && !self.device_cert.is_empty() && !self.device_key.is_empty()
    }
}

/// One telemetry publish: the outdoor packet enriched with the indoor
/// reading and a wall-clock stamp. Field names are the broker's schema.
#[derive(Debug, Serialize, PartialEq)]
pub struct CloudPayload {
    #[serde(rename = "indoorTemperatureRead")]
    pub indoor_temp_c: f32,
    #[serde(rename = "humidityRead")]
    pub humidity: u8,
    #[serde(rename = "outdoorTemperatureRead")]
    pub outdoor_temp_dc: i16,
    #[serde(rename = "pressureRead")]
    pub pressure_hpa: u16,
    #[serde(rename = "uvIndexRead")]
    pub uv_raw: u8,
    /// Unix milliseconds, UTC.
    pub ts: i64,
}

impl CloudPayload {
    /// Build from the raw packet. The indoor reading is rounded to one
    /// decimal; the packet fields pass through untouched.
    pub fn build(packet: &TelemetryPacket, indoor_temp_c: f32, ts_ms: i64) -> Self {
        Self {
            indoor_temp_c: round_1dp(indoor_temp_c),
            humidity: packet.humidity,
            outdoor_temp_dc: packet.outdoor_temp_dc,
            pressure_hpa: packet.pressure_hpa,
            uv_raw: packet.uv_raw,
            ts: ts_ms,
        }
    }
}

fn round_1dp(v: f32) -> f32 {
    let scaled = v * 10.0;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5) as i64
    } else {
        (scaled - 0.5) as i64
    };
    rounded as f32 / 10.0
}

/// UTC milliseconds from the RTC reading. The RTC runs in local time,
/// so the configured offset is subtracted before scaling.
pub fn timestamp_ms(rtc_unix_secs: i64, utc_offset_secs: i64) -> i64 {
    (rtc_unix_secs - utc_offset_secs) * 1000
}

/// Data topic: user-scoped once claimed, top-level `stations/` before.
pub fn data_topic(owner_id: Option<&str>, thing_name: &str) -> heapless::String<128> {
    let mut t = heapless::String::new();
    let res = match owner_id {
        Some(owner) => write!(t, "users/{owner}/stations/{thing_name}/data"),
        None => write!(t, "stations/{thing_name}/data"),
    };
    debug_assert!(res.is_ok());
    t
}

pub fn claim_request_topic(thing_name: &str) -> heapless::String<128> {
    let mut t = heapless::String::new();
    let res = write!(t, "devices/{thing_name}/claim/request");
    debug_assert!(res.is_ok());
    t
}

pub fn claim_reply_topic(thing_name: &str) -> heapless::String<128> {
    let mut t = heapless::String::new();
    let res = write!(t, "devices/{thing_name}/claim/reply");
    debug_assert!(res.is_ok());
    t
}
