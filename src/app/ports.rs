//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ domain (outdoor::* / gateway::*)
//! ```
//!
//! Driven adapters (radio, WiFi, MQTT session, NVS, clocks) implement
//! these traits. The domain consumes them via generics at the call site,
//! so the core never touches ESP-IDF directly and every component runs
//! against mocks on the host.
//!
//! Callback contexts (delivery confirmation, packet receipt, inbound
//! MQTT messages) never appear here as callbacks: adapters latch them
//! into atomic single-slot structures and the domain polls through
//! bounded synchronous calls.

use crate::config::SystemConfig;
use crate::error::{CommsError, RadioError, StorageError};
use crate::gateway::cloud::CertBundle;
use crate::gateway::provisioning::NetworkCredentials;

// ───────────────────────────────────────────────────────────────
// Radio port (link-layer broadcast, outdoor node + gateway RX)
// ───────────────────────────────────────────────────────────────

/// Connectionless link-layer radio. One fixed peer address, no sessions.
pub trait RadioPort {
    /// Retune to `channel` (1..=13). Takes effect before the next transmit;
    /// callers must allow the configured settle time.
    fn tune(&mut self, channel: u8) -> Result<(), RadioError>;

    /// Start an asynchronous send of one frame to the fixed peer.
    /// Completion is reported through the shared
    /// [`DeliverySignal`](crate::outdoor::delivery::DeliverySignal),
    /// not through this call.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Time and delay ports
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

/// Blocking delay. The outdoor node blocks deliberately during burst
/// waits — it has no other useful work then.
pub trait DelayPort {
    fn delay_ms(&mut self, ms: u32);
}

/// Wall-clock time from the RTC collaborator.
pub trait WallClockPort {
    /// Unix time in seconds, or `None` when the clock is not set or
    /// reads an implausible epoch.
    fn unix_time_secs(&self) -> Option<i64>;
}

/// Hardware random source for the claim nonce.
pub trait RngPort {
    fn next_u32(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Storage port (namespaced key-value, NVS-backed)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage. Keys are namespaced per subsystem
/// (`net`, `claim`, `radio`). Writes are atomic — the NVS commit
/// guarantees no partial value survives power loss.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Erase every key in a namespace (factory reset path).
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;
}

/// Loads and persists the gateway's system configuration.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns `SystemConfig::default()` if no stored config exists.
    fn load(&self) -> Result<SystemConfig, StorageError>;

    /// Persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// WiFi port (gateway station / AP / receive-only modes)
// ───────────────────────────────────────────────────────────────

/// A network visible to the provisioning scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: heapless::String<32>,
    pub rssi: i8,
    /// True when the network requires a passphrase.
    pub enc: bool,
}

/// The gateway radio can associate as a station, host a provisioning
/// access point, or park on a fixed channel in receive-only mode —
/// but only one at a time: association and efficient link-layer
/// receive are mutually exclusive.
pub trait WifiPort {
    /// Associate with `creds`, blocking up to `timeout_ms`.
    fn connect(&mut self, creds: &NetworkCredentials, timeout_ms: u32) -> Result<(), CommsError>;

    /// Drop the station association.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Disable modem power-save while associated (publish responsiveness).
    fn set_power_save(&mut self, enabled: bool);

    /// Leave station mode and park on `channel` for link-layer receive.
    fn enter_receive_mode(&mut self, channel: u8);

    /// Start the local provisioning access point.
    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), CommsError>;

    /// Scan for nearby networks (provisioning surface's `/api/scan`).
    fn scan(&mut self) -> heapless::Vec<WifiNetwork, 16>;
}

// ───────────────────────────────────────────────────────────────
// Cloud port (TLS + MQTT pub/sub session)
// ───────────────────────────────────────────────────────────────

/// Mutually-authenticated MQTT session. Inbound messages arrive on the
/// adapter's own task and are drained by [`poll`](CloudPort::poll) from
/// the main loop.
pub trait CloudPort {
    /// Establish the TLS session and MQTT connection.
    fn connect(
        &mut self,
        endpoint: &str,
        port: u16,
        client_id: &str,
        certs: &CertBundle,
    ) -> Result<(), CommsError>;

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    fn unsubscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    /// Drain inbound messages queued since the last poll, invoking
    /// `on_message(topic, payload)` for each.
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8]));

    /// Tear the session down. Safe to call when not connected.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Local sensor port (gateway enrichment)
// ───────────────────────────────────────────────────────────────

/// The gateway's one local scalar: indoor temperature. A failed read
/// returns `None` and the publish proceeds with the last known value.
pub trait IndoorSensorPort {
    fn read_temp_c(&mut self) -> Option<f32>;
}

// ───────────────────────────────────────────────────────────────
// Outdoor sensor + sleep ports
// ───────────────────────────────────────────────────────────────

/// One barometric sample from the outdoor combo sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarometricSample {
    pub temp_c: f32,
    pub humidity_pct: f32,
    pub pressure_hpa: f32,
}

/// The outdoor node's sensors. Acquisition details (I2C, ADC) live in
/// the adapter; the core only needs the scalars.
pub trait WeatherSensorPort {
    /// Forced-mode barometric measurement. `None` when the sensor was
    /// not found at boot — the packet then carries zeros, which the
    /// cycle still delivers.
    fn read_barometric(&mut self) -> Option<BarometricSample>;

    /// Raw UV ADC count (0–4095). Always readable.
    fn read_uv_raw(&mut self) -> u16;
}

/// Timer-wakeup deep sleep. On hardware this call does not return; the
/// simulation records the request and does.
pub trait SleepPort {
    fn deep_sleep(&mut self, secs: u64);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → UI / logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. The on-screen UI is an external collaborator that
/// consumes these instead of reading ambient globals.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Provisioning surface port (captive portal collaborator)
// ───────────────────────────────────────────────────────────────

/// The captive-portal web surface. The core only starts it and checks
/// whether it is active; credential writes come back through
/// [`StoragePort`] and take effect after restart.
pub trait ProvisioningPort {
    fn start(&mut self);
    fn is_active(&self) -> bool;
}
