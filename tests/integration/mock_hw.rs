//! Mock adapters for integration tests.
//!
//! Every port the connectivity manager touches has a recording mock
//! here, so tests can assert on the full call history without real
//! radios or brokers. All tests run on the host (x86_64).

use std::collections::{HashMap, VecDeque};

use meteolink::app::events::AppEvent;
use meteolink::app::ports::{
    CloudPort, EventSink, IndoorSensorPort, ProvisioningPort, RngPort, StoragePort, WallClockPort,
    WifiPort, WifiNetwork,
};
use meteolink::error::{CommsError, StorageError};
use meteolink::gateway::cloud::CertBundle;
use meteolink::gateway::provisioning::NetworkCredentials;

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    pub store: HashMap<String, Vec<u8>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
        }
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .contains_key(&format!("{}::{}", namespace, key))
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let prefix = format!("{}::", namespace);
        self.store.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

// ── MockWifi ──────────────────────────────────────────────────

/// Station/AP/receive-mode radio with a switchable "AP in range" flag.
pub struct MockWifi {
    pub reachable: bool,
    pub connected: bool,
    pub parked_channel: Option<u8>,
    pub ap_started: Option<(String, String)>,
    pub connect_attempts: u32,
    pub power_save: Option<bool>,
    pub scan_results: Vec<WifiNetwork>,
}

#[allow(dead_code)]
impl MockWifi {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable,
            connected: false,
            parked_channel: None,
            ap_started: None,
            connect_attempts: 0,
            power_save: None,
            scan_results: Vec::new(),
        }
    }
}

impl WifiPort for MockWifi {
    fn connect(&mut self, _creds: &NetworkCredentials, _timeout_ms: u32) -> Result<(), CommsError> {
        self.connect_attempts += 1;
        if self.reachable {
            self.connected = true;
            self.parked_channel = None;
            Ok(())
        } else {
            Err(CommsError::WifiConnectTimeout)
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn set_power_save(&mut self, enabled: bool) {
        self.power_save = Some(enabled);
    }

    fn enter_receive_mode(&mut self, channel: u8) {
        self.connected = false;
        self.parked_channel = Some(channel);
    }

    fn start_access_point(&mut self, ssid: &str, passphrase: &str) -> Result<(), CommsError> {
        self.ap_started = Some((ssid.to_string(), passphrase.to_string()));
        Ok(())
    }

    fn scan(&mut self) -> heapless::Vec<WifiNetwork, 16> {
        let mut out = heapless::Vec::new();
        for n in &self.scan_results {
            let _ = out.push(n.clone());
        }
        out
    }
}

// ── MockCloud ─────────────────────────────────────────────────

/// Broker session double. Inbound messages injected by the test are
/// drained on the next `poll`, whether or not the session is up —
/// matching the persistent-subscription delivery the real broker does.
pub struct MockCloud {
    pub connected: bool,
    pub fail_connect: bool,
    pub fail_publish: bool,
    pub connects: u32,
    pub disconnects: u32,
    pub published: Vec<(String, Vec<u8>)>,
    pub subscriptions: Vec<String>,
    inbound: VecDeque<(String, Vec<u8>)>,
}

#[allow(dead_code)]
impl MockCloud {
    pub fn new() -> Self {
        Self {
            connected: false,
            fail_connect: false,
            fail_publish: false,
            connects: 0,
            disconnects: 0,
            published: Vec::new(),
            subscriptions: Vec::new(),
            inbound: VecDeque::new(),
        }
    }

    pub fn inject(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.to_string(), payload.to_vec()));
    }

    pub fn published_topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudPort for MockCloud {
    fn connect(
        &mut self,
        _endpoint: &str,
        _port: u16,
        _client_id: &str,
        certs: &CertBundle,
    ) -> Result<(), CommsError> {
        if !certs.is_complete() {
            return Err(CommsError::IncompleteCertBundle);
        }
        if self.fail_connect {
            return Err(CommsError::CloudConnectFailed);
        }
        self.connects += 1;
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.connected || self.fail_publish {
            return Err(CommsError::PublishFailed);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.connected {
            return Err(CommsError::SubscribeFailed);
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.subscriptions.retain(|t| t != topic);
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        while let Some((topic, payload)) = self.inbound.pop_front() {
            on_message(&topic, &payload);
        }
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.disconnects += 1;
        }
        self.connected = false;
    }
}

// ── Sensor / clock / rng doubles ──────────────────────────────

pub struct MockIndoor {
    pub temp_c: Option<f32>,
}

impl IndoorSensorPort for MockIndoor {
    fn read_temp_c(&mut self) -> Option<f32> {
        self.temp_c
    }
}

pub struct MockRtc {
    pub unix_secs: Option<i64>,
}

impl WallClockPort for MockRtc {
    fn unix_time_secs(&self) -> Option<i64> {
        self.unix_secs
    }
}

/// Deterministic random source: hands out queued draws, then a fixed
/// fallback.
pub struct MockRng {
    pub draws: VecDeque<u32>,
}

#[allow(dead_code)]
impl MockRng {
    pub fn new(draws: &[u32]) -> Self {
        Self {
            draws: draws.iter().copied().collect(),
        }
    }
}

impl RngPort for MockRng {
    fn next_u32(&mut self) -> u32 {
        self.draws.pop_front().unwrap_or(0x1234_5678)
    }
}

// ── MockPortal ────────────────────────────────────────────────

pub struct MockPortal {
    pub active: bool,
}

#[allow(dead_code)]
impl MockPortal {
    pub fn new() -> Self {
        Self { active: false }
    }
}

impl Default for MockPortal {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisioningPort for MockPortal {
    fn start(&mut self) {
        self.active = true;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

// ── CaptureSink ───────────────────────────────────────────────

/// Records every emitted event for later assertions.
pub struct CaptureSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl CaptureSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn connection_good_edges(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ConnectionGood(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn saw_provisioning_started(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, AppEvent::ProvisioningStarted))
    }

    pub fn claim_accepted_owner(&self) -> Option<String> {
        self.events.iter().find_map(|e| match e {
            AppEvent::ClaimAccepted { owner_id } => Some(owner_id.to_string()),
            _ => None,
        })
    }

    pub fn telemetry_updates(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::TelemetryUpdated(_)))
            .count()
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for CaptureSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Shared fixtures ───────────────────────────────────────────

#[allow(dead_code)]
pub fn test_certs() -> CertBundle {
    let mut bundle = CertBundle::empty();
    let _ = bundle.ca_cert.extend_from_slice(b"-----CA-----\0");
    let _ = bundle.device_cert.extend_from_slice(b"-----CERT-----\0");
    let _ = bundle.device_key.extend_from_slice(b"-----KEY-----\0");
    bundle
}

#[allow(dead_code)]
pub fn save_test_credentials(storage: &mut MockNvs) {
    assert!(meteolink::gateway::provisioning::save(
        storage, "home-net", "hunter22"
    ));
}
