//! Connectivity manager — the gateway's network state machine.
//!
//! The gateway idles in link-layer receive mode and only becomes a
//! WiFi station for the duration of one cloud publish; association and
//! efficient packet receive are mutually exclusive, so every publish
//! cycle ends by tearing the station down and re-parking the radio.
//!
//! ```text
//!              no credentials
//!   boot ──────────────────────▶ ProvisioningActive (terminal until restart)
//!     │
//!     │ credentials
//!     ▼
//!   Disconnected ──connect──▶ StationConnecting ──▶ StationConnected
//!        ▲                          │ timeout            │ publish done
//!        └──────────────────────────┴────────────────────┘
//! ```
//!
//! One publish cycle is in flight at a time: a packet arriving while a
//! cycle runs waits in the mailbox for the next loop pass.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    CloudPort, EventSink, IndoorSensorPort, ProvisioningPort, RngPort, StoragePort, WallClockPort,
    WifiPort,
};
use crate::config::SystemConfig;
use crate::gateway::claim::{self, Nonce, OwnerId};
use crate::gateway::cloud::{self, CertBundle, CloudPayload};
use crate::gateway::freshness::{FreshnessChange, FreshnessTracker};
use crate::gateway::mailbox::TelemetryMailbox;
use crate::gateway::provisioning;
use crate::packet::TelemetryPacket;

/// Gateway network state. `ProvisioningActive` is terminal until
/// restart: saved credentials take effect on the next boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    StationConnecting,
    StationConnected,
    ProvisioningActive,
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::StationConnecting => "station-connecting",
            Self::StationConnected => "station-connected",
            Self::ProvisioningActive => "provisioning-active",
        };
        f.write_str(s)
    }
}

/// Inbound message staging: drained from the session adapter first,
/// handled second, so the handler can borrow the manager mutably.
type InboundQueue = heapless::Vec<(heapless::String<128>, heapless::Vec<u8, 256>), 4>;

pub struct ConnectivityManager {
    cfg: SystemConfig,
    state: ConnectionState,
    /// Last publish outcome, cleared by staleness. Drives the UI's
    /// link indicator.
    connection_good: bool,
    /// Single publish cycle in flight at a time.
    publish_in_flight: bool,
    owner_id: Option<OwnerId>,
    /// One nonce per boot; replies to older nonces are stale.
    claim_nonce: Option<Nonce>,
    /// Armed by [`request_claim`](Self::request_claim) — the handshake
    /// only runs on an explicit user action, never spontaneously.
    claim_requested: bool,
    /// Once armed, the claim request goes out once per boot,
    /// piggybacked on the next successful publish session. The
    /// reply-topic subscription persists broker-side, so a reply sent
    /// while the station is down is delivered on the next session.
    claim_offered: bool,
    /// Last good indoor reading; publishes reuse it when a read fails.
    indoor_temp_c: f32,
    freshness: FreshnessTracker,
}

impl ConnectivityManager {
    pub fn new(cfg: SystemConfig) -> Self {
        let freshness = FreshnessTracker::new(cfg.staleness_threshold_ms);
        Self {
            cfg,
            state: ConnectionState::Disconnected,
            connection_good: false,
            publish_in_flight: false,
            owner_id: None,
            claim_nonce: None,
            claim_requested: false,
            claim_offered: false,
            indoor_temp_c: 0.0,
            freshness,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_good(&self) -> bool {
        self.connection_good
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn is_claimed(&self) -> bool {
        self.owner_id.is_some()
    }

    /// Arm the claim handshake. The UI collaborator calls this on an
    /// explicit user action (the pairing button); the request itself
    /// rides the next successful publish session.
    pub fn request_claim(&mut self) {
        if self.is_claimed() {
            info!("Claim: already bound, ignoring request");
            return;
        }
        if !self.claim_requested {
            info!("Claim: armed, offer rides the next publish session");
            self.claim_requested = true;
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Boot
    // ───────────────────────────────────────────────────────────────

    /// Decide the boot posture: provisioning portal when no credentials
    /// are stored, otherwise a short reachability probe followed by
    /// receive-only parking.
    pub fn begin(
        &mut self,
        storage: &mut impl StoragePort,
        wifi: &mut impl WifiPort,
        portal: &mut impl ProvisioningPort,
        sink: &mut impl EventSink,
    ) {
        self.owner_id = claim::load_owner(storage);
        if self.owner_id.is_some() {
            info!("Connectivity: device is claimed");
        }

        if !provisioning::has_credentials(storage) {
            info!("Connectivity: no stored credentials, starting provisioning portal");
            if let Err(e) =
                wifi.start_access_point(provisioning::AP_SSID, provisioning::AP_PASSPHRASE)
            {
                warn!("Connectivity: access point failed to start: {e}");
            }
            portal.start();
            self.set_state(ConnectionState::ProvisioningActive, sink);
            sink.emit(&AppEvent::ProvisioningStarted);
            return;
        }

        // Short reachability probe: confirms the saved credentials
        // still associate and primes the link indicator. Either way the
        // radio parks in receive mode until the first packet needs
        // publishing.
        let reachable = self.try_station(storage, wifi, self.cfg.boot_connect_timeout_ms, sink);
        if reachable {
            wifi.disconnect();
        }
        self.park(wifi, sink);
    }

    // ───────────────────────────────────────────────────────────────
    // Main-loop tick
    // ───────────────────────────────────────────────────────────────

    /// One pass of the gateway loop: drain inbound messages, refresh
    /// the staleness verdict, and run at most one publish cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn service(
        &mut self,
        now_ms: u64,
        mailbox: &TelemetryMailbox,
        storage: &mut impl StoragePort,
        wifi: &mut impl WifiPort,
        session: &mut impl CloudPort,
        certs: &CertBundle,
        indoor: &mut impl IndoorSensorPort,
        rtc: &impl WallClockPort,
        rng: &mut impl RngPort,
        sink: &mut impl EventSink,
    ) {
        let mut inbound = InboundQueue::new();
        session.poll(&mut |topic, payload| {
            let mut t = heapless::String::new();
            let mut p = heapless::Vec::new();
            if t.push_str(topic).is_ok() && p.extend_from_slice(payload).is_ok() {
                let _ = inbound.push((t, p));
            }
        });
        for (topic, payload) in &inbound {
            self.handle_message(topic.as_str(), payload, storage, session, sink);
        }

        match self.freshness.check(mailbox.last_received_ms(), now_ms) {
            Some(FreshnessChange::BecameStale) => {
                warn!("Connectivity: telemetry went stale");
                self.set_connection_good(false, sink);
            }
            Some(FreshnessChange::BecameFresh) | None => {}
        }

        if self.state == ConnectionState::ProvisioningActive {
            return;
        }

        // The new-data edge is only consumed when a cycle can run, so
        // a packet arriving mid-cycle waits in the mailbox for the
        // next pass instead of being dropped.
        if !self.publish_in_flight
            && let Some(packet) = mailbox.take_new()
        {
            sink.emit(&AppEvent::TelemetryUpdated(packet));
            self.publish_cycle(&packet, storage, wifi, session, certs, indoor, rtc, rng, sink);
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Publish cycle
    // ───────────────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn publish_cycle(
        &mut self,
        packet: &TelemetryPacket,
        storage: &mut impl StoragePort,
        wifi: &mut impl WifiPort,
        session: &mut impl CloudPort,
        certs: &CertBundle,
        indoor: &mut impl IndoorSensorPort,
        rtc: &impl WallClockPort,
        rng: &mut impl RngPort,
        sink: &mut impl EventSink,
    ) {
        self.publish_in_flight = true;

        let ok = self.connect_and_publish(packet, storage, wifi, session, certs, indoor, rtc, sink);
        self.set_connection_good(ok, sink);

        // A user-armed, unclaimed gateway rides the session it already
        // has up to offer itself for claiming, then tears down as
        // usual. The reply lands on a later session via the persistent
        // subscription.
        if ok && self.claim_requested && !self.is_claimed() {
            self.offer_claim(session, rng);
        }

        session.disconnect();
        wifi.disconnect();
        self.park(wifi, sink);
        self.publish_in_flight = false;
    }

    #[allow(clippy::too_many_arguments)]
    fn connect_and_publish(
        &mut self,
        packet: &TelemetryPacket,
        storage: &mut impl StoragePort,
        wifi: &mut impl WifiPort,
        session: &mut impl CloudPort,
        certs: &CertBundle,
        indoor: &mut impl IndoorSensorPort,
        rtc: &impl WallClockPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.try_station(storage, wifi, self.cfg.publish_connect_timeout_ms, sink) {
            return false;
        }
        if !self.ensure_session(session, certs) {
            return false;
        }

        if let Some(t) = indoor.read_temp_c() {
            self.indoor_temp_c = t;
        } else {
            warn!("Connectivity: indoor sensor read failed, reusing last value");
        }

        let ts_ms = match rtc.unix_time_secs() {
            Some(secs) => cloud::timestamp_ms(secs, self.cfg.rtc_utc_offset_secs),
            None => {
                warn!("Connectivity: wall clock unset, publishing ts=0");
                0
            }
        };

        let payload = CloudPayload::build(packet, self.indoor_temp_c, ts_ms);
        let body = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                warn!("Connectivity: payload serialization failed: {e}");
                return false;
            }
        };

        let topic = cloud::data_topic(self.owner_id(), self.cfg.thing_name.as_str());
        match session.publish(topic.as_str(), &body) {
            Ok(()) => {
                info!("Connectivity: published {} bytes to {}", body.len(), topic);
                true
            }
            Err(e) => {
                warn!("Connectivity: publish failed: {e}");
                false
            }
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Claim handshake
    // ───────────────────────────────────────────────────────────────

    /// Subscribe to the reply topic and publish one claim request over
    /// the broker session already in hand. Runs at most once per boot,
    /// from inside a successful publish cycle, and only after the user
    /// armed the handshake.
    fn offer_claim(&mut self, session: &mut impl CloudPort, rng: &mut impl RngPort) {
        if self.claim_offered {
            return;
        }

        if self.claim_nonce.is_none() {
            self.claim_nonce = Some(claim::generate_nonce(rng));
        }
        let Some(nonce) = self.claim_nonce.clone() else {
            return;
        };

        let reply_topic = cloud::claim_reply_topic(self.cfg.thing_name.as_str());
        if let Err(e) = session.subscribe(reply_topic.as_str()) {
            warn!("Claim: subscribe failed: {e}");
            return;
        }

        let Some(body) = claim::request_body(self.cfg.thing_name.as_str(), nonce.as_str()) else {
            return;
        };
        let request_topic = cloud::claim_request_topic(self.cfg.thing_name.as_str());
        match session.publish(request_topic.as_str(), body.as_bytes()) {
            Ok(()) => {
                info!("Claim: request published, awaiting reply");
                self.claim_offered = true;
            }
            Err(e) => {
                warn!("Claim: request publish failed: {e}");
                let _ = session.unsubscribe(reply_topic.as_str());
            }
        }
    }

    fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        storage: &mut impl StoragePort,
        session: &mut impl CloudPort,
        sink: &mut impl EventSink,
    ) {
        let reply_topic = cloud::claim_reply_topic(self.cfg.thing_name.as_str());
        if topic != reply_topic.as_str() {
            return;
        }
        if self.is_claimed() {
            return;
        }
        let Some(nonce) = self.claim_nonce.as_ref() else {
            return;
        };
        let Some(owner) = claim::verify_reply(payload, nonce.as_str()) else {
            return;
        };

        info!("Claim: accepted, binding owner");
        claim::save_owner(storage, owner.as_str());
        sink.emit(&AppEvent::ClaimAccepted {
            owner_id: owner.clone(),
        });
        self.owner_id = Some(owner);
        // Best-effort: the session may already be down between cycles.
        let _ = session.unsubscribe(reply_topic.as_str());
    }

    // ───────────────────────────────────────────────────────────────
    // Station helpers
    // ───────────────────────────────────────────────────────────────

    fn try_station(
        &mut self,
        storage: &mut impl StoragePort,
        wifi: &mut impl WifiPort,
        timeout_ms: u32,
        sink: &mut impl EventSink,
    ) -> bool {
        if wifi.is_connected() {
            self.set_state(ConnectionState::StationConnected, sink);
            return true;
        }
        let Some(creds) = provisioning::load(storage) else {
            warn!("Connectivity: no credentials available");
            return false;
        };

        self.set_state(ConnectionState::StationConnecting, sink);
        match wifi.connect(&creds, timeout_ms) {
            Ok(()) => {
                wifi.set_power_save(false);
                self.set_state(ConnectionState::StationConnected, sink);
                // Association alone asserts the link indicator; a
                // failed publish afterwards clears it again.
                self.set_connection_good(true, sink);
                true
            }
            Err(e) => {
                warn!(
                    "Connectivity: association with '{}' failed within {} ms: {e}",
                    creds.ssid, timeout_ms
                );
                self.set_state(ConnectionState::Disconnected, sink);
                self.set_connection_good(false, sink);
                false
            }
        }
    }

    fn ensure_session(&mut self, session: &mut impl CloudPort, certs: &CertBundle) -> bool {
        if session.is_connected() {
            return true;
        }
        if !certs.is_complete() {
            warn!("Connectivity: certificate bundle incomplete, refusing to connect");
            return false;
        }
        match session.connect(
            self.cfg.cloud_endpoint.as_str(),
            self.cfg.cloud_port,
            self.cfg.thing_name.as_str(),
            certs,
        ) {
            Ok(()) => true,
            Err(e) => {
                warn!("Connectivity: broker connect failed: {e}");
                false
            }
        }
    }

    /// Return the radio to link-layer receive on the home channel.
    fn park(&mut self, wifi: &mut impl WifiPort, sink: &mut impl EventSink) {
        wifi.enter_receive_mode(self.cfg.fallback_channel);
        self.set_state(ConnectionState::Disconnected, sink);
    }

    fn set_state(&mut self, to: ConnectionState, sink: &mut impl EventSink) {
        if self.state == to {
            return;
        }
        let from = self.state;
        info!("Connectivity: {from} -> {to}");
        self.state = to;
        sink.emit(&AppEvent::StateChanged { from, to });
    }

    fn set_connection_good(&mut self, good: bool, sink: &mut impl EventSink) {
        if self.connection_good == good {
            return;
        }
        self.connection_good = good;
        sink.emit(&AppEvent::ConnectionGood(good));
    }
}
