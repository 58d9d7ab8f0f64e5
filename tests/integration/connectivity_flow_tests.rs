//! Connectivity manager flows: boot posture, publish cycles, staleness.

use meteolink::app::ports::ProvisioningPort;
use meteolink::config::SystemConfig;
use meteolink::gateway::connectivity::{ConnectionState, ConnectivityManager};
use meteolink::gateway::cloud::CertBundle;
use meteolink::gateway::mailbox::TelemetryMailbox;
use meteolink::packet::TelemetryPacket;

use crate::mock_hw::{
    save_test_credentials, test_certs, CaptureSink, MockCloud, MockIndoor, MockNvs, MockPortal,
    MockRng, MockRtc, MockWifi,
};

fn sample_packet() -> TelemetryPacket {
    TelemetryPacket {
        humidity: 55,
        outdoor_temp_dc: 214,
        pressure_hpa: 1011,
        uv_raw: 42,
    }
}

/// Everything one service tick needs, wired to sensible defaults.
struct Rig {
    manager: ConnectivityManager,
    mailbox: TelemetryMailbox,
    storage: MockNvs,
    wifi: MockWifi,
    cloud: MockCloud,
    certs: CertBundle,
    indoor: MockIndoor,
    rtc: MockRtc,
    rng: MockRng,
    sink: CaptureSink,
}

impl Rig {
    fn new() -> Self {
        Self {
            manager: ConnectivityManager::new(SystemConfig::default()),
            mailbox: TelemetryMailbox::new(),
            storage: MockNvs::new(),
            wifi: MockWifi::new(true),
            cloud: MockCloud::new(),
            certs: test_certs(),
            indoor: MockIndoor { temp_c: Some(21.5) },
            rtc: MockRtc {
                unix_secs: Some(1_700_003_600),
            },
            rng: MockRng::new(&[0xDEAD_BEEF, 0x0123_4567]),
            sink: CaptureSink::new(),
        }
    }

    fn provisioned() -> Self {
        let mut rig = Self::new();
        save_test_credentials(&mut rig.storage);
        rig
    }

    fn begin(&mut self) {
        let mut portal = MockPortal::new();
        self.manager
            .begin(&mut self.storage, &mut self.wifi, &mut portal, &mut self.sink);
    }

    /// Payloads published to the telemetry data topic, in order. A
    /// user-armed claim request shares the broker session, so tests
    /// filter by topic.
    fn data_bodies(&self) -> Vec<String> {
        self.cloud
            .published
            .iter()
            .filter(|(t, _)| t.ends_with("/data"))
            .map(|(_, b)| String::from_utf8(b.clone()).unwrap())
            .collect()
    }

    fn tick(&mut self, now_ms: u64) {
        self.manager.service(
            now_ms,
            &self.mailbox,
            &mut self.storage,
            &mut self.wifi,
            &mut self.cloud,
            &self.certs,
            &mut self.indoor,
            &self.rtc,
            &mut self.rng,
            &mut self.sink,
        );
    }
}

// ── Boot posture ──────────────────────────────────────────────

#[test]
fn boot_without_credentials_starts_portal() {
    let mut rig = Rig::new();
    let mut portal = MockPortal::new();
    rig.manager
        .begin(&mut rig.storage, &mut rig.wifi, &mut portal, &mut rig.sink);

    assert_eq!(rig.manager.state(), ConnectionState::ProvisioningActive);
    assert!(portal.is_active());
    assert!(rig.sink.saw_provisioning_started());
    let (ssid, _) = rig.wifi.ap_started.as_ref().unwrap();
    assert_eq!(ssid, "Meteo-Setup");
    // No station attempt was made without credentials.
    assert_eq!(rig.wifi.connect_attempts, 0);
}

#[test]
fn boot_with_credentials_parks_in_receive_mode() {
    let mut rig = Rig::provisioned();
    rig.begin();

    assert_eq!(rig.manager.state(), ConnectionState::Disconnected);
    assert!(!rig.wifi.connected);
    assert_eq!(
        rig.wifi.parked_channel,
        Some(SystemConfig::default().fallback_channel)
    );
    assert!(rig.wifi.ap_started.is_none());
    assert_eq!(rig.wifi.connect_attempts, 1);
}

#[test]
fn boot_probe_success_asserts_the_link() {
    let mut rig = Rig::provisioned();
    rig.begin();

    // Association alone lights the indicator, before any publish.
    assert!(rig.manager.connection_good());
    assert_eq!(rig.sink.connection_good_edges(), vec![true]);
}

#[test]
fn boot_probe_failure_still_parks() {
    let mut rig = Rig::provisioned();
    rig.wifi.reachable = false;
    rig.begin();

    assert_eq!(rig.manager.state(), ConnectionState::Disconnected);
    assert!(rig.wifi.parked_channel.is_some());
    assert!(!rig.manager.connection_good());
}

#[test]
fn provisioning_mode_never_publishes() {
    let mut rig = Rig::new(); // no credentials
    rig.begin();
    rig.mailbox.publish(&sample_packet(), 1_000);
    rig.tick(2_000);

    assert!(rig.cloud.published.is_empty());
    assert_eq!(rig.wifi.connect_attempts, 0);
    // The packet stays queued; the portal posture does not consume it.
    assert!(rig.mailbox.take_new().is_some());
}

// ── Publish cycle ─────────────────────────────────────────────

#[test]
fn publish_cycle_delivers_and_reparks() {
    let mut rig = Rig::provisioned();
    rig.begin();
    let boot_attempts = rig.wifi.connect_attempts;

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);

    // Orphan device publishes on the top-level stations topic.
    let (topic, body) = &rig.cloud.published[0];
    assert_eq!(topic, "stations/station-001/data");
    let json = String::from_utf8(body.clone()).unwrap();
    assert_eq!(rig.data_bodies().len(), 1);
    assert!(json.contains("\"humidityRead\":55"), "{json}");
    assert!(json.contains("\"outdoorTemperatureRead\":214"), "{json}");
    assert!(json.contains("\"indoorTemperatureRead\":21.5"), "{json}");
    // RTC 1_700_003_600 local minus the default +1h offset, in ms.
    assert!(json.contains("\"ts\":1700000000000"), "{json}");

    // Cycle tore the station down and re-parked the radio.
    assert_eq!(rig.wifi.connect_attempts, boot_attempts + 1);
    assert!(!rig.wifi.connected);
    assert!(!rig.cloud.connected);
    assert!(rig.wifi.parked_channel.is_some());
    assert_eq!(rig.manager.state(), ConnectionState::Disconnected);

    assert!(rig.manager.connection_good());
    assert_eq!(rig.sink.telemetry_updates(), 1);
    assert_eq!(rig.sink.connection_good_edges(), vec![true]);
}

#[test]
fn no_new_packet_means_no_cycle() {
    let mut rig = Rig::provisioned();
    rig.begin();
    let boot_attempts = rig.wifi.connect_attempts;

    rig.tick(1_000);
    rig.tick(2_000);

    assert!(rig.cloud.published.is_empty());
    assert_eq!(rig.wifi.connect_attempts, boot_attempts);
}

#[test]
fn same_packet_publishes_once() {
    let mut rig = Rig::provisioned();
    rig.begin();

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);
    rig.tick(5_200);
    rig.tick(5_300);

    assert_eq!(rig.data_bodies().len(), 1);
}

#[test]
fn wifi_failure_marks_connection_bad() {
    let mut rig = Rig::provisioned();
    rig.begin();
    rig.wifi.reachable = false;

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);

    assert!(rig.cloud.published.is_empty());
    assert!(!rig.manager.connection_good());
    // Failure still ends parked and listening.
    assert!(rig.wifi.parked_channel.is_some());
    assert_eq!(rig.manager.state(), ConnectionState::Disconnected);
}

#[test]
fn incomplete_certs_fail_closed() {
    let mut rig = Rig::provisioned();
    rig.certs = CertBundle::empty();
    rig.begin();

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);

    assert_eq!(rig.cloud.connects, 0);
    assert!(rig.cloud.published.is_empty());
    assert!(!rig.manager.connection_good());
}

#[test]
fn recovery_after_failed_cycle() {
    let mut rig = Rig::provisioned();
    rig.begin();
    rig.wifi.reachable = false;

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);
    assert!(!rig.manager.connection_good());

    // Network comes back; the next packet goes through.
    rig.wifi.reachable = true;
    rig.mailbox.publish(&sample_packet(), 65_000);
    rig.tick(65_100);

    assert_eq!(rig.data_bodies().len(), 1);
    assert!(rig.manager.connection_good());
    // Boot probe up, failed cycle down, recovered cycle up again.
    assert_eq!(rig.sink.connection_good_edges(), vec![true, false, true]);
}

#[test]
fn indoor_sensor_failure_reuses_last_reading() {
    let mut rig = Rig::provisioned();
    rig.begin();

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);

    rig.indoor.temp_c = None;
    rig.mailbox.publish(&sample_packet(), 65_000);
    rig.tick(65_100);

    let bodies = rig.data_bodies();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[1].contains("\"indoorTemperatureRead\":21.5"), "{}", bodies[1]);
}

#[test]
fn unset_rtc_publishes_ts_zero() {
    let mut rig = Rig::provisioned();
    rig.rtc.unix_secs = None;
    rig.begin();

    rig.mailbox.publish(&sample_packet(), 5_000);
    rig.tick(5_100);

    let json = String::from_utf8(rig.cloud.published[0].1.clone()).unwrap();
    assert!(json.contains("\"ts\":0"), "{json}");
}

// ── Staleness ─────────────────────────────────────────────────

#[test]
fn staleness_clears_connection_good_exactly_once() {
    let mut rig = Rig::provisioned();
    rig.begin();

    rig.mailbox.publish(&sample_packet(), 0);
    rig.tick(100);
    assert!(rig.manager.connection_good());

    // One tick short of the threshold: still fresh.
    rig.tick(119_999);
    assert!(rig.manager.connection_good());

    // At exactly the threshold the link goes stale.
    rig.tick(120_000);
    assert!(!rig.manager.connection_good());

    // Later ticks do not re-emit the edge.
    rig.tick(240_000);
    rig.tick(360_000);
    let edges = rig.sink.connection_good_edges();
    assert_eq!(edges, vec![true, false]);
}

#[test]
fn fresh_packet_after_staleness_restores_the_link() {
    let mut rig = Rig::provisioned();
    rig.begin();

    rig.mailbox.publish(&sample_packet(), 0);
    rig.tick(100);
    rig.tick(120_000);
    assert!(!rig.manager.connection_good());

    rig.mailbox.publish(&sample_packet(), 130_000);
    rig.tick(130_100);

    assert!(rig.manager.connection_good());
    assert_eq!(rig.data_bodies().len(), 2);
}
