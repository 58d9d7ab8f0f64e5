//! Device-claim handshake, end to end against the mock broker.

use meteolink::config::SystemConfig;
use meteolink::gateway::claim;
use meteolink::gateway::connectivity::ConnectivityManager;
use meteolink::gateway::mailbox::TelemetryMailbox;
use meteolink::packet::TelemetryPacket;

use crate::mock_hw::{
    save_test_credentials, test_certs, CaptureSink, MockCloud, MockIndoor, MockNvs, MockPortal,
    MockRng, MockRtc, MockWifi,
};

const REPLY_TOPIC: &str = "devices/station-001/claim/reply";
const REQUEST_TOPIC: &str = "devices/station-001/claim/request";

struct Rig {
    manager: ConnectivityManager,
    mailbox: TelemetryMailbox,
    storage: MockNvs,
    wifi: MockWifi,
    cloud: MockCloud,
    certs: meteolink::gateway::cloud::CertBundle,
    indoor: MockIndoor,
    rtc: MockRtc,
    rng: MockRng,
    sink: CaptureSink,
}

impl Rig {
    /// Provisioned, unclaimed gateway with the claim armed by a user
    /// request and a fixed nonce ("deadbeef").
    fn new() -> Self {
        let mut rig = Self::unrequested();
        rig.manager.request_claim();
        rig
    }

    /// Same gateway, but the user never pressed the pairing button.
    fn unrequested() -> Self {
        let mut storage = MockNvs::new();
        save_test_credentials(&mut storage);
        let mut rig = Self {
            manager: ConnectivityManager::new(SystemConfig::default()),
            mailbox: TelemetryMailbox::new(),
            storage,
            wifi: MockWifi::new(true),
            cloud: MockCloud::new(),
            certs: test_certs(),
            indoor: MockIndoor { temp_c: Some(20.0) },
            rtc: MockRtc {
                unix_secs: Some(1_700_003_600),
            },
            rng: MockRng::new(&[0xDEAD_BEEF, 0x0123_4567]),
            sink: CaptureSink::new(),
        };
        let mut portal = MockPortal::new();
        rig.manager
            .begin(&mut rig.storage, &mut rig.wifi, &mut portal, &mut rig.sink);
        rig
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

    /// Run one publish cycle (which is what carries the claim offer).
    fn publish_once(&mut self, now_ms: u64) {
        self.mailbox.publish(&TelemetryPacket::default(), now_ms);
        self.tick(now_ms + 100);
    }
}

#[test]
fn no_offer_without_a_user_request() {
    let mut rig = Rig::unrequested();
    rig.publish_once(5_000);
    rig.publish_once(65_000);

    assert!(rig.cloud.subscriptions.is_empty());
    assert!(!rig.cloud.published_topics().contains(&REQUEST_TOPIC));
}

#[test]
fn request_after_boot_rides_the_next_cycle() {
    let mut rig = Rig::unrequested();
    rig.publish_once(5_000);
    assert!(!rig.cloud.published_topics().contains(&REQUEST_TOPIC));

    // Pairing button pressed mid-operation.
    rig.manager.request_claim();
    rig.publish_once(65_000);

    assert!(rig.cloud.published_topics().contains(&REQUEST_TOPIC));
}

#[test]
fn claim_offer_rides_the_first_publish_cycle() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);

    assert!(rig.cloud.subscriptions.iter().any(|t| t == REPLY_TOPIC));
    let (_, body) = rig
        .cloud
        .published
        .iter()
        .find(|(t, _)| t == REQUEST_TOPIC)
        .expect("claim request published");
    assert_eq!(
        String::from_utf8(body.clone()).unwrap(),
        "{\"thingName\":\"station-001\",\"nonce\":\"deadbeef\"}"
    );
}

#[test]
fn claim_request_goes_out_once_per_boot() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);
    rig.publish_once(65_000);
    rig.publish_once(125_000);

    let requests = rig
        .cloud
        .published
        .iter()
        .filter(|(t, _)| t == REQUEST_TOPIC)
        .count();
    assert_eq!(requests, 1);
}

#[test]
fn matching_reply_binds_the_owner() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);

    rig.cloud.inject(
        REPLY_TOPIC,
        br#"{"identityId":"eu-north-1:user-42","nonce":"deadbeef"}"#,
    );
    rig.tick(6_000);

    assert!(rig.manager.is_claimed());
    assert_eq!(rig.manager.owner_id(), Some("eu-north-1:user-42"));
    assert_eq!(
        rig.sink.claim_accepted_owner().as_deref(),
        Some("eu-north-1:user-42")
    );
    // The binding survives a restart.
    assert_eq!(
        claim::load_owner(&rig.storage).unwrap().as_str(),
        "eu-north-1:user-42"
    );
    // The reply subscription is gone.
    assert!(!rig.cloud.subscriptions.iter().any(|t| t == REPLY_TOPIC));
}

#[test]
fn stale_nonce_reply_is_ignored() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);

    rig.cloud.inject(
        REPLY_TOPIC,
        br#"{"identityId":"eu-north-1:mallory","nonce":"feedface"}"#,
    );
    rig.tick(6_000);

    assert!(!rig.manager.is_claimed());
    assert!(claim::load_owner(&rig.storage).is_none());
}

#[test]
fn malformed_reply_is_ignored() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);

    rig.cloud.inject(REPLY_TOPIC, b"not json at all");
    rig.tick(6_000);

    assert!(!rig.manager.is_claimed());
}

#[test]
fn reply_on_another_topic_is_ignored() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);

    rig.cloud.inject(
        "devices/other-station/claim/reply",
        br#"{"identityId":"eu-north-1:user-42","nonce":"deadbeef"}"#,
    );
    rig.tick(6_000);

    assert!(!rig.manager.is_claimed());
}

#[test]
fn publishes_switch_to_owner_topic_after_claim() {
    let mut rig = Rig::new();
    rig.publish_once(5_000);
    rig.cloud.inject(
        REPLY_TOPIC,
        br#"{"identityId":"eu-north-1:user-42","nonce":"deadbeef"}"#,
    );
    rig.tick(6_000);

    rig.publish_once(65_000);

    let topics = rig.cloud.published_topics();
    assert!(topics.contains(&"stations/station-001/data"));
    assert!(topics.contains(&"users/eu-north-1:user-42/stations/station-001/data"));
}

#[test]
fn claimed_device_skips_the_offer_entirely() {
    let mut rig = Rig::new();
    claim::save_owner(&mut rig.storage, "eu-north-1:user-42");

    // Re-run boot so the stored owner is loaded.
    let mut portal = MockPortal::new();
    rig.manager = ConnectivityManager::new(SystemConfig::default());
    rig.manager
        .begin(&mut rig.storage, &mut rig.wifi, &mut portal, &mut rig.sink);
    assert!(rig.manager.is_claimed());

    // Even an explicit request is a no-op once bound.
    rig.manager.request_claim();
    rig.publish_once(5_000);

    assert!(rig.cloud.subscriptions.is_empty());
    assert!(!rig.cloud.published_topics().contains(&REQUEST_TOPIC));
    assert_eq!(
        rig.cloud.published_topics(),
        vec!["users/eu-north-1:user-42/stations/station-001/data"]
    );
}
