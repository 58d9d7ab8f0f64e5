//! Provisioning lifecycle: portal save, restart, factory reset.
//!
//! "Restart" here is a fresh `ConnectivityManager` over the same
//! storage — saved credentials only take effect on the next boot.

use meteolink::app::ports::ProvisioningPort;
use meteolink::config::SystemConfig;
use meteolink::gateway::connectivity::{ConnectionState, ConnectivityManager};
use meteolink::gateway::provisioning;

use crate::mock_hw::{CaptureSink, MockNvs, MockPortal, MockWifi};

fn boot(
    storage: &mut MockNvs,
    wifi: &mut MockWifi,
) -> (ConnectivityManager, MockPortal, CaptureSink) {
    let mut manager = ConnectivityManager::new(SystemConfig::default());
    let mut portal = MockPortal::new();
    let mut sink = CaptureSink::new();
    manager.begin(storage, wifi, &mut portal, &mut sink);
    (manager, portal, sink)
}

#[test]
fn saved_credentials_take_effect_on_next_boot() {
    let mut storage = MockNvs::new();

    // First boot: nothing stored, portal comes up.
    let mut wifi = MockWifi::new(true);
    let (manager, portal, _) = boot(&mut storage, &mut wifi);
    assert_eq!(manager.state(), ConnectionState::ProvisioningActive);
    assert!(portal.is_active());

    // User submits credentials through the portal.
    assert!(provisioning::save(&mut storage, "HomeNet", "hunter22"));

    // The running boot stays in provisioning until restart.
    assert_eq!(manager.state(), ConnectionState::ProvisioningActive);

    // Next boot associates and parks.
    let mut wifi2 = MockWifi::new(true);
    let (manager2, portal2, _) = boot(&mut storage, &mut wifi2);
    assert_eq!(manager2.state(), ConnectionState::Disconnected);
    assert!(!portal2.is_active());
    assert_eq!(wifi2.connect_attempts, 1);
    assert!(wifi2.parked_channel.is_some());
}

#[test]
fn factory_reset_returns_to_portal_on_next_boot() {
    let mut storage = MockNvs::new();
    assert!(provisioning::save(&mut storage, "HomeNet", "hunter22"));
    meteolink::gateway::claim::save_owner(&mut storage, "eu-north-1:user-42");

    provisioning::factory_reset(&mut storage);

    let mut wifi = MockWifi::new(true);
    let (manager, portal, sink) = boot(&mut storage, &mut wifi);
    assert_eq!(manager.state(), ConnectionState::ProvisioningActive);
    assert!(portal.is_active());
    assert!(sink.saw_provisioning_started());
    // Ownership went with the reset.
    assert!(!manager.is_claimed());
}

#[test]
fn credentials_survive_a_claim_binding() {
    let mut storage = MockNvs::new();
    assert!(provisioning::save(&mut storage, "HomeNet", "hunter22"));
    meteolink::gateway::claim::save_owner(&mut storage, "eu-north-1:user-42");

    let mut wifi = MockWifi::new(true);
    let (manager, _, _) = boot(&mut storage, &mut wifi);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.is_claimed());
    assert_eq!(manager.owner_id(), Some("eu-north-1:user-42"));
}
