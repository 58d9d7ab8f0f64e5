//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable thing name in the form `meteo-xxyyzz` (last 3
//! bytes of the 6-byte MAC in lowercase hex). This name is:
//! - Deterministic across reboots (factory-burned eFuse MAC)
//! - The MQTT client id and the `{thingName}` topic segment
//! - The subject the device certificate is issued for

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the thing name from the last 3 MAC bytes.
/// Format: `meteo-xxyyzz` (e.g., `meteo-efcafe`).
pub fn thing_name(mac: &MacAddress) -> heapless::String<32> {
    let mut name = heapless::String::new();
    use core::fmt::Write;
    let _ = write!(name, "meteo-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
