//! Network credentials and the provisioning surface's data contract.
//!
//! Credentials live in the `net` storage namespace and are only ever
//! read at connect time; a save from the captive portal takes effect on
//! the next restart. The portal itself (HTTP server, DNS redirect) is
//! an adapter behind [`ProvisioningPort`](crate::app::ports::ProvisioningPort) —
//! this module owns what it reads and writes.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::{StoragePort, WifiNetwork};
use crate::gateway::claim;

/// Storage namespace for station credentials.
pub const NAMESPACE: &str = "net";
const SSID_KEY: &str = "ssid";
const PASS_KEY: &str = "pass";

/// Provisioning access point name.
pub const AP_SSID: &str = "Meteo-Setup";
/// Provisioning access point passphrase.
pub const AP_PASSPHRASE: &str = "12345678";

/// Station credentials as stored and as used to associate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    pub ssid: heapless::String<32>,
    pub passphrase: heapless::String<64>,
}

impl NetworkCredentials {
    /// Build from portal input. An empty SSID is not a credential.
    pub fn new(ssid: &str, passphrase: &str) -> Option<Self> {
        if ssid.is_empty() {
            return None;
        }
        let mut s = heapless::String::new();
        s.push_str(ssid).ok()?;
        let mut p = heapless::String::new();
        p.push_str(passphrase).ok()?;
        Some(Self {
            ssid: s,
            passphrase: p,
        })
    }
}

/// Load saved credentials, if any. A stored SSID with no passphrase is
/// valid (open network).
pub fn load(storage: &impl StoragePort) -> Option<NetworkCredentials> {
    let mut ssid_buf = [0u8; 32];
    let n = storage.read(NAMESPACE, SSID_KEY, &mut ssid_buf).ok()?;
    let ssid = core::str::from_utf8(&ssid_buf[..n]).ok()?;

    let mut pass_buf = [0u8; 64];
    let pass = match storage.read(NAMESPACE, PASS_KEY, &mut pass_buf) {
        Ok(m) => core::str::from_utf8(&pass_buf[..m]).ok()?,
        Err(_) => "",
    };

    NetworkCredentials::new(ssid, pass)
}

pub fn has_credentials(storage: &impl StoragePort) -> bool {
    storage.exists(NAMESPACE, SSID_KEY)
}

/// Persist credentials from the portal. Returns `false` on invalid
/// input or a storage failure.
pub fn save(storage: &mut impl StoragePort, ssid: &str, passphrase: &str) -> bool {
    let Some(creds) = NetworkCredentials::new(ssid, passphrase) else {
        warn!("Provisioning: rejecting empty SSID");
        return false;
    };
    let ok = storage
        .write(NAMESPACE, SSID_KEY, creds.ssid.as_bytes())
        .and_then(|()| storage.write(NAMESPACE, PASS_KEY, creds.passphrase.as_bytes()));
    match ok {
        Ok(()) => {
            info!("Provisioning: credentials saved, effective after restart");
            true
        }
        Err(e) => {
            warn!("Provisioning: failed to save credentials: {e}");
            false
        }
    }
}

/// Forget credentials only.
pub fn clear(storage: &mut impl StoragePort) {
    if let Err(e) = storage.erase_namespace(NAMESPACE) {
        warn!("Provisioning: failed to clear credentials: {e}");
    }
}

/// Factory reset: forget both the network and the ownership binding.
/// The caller restarts afterwards.
pub fn factory_reset(storage: &mut impl StoragePort) {
    info!("Provisioning: factory reset requested");
    clear(storage);
    if let Err(e) = storage.erase_namespace(claim::NAMESPACE) {
        warn!("Provisioning: failed to clear ownership: {e}");
    }
}

/// One row of the portal's `/api/scan` response.
#[derive(Serialize)]
struct ScanRow<'a> {
    ssid: &'a str,
    rssi: i8,
    enc: bool,
}

/// Serialize a scan result for the portal.
pub fn scan_response_json(networks: &[WifiNetwork]) -> String {
    let rows: Vec<ScanRow<'_>> = networks
        .iter()
        .map(|n| ScanRow {
            ssid: n.ssid.as_str(),
            rssi: n.rssi,
            enc: n.enc,
        })
        .collect();
    serde_json::to_string(&rows).unwrap_or_else(|_| "[]".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use std::collections::HashMap;

    struct MemStore(HashMap<String, Vec<u8>>);

    impl StoragePort for MemStore {
        fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
            match self.0.get(&format!("{ns}::{key}")) {
                Some(v) => {
                    let n = v.len().min(buf.len());
                    buf[..n].copy_from_slice(&v[..n]);
                    Ok(n)
                }
                None => Err(StorageError::NotFound),
            }
        }
        fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
            self.0.insert(format!("{ns}::{key}"), data.to_vec());
            Ok(())
        }
        fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
            self.0.remove(&format!("{ns}::{key}"));
            Ok(())
        }
        fn exists(&self, ns: &str, key: &str) -> bool {
            self.0.contains_key(&format!("{ns}::{key}"))
        }
        fn erase_namespace(&mut self, ns: &str) -> Result<(), StorageError> {
            let prefix = format!("{ns}::");
            self.0.retain(|k, _| !k.starts_with(&prefix));
            Ok(())
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let mut store = MemStore(HashMap::new());
        assert!(!has_credentials(&store));
        assert!(save(&mut store, "HomeNet", "hunter22"));
        assert!(has_credentials(&store));
        let creds = load(&store).unwrap();
        assert_eq!(creds.ssid.as_str(), "HomeNet");
        assert_eq!(creds.passphrase.as_str(), "hunter22");
    }

    #[test]
    fn empty_ssid_is_rejected() {
        let mut store = MemStore(HashMap::new());
        assert!(!save(&mut store, "", "whatever"));
        assert!(!has_credentials(&store));
    }

    #[test]
    fn open_network_has_empty_passphrase() {
        let mut store = MemStore(HashMap::new());
        assert!(save(&mut store, "CafeOpen", ""));
        let creds = load(&store).unwrap();
        assert_eq!(creds.passphrase.as_str(), "");
    }

    #[test]
    fn factory_reset_clears_network_and_ownership() {
        let mut store = MemStore(HashMap::new());
        save(&mut store, "HomeNet", "hunter22");
        claim::save_owner(&mut store, "eu-north-1:user-42");
        factory_reset(&mut store);
        assert!(!has_credentials(&store));
        assert!(claim::load_owner(&store).is_none());
    }

    #[test]
    fn scan_response_shape() {
        let mut ssid: heapless::String<32> = heapless::String::new();
        ssid.push_str("HomeNet").unwrap();
        let nets = [WifiNetwork {
            ssid,
            rssi: -61,
            enc: true,
        }];
        assert_eq!(
            scan_response_json(&nets),
            "[{\"ssid\":\"HomeNet\",\"rssi\":-61,\"enc\":true}]"
        );
    }
}
