//! Certificate store — loads the TLS client identity from storage.
//!
//! Certificates are provisioned into the `certs` NVS namespace at
//! manufacturing time (PEM format). The broker session requires all
//! three pieces; a partial set is treated as no set at all, so a
//! half-provisioned device never attempts a connection it cannot
//! authenticate.
//!
//! | Key           | Content                          |
//! |---------------|----------------------------------|
//! | `ca_cert`     | PEM-encoded CA certificate chain |
//! | `device_cert` | PEM-encoded device certificate   |
//! | `device_key`  | PEM-encoded private key          |

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::gateway::cloud::CertBundle;

pub const NAMESPACE: &str = "certs";
const CA_KEY: &str = "ca_cert";
const CERT_KEY: &str = "device_cert";
const KEY_KEY: &str = "device_key";

/// Load the full bundle, or `None` when any piece is missing or
/// oversized. Each blob is NUL-terminated for mbedTLS.
pub fn load_bundle(storage: &impl StoragePort) -> Option<CertBundle> {
    let mut bundle = CertBundle::empty();

    if !read_pem(storage, CA_KEY, &mut bundle.ca_cert)
        || !read_pem(storage, CERT_KEY, &mut bundle.device_cert)
        || !read_pem(storage, KEY_KEY, &mut bundle.device_key)
    {
        warn!("CertStore: bundle incomplete, TLS unavailable");
        return None;
    }

    info!(
        "CertStore: bundle loaded (ca={} B, cert={} B, key={} B)",
        bundle.ca_cert.len(),
        bundle.device_cert.len(),
        bundle.device_key.len()
    );
    Some(bundle)
}

fn read_pem<const N: usize>(
    storage: &impl StoragePort,
    key: &str,
    out: &mut heapless::Vec<u8, N>,
) -> bool {
    let mut buf = [0u8; N];
    let n = match storage.read(NAMESPACE, key, &mut buf) {
        Ok(n) if n > 0 => n,
        Ok(_) => return false,
        Err(_) => return false,
    };
    if out.extend_from_slice(&buf[..n]).is_err() {
        return false;
    }
    // mbedTLS parses PEM only when the buffer ends in NUL.
    if out.last() != Some(&0) && out.push(0).is_err() {
        warn!("CertStore: '{key}' too large to NUL-terminate");
        return false;
    }
    true
}
