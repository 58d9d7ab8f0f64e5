//! Device-claim handshake.
//!
//! An unclaimed gateway offers itself for ownership over the broker:
//! it subscribes to its reply topic, publishes a claim request carrying
//! a random nonce, and waits for the companion app to echo that nonce
//! back together with the owner's identity. Only a reply with the
//! matching nonce binds the device; everything else is ignored.
//!
//! The accepted owner id is persisted under the `claim` namespace and
//! re-routes every future data publish to the user-scoped topic.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{RngPort, StoragePort};

/// Storage namespace for the ownership binding.
pub const NAMESPACE: &str = "claim";
/// Key holding the accepted owner identity.
pub const OWNER_KEY: &str = "ownerId";

/// Nonce length in hex characters.
const NONCE_LEN: usize = 8;

pub type OwnerId = heapless::String<64>;
pub type Nonce = heapless::String<NONCE_LEN>;

/// Outbound claim request body.
#[derive(Serialize)]
struct ClaimRequest<'a> {
    #[serde(rename = "thingName")]
    thing_name: &'a str,
    nonce: &'a str,
}

/// Inbound claim reply body.
#[derive(Deserialize)]
struct ClaimReply<'a> {
    #[serde(rename = "identityId")]
    identity_id: &'a str,
    nonce: &'a str,
}

/// Draw a fresh nonce from the hardware random source: two 32-bit
/// draws rendered as hex, truncated to [`NONCE_LEN`] characters.
pub fn generate_nonce(rng: &mut impl RngPort) -> Nonce {
    let mut full: heapless::String<16> = heapless::String::new();
    let res = core::fmt::Write::write_fmt(
        &mut full,
        format_args!("{:08x}{:08x}", rng.next_u32(), rng.next_u32()),
    );
    debug_assert!(res.is_ok());
    full.truncate(NONCE_LEN);
    let mut nonce = Nonce::new();
    let res = nonce.push_str(full.as_str());
    debug_assert!(res.is_ok());
    nonce
}

/// Serialize the claim request for the request topic.
pub fn request_body(thing_name: &str, nonce: &str) -> Option<String> {
    serde_json::to_string(&ClaimRequest { thing_name, nonce }).ok()
}

/// Parse and verify a claim reply. Returns the owner identity only
/// when the echoed nonce matches `expected_nonce`; malformed payloads
/// and stale nonces are dropped.
pub fn verify_reply(payload: &[u8], expected_nonce: &str) -> Option<OwnerId> {
    let reply: ClaimReply<'_> = match serde_json::from_slice(payload) {
        Ok(r) => r,
        Err(_) => {
            warn!("Claim: dropping malformed reply");
            return None;
        }
    };
    if reply.nonce != expected_nonce {
        warn!("Claim: dropping reply with stale nonce");
        return None;
    }
    let mut owner = OwnerId::new();
    if owner.push_str(reply.identity_id).is_err() {
        warn!("Claim: owner identity too long, dropping reply");
        return None;
    }
    Some(owner)
}

/// Load the persisted owner identity, if the device has been claimed.
pub fn load_owner(storage: &impl StoragePort) -> Option<OwnerId> {
    let mut buf = [0u8; 64];
    let n = storage.read(NAMESPACE, OWNER_KEY, &mut buf).ok()?;
    let s = core::str::from_utf8(&buf[..n]).ok()?;
    if s.is_empty() {
        return None;
    }
    let mut owner = OwnerId::new();
    owner.push_str(s).ok()?;
    Some(owner)
}

/// Persist an accepted owner identity.
pub fn save_owner(storage: &mut impl StoragePort, owner: &str) {
    match storage.write(NAMESPACE, OWNER_KEY, owner.as_bytes()) {
        Ok(()) => info!("Claim: owner identity persisted"),
        Err(e) => warn!("Claim: failed to persist owner identity: {e}"),
    }
}
