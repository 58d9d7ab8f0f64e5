//! Fuzz target: provisioning save-request parsing.
//!
//! The captive portal accepts credential posts from any device on the
//! setup network. Arbitrary bodies must never panic and an empty SSID
//! must never persist.
//!
//! cargo fuzz run fuzz_portal_save

#![no_main]

use libfuzzer_sys::fuzz_target;
use meteolink::gateway::provisioning::NetworkCredentials;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Some((ssid, pass)) = text.split_once('\n') else {
        return;
    };
    match NetworkCredentials::new(ssid, pass) {
        Some(creds) => {
            assert!(!creds.ssid.is_empty());
            assert!(creds.ssid.len() <= 32);
            assert!(creds.passphrase.len() <= 64);
        }
        None => assert!(ssid.is_empty() || ssid.len() > 32 || pass.len() > 64),
    }
});
