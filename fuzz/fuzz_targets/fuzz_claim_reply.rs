//! Fuzz target: `claim::verify_reply`
//!
//! The claim reply arrives from the network and is attacker-shaped by
//! definition. Arbitrary payloads must never panic and must never bind
//! an owner unless the echoed nonce matches exactly.
//!
//! cargo fuzz run fuzz_claim_reply

#![no_main]

use libfuzzer_sys::fuzz_target;
use meteolink::gateway::claim;

fuzz_target!(|data: &[u8]| {
    // A nonce that cannot appear verbatim in most inputs, so accepted
    // replies really did carry it.
    if let Some(owner) = claim::verify_reply(data, "a1b2c3d4") {
        assert!(!owner.is_empty());
        let text = core::str::from_utf8(data).expect("accepted reply was valid JSON");
        assert!(text.contains("a1b2c3d4"));
    }

    // The empty nonce must never be satisfiable by omission.
    let _ = claim::verify_reply(data, "");
});
