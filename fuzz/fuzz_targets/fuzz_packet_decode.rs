//! Fuzz target: `TelemetryPacket::decode`
//!
//! Drives arbitrary byte sequences into the wire-frame decoder and
//! asserts that it never panics, only accepts exact-length frames, and
//! re-encodes accepted frames byte-identically.
//!
//! cargo fuzz run fuzz_packet_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use meteolink::packet::{TelemetryPacket, WIRE_LEN};

fuzz_target!(|data: &[u8]| {
    match TelemetryPacket::decode(data) {
        Ok(packet) => {
            // Only exact-length frames may decode, and the codec must
            // be a bijection on them.
            assert_eq!(data.len(), WIRE_LEN);
            assert_eq!(&packet.encode()[..], data);
            // The mailbox packing of any decoded frame is lossless.
            assert_eq!(TelemetryPacket::unpack_u64(packet.pack_u64()), packet);
        }
        Err(_) => assert_ne!(data.len(), WIRE_LEN),
    }
});
