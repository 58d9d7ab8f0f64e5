//! Application layer: port traits and outbound events.
//!
//! The domain logic itself lives in [`crate::outdoor`] (sensor node)
//! and [`crate::gateway`] (receiver/uplink node); both consume the
//! ports defined here.

pub mod events;
pub mod ports;
