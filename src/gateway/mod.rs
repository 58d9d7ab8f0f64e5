//! Indoor gateway.
//!
//! The gateway is always listening: packets from the outdoor node land
//! in the [`mailbox`](mailbox::TelemetryMailbox) from callback context,
//! and the main loop turns each one into at most one cloud publish
//! while [`freshness`] watches for the node going quiet. Network
//! posture (receive-only vs station vs provisioning portal) is owned
//! by the [`connectivity`] state machine.

pub mod claim;
pub mod cloud;
pub mod connectivity;
pub mod freshness;
pub mod mailbox;
pub mod provisioning;
