//! Outbound application events.
//!
//! The gateway's connectivity manager and telemetry receiver emit these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on
//! the other side decide what to do with them — log to serial, redraw a
//! screen icon, etc.

use crate::gateway::connectivity::ConnectionState;
use crate::packet::TelemetryPacket;

/// Structured events emitted by the gateway core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A new outdoor telemetry packet was consumed from the mailbox.
    TelemetryUpdated(TelemetryPacket),

    /// The "connection good" indicator changed (WiFi/cloud reachable and
    /// telemetry fresh).
    ConnectionGood(bool),

    /// The connectivity manager transitioned between states.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// The claim handshake accepted a reply and persisted the owner.
    ClaimAccepted { owner_id: heapless::String<64> },

    /// The provisioning access point was started (no credentials stored).
    ProvisioningStarted,
}
