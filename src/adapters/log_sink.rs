//! Structured-log event sink.
//!
//! The gateway's on-device display consumes [`AppEvent`]s; this sink is
//! the headless counterpart that renders the same stream into the log,
//! which is all the host simulation and field debugging need.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::TelemetryUpdated(p) => info!(
                "Event: telemetry {}% {} dC {} hPa uv={}",
                p.humidity, p.outdoor_temp_dc, p.pressure_hpa, p.uv_raw
            ),
            AppEvent::ConnectionGood(good) => info!("Event: connection good = {good}"),
            AppEvent::StateChanged { from, to } => info!("Event: state {from} -> {to}"),
            AppEvent::ClaimAccepted { owner_id } => {
                info!("Event: claimed by {owner_id}");
            }
            AppEvent::ProvisioningStarted => info!("Event: provisioning started"),
        }
    }
}
