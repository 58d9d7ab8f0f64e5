//! MeteoLink — weather-telemetry link firmware.
//!
//! Two nodes share this crate:
//!
//! ```text
//! ┌─────────────────────┐   ESP-NOW, 6-byte frame   ┌──────────────────────┐
//! │  Outdoor node       │ ────────────────────────▶ │  Indoor gateway      │
//! │  wake/sample/burst/ │   channel 1..=13,         │  always listening,   │
//! │  deep-sleep         │   remembered across sleep │  MQTT/TLS publisher  │
//! └─────────────────────┘                           └──────────────────────┘
//! ```
//!
//! Hexagonal layout: pure domain logic in [`outdoor`] and [`gateway`]
//! behind the port traits in [`app::ports`]; platform code lives in
//! [`adapters`] and is cfg-gated so everything above it runs on the
//! host.

#![deny(unused_must_use)]

pub mod config;
pub mod error;
pub mod packet;

pub mod app;

pub mod gateway;
pub mod outdoor;

pub mod adapters;
