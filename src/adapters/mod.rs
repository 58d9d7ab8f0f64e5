//! Adapters — platform implementations of the port traits.
//!
//! Every adapter is dual-target: real ESP-IDF driver calls under
//! `target_os = "espidf"`, a deterministic simulation backend
//! everywhere else. The simulation backends are first-class — the
//! integration suite runs the full gateway loop against them.

pub mod cert_store;
pub mod clock;
pub mod device_id;
pub mod espnow;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod portal;
pub mod rng;
pub mod sensors;
pub mod sleep;
pub mod wifi;
