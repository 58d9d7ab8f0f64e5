//! Unified error types for the MeteoLink firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the top-level loop's error handling uniform. All variants are `Copy`
//! so they can be passed through the connectivity manager without
//! allocation. Transient radio and network failures are never fatal:
//! they surface as `Result::Err` or a `false` success indicator at the
//! call site and are retried (or dropped) on the next cycle.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A radio (ESP-NOW) operation failed.
    Radio(RadioError),
    /// WiFi station / cloud session failure.
    Comms(CommsError),
    /// Persistent storage failure.
    Storage(StorageError),
    /// Peripheral or service initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Radio errors (ESP-NOW link layer)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Channel outside 1..=13.
    InvalidChannel,
    /// The driver rejected the transmit request.
    TransmitRejected,
    /// Radio or peer registration failed.
    InitFailed,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel => write!(f, "invalid channel"),
            Self::TransmitRejected => write!(f, "transmit rejected"),
            Self::InitFailed => write!(f, "radio init failed"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors (station WiFi, TLS, MQTT)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// No credentials are persisted.
    NoCredentials,
    /// Association did not complete within the bounded timeout.
    WifiConnectTimeout,
    /// TLS material missing or empty — the session fails closed.
    IncompleteCertBundle,
    /// The broker connection could not be established.
    CloudConnectFailed,
    /// A publish was rejected or the session dropped mid-publish.
    PublishFailed,
    /// Subscribe/unsubscribe request failed.
    SubscribeFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials"),
            Self::WifiConnectTimeout => write!(f, "WiFi connect timeout"),
            Self::IncompleteCertBundle => write!(f, "TLS cert bundle incomplete"),
            Self::CloudConnectFailed => write!(f, "cloud connect failed"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for RadioError {}
impl std::error::Error for CommsError {}
impl std::error::Error for StorageError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
