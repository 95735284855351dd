//! Error taxonomy for the printer device
//!
//! Runtime errors (link, broker, dispatch, actuator) are reported and then
//! recovered by the supervisor; none of them ends the process. Only setup
//! errors bubble up to `main` through [`DeviceError`].

use thiserror::Error;

/// Wireless link not (yet) available
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("Link unavailable on interface {interface}")]
    Unavailable { interface: String },
}

/// Categorized reason for a failed broker connection attempt
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Hash)]
pub enum ConnectFailureReason {
    #[error("timeout")]
    Timeout,
    #[error("protocol mismatch")]
    ProtocolMismatch,
    #[error("bad credentials")]
    BadCredentials,
    #[error("server unavailable")]
    ServerUnavailable,
    #[error("bad client identity")]
    BadClientId,
}

/// A broker connection attempt that did not reach a subscribed session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Broker connection failed ({reason}): {detail}")]
pub struct ConnectFailure {
    pub reason: ConnectFailureReason,
    pub detail: String,
}

impl ConnectFailure {
    pub fn new<S: Into<String>>(reason: ConnectFailureReason, detail: S) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Reasons an inbound message is dropped before reaching the actuator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Payload too large: {size} bytes exceeds limit of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing or non-string field '{field}'")]
    MissingField { field: String },

    #[error("Retained message replay ignored")]
    RetainedReplay,
}

/// Printer output failures. Reported, never retried.
#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Printer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Printer write timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Content too long for QR symbol: {len} bytes (max {max})")]
    ContentTooLong { len: usize, max: usize },
}

/// Setup-time errors that prevent the device from starting
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::MqttError),

    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for device setup
pub type DeviceResult<T> = Result<T, DeviceError>;
