//! Device configuration loaded from TOML
//!
//! Network association is owned by the host, so the file only carries the
//! broker endpoint, the subscribed topic, device identity, printer settings
//! and loop timing. Secrets stay out of the file: the broker token is read
//! from the environment variable named by `token_env`, and certificate
//! material is read from the paths under `[broker.certificate]`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Main device configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub device: DeviceSection,
    #[serde(default)]
    pub link: LinkSection,
    pub broker: BrokerSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    pub printer: PrinterSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier, also used as the MQTT client id (must match [a-zA-Z0-9._-]+)
    pub id: String,
}

/// Wireless link settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    /// Network interface to watch (e.g. "wlan0"). None means the link is assumed up.
    pub interface: Option<String>,
    /// Bounded wait between link status checks while establishing
    #[serde(default = "default_link_poll_wait_ms")]
    pub poll_wait_ms: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            interface: None,
            poll_wait_ms: default_link_poll_wait_ms(),
        }
    }
}

/// How the device authenticates to the broker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerAuth {
    None,
    Token,
    Certificate,
}

/// Broker endpoint and subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL with scheme and port (mqtt:// or mqtts://)
    pub broker_url: String,
    /// Topic carrying print requests
    pub topic: String,
    #[serde(default = "default_broker_auth")]
    pub auth: BrokerAuth,
    /// Environment variable containing the broker token
    pub token_env: Option<String>,
    /// Subscription QoS (0 or 1)
    #[serde(default)]
    pub qos: u8,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Upper bound on a single connection attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    pub certificate: Option<CertificateSection>,
}

/// Certificate material for mutual TLS
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertificateSection {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Reconnection pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySection {
    /// Minimum delay between broker connection attempts
    #[serde(default = "default_backoff_interval_ms")]
    pub backoff_interval_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            backoff_interval_ms: default_backoff_interval_ms(),
        }
    }
}

/// Inbound payload handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchSection {
    /// Payload field forwarded to the printer
    #[serde(default = "default_dispatch_field")]
    pub field: String,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Drop retained messages replayed by the broker on reconnect
    #[serde(default)]
    pub ignore_retained: bool,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            field: default_dispatch_field(),
            max_payload_bytes: default_max_payload_bytes(),
            ignore_retained: false,
        }
    }
}

/// QR error correction level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum QrErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

/// Receipt printer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrinterSection {
    /// Serial device path (e.g. "/dev/serial0")
    pub device: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Pause after each job so the print head can finish
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Text printed above the QR code
    #[serde(default)]
    pub header_lines: Vec<String>,
    #[serde(default = "default_feed_lines")]
    pub feed_lines: u8,
    #[serde(default)]
    pub qr_error_correction: QrErrorCorrection,
}

/// Cooperative loop timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeSection {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Wait for pending broker I/O on each service pass
    #[serde(default = "default_service_wait_ms")]
    pub service_wait_ms: u64,
    #[serde(default = "default_max_messages_per_tick")]
    pub max_messages_per_tick: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            service_wait_ms: default_service_wait_ms(),
            max_messages_per_tick: default_max_messages_per_tick(),
        }
    }
}

fn default_link_poll_wait_ms() -> u64 {
    1000
}

fn default_broker_auth() -> BrokerAuth {
    BrokerAuth::None
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_backoff_interval_ms() -> u64 {
    5000
}

fn default_dispatch_field() -> String {
    "link".to_string()
}

fn default_max_payload_bytes() -> usize {
    1024
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_write_timeout_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    3000
}

fn default_feed_lines() -> u8 {
    2
}

fn default_tick_interval_ms() -> u64 {
    50
}

fn default_service_wait_ms() -> u64 {
    10
}

fn default_max_messages_per_tick() -> usize {
    8
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeviceConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DeviceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;
        self.broker.validate()?;

        if self.retry.backoff_interval_ms == 0 {
            return Err(invalid("retry.backoff_interval_ms must be greater than 0"));
        }
        if self.link.poll_wait_ms == 0 {
            return Err(invalid("link.poll_wait_ms must be greater than 0"));
        }
        if self.dispatch.field.trim().is_empty() {
            return Err(invalid("dispatch.field must not be empty"));
        }
        if self.dispatch.max_payload_bytes == 0 {
            return Err(invalid("dispatch.max_payload_bytes must be greater than 0"));
        }
        if self.printer.device.trim().is_empty() {
            return Err(invalid("printer.device must not be empty"));
        }
        if self.printer.baud_rate == 0 || self.printer.write_timeout_ms == 0 {
            return Err(invalid(
                "printer.baud_rate and printer.write_timeout_ms must be greater than 0",
            ));
        }
        if self.runtime.tick_interval_ms == 0
            || self.runtime.service_wait_ms == 0
            || self.runtime.max_messages_per_tick == 0
        {
            return Err(invalid("runtime intervals and limits must be greater than 0"));
        }

        // No keep-alive traffic is sent while a service pass is printing
        let worst_pass_ms = self.worst_service_pass_ms();
        if worst_pass_ms >= self.broker.keep_alive_secs.saturating_mul(1000) {
            return Err(invalid(&format!(
                "broker.keep_alive_secs ({}s) must exceed the longest service pass \
                 ({worst_pass_ms}ms = max_messages_per_tick x (write_timeout_ms + settle_ms))",
                self.broker.keep_alive_secs
            )));
        }

        Ok(())
    }

    /// Longest a single service pass can block while printing a full batch
    pub fn worst_service_pass_ms(&self) -> u64 {
        let per_job = self
            .printer
            .write_timeout_ms
            .saturating_add(self.printer.settle_ms);
        (self.runtime.max_messages_per_tick as u64).saturating_mul(per_job)
    }

    /// Resolve the broker token from the environment
    ///
    /// Returns `Ok(None)` unless token authentication is configured.
    pub fn broker_token(&self) -> Result<Option<String>, ConfigError> {
        match (self.broker.auth, &self.broker.token_env) {
            (BrokerAuth::Token, Some(env_name)) => std::env::var(env_name)
                .map(Some)
                .map_err(|_| ConfigError::EnvVarNotFound(env_name.clone())),
            (BrokerAuth::Token, None) => Err(invalid("token auth requires broker.token_env")),
            _ => Ok(None),
        }
    }
}

impl BrokerSection {
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.broker_url)
            .map_err(|_| invalid(&format!("invalid broker_url '{}'", self.broker_url)))?;

        let secure = match url.scheme() {
            "mqtt" => false,
            "mqtts" => true,
            other => {
                return Err(invalid(&format!(
                    "broker_url scheme must be mqtt or mqtts, got '{other}'"
                )))
            }
        };
        if url.host_str().is_none() {
            return Err(invalid("broker_url must include a host"));
        }

        if self.topic.trim().is_empty() {
            return Err(invalid("broker.topic must not be empty"));
        }
        if self.qos > 1 {
            return Err(invalid("broker.qos must be 0 or 1"));
        }
        if self.keep_alive_secs < 5 {
            return Err(invalid("broker.keep_alive_secs must be at least 5"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("broker.connect_timeout_ms must be greater than 0"));
        }

        match self.auth {
            BrokerAuth::Token if self.token_env.is_none() => {
                Err(invalid("token auth requires broker.token_env"))
            }
            BrokerAuth::Certificate if !secure => {
                Err(invalid("certificate auth requires an mqtts:// broker_url"))
            }
            BrokerAuth::Certificate if self.certificate.is_none() => Err(invalid(
                "certificate auth requires a [broker.certificate] table",
            )),
            _ => Ok(()),
        }
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::InvalidConfig(message.to_string())
}

/// Validate device ID format (usable as an MQTT client id)
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
