//! Pure connection configuration for the MQTT session
//!
//! This module contains pure functions for building client options from
//! configuration and for classifying connection errors into the fixed set
//! of failure reasons the supervisor reports.

use crate::config::{BrokerAuth, BrokerSection};
use crate::error::ConnectFailureReason;
use rumqttc::{ConnectReturnCode, ConnectionError, MqttOptions, QoS, TlsConfiguration, Transport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// MQTT session construction errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Failed to read certificate material from {path}")]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Certificate auth configured without [broker.certificate]")]
    MissingCertificate,
}

/// Client certificate material for mutual TLS
#[derive(Clone)]
pub struct TlsMaterial {
    pub ca: Vec<u8>,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

// Keys stay out of logs
impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_bytes", &self.ca.len())
            .field("cert_bytes", &self.cert.len())
            .field("key_bytes", &"***")
            .finish()
    }
}

/// Resolved secrets for one broker endpoint
#[derive(Clone, Default)]
pub struct BrokerCredentials {
    pub token: Option<String>,
    pub tls: Option<TlsMaterial>,
}

impl std::fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .finish()
    }
}

impl BrokerCredentials {
    /// Read certificate material from disk when certificate auth is configured
    pub fn load(broker: &BrokerSection, token: Option<String>) -> Result<Self, MqttError> {
        let tls = match broker.auth {
            BrokerAuth::Certificate => {
                let paths = broker
                    .certificate
                    .as_ref()
                    .ok_or(MqttError::MissingCertificate)?;
                Some(TlsMaterial {
                    ca: read_material(&paths.ca_path)?,
                    cert: read_material(&paths.cert_path)?,
                    key: read_material(&paths.key_path)?,
                })
            }
            _ => None,
        };

        Ok(Self { token, tls })
    }
}

fn read_material(path: &Path) -> Result<Vec<u8>, MqttError> {
    std::fs::read(path).map_err(|source| MqttError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(
    client_id: &str,
    broker: &BrokerSection,
    credentials: &BrokerCredentials,
) -> Result<MqttOptions, MqttError> {
    let url = Url::parse(&broker.broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(broker.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| MqttError::InvalidBrokerUrl(broker.broker_url.clone()))?;
    let secure = url.scheme() == "mqtts";
    let port = url.port().unwrap_or(if secure { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(client_id, host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));
    mqtt_options.set_clean_session(true);

    if secure {
        let transport = match &credentials.tls {
            Some(material) => Transport::Tls(TlsConfiguration::Simple {
                ca: material.ca.clone(),
                alpn: None,
                client_auth: Some((material.cert.clone(), material.key.clone())),
            }),
            None => Transport::tls_with_default_config(),
        };
        mqtt_options.set_transport(transport);
    }

    // Token brokers take the token as username with an empty password
    if let Some(token) = &credentials.token {
        mqtt_options.set_credentials(token.as_str(), "");
    }

    Ok(mqtt_options)
}

/// Map configured QoS level to the protocol enum
pub fn subscription_qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// Map a CONNACK refusal code to a failure reason (pure function)
pub fn classify_return_code(code: ConnectReturnCode) -> ConnectFailureReason {
    match code {
        ConnectReturnCode::RefusedProtocolVersion => ConnectFailureReason::ProtocolMismatch,
        ConnectReturnCode::BadClientId => ConnectFailureReason::BadClientId,
        ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
            ConnectFailureReason::BadCredentials
        }
        ConnectReturnCode::ServiceUnavailable | ConnectReturnCode::Success => {
            ConnectFailureReason::ServerUnavailable
        }
    }
}

/// Classify an event loop error raised while connecting (pure function)
///
/// Socket, DNS and TLS failures all surface as the broker being unavailable.
pub fn classify_connection_error(error: &ConnectionError) -> ConnectFailureReason {
    match error {
        ConnectionError::ConnectionRefused(code) => classify_return_code(*code),
        ConnectionError::NetworkTimeout => ConnectFailureReason::Timeout,
        ConnectionError::NotConnAck(_) => ConnectFailureReason::ProtocolMismatch,
        _ => ConnectFailureReason::ServerUnavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_broker_section() -> BrokerSection {
        BrokerSection {
            broker_url: "mqtt://localhost:1883".to_string(),
            topic: "lab/prints".to_string(),
            auth: BrokerAuth::None,
            token_env: None,
            qos: 0,
            keep_alive_secs: 60,
            connect_timeout_ms: 5000,
            certificate: None,
        }
    }

    #[test]
    fn test_configure_mqtt_options() {
        let broker = test_broker_section();
        let options =
            configure_mqtt_options("printer-01", &broker, &BrokerCredentials::default()).unwrap();
        assert_eq!(options.client_id(), "printer-01");
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.credentials().is_none());
    }

    #[test]
    fn test_default_port_follows_scheme() {
        let mut broker = test_broker_section();
        broker.broker_url = "mqtts://broker.example.com".to_string();
        let credentials = BrokerCredentials {
            token: None,
            tls: Some(TlsMaterial {
                ca: b"ca".to_vec(),
                cert: b"cert".to_vec(),
                key: b"key".to_vec(),
            }),
        };
        let options = configure_mqtt_options("printer-01", &broker, &credentials).unwrap();
        assert_eq!(options.broker_address().1, 8883);

        broker.broker_url = "mqtt://broker.example.com".to_string();
        let options =
            configure_mqtt_options("printer-01", &broker, &BrokerCredentials::default()).unwrap();
        assert_eq!(options.broker_address().1, 1883);
    }

    #[test]
    fn test_token_becomes_username() {
        let broker = test_broker_section();
        let credentials = BrokerCredentials {
            token: Some("token_abc".to_string()),
            tls: None,
        };
        let options = configure_mqtt_options("printer-01", &broker, &credentials).unwrap();
        assert_eq!(
            options.credentials(),
            Some(("token_abc".to_string(), String::new()))
        );
    }

    #[test]
    fn test_invalid_broker_url() {
        let mut broker = test_broker_section();
        broker.broker_url = "invalid-url".to_string();

        let result = configure_mqtt_options("printer-01", &broker, &BrokerCredentials::default());
        assert!(matches!(result, Err(MqttError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_classify_return_codes() {
        assert_eq!(
            classify_return_code(ConnectReturnCode::RefusedProtocolVersion),
            ConnectFailureReason::ProtocolMismatch
        );
        assert_eq!(
            classify_return_code(ConnectReturnCode::BadClientId),
            ConnectFailureReason::BadClientId
        );
        assert_eq!(
            classify_return_code(ConnectReturnCode::ServiceUnavailable),
            ConnectFailureReason::ServerUnavailable
        );
        assert_eq!(
            classify_return_code(ConnectReturnCode::BadUserNamePassword),
            ConnectFailureReason::BadCredentials
        );
        assert_eq!(
            classify_return_code(ConnectReturnCode::NotAuthorized),
            ConnectFailureReason::BadCredentials
        );
    }

    #[test]
    fn test_classify_connection_errors() {
        let refused = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert_eq!(
            classify_connection_error(&refused),
            ConnectFailureReason::BadCredentials
        );
        assert_eq!(
            classify_connection_error(&ConnectionError::NetworkTimeout),
            ConnectFailureReason::Timeout
        );
        let io = ConnectionError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(
            classify_connection_error(&io),
            ConnectFailureReason::ServerUnavailable
        );
    }

    #[test]
    fn test_subscription_qos() {
        assert_eq!(subscription_qos(0), QoS::AtMostOnce);
        assert_eq!(subscription_qos(1), QoS::AtLeastOnce);
    }

    #[test]
    fn test_certificate_auth_without_table() {
        let mut broker = test_broker_section();
        broker.auth = BrokerAuth::Certificate;
        let result = BrokerCredentials::load(&broker, None);
        assert!(matches!(result, Err(MqttError::MissingCertificate)));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let credentials = BrokerCredentials {
            token: Some("token_secret_value".to_string()),
            tls: None,
        };
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("token_secret_value"));
    }
}
