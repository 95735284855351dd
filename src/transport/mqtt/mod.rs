//! MQTT broker session
//!
//! Separates pure functions from I/O operations for testability:
//!
//! - [`connection`] - Pure option building and failure classification
//! - [`message_handler`] - Pure routing of event loop events
//! - [`client`] - Impure I/O: connect, service and disconnect
//!
//! # Usage
//!
//! ```rust,no_run
//! use linkprint::config::{BrokerAuth, BrokerSection, RuntimeSection};
//! use linkprint::transport::mqtt::{BrokerCredentials, MqttSession};
//! use linkprint::transport::BrokerSession;
//!
//! # tokio_test::block_on(async {
//! let broker = BrokerSection {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     topic: "lab/prints".to_string(),
//!     auth: BrokerAuth::None,
//!     token_env: None,
//!     qos: 0,
//!     keep_alive_secs: 60,
//!     connect_timeout_ms: 5000,
//!     certificate: None,
//! };
//!
//! let mut session = MqttSession::new(
//!     "printer-01",
//!     &broker,
//!     &RuntimeSection::default(),
//!     &BrokerCredentials::default(),
//! )?;
//! session.connect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttSession;
pub use connection::{
    classify_connection_error, classify_return_code, configure_mqtt_options, BrokerCredentials,
    MqttError, TlsMaterial,
};
pub use message_handler::{EventRoute, MessageHandler};
