//! linkprint - MQTT-driven QR receipt printer
//!
//! Keeps a wireless link and a single secured MQTT session alive, and turns
//! each inbound JSON payload on the subscribed topic into a printed QR code.
//!
//! # Overview
//!
//! - [`supervisor`] - the cooperative `tick` state machine with retry backoff
//! - [`dispatch`] - payload decoding and single-shot actuator invocation
//! - [`transport`] - broker session abstraction and the rumqttc implementation
//! - [`link`] - wireless link status providers
//! - [`printer`] - ESC/POS receipt rendering over a serial channel
//! - [`config`], [`error`], [`observability`] - configuration, errors, logging and status signal
//!
//! # Quick Start
//!
//! ```rust
//! use linkprint::dispatch::{DispatchPolicy, MessageDispatcher};
//! use linkprint::supervisor::{ConnectionState, ConnectivitySupervisor, RetryTimer};
//! use linkprint::testing::{MockActionHandler, MockBroker, MockLink, RecordingIndicator};
//!
//! # tokio_test::block_on(async {
//! let mut supervisor = ConnectivitySupervisor::new(
//!     MockLink::up(),
//!     MockBroker::new(),
//!     MessageDispatcher::new(DispatchPolicy::default(), MockActionHandler::new()),
//!     RecordingIndicator::new(),
//!     RetryTimer::new(5000),
//! );
//!
//! supervisor.tick(0).await;
//! assert_eq!(supervisor.state(), ConnectionState::BrokerConnected);
//! # });
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod observability;
pub mod printer;
pub mod supervisor;
pub mod testing;
pub mod transport;

pub use config::DeviceConfig;
pub use dispatch::{DispatchOutcome, DispatchPolicy, ExtractedCommand, MessageDispatcher};
pub use error::{
    ActuatorError, ConnectFailure, ConnectFailureReason, DeviceError, DeviceResult, DispatchError,
    LinkError,
};
pub use supervisor::{ConnectionState, ConnectivitySupervisor, RetryTimer, TickAction};
pub use transport::mqtt::MqttSession;
