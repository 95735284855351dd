//! Broker transport layer
//!
//! This module provides the broker session abstraction used by the
//! supervisor and its MQTT implementation.

use crate::error::ConnectFailure;
use bytes::Bytes;

pub mod mqtt;

/// A message delivered by the broker on a subscribed topic
///
/// Constructed by the session on delivery and consumed synchronously by the
/// registered [`InboundHandler`]; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    /// Broker replayed a retained message rather than a fresh publish
    pub retain: bool,
}

impl InboundMessage {
    pub fn new<T: Into<String>, P: Into<Bytes>>(topic: T, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}

/// Receives inbound messages while a session is being serviced
#[async_trait::async_trait]
pub trait InboundHandler: Send {
    async fn on_message(&mut self, message: InboundMessage);
}

/// Result of one servicing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Session still usable
    Alive,
    /// Session lost; the reason is diagnostic only
    Dropped(String),
}

/// Broker session trait
///
/// Every method returns within a bounded time. Delivery is synchronous:
/// `service` hands each pending message to the handler, in arrival order,
/// before it returns.
#[async_trait::async_trait]
pub trait BrokerSession: Send {
    /// Connect and subscribe to the configured topic
    async fn connect(&mut self) -> Result<(), ConnectFailure>;

    /// Process pending I/O, delivering inbound messages to `handler`
    async fn service(&mut self, handler: &mut dyn InboundHandler) -> SessionStatus;

    /// Tear down the session (best effort)
    async fn disconnect(&mut self);

    /// Check if a session is currently held
    fn is_connected(&self) -> bool;
}
