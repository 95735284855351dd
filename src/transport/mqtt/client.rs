//! Impure I/O operations for the MQTT session
//!
//! The session owns the rumqttc client and event loop directly and drives the
//! event loop only from `connect` and `service`, so all broker I/O happens on
//! the caller's thread inside bounded waits. There is no background task.

use super::connection::{
    classify_connection_error, configure_mqtt_options, subscription_qos, BrokerCredentials,
    MqttError,
};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{BrokerSection, RuntimeSection};
use crate::error::{ConnectFailure, ConnectFailureReason};
use crate::transport::{BrokerSession, InboundHandler, SessionStatus};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Request channel capacity between client handle and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Events handled per service pass before yielding back to the loop,
/// counting keep-alive and acknowledgement traffic
const MAX_EVENTS_PER_PASS: usize = 64;

/// Bounded wait for the DISCONNECT packet to be flushed
const DISCONNECT_FLUSH: Duration = Duration::from_millis(250);

/// rumqttc-backed broker session subscribed to a single topic
pub struct MqttSession {
    options: MqttOptions,
    topic: String,
    qos: QoS,
    connect_timeout: Duration,
    service_wait: Duration,
    max_messages_per_pass: usize,
    client: Option<AsyncClient>,
    event_loop: Option<EventLoop>,
}

impl std::fmt::Debug for MqttSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSession")
            .field("broker", &self.options.broker_address())
            .field("topic", &self.topic)
            .field("qos", &self.qos)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl MqttSession {
    /// Build a session from configuration. No network I/O happens here.
    pub fn new(
        client_id: &str,
        broker: &BrokerSection,
        runtime: &RuntimeSection,
        credentials: &BrokerCredentials,
    ) -> Result<Self, MqttError> {
        let options = configure_mqtt_options(client_id, broker, credentials)?;

        Ok(Self {
            options,
            topic: broker.topic.clone(),
            qos: subscription_qos(broker.qos),
            connect_timeout: Duration::from_millis(broker.connect_timeout_ms),
            service_wait: Duration::from_millis(runtime.service_wait_ms),
            max_messages_per_pass: runtime.max_messages_per_tick,
            client: None,
            event_loop: None,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Drive the event loop until the broker acknowledges the connection
    async fn await_connack(event_loop: &mut EventLoop) -> Result<(), ConnectFailure> {
        loop {
            let event = event_loop.poll().await.map_err(connect_failure)?;
            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::ConnectionAcknowledged => return Ok(()),
                EventRoute::Disconnected => {
                    return Err(ConnectFailure::new(
                        ConnectFailureReason::ServerUnavailable,
                        "broker closed the connection during handshake",
                    ))
                }
                _ => continue,
            }
        }
    }

    /// Drop client and event loop; the network connection closes with them
    fn teardown(&mut self) {
        self.client = None;
        self.event_loop = None;
    }

    /// Outcome of waiting for one event; `None` when the wait elapsed
    async fn next_event(&mut self) -> Option<Result<Event, ConnectionError>> {
        let event_loop = self.event_loop.as_mut()?;
        timeout(self.service_wait, event_loop.poll()).await.ok()
    }
}

fn connect_failure(error: ConnectionError) -> ConnectFailure {
    ConnectFailure::new(classify_connection_error(&error), error.to_string())
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn connect(&mut self) -> Result<(), ConnectFailure> {
        self.teardown();

        let (client, mut event_loop) =
            AsyncClient::new(self.options.clone(), REQUEST_CHANNEL_CAPACITY);

        match timeout(self.connect_timeout, Self::await_connack(&mut event_loop)).await {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => return Err(failure),
            Err(_) => {
                return Err(ConnectFailure::new(
                    ConnectFailureReason::Timeout,
                    format!(
                        "no CONNACK within {}ms",
                        self.connect_timeout.as_millis()
                    ),
                ))
            }
        }

        // Queued here, written by the next event loop poll; SUBACK is checked in service()
        client
            .subscribe(self.topic.as_str(), self.qos)
            .await
            .map_err(|e| {
                ConnectFailure::new(
                    ConnectFailureReason::ServerUnavailable,
                    format!("subscribe request failed: {e}"),
                )
            })?;

        info!(topic = %self.topic, qos = ?self.qos, "Broker session established");
        self.client = Some(client);
        self.event_loop = Some(event_loop);
        Ok(())
    }

    async fn service(&mut self, handler: &mut dyn InboundHandler) -> SessionStatus {
        if self.event_loop.is_none() {
            return SessionStatus::Dropped("no active session".to_string());
        }

        let mut delivered = 0;
        for _ in 0..MAX_EVENTS_PER_PASS {
            let event = match self.next_event().await {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!(error = %e, "Broker connection lost");
                    self.teardown();
                    return SessionStatus::Dropped(e.to_string());
                }
            };

            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::MessageReceived(message) => {
                    debug!(topic = %message.topic, bytes = message.payload.len(), "Inbound message");
                    handler.on_message(message).await;
                    delivered += 1;
                    if delivered >= self.max_messages_per_pass {
                        break;
                    }
                }
                EventRoute::SubscriptionResult(Ok(())) => {
                    debug!(topic = %self.topic, "Subscription acknowledged");
                }
                EventRoute::SubscriptionResult(Err(detail)) => {
                    error!(topic = %self.topic, detail = %detail, "Subscription rejected");
                    self.teardown();
                    return SessionStatus::Dropped(detail);
                }
                EventRoute::Disconnected => {
                    warn!("Broker sent DISCONNECT");
                    self.teardown();
                    return SessionStatus::Dropped("broker disconnected".to_string());
                }
                EventRoute::ConnectionAcknowledged
                | EventRoute::InfrastructureEvent(_)
                | EventRoute::OutgoingEvent => {}
            }
        }

        SessionStatus::Alive
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                debug!(error = %e, "Disconnect request not queued");
            } else if let Some(event_loop) = self.event_loop.as_mut() {
                // One bounded poll to put DISCONNECT on the wire
                let _ = timeout(DISCONNECT_FLUSH, event_loop.poll()).await;
            }
        }
        self.teardown();
    }

    fn is_connected(&self) -> bool {
        self.event_loop.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerAuth;
    use crate::testing::mocks::RecordingHandler;

    fn test_session() -> MqttSession {
        let broker = BrokerSection {
            broker_url: "mqtt://127.0.0.1:1".to_string(),
            topic: "lab/prints".to_string(),
            auth: BrokerAuth::None,
            token_env: None,
            qos: 1,
            keep_alive_secs: 30,
            connect_timeout_ms: 500,
            certificate: None,
        };
        MqttSession::new(
            "printer-01",
            &broker,
            &RuntimeSection::default(),
            &BrokerCredentials::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = test_session();
        assert!(!session.is_connected());
        assert_eq!(session.topic(), "lab/prints");
        assert_eq!(session.qos, QoS::AtLeastOnce);
        assert_eq!(session.connect_timeout, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_service_without_session_reports_drop() {
        let mut session = test_session();
        let mut handler = RecordingHandler::default();
        let status = session.service(&mut handler).await;
        assert!(matches!(status, SessionStatus::Dropped(_)));
        assert!(handler.messages.is_empty());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_without_session() {
        let mut session = test_session();
        let failure = session.connect().await.unwrap_err();
        assert!(matches!(
            failure.reason,
            ConnectFailureReason::ServerUnavailable | ConnectFailureReason::Timeout
        ));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut session = test_session();
        session.disconnect().await;
        session.disconnect().await;
        assert!(!session.is_connected());
    }

    #[test]
    fn test_debug_omits_credentials() {
        let rendered = format!("{:?}", test_session());
        assert!(rendered.contains("lab/prints"));
        assert!(rendered.contains("connected: false"));
    }
}
