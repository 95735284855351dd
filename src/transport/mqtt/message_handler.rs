//! Pure routing of MQTT event loop events
//!
//! Converts raw rumqttc events into the small set of decisions the session
//! acts on, so the I/O side stays a thin loop.

use crate::transport::InboundMessage;
use rumqttc::{Event, Packet, SubAck, SubscribeReasonCode};

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// CONNACK received
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived(InboundMessage),
    /// SUBACK received; Err carries the rejection description
    SubscriptionResult(Result<(), String>),
    /// Broker sent DISCONNECT
    Disconnected,
    /// Keep-alive and acknowledgement traffic
    InfrastructureEvent(String),
    /// Outgoing packet written (handled automatically)
    OutgoingEvent,
}

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived(InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                    retain: publish.retain,
                }),
                Packet::SubAck(suback) => {
                    EventRoute::SubscriptionResult(Self::validate_subscription(suback))
                }
                Packet::Disconnect => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Validate subscription success from SubAck (pure function)
    pub fn validate_subscription(suback: &SubAck) -> Result<(), String> {
        if suback
            .return_codes
            .iter()
            .any(|code| matches!(code, SubscribeReasonCode::Failure))
        {
            Err(format!(
                "Subscription {} rejected by broker: {:?}",
                suback.pkid, suback.return_codes
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Outgoing, Publish, QoS};

    #[test]
    fn test_route_connack() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&connack),
            EventRoute::ConnectionAcknowledged
        );
    }

    #[test]
    fn test_route_publish() {
        let mut publish = Publish::new(
            "lab/prints",
            QoS::AtMostOnce,
            br#"{"link":"https://example.com/x"}"#.to_vec(),
        );
        publish.retain = true;

        match MessageHandler::route_mqtt_event(&Event::Incoming(Packet::Publish(publish))) {
            EventRoute::MessageReceived(message) => {
                assert_eq!(message.topic, "lab/prints");
                assert_eq!(&message.payload[..], br#"{"link":"https://example.com/x"}"#);
                assert!(message.retain);
            }
            other => panic!("Expected MessageReceived route, got {other:?}"),
        }
    }

    #[test]
    fn test_route_disconnect_and_outgoing() {
        assert_eq!(
            MessageHandler::route_mqtt_event(&Event::Incoming(Packet::Disconnect)),
            EventRoute::Disconnected
        );
        assert_eq!(
            MessageHandler::route_mqtt_event(&Event::Outgoing(Outgoing::PingReq)),
            EventRoute::OutgoingEvent
        );
        assert!(matches!(
            MessageHandler::route_mqtt_event(&Event::Incoming(Packet::PingResp)),
            EventRoute::InfrastructureEvent(_)
        ));
    }

    #[test]
    fn test_validate_subscription() {
        let accepted = SubAck::new(1, vec![SubscribeReasonCode::Success(QoS::AtMostOnce)]);
        assert!(MessageHandler::validate_subscription(&accepted).is_ok());

        let rejected = SubAck::new(2, vec![SubscribeReasonCode::Failure]);
        let result = MessageHandler::validate_subscription(&rejected);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("rejected"));
    }
}
