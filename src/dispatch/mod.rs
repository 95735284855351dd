//! Inbound message dispatch
//!
//! Turns an opaque payload into zero or one actuator invocation. Decoding is
//! a pure function of the payload bytes and the [`DispatchPolicy`]; the only
//! side effect of [`MessageDispatcher::dispatch`] is the single call to the
//! [`ActionHandler`] on success.
//!
//! Dropped messages are not acknowledged or answered in any way: the broker
//! message is the only copy and losing a print is acceptable.

use crate::config::DispatchSection;
use crate::error::DispatchError;
use crate::observability::StatusSignal;
use crate::printer::ActionHandler;
use crate::transport::InboundMessage;
use serde_json::Value;
use tracing::{debug, error, info, warn, Instrument};

/// The single field of interest decoded from a valid payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCommand {
    pub target_value: String,
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler invoked once and reported success
    Delivered { target_value: String },
    /// Message dropped before reaching the handler
    Dropped(DispatchError),
    /// Handler invoked once and failed; not retried
    ActuatorFailed { reason: String },
}

impl DispatchOutcome {
    /// Status signal to show for this outcome
    pub fn status_signal(&self) -> StatusSignal {
        match self {
            DispatchOutcome::Delivered { .. } => StatusSignal::Connected,
            DispatchOutcome::Dropped(DispatchError::RetainedReplay) => StatusSignal::Connected,
            DispatchOutcome::Dropped(_) => StatusSignal::DecodeFailure,
            DispatchOutcome::ActuatorFailed { .. } => StatusSignal::Error,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }
}

/// Decoding rules for inbound payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Payload field forwarded to the handler
    pub field: String,
    pub max_payload_bytes: usize,
    /// Drop messages the broker replays from its retained store
    pub ignore_retained: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&DispatchSection::default())
    }
}

impl From<&DispatchSection> for DispatchPolicy {
    fn from(section: &DispatchSection) -> Self {
        Self {
            field: section.field.clone(),
            max_payload_bytes: section.max_payload_bytes,
            ignore_retained: section.ignore_retained,
        }
    }
}

/// Decodes inbound messages and forwards valid commands to an action handler
pub struct MessageDispatcher<A: ActionHandler> {
    policy: DispatchPolicy,
    handler: A,
}

impl<A: ActionHandler> MessageDispatcher<A> {
    pub fn new(policy: DispatchPolicy, handler: A) -> Self {
        Self { policy, handler }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn handler(&self) -> &A {
        &self.handler
    }

    /// Decode a payload into a command (pure function)
    ///
    /// Any JSON object is accepted as long as the designated field holds a
    /// string; other fields are ignored. An empty string is forwarded as is.
    pub fn extract(&self, payload: &[u8]) -> Result<ExtractedCommand, DispatchError> {
        if payload.len() > self.policy.max_payload_bytes {
            return Err(DispatchError::PayloadTooLarge {
                size: payload.len(),
                max: self.policy.max_payload_bytes,
            });
        }

        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| DispatchError::MalformedPayload(e.to_string()))?;

        let Value::Object(record) = value else {
            return Err(DispatchError::MalformedPayload(
                "payload is not a JSON object".to_string(),
            ));
        };

        match record.get(&self.policy.field) {
            Some(Value::String(target_value)) => Ok(ExtractedCommand {
                target_value: target_value.clone(),
            }),
            _ => Err(DispatchError::MissingField {
                field: self.policy.field.clone(),
            }),
        }
    }

    /// Dispatch one message, invoking the handler at most once
    pub async fn dispatch(&mut self, message: InboundMessage) -> DispatchOutcome {
        let span = crate::dispatch_span!(topic = %message.topic, bytes = message.payload.len());

        async move {
            if message.retain && self.policy.ignore_retained {
                debug!("Dropping retained replay");
                return DispatchOutcome::Dropped(DispatchError::RetainedReplay);
            }

            let command = match self.extract(&message.payload) {
                Ok(command) => command,
                Err(e) => {
                    warn!(error = %e, "Dropping inbound message");
                    return DispatchOutcome::Dropped(e);
                }
            };

            let target_value = command.target_value.clone();
            match self.handler.perform(command).await {
                Ok(()) => {
                    info!(target_value = %target_value, "Command delivered");
                    DispatchOutcome::Delivered { target_value }
                }
                Err(e) => {
                    error!(error = %e, "Action handler failed");
                    DispatchOutcome::ActuatorFailed {
                        reason: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
