//! Mock implementations for testing

use crate::dispatch::ExtractedCommand;
use crate::error::{ActuatorError, ConnectFailure, LinkError};
use crate::link::{LinkProvider, LinkStatus};
use crate::observability::{StatusIndicator, StatusSignal};
use crate::printer::{ActionHandler, PrinterChannel};
use crate::transport::{BrokerSession, InboundHandler, InboundMessage, SessionStatus};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// A panicking test must not cascade into every other assertion
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct LinkState {
    up: bool,
    establish_succeeds: bool,
    establish_calls: usize,
}

/// Mock wireless link
#[derive(Debug, Clone)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    fn with(up: bool, establish_succeeds: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(LinkState {
                up,
                establish_succeeds,
                establish_calls: 0,
            })),
        }
    }

    pub fn up() -> Self {
        Self::with(true, true)
    }

    /// Down, and establishment keeps failing until told otherwise
    pub fn down() -> Self {
        Self::with(false, false)
    }

    pub fn set_up(&self, up: bool) {
        lock(&self.state).up = up;
    }

    pub fn set_establish_succeeds(&self, succeeds: bool) {
        lock(&self.state).establish_succeeds = succeeds;
    }

    pub fn establish_calls(&self) -> usize {
        lock(&self.state).establish_calls
    }
}

#[async_trait]
impl LinkProvider for MockLink {
    fn status(&mut self) -> LinkStatus {
        if lock(&self.state).up {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }

    async fn establish(&mut self) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        state.establish_calls += 1;
        if state.establish_succeeds {
            state.up = true;
            Ok(())
        } else {
            Err(LinkError::Unavailable {
                interface: "mock0".to_string(),
            })
        }
    }
}

#[derive(Debug)]
struct BrokerState {
    scripted: VecDeque<Result<(), ConnectFailure>>,
    default_outcome: Result<(), ConnectFailure>,
    inbound: VecDeque<InboundMessage>,
    drop_next: Option<String>,
    open: bool,
    connect_calls: usize,
    service_calls: usize,
    disconnect_calls: usize,
}

/// Mock broker session with scripted connection outcomes
#[derive(Debug, Clone)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// Every connection attempt succeeds unless scripted otherwise
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                scripted: VecDeque::new(),
                default_outcome: Ok(()),
                inbound: VecDeque::new(),
                drop_next: None,
                open: false,
                connect_calls: 0,
                service_calls: 0,
                disconnect_calls: 0,
            })),
        }
    }

    /// Outcomes for the next attempts, in order; the default applies afterwards
    pub fn script_connects<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = Result<(), ConnectFailure>>,
    {
        lock(&self.state).scripted.extend(outcomes);
    }

    pub fn set_default_outcome(&self, outcome: Result<(), ConnectFailure>) {
        lock(&self.state).default_outcome = outcome;
    }

    /// Queue a message for delivery on the next service pass
    pub fn push_message(&self, message: InboundMessage) {
        lock(&self.state).inbound.push_back(message);
    }

    /// Make the next service pass report the session as dropped
    pub fn drop_next_service<S: Into<String>>(&self, reason: S) {
        lock(&self.state).drop_next = Some(reason.into());
    }

    pub fn connect_calls(&self) -> usize {
        lock(&self.state).connect_calls
    }

    pub fn service_calls(&self) -> usize {
        lock(&self.state).service_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        lock(&self.state).disconnect_calls
    }

    pub fn is_session_open(&self) -> bool {
        lock(&self.state).open
    }
}

#[async_trait]
impl BrokerSession for MockBroker {
    async fn connect(&mut self) -> Result<(), ConnectFailure> {
        let mut state = lock(&self.state);
        state.connect_calls += 1;
        let outcome = match state.scripted.pop_front() {
            Some(outcome) => outcome,
            None => state.default_outcome.clone(),
        };
        state.open = outcome.is_ok();
        outcome
    }

    async fn service(&mut self, handler: &mut dyn InboundHandler) -> SessionStatus {
        let pending: Vec<InboundMessage> = {
            let mut state = lock(&self.state);
            state.service_calls += 1;
            if !state.open {
                return SessionStatus::Dropped("no active session".to_string());
            }
            if let Some(reason) = state.drop_next.take() {
                state.open = false;
                return SessionStatus::Dropped(reason);
            }
            state.inbound.drain(..).collect()
        };

        for message in pending {
            handler.on_message(message).await;
        }
        SessionStatus::Alive
    }

    async fn disconnect(&mut self) {
        let mut state = lock(&self.state);
        state.disconnect_calls += 1;
        state.open = false;
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).open
    }
}

#[derive(Debug, Default)]
struct ActionState {
    performed: Vec<ExtractedCommand>,
    failing: bool,
}

/// Mock actuator recording every command it is given
#[derive(Debug, Clone, Default)]
pub struct MockActionHandler {
    state: Arc<Mutex<ActionState>>,
}

impl MockActionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following invocation fail
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Commands passed to `perform`, including failed ones
    pub fn performed(&self) -> Vec<ExtractedCommand> {
        lock(&self.state).performed.clone()
    }

    pub fn attempts(&self) -> usize {
        lock(&self.state).performed.len()
    }
}

#[async_trait]
impl ActionHandler for MockActionHandler {
    async fn perform(&mut self, command: ExtractedCommand) -> Result<(), ActuatorError> {
        let mut state = lock(&self.state);
        state.performed.push(command);
        if state.failing {
            Err(ActuatorError::Timeout { ms: 0 })
        } else {
            Ok(())
        }
    }
}

/// Status indicator that keeps every signal shown
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    signals: Arc<Mutex<Vec<StatusSignal>>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<StatusSignal> {
        lock(&self.signals).clone()
    }

    pub fn last(&self) -> Option<StatusSignal> {
        lock(&self.signals).last().copied()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn show(&mut self, signal: StatusSignal) {
        lock(&self.signals).push(signal);
    }
}

/// Inbound handler that just collects messages
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub messages: Vec<InboundMessage>,
}

#[async_trait]
impl InboundHandler for RecordingHandler {
    async fn on_message(&mut self, message: InboundMessage) {
        self.messages.push(message);
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    jobs: Vec<Vec<u8>>,
    stalled: bool,
}

/// Printer channel capturing each write as one job
#[derive(Debug, Clone, Default)]
pub struct MockPrinterChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MockPrinterChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stalled channel never completes a write
    pub fn set_stalled(&self, stalled: bool) {
        lock(&self.state).stalled = stalled;
    }

    pub fn jobs(&self) -> Vec<Vec<u8>> {
        lock(&self.state).jobs.clone()
    }
}

#[async_trait]
impl PrinterChannel for MockPrinterChannel {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ActuatorError> {
        let stalled = lock(&self.state).stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
        lock(&self.state).jobs.push(bytes.to_vec());
        Ok(())
    }
}
