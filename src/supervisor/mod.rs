//! Connectivity supervisor
//!
//! [`ConnectivitySupervisor::tick`] is called once per iteration of the
//! cooperative loop. Each call takes exactly one branch: service the broker
//! session, poll the link, attempt a broker connection, or wait out the
//! backoff. The branch taken is returned as a [`TickAction`].
//!
//! ```text
//!            link down                     link up, backoff elapsed
//!  LinkDown ----------> LinkDown   LinkUp ---------------------------> BrokerConnecting
//!     |  establish ok                 ^  \                                  |
//!     +-----------------> LinkUp <----+   +-- connect failed <--------------+
//!                            ^                                              | connected
//!                            +-------- session dropped -- BrokerConnected <-+
//! ```
//!
//! All state lives in the supervisor value; collaborators only see the calls
//! the supervisor makes on them.

use crate::dispatch::MessageDispatcher;
use crate::error::ConnectFailureReason;
use crate::link::{LinkProvider, LinkStatus};
use crate::observability::{StatusIndicator, StatusSignal};
use crate::printer::ActionHandler;
use crate::transport::{BrokerSession, InboundHandler, InboundMessage, SessionStatus};
use async_trait::async_trait;
use tracing::{debug, error, info, warn, Instrument};

pub mod clock;
pub mod retry;
pub mod stats;

pub use clock::{Clock, MonotonicClock};
pub use retry::{AttemptDecision, RetryTimer, DEFAULT_BACKOFF_MS};
pub use stats::SupervisorStats;

/// Connection lifecycle state, owned and mutated only by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    LinkDown,
    LinkUp,
    BrokerConnecting,
    BrokerConnected,
}

/// The single branch a tick took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickAction {
    /// Serviced the broker session
    Serviced { dropped: bool },
    /// Link reported down while connected; session torn down, nothing serviced
    LinkLost,
    /// Ran one bounded link establishment step
    LinkPolled { established: bool },
    /// Made one broker connection attempt
    ConnectAttempted {
        outcome: Result<(), ConnectFailureReason>,
    },
    /// Link up but the backoff interval has not elapsed
    Waiting { retry_in_ms: u64 },
}

impl TickAction {
    pub fn is_connect_attempt(&self) -> bool {
        matches!(self, TickAction::ConnectAttempted { .. })
    }

    pub fn is_service(&self) -> bool {
        matches!(self, TickAction::Serviced { .. })
    }
}

/// Forwards delivered messages to the dispatcher while a session is serviced
struct DispatchForwarder<'a, A: ActionHandler, I: StatusIndicator> {
    dispatcher: &'a mut MessageDispatcher<A>,
    indicator: &'a mut I,
    stats: &'a mut SupervisorStats,
}

#[async_trait]
impl<'a, A: ActionHandler, I: StatusIndicator> InboundHandler for DispatchForwarder<'a, A, I> {
    async fn on_message(&mut self, message: InboundMessage) {
        let outcome = self.dispatcher.dispatch(message).await;
        self.stats.record_dispatch(&outcome);
        self.indicator.show(outcome.status_signal());
    }
}

/// Keeps the device connected to the broker and routes inbound messages
pub struct ConnectivitySupervisor<L, B, A, I>
where
    L: LinkProvider,
    B: BrokerSession,
    A: ActionHandler,
    I: StatusIndicator,
{
    link: L,
    session: B,
    dispatcher: MessageDispatcher<A>,
    indicator: I,
    retry: RetryTimer,
    state: ConnectionState,
    stats: SupervisorStats,
}

impl<L, B, A, I> ConnectivitySupervisor<L, B, A, I>
where
    L: LinkProvider,
    B: BrokerSession,
    A: ActionHandler,
    I: StatusIndicator,
{
    pub fn new(
        link: L,
        session: B,
        dispatcher: MessageDispatcher<A>,
        mut indicator: I,
        retry: RetryTimer,
    ) -> Self {
        indicator.show(StatusSignal::Idle);
        Self {
            link,
            session,
            dispatcher,
            indicator,
            retry,
            state: ConnectionState::LinkDown,
            stats: SupervisorStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn retry_timer(&self) -> &RetryTimer {
        &self.retry
    }

    pub fn session(&self) -> &B {
        &self.session
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn dispatcher(&self) -> &MessageDispatcher<A> {
        &self.dispatcher
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Run one iteration of the supervisory state machine
    pub async fn tick(&mut self, now: u64) -> TickAction {
        if self.state == ConnectionState::BrokerConnected {
            self.tick_connected().await
        } else {
            self.tick_disconnected(now).await
        }
    }

    /// Disconnect the broker session for a clean host shutdown
    pub async fn shutdown(&mut self) {
        if self.session.is_connected() {
            self.session.disconnect().await;
            info!("Broker session closed");
        }
        let next = Self::state_for_link(self.link.status());
        self.transition(next);
        self.indicator.show(StatusSignal::Idle);
    }

    async fn tick_connected(&mut self) -> TickAction {
        if !self.link.status().is_up() {
            warn!("Link lost while connected to broker");
            self.session.disconnect().await;
            self.stats.sessions_dropped += 1;
            self.transition(ConnectionState::LinkDown);
            self.indicator.show(StatusSignal::Error);
            return TickAction::LinkLost;
        }

        let mut forwarder = DispatchForwarder {
            dispatcher: &mut self.dispatcher,
            indicator: &mut self.indicator,
            stats: &mut self.stats,
        };

        match self.session.service(&mut forwarder).await {
            SessionStatus::Alive => TickAction::Serviced { dropped: false },
            SessionStatus::Dropped(reason) => {
                warn!(reason = %reason, "Broker session dropped");
                self.stats.sessions_dropped += 1;
                let next = Self::state_for_link(self.link.status());
                self.transition(next);
                self.indicator.show(StatusSignal::Error);
                TickAction::Serviced { dropped: true }
            }
        }
    }

    async fn tick_disconnected(&mut self, now: u64) -> TickAction {
        if !self.link.status().is_up() {
            self.transition(ConnectionState::LinkDown);
            self.stats.link_polls += 1;
            self.indicator.show(StatusSignal::Connecting);

            return match self.link.establish().await {
                Ok(()) => {
                    self.transition(ConnectionState::LinkUp);
                    TickAction::LinkPolled { established: true }
                }
                Err(e) => {
                    debug!(error = %e, "Link not up yet");
                    TickAction::LinkPolled { established: false }
                }
            };
        }

        self.transition(ConnectionState::LinkUp);
        match self.retry.decide(now) {
            AttemptDecision::Wait { remaining_ms } => TickAction::Waiting {
                retry_in_ms: remaining_ms,
            },
            AttemptDecision::Proceed => self.attempt_connect(now).await,
        }
    }

    async fn attempt_connect(&mut self, now: u64) -> TickAction {
        self.retry.record_attempt(now);
        self.stats.record_attempt(now);
        self.transition(ConnectionState::BrokerConnecting);
        self.indicator.show(StatusSignal::Connecting);

        let span = crate::connect_span!(attempt = self.stats.connect_attempts, now_ms = now);
        let result = self.session.connect().instrument(span).await;

        match result {
            Ok(()) => {
                self.stats.sessions_established += 1;
                self.transition(ConnectionState::BrokerConnected);
                self.indicator.show(StatusSignal::Connected);
                TickAction::ConnectAttempted { outcome: Ok(()) }
            }
            Err(failure) => {
                self.stats.connect_failures += 1;
                warn!(
                    reason = %failure.reason,
                    detail = %failure.detail,
                    retry_in_ms = self.retry.backoff_interval_ms(),
                    "Broker connection failed"
                );
                self.transition(ConnectionState::LinkUp);
                self.indicator.show(StatusSignal::Error);
                TickAction::ConnectAttempted {
                    outcome: Err(failure.reason),
                }
            }
        }
    }

    fn state_for_link(link: LinkStatus) -> ConnectionState {
        match link {
            LinkStatus::Up => ConnectionState::LinkUp,
            LinkStatus::Down => ConnectionState::LinkDown,
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        if from != to {
            Self::log_state_transition(from, to);
            self.state = to;
        }
    }

    /// Log a state transition with a message matched to its meaning
    pub fn log_state_transition(from: ConnectionState, to: ConnectionState) {
        match (from, to) {
            (ConnectionState::LinkDown, ConnectionState::LinkUp) => {
                info!(from = ?from, to = ?to, "Link up");
            }
            (ConnectionState::BrokerConnecting, ConnectionState::BrokerConnected) => {
                info!(from = ?from, to = ?to, "Broker session established");
            }
            (ConnectionState::BrokerConnected, ConnectionState::LinkDown) => {
                error!(from = ?from, to = ?to, "Link lost with an open broker session");
            }
            (ConnectionState::BrokerConnected, _) => {
                warn!(from = ?from, to = ?to, "Broker session ended");
            }
            (_, ConnectionState::LinkDown) => {
                warn!(from = ?from, to = ?to, "Link down");
            }
            _ => {
                debug!(from = ?from, to = ?to, "Connection state transition");
            }
        }
    }
}
