//! Supervisor behavior under connection failures, link loss and recovery
//!
//! Drives the supervisor with mock collaborators and a synthetic clock,
//! ticking every 50ms the way the device loop does.

mod test_helpers;

use linkprint::error::ConnectFailureReason;
use linkprint::observability::StatusSignal;
use linkprint::supervisor::{ConnectionState, TickAction};
use linkprint::testing::MockLink;
use linkprint::transport::InboundMessage;
use linkprint::DispatchPolicy;
use test_helpers::{attempt_times, bad_credentials, rig, rig_with, run_ticks};

const TICK_MS: u64 = 50;

fn print_request(link: &str) -> InboundMessage {
    InboundMessage::new("lab/prints", format!(r#"{{"link": "{link}"}}"#))
}

#[tokio::test]
async fn test_bad_credentials_retry_at_backoff_boundaries() {
    let mut rig = rig();
    rig.broker.set_default_outcome(Err(bad_credentials()));

    let actions = run_ticks(&mut rig.supervisor, 0, 14_950, TICK_MS).await;

    assert_eq!(attempt_times(&actions), vec![0, 5000, 10_000]);
    assert_eq!(rig.broker.connect_calls(), 3);
    assert_eq!(rig.supervisor.stats().connect_failures, 3);
    assert_eq!(rig.supervisor.stats().attempt_log, vec![0, 5000, 10_000]);
    assert!(actions
        .iter()
        .filter_map(|(_, action)| match action {
            TickAction::ConnectAttempted { outcome } => Some(*outcome),
            _ => None,
        })
        .all(|outcome| outcome == Err(ConnectFailureReason::BadCredentials)));
    assert_eq!(rig.supervisor.state(), ConnectionState::LinkUp);
}

#[tokio::test]
async fn test_waiting_ticks_report_remaining_backoff() {
    let mut rig = rig();
    rig.broker.set_default_outcome(Err(bad_credentials()));

    rig.supervisor.tick(0).await;
    assert_eq!(
        rig.supervisor.tick(4_950).await,
        TickAction::Waiting { retry_in_ms: 50 }
    );
    assert!(rig.supervisor.tick(5_000).await.is_connect_attempt());
}

#[tokio::test]
async fn test_recovery_after_failed_attempts_dispatches_normally() {
    let mut rig = rig();
    rig.broker
        .script_connects([Err(bad_credentials()), Err(bad_credentials()), Err(bad_credentials())]);

    let actions = run_ticks(&mut rig.supervisor, 0, 15_000, TICK_MS).await;
    assert_eq!(attempt_times(&actions), vec![0, 5000, 10_000, 15_000]);
    assert_eq!(rig.supervisor.state(), ConnectionState::BrokerConnected);
    assert_eq!(rig.indicator.last(), Some(StatusSignal::Connected));

    rig.broker.push_message(print_request("https://example.com/x"));
    let action = rig.supervisor.tick(15_050).await;

    assert_eq!(action, TickAction::Serviced { dropped: false });
    let performed = rig.actuator.performed();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].target_value, "https://example.com/x");
    assert_eq!(rig.supervisor.stats().messages_delivered, 1);
}

#[tokio::test]
async fn test_link_drop_while_connected_stops_servicing() {
    let link = MockLink::up();
    let mut rig = rig_with(link.clone(), DispatchPolicy::default(), 5000);

    rig.supervisor.tick(0).await;
    rig.supervisor.tick(50).await;
    assert_eq!(rig.supervisor.state(), ConnectionState::BrokerConnected);
    let serviced_before = rig.broker.service_calls();

    link.set_up(false);
    link.set_establish_succeeds(false);
    assert_eq!(rig.supervisor.tick(100).await, TickAction::LinkLost);
    assert_eq!(rig.supervisor.state(), ConnectionState::LinkDown);
    assert_eq!(rig.broker.disconnect_calls(), 1);

    // Still down: only link polls, no servicing and no connection attempts
    let actions = run_ticks(&mut rig.supervisor, 150, 6_000, TICK_MS).await;
    assert!(actions
        .iter()
        .all(|(_, action)| *action == TickAction::LinkPolled { established: false }));
    assert_eq!(rig.broker.service_calls(), serviced_before);
    assert_eq!(rig.broker.connect_calls(), 1);

    // Link returns, broker reconnects, servicing resumes
    link.set_establish_succeeds(true);
    assert_eq!(
        rig.supervisor.tick(6_050).await,
        TickAction::LinkPolled { established: true }
    );
    assert_eq!(rig.supervisor.state(), ConnectionState::LinkUp);
    assert!(rig.supervisor.tick(6_100).await.is_connect_attempt());
    assert_eq!(rig.supervisor.state(), ConnectionState::BrokerConnected);

    rig.broker.push_message(print_request("https://example.com/after"));
    assert!(rig.supervisor.tick(6_150).await.is_service());
    assert_eq!(rig.actuator.attempts(), 1);
}

#[tokio::test]
async fn test_session_drop_then_link_loss_polls_link() {
    let link = MockLink::up();
    let mut rig = rig_with(link.clone(), DispatchPolicy::default(), 5000);
    rig.supervisor.tick(0).await;

    rig.broker.drop_next_service("socket closed");
    let action = rig.supervisor.tick(50).await;
    assert_eq!(action, TickAction::Serviced { dropped: true });
    assert_eq!(rig.supervisor.state(), ConnectionState::LinkUp);

    link.set_up(false);
    link.set_establish_succeeds(false);
    assert_eq!(
        rig.supervisor.tick(100).await,
        TickAction::LinkPolled { established: false }
    );
    assert_eq!(rig.supervisor.state(), ConnectionState::LinkDown);
}

#[tokio::test]
async fn test_messages_dispatched_in_arrival_order() {
    let mut rig = rig();
    rig.supervisor.tick(0).await;

    for link in ["https://example.com/1", "https://example.com/2", "https://example.com/3"] {
        rig.broker.push_message(print_request(link));
    }
    rig.supervisor.tick(50).await;

    let values: Vec<String> = rig
        .actuator
        .performed()
        .into_iter()
        .map(|command| command.target_value)
        .collect();
    assert_eq!(
        values,
        vec![
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3"
        ]
    );
}

#[tokio::test]
async fn test_bad_payload_signals_decode_failure_and_keeps_session() {
    let mut rig = rig();
    rig.supervisor.tick(0).await;

    rig.broker
        .push_message(InboundMessage::new("lab/prints", &br#"{"other": 1}"#[..]));
    let action = rig.supervisor.tick(50).await;

    assert_eq!(action, TickAction::Serviced { dropped: false });
    assert_eq!(rig.actuator.attempts(), 0);
    assert_eq!(rig.indicator.last(), Some(StatusSignal::DecodeFailure));
    assert_eq!(rig.supervisor.stats().messages_dropped, 1);
    assert_eq!(rig.supervisor.state(), ConnectionState::BrokerConnected);
}

#[tokio::test]
async fn test_actuator_failure_is_not_retried() {
    let mut rig = rig();
    rig.actuator.set_failing(true);
    rig.supervisor.tick(0).await;

    rig.broker.push_message(print_request("https://example.com/x"));
    rig.supervisor.tick(50).await;
    rig.supervisor.tick(100).await;

    assert_eq!(rig.actuator.attempts(), 1);
    assert_eq!(rig.supervisor.stats().actuator_failures, 1);
    assert_eq!(rig.indicator.last(), Some(StatusSignal::Error));
}

#[tokio::test]
async fn test_indicator_sequence_for_failed_then_successful_connect() {
    let mut rig = rig();
    rig.broker.script_connects([Err(bad_credentials())]);

    rig.supervisor.tick(0).await;
    rig.supervisor.tick(5_000).await;

    assert_eq!(
        rig.indicator.signals(),
        vec![
            StatusSignal::Idle,
            StatusSignal::Connecting,
            StatusSignal::Error,
            StatusSignal::Connecting,
            StatusSignal::Connected,
        ]
    );
}
