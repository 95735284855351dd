//! Test helpers and utilities for integration tests

use linkprint::config::DeviceConfig;
use linkprint::dispatch::{DispatchPolicy, MessageDispatcher};
use linkprint::error::{ConnectFailure, ConnectFailureReason};
use linkprint::supervisor::{ConnectivitySupervisor, RetryTimer, TickAction};
use linkprint::testing::{MockActionHandler, MockBroker, MockLink, RecordingIndicator};

pub type TestSupervisor =
    ConnectivitySupervisor<MockLink, MockBroker, MockActionHandler, RecordingIndicator>;

/// Supervisor plus handles on every mock it owns
#[allow(dead_code)]
pub struct TestRig {
    pub supervisor: TestSupervisor,
    pub link: MockLink,
    pub broker: MockBroker,
    pub actuator: MockActionHandler,
    pub indicator: RecordingIndicator,
}

/// Rig with the link up, a broker that accepts connections and a 5s backoff
#[allow(dead_code)]
pub fn rig() -> TestRig {
    rig_with(MockLink::up(), DispatchPolicy::default(), 5000)
}

#[allow(dead_code)]
pub fn rig_with(link: MockLink, policy: DispatchPolicy, backoff_ms: u64) -> TestRig {
    let broker = MockBroker::new();
    let actuator = MockActionHandler::new();
    let indicator = RecordingIndicator::new();

    let supervisor = ConnectivitySupervisor::new(
        link.clone(),
        broker.clone(),
        MessageDispatcher::new(policy, actuator.clone()),
        indicator.clone(),
        RetryTimer::new(backoff_ms),
    );

    TestRig {
        supervisor,
        link,
        broker,
        actuator,
        indicator,
    }
}

/// Tick at every `step` ms in `[from, to]`, returning what each tick did
#[allow(dead_code)]
pub async fn run_ticks(
    supervisor: &mut TestSupervisor,
    from: u64,
    to: u64,
    step: u64,
) -> Vec<(u64, TickAction)> {
    let mut actions = Vec::new();
    let mut now = from;
    while now <= to {
        actions.push((now, supervisor.tick(now).await));
        now += step;
    }
    actions
}

/// Timestamps of the ticks that attempted a broker connection
#[allow(dead_code)]
pub fn attempt_times(actions: &[(u64, TickAction)]) -> Vec<u64> {
    actions
        .iter()
        .filter(|(_, action)| action.is_connect_attempt())
        .map(|(now, _)| *now)
        .collect()
}

#[allow(dead_code)]
pub fn bad_credentials() -> ConnectFailure {
    ConnectFailure::new(ConnectFailureReason::BadCredentials, "connection refused: code 4")
}

/// Create a test configuration for integration tests
#[allow(dead_code)]
pub fn test_config() -> DeviceConfig {
    DeviceConfig::from_toml_str(
        r#"
[device]
id = "printer-01"

[broker]
broker_url = "mqtt://localhost:1883"
topic = "lab/prints"

[printer]
device = "/dev/null"
"#,
    )
    .expect("test configuration should be valid")
}
