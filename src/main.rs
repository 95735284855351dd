//! linkprint - Main Entry Point
//!
//! Runs setup once, then ticks the connectivity supervisor forever. On a host
//! the loop also stops cleanly on SIGINT/SIGTERM.

use linkprint::config::DeviceConfig;
use linkprint::dispatch::{DispatchPolicy, MessageDispatcher};
use linkprint::error::DeviceResult;
use linkprint::link::HostLink;
use linkprint::observability::{init_default_logging, LogIndicator};
use linkprint::printer::{ReceiptLayout, ReceiptPrinter, SerialChannel};
use linkprint::supervisor::{Clock, ConnectivitySupervisor, MonotonicClock, RetryTimer};
use linkprint::transport::mqtt::{BrokerCredentials, MqttSession};
use std::path::PathBuf;
use std::process;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

type DeviceSupervisor =
    ConnectivitySupervisor<HostLink, MqttSession, ReceiptPrinter<SerialChannel>, LogIndicator>;

const CONFIG_ENV: &str = "LINKPRINT_CONFIG";
const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "linkprint.toml",
    "config/linkprint.toml",
    "/etc/linkprint/linkprint.toml",
];

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_default_logging();

    info!("Starting linkprint v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let supervisor = match setup(&config) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!("Setup failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(supervisor, &config).await {
        error!("Run loop failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    DEFAULT_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_configuration() -> DeviceResult<DeviceConfig> {
    let path = config_path().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no configuration file found; set {CONFIG_ENV} or create linkprint.toml"),
        )
    })?;

    info!("Loading configuration from: {}", path.display());
    Ok(DeviceConfig::load_from_file(&path)?)
}

/// Build every collaborator and hand them to the supervisor
fn setup(config: &DeviceConfig) -> DeviceResult<DeviceSupervisor> {
    let link = HostLink::from_config(&config.link);

    let token = config.broker_token()?;
    let credentials = BrokerCredentials::load(&config.broker, token)?;
    let session = MqttSession::new(
        &config.device.id,
        &config.broker,
        &config.runtime,
        &credentials,
    )?;

    let channel = SerialChannel::open(&config.printer.device, config.printer.baud_rate)?;
    let printer = ReceiptPrinter::new(channel, ReceiptLayout::from(&config.printer));
    let dispatcher = MessageDispatcher::new(DispatchPolicy::from(&config.dispatch), printer);

    info!(
        device_id = %config.device.id,
        broker = %config.broker.broker_url,
        topic = %config.broker.topic,
        auth = ?config.broker.auth,
        "Setup complete"
    );

    Ok(ConnectivitySupervisor::new(
        link,
        session,
        dispatcher,
        LogIndicator::new(),
        RetryTimer::new(config.retry.backoff_interval_ms),
    ))
}

async fn run(mut supervisor: DeviceSupervisor, config: &DeviceConfig) -> DeviceResult<()> {
    let clock = MonotonicClock::new();
    let mut ticker = interval(Duration::from_millis(config.runtime.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                break;
            }
            _ = ticker.tick() => {
                supervisor.tick(clock.now_ms()).await;
            }
        }
    }

    supervisor.shutdown().await;

    let stats = supervisor.stats();
    info!(
        connect_attempts = stats.connect_attempts,
        connect_failures = stats.connect_failures,
        sessions_established = stats.sessions_established,
        sessions_dropped = stats.sessions_dropped,
        messages_delivered = stats.messages_delivered,
        messages_dropped = stats.messages_dropped,
        actuator_failures = stats.actuator_failures,
        "Supervisor statistics"
    );
    Ok(())
}
