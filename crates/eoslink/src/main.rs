use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use eoslink_core::{
    ConfigManager, ConsoleSession, SessionEvent, SessionSettings, Settings, TargetSnapshot,
    UdpTransport,
};
use eoslink_records::{Console, ConsoleType, RecordTarget};

/// Connects to an Eos family console and mirrors the requested record targets.
#[derive(Parser, Debug)]
#[command(name = "eoslink")]
#[command(about = "Eos console record mirror")]
struct Args {
    /// Console host name or IP address
    #[arg(long)]
    host: Option<String>,

    /// Console OSC port (default: 8000)
    #[arg(long)]
    port: Option<u16>,

    /// Local port replies are received on (default: 8001)
    #[arg(long)]
    local_port: Option<u16>,

    /// Path to a config.json; created with defaults if missing
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record target to synchronize, e.g. `patch`, `cue`, `ip` (repeatable)
    #[arg(long = "target", value_parser = parse_target)]
    targets: Vec<RecordTarget>,

    /// Give up waiting for synchronization after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print every snapshot as JSON before exiting
    #[arg(long, default_value = "false")]
    dump: bool,
}

fn parse_target(s: &str) -> Result<RecordTarget, String> {
    s.parse().map_err(|e| format!("Invalid target: {}", e))
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(run(settings, args.timeout.map(Duration::from_secs), args.dump))
}

/// Config file values first, then command line overrides.
fn load_settings(args: &Args) -> Result<Settings, anyhow::Error> {
    let mut settings = match &args.config {
        Some(path) => {
            let mut manager = ConfigManager::new(Some(path.clone()));
            manager
                .load()
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => Settings::default(),
    };

    if let Some(host) = &args.host {
        settings.console_host = host.clone();
    }
    if let Some(port) = args.port {
        settings.console_port = port;
    }
    if let Some(local_port) = args.local_port {
        settings.local_port = local_port;
    }
    if !args.targets.is_empty() {
        settings.targets = args.targets.clone();
    }

    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow::anyhow!("invalid settings: {}", errors.join(", ")))?;
    Ok(settings)
}

async fn run(settings: Settings, timeout: Option<Duration>, dump: bool) -> Result<(), anyhow::Error> {
    let console = Console::new(
        settings.console_host.clone(),
        ConsoleType::Unknown,
        settings.console_host.clone(),
        settings.console_port,
    );
    let transport = UdpTransport::new(
        &settings.console_host,
        settings.console_port,
        settings.local_port,
    );
    let (mut session, mut events) = ConsoleSession::start(
        console,
        &settings.client_name,
        Box::new(transport),
        SessionSettings::from(&settings),
    );

    session.connect().await?;
    let mut waiting: BTreeSet<RecordTarget> = settings.targets.iter().copied().collect();
    session.subscribe(waiting.clone()).await?;

    if waiting.is_empty() {
        log::info!("No targets requested; waiting for the console to answer");
    }

    let deadline = timeout.map(|timeout| tokio::time::Instant::now() + timeout);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    SessionEvent::StateChanged { state } => log::info!("Console is {}", state),
                    SessionEvent::Version { version } => log::info!("Console version {}", version),
                    SessionEvent::Progress { target, fraction, stage } => {
                        log::info!("{}: {:.0}% {}", target, fraction * 100.0, stage);
                    }
                    SessionEvent::Synchronized { target } => {
                        log::info!("{} synchronized", target);
                        waiting.remove(&target);
                        if waiting.is_empty() {
                            break;
                        }
                    }
                    SessionEvent::SyncAbandoned { target } => {
                        log::warn!("{} abandoned before it finished", target);
                    }
                    SessionEvent::IncompleteRecord { target, path, received, expected, .. } => {
                        log::warn!(
                            "{}: dropped {} after {} of {} messages",
                            target,
                            path,
                            received,
                            expected
                        );
                    }
                    SessionEvent::UndefinedMessage { message } => {
                        log::debug!("Unhandled message {}", message.address);
                    }
                    SessionEvent::Error { message } => log::error!("{}", message),
                    SessionEvent::ShutdownComplete => break,
                }
            }

            _ = sleep_until(deadline) => {
                log::warn!("Timed out waiting for {} target(s)", waiting.len());
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    if dump {
        let snapshots = session.snapshots();
        let snapshots: BTreeMap<&str, &TargetSnapshot> = snapshots
            .iter()
            .map(|(target, snapshot)| (target.key(), snapshot.as_ref()))
            .collect();
        let output = serde_json::to_string_pretty(&snapshots)?;
        println!("{}", output);
    }

    session.disconnect().await?;
    session.shutdown().await?;
    Ok(())
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
