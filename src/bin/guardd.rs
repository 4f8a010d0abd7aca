use std::path::Path;

use anyhow::Context;
use clap::Parser;
use service_guard::{
    Config, MonitorContext, MonitorSupervisor,
    config::read_config_file,
    util::{get_base_dir, get_config_path},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Targets to watch, separated by whitespace, ',' or ';'
    targets: Option<String>,

    /// Default poll interval in milliseconds
    duration: Option<f64>,

    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Run as a managed background service and stop on SIGTERM/SIGINT
    #[arg(long)]
    service: bool,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("service_guard", LevelFilter::DEBUG),
        ("guardd", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = load_config(args.file.as_deref())?;

    let (targets, duration) = match args.targets {
        Some(targets) => (
            Some(targets),
            args.duration.unwrap_or(config.default_duration_ms()),
        ),
        None => (config.service_name.clone(), config.default_duration_ms()),
    };

    let Some(targets) = targets else {
        eprintln!(
            "Specify the targets to watch and optionally a poll interval in milliseconds, \
             e.g. \"nginx 5000\" checks nginx every 5 seconds."
        );
        return Ok(());
    };

    let context = MonitorContext::new(&config, get_base_dir())?;
    let mut supervisor = MonitorSupervisor::new(config, targets, duration, context);

    let started = supervisor.start().await;
    info!("watching {started} targets");

    if args.service {
        wait_for_termination().await?;
    } else {
        wait_for_console().await;
    }

    supervisor.stop().await;

    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<Config> {
    let explicit = path.is_some();
    let path = path.map(str::to_string).unwrap_or_else(get_config_path);

    match read_config_file(&path) {
        Ok(config) => Ok(config),
        Err(_) if !explicit && !Path::new(&path).exists() => {
            debug!("no config file at {path}, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {path}")),
    }
}

async fn wait_for_console() {
    info!("press enter to stop");

    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = stdin.read_line(&mut line) => {
            if let Err(e) = result {
                warn!("failed to read from stdin: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(unix)]
async fn wait_for_termination() -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;

    tokio::select! {
        _ = terminate.recv() => info!("received SIGTERM"),
        _ = tokio::signal::ctrl_c() => info!("received interrupt"),
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt")?;
    info!("received interrupt");
    Ok(())
}
