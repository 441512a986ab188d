//! waitingroom-gateway — HTTP front-end for the admission engine.
//!
//! One process runs the axum server and a single admission-controller task
//! side by side; any number of replicas coordinate through the shared
//! store. Shutdown is signal-driven: SIGINT/SIGTERM stop accepting
//! connections, the controller is told to stop between domains, and both
//! are drained before exit.

mod api;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use waitingroom_core::repository::{RedisRepository, Repository};
use waitingroom_core::{
    AccessController, Config, CookieCodec, Notifier, NoopNotifier, SlackNotifier, Waitingroom,
};

use crate::state::AppState;

/// waitingroom gateway server
#[derive(Parser, Debug)]
#[command(name = "waitingroom-gateway")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides configuration)
    #[arg(long)]
    listener: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides configuration)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// Builds the store URL from the `REDIS_*` environment.
fn redis_url() -> String {
    let host = env_or("REDIS_HOST", "127.0.0.1");
    let port = env_or("REDIS_PORT", "6379");
    let db = env_or("REDIS_DB", "0");
    match std::env::var("REDIS_PASSWORD") {
        Ok(password) if !password.is_empty() => {
            format!("redis://:{password}@{host}:{port}/{db}")
        }
        _ => format!("redis://{host}:{port}/{db}"),
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("invalid log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    match (&config.slack_webhook_url, &config.slack_channel) {
        (Some(url), Some(channel)) => {
            info!(channel, "slack notifications enabled");
            Arc::new(SlackNotifier::new(url.clone(), channel.clone()))
        }
        _ => Arc::new(NoopNotifier),
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        Config::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(listener) = args.listener {
        config.listener = listener;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }
    config.validate().context("invalid configuration")?;

    init_tracing(&config.log_level, args.log_json)?;

    let url = redis_url();
    let client = redis::Client::open(url.as_str()).context("invalid store URL")?;
    let connection = client
        .get_connection_manager()
        .await
        .context("failed to connect to the shared store")?;

    let config = Arc::new(config);
    let repository: Arc<dyn Repository> = Arc::new(RedisRepository::new(connection));
    repository
        .ping()
        .await
        .context("shared store did not answer ping")?;

    let codec = Arc::new(CookieCodec::from_env().context("cookie seal configuration")?);
    let notifier = build_notifier(&config);
    let engine = Arc::new(Waitingroom::new(
        Arc::clone(&config),
        Arc::clone(&repository),
        notifier,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = AccessController::new(Arc::clone(&engine), Arc::clone(&config), shutdown_rx);
    let controller_task = tokio::spawn(controller.run());

    let app = api::router(Arc::new(AppState {
        config: Arc::clone(&config),
        engine,
        codec,
    }));

    let listener = tokio::net::TcpListener::bind(&config.listener)
        .await
        .with_context(|| format!("failed to bind {}", config.listener))?;
    info!(listener = %config.listener, "waitingroom gateway started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(10), controller_task)
        .await
        .is_err()
    {
        warn!("permit worker did not stop within 10s");
    }

    info!("shutdown complete");
    Ok(())
}
