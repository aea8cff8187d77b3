//! Logbook webhook gateway.

use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use logbook_webhook::config::{self, loader, ConfigError, GateConfig};
use logbook_webhook::config::watcher::ConfigWatcher;
use logbook_webhook::gate::{self, GateSettings, GateSweeper};
use logbook_webhook::http::HttpServer;
use logbook_webhook::lifecycle::{shutdown_on_signal, Shutdown};
use logbook_webhook::net::load_tls_config;
use logbook_webhook::observability::{self, metrics};

#[derive(Parser)]
#[command(name = "logbook-webhook")]
#[command(about = "Admits Logbook webhooks and triggers GitHub repository dispatches", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "LOGBOOK_WEBHOOK_CONFIG", default_value = "webhook.toml")]
    config: PathBuf,

    /// Do not reload the configuration file when it changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, from_file) = initial_config(&args.config)?;
    observability::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logbook-webhook starting");
    if !from_file {
        tracing::warn!(path = ?args.config, "Config file not found, using defaults and environment");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        webhook_path = %config.webhook.path,
        max_per_window = config.rate_limit.max_per_window,
        window_secs = config.rate_limit.window_secs,
        replay_ttl_secs = config.replay.ttl_secs,
        dispatch_target = %format!("{}/{}", config.dispatch.owner, config.dispatch.repo),
        secret_configured = config.webhook.secret.is_some(),
        token_configured = config.dispatch.token.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = gate::open_store(&config.storage)?;
    let gate = gate::spawn_gate(store, GateSettings::from_config(&config));

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));
    tokio::spawn(GateSweeper::new(gate.clone(), config.replay.sweep_interval_secs).run(shutdown.subscribe()));

    // The watcher must stay alive for updates to flow.
    let (config_updates, _watcher) = if from_file && !args.no_watch {
        let (watcher, rx) = ConfigWatcher::new(&args.config);
        match watcher.run() {
            Ok(w) => (rx, Some(w)),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                (mpsc::unbounded_channel().1, None)
            }
        }
    } else {
        (mpsc::unbounded_channel().1, None)
    };

    let bind_address: SocketAddr = config.listener.bind_address.parse()?;
    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config, gate);

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(bind_address, rustls, config_updates, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(bind_address).await?;
            server.run(listener, config_updates, shutdown.subscribe()).await?;
        }
    }

    shutdown.trigger();
    let lingering = shutdown.drain(Duration::from_secs(5)).await;
    if lingering > 0 {
        tracing::warn!(tasks = lingering, "Background tasks still running at exit");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load the config file, or fall back to defaults plus environment when it
/// does not exist. Returns whether a file was read.
fn initial_config(path: &Path) -> Result<(GateConfig, bool), ConfigError> {
    if path.exists() {
        return Ok((config::load_config(path)?, true));
    }

    let mut config = GateConfig::default();
    loader::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config::validate_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, false))
}
