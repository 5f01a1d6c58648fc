//! muninnd — Muninn daemon.
//!
//! Loads configuration, installs the tracing subscriber and (optionally)
//! the prometheus exporter, then runs the [`UpdateProxy`] until SIGINT
//! or SIGTERM.

use std::net::SocketAddr;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use muninn::{Config, ProxyError, UpdateProxy};

/// Muninn daemon — caching reverse proxy for update-graph APIs.
#[derive(Parser)]
#[command(name = "muninnd")]
#[command(version = muninn::PKG_VERSION)]
#[command(about = "Caching reverse proxy for Cincinnati update-graph APIs")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, env = "MUNINN_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(args.config.as_deref())?;

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.listen.parse().map_err(|e| {
            ProxyError::Configuration(format!(
                "invalid metrics listen address {:?}: {e}",
                config.metrics.listen
            ))
        })?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(address = %addr, "metrics exporter listening");
    }

    info!(version = muninn::version_string(), "muninnd starting");

    let proxy = UpdateProxy::new(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    proxy.run(shutdown_rx).await?;

    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
