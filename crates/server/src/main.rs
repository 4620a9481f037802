//! Sluice gateway binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use sluice_backend::{spawn_reaper, Services, REAP_INTERVAL};
use sluice_core::GatewayConfig;
use sluice_server::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sluice - a write-coordination gateway
#[derive(Parser, Debug)]
#[command(name = "sluiced")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SLUICE_CONFIG",
        default_value = "/etc/sluice/gateway.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sluice v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: GatewayConfig = figment
        .merge(Env::prefixed("SLUICE_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    let services = Arc::new(
        Services::start(config.clone())
            .await
            .context("failed to start backend services")?,
    );
    tracing::info!("Backend services started");

    let reaper = spawn_reaper(services.leases.clone(), REAP_INTERVAL);
    tracing::info!("Lease reaper spawned");

    let app = create_router(AppState::new(services.clone()));

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the pool and close the store before exiting.
    reaper.abort();
    services
        .stop()
        .await
        .context("failed to stop backend services")?;
    tracing::info!("Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
}
