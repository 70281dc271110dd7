//! vos-sync-server binary
//!
//! Loads settings, builds the [`SyncService`] and connects it to NATS.
//!
//! ## Configuration
//!
//! | Flag                        | Env                              | Default                 |
//! |-----------------------------|----------------------------------|-------------------------|
//! | `--config`                  | `VOS_SYNC_CONFIG`                | *(none)*                |
//! | `--endpoint`                | `VOS_SYNC_ENDPOINT`              | `nats://localhost:4222` |
//! | `--heartbeat-period-secs`   | `VOS_SYNC_HEARTBEAT_PERIOD_SECS` | `5`                     |
//! | `--heartbeat-timeout-secs`  | `VOS_SYNC_HEARTBEAT_TIMEOUT_SECS`| `250`                   |
//!
//! Flags override the config file and `VOS_SYNC__*` variables.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vos_sync::{settings, SyncBusAgent, SyncService};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "vos-sync-server", about = "VOS Synchronization Service", version)]
struct Args {
    /// Settings file (TOML, YAML or JSON)
    #[arg(long, env = "VOS_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// NATS endpoint
    #[arg(long, env = "VOS_SYNC_ENDPOINT")]
    endpoint: Option<String>,

    /// Seconds between heartbeat sweeps
    #[arg(long, env = "VOS_SYNC_HEARTBEAT_PERIOD_SECS")]
    heartbeat_period_secs: Option<u64>,

    /// Seconds of silence before a client is removed
    #[arg(long, env = "VOS_SYNC_HEARTBEAT_TIMEOUT_SECS")]
    heartbeat_timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vos_sync=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut settings = settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(endpoint) = args.endpoint {
        settings.bus.endpoint = endpoint;
    }
    if let Some(period) = args.heartbeat_period_secs {
        settings.service.heartbeat_period_secs = period;
    }
    if let Some(timeout) = args.heartbeat_timeout_secs {
        settings.service.heartbeat_timeout_secs = timeout;
    }
    settings.validate().context("Invalid settings")?;

    log::info!(
        "Starting vos-sync-server (endpoint='{}', heartbeat every {}s, timeout {}s, {} static sessions)",
        settings.bus.endpoint,
        settings.service.heartbeat_period_secs,
        settings.service.heartbeat_timeout_secs,
        settings.service.sessions.len(),
    );

    let service = Arc::new(SyncService::new(settings.service));

    SyncBusAgent::new(settings.bus, service).run().await
}
