// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Forwarder daemon.
//!
//! Reads JSON-lines readings from stdin, configuration from the
//! environment, and runs until Ctrl-C. Exits with status 1 if the
//! configuration is invalid or the local store cannot be opened.

use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use telemetry_forwarder::{
    AlwaysAvailable, AvailabilityProbe, Backlog, ForwarderConfig, HttpDeliveryClient, HttpProbe,
    JsonLinesSource, SqliteStore, SyncEngine,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = match ForwarderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    if config.server_url.is_empty() {
        warn!("SERVER_URL is not set, every delivery will fail and samples will pile up locally");
    }

    let store = match SqliteStore::connect(&config.db_path).await {
        Ok(store) => {
            info!(path = store.path(), "Local store opened");
            store
        }
        Err(e) => {
            error!(path = %config.db_path, error = %e, "Cannot open local store");
            return ExitCode::FAILURE;
        }
    };
    let backlog = match Backlog::open(Arc::new(store)).await {
        Ok(backlog) => backlog,
        Err(e) => {
            error!(path = %config.db_path, error = %e, "Cannot initialize local store");
            return ExitCode::FAILURE;
        }
    };

    let client = match HttpDeliveryClient::new(config.collector_url(), config.device_id.clone(), config.request_timeout()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Cannot build collector client");
            return ExitCode::FAILURE;
        }
    };

    let probe: Arc<dyn AvailabilityProbe> = match config.probe_url.as_deref() {
        Some(url) => match HttpProbe::new(url, config.probe_timeout()) {
            Ok(probe) => Arc::new(probe),
            Err(e) => {
                error!(error = %e, "Cannot build reachability probe");
                return ExitCode::FAILURE;
            }
        },
        None => {
            info!("Reachability probing disabled");
            Arc::new(AlwaysAvailable)
        }
    };

    let source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()), config.speed_factor);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Keep the sender alive; dropping it would stop the engine.
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut engine = SyncEngine::new(config, backlog, Arc::new(client), probe, Box::new(source));
    engine.run(shutdown_rx).await;

    ExitCode::SUCCESS
}
