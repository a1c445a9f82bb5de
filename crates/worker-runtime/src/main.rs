//! # Fleet Worker
//!
//! Entry point: load configuration, install logging, start the worker and
//! run until interrupted or detached from its staker.

use anyhow::{Context, Result};
use fleet_discovery::BondingStatus;
use tracing::{error, info};

use worker_runtime::{build_runtime, load_config, telemetry, StartupError};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_logging().map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let config = load_config().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let runtime = build_runtime(config).context("Failed to wire worker")?;
    let identity = runtime.identity();
    let worker = match runtime.start().await {
        Ok(worker) => worker,
        Err(e) => {
            error!("Worker failed to start: {}", e);
            return Err(e.into());
        }
    };

    if worker.is_dry_run() {
        info!("Dry run complete");
        return Ok(());
    }

    let mut stopped = worker.stopped();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal");
        }
        _ = stopped.wait_for(|stop| *stop) => {}
    }

    let detached = worker.bonding_status() == Some(BondingStatus::Detached);
    worker.shutdown().await;

    if detached {
        return Err(StartupError::DetachedWorker { worker: identity }.into());
    }
    Ok(())
}
