//! Engine Telemetry Logger - Main Entry Point
//!
//! Usage: `telemetry-logger [CONFIG_FILE]`. The config file may also be
//! given through `TELEMETRY_CONFIG`.

use logger::{init_logging, run, AppConfig};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("TELEMETRY_CONFIG"))
        .map(PathBuf::from);

    let config = AppConfig::load(config_path.as_deref())?;
    init_logging(&config.log_level, config.log_format)?;

    info!("=== Engine Telemetry Logger v{} ===", env!("CARGO_PKG_VERSION"));
    if config.demo {
        info!("Demo mode: synthetic source every {} ms", config.synthetic.interval_ms);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, stopping");
                shutdown_tx.send_replace(true);
            }
            Err(e) => {
                error!("Cannot listen for Ctrl+C: {}", e);
                // Keep the sender alive so the session is not cancelled
                let _keep = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    let report = run(config, shutdown_rx).await?;
    info!("Session report: {}", serde_json::to_string(&report)?);

    Ok(())
}
