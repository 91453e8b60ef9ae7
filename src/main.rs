//! # MAV Telemetry Logger
//!
//! Record live MAVLink attitude, battery and position telemetry to log files.
//!
//! Usage: `mav-telemetry-logger [config.toml]`

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use mav_telemetry_logger::app;
use mav_telemetry_logger::config::Config;

/// Main entry point for MAV Telemetry Logger
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging to stderr with tracing subscriber
///    - Load configuration (first argument, or built-in defaults)
///
/// 2. **Startup**
///    - Open the MAVLink link and wait for the vehicle's heartbeat
///    - Open the output files
///
/// 3. **Main Loop**
///    - Handlers merge attitude, battery and position into the shared state
///    - Output files are emptied, then a snapshot is added to each one every interval
///
/// 4. **Graceful Shutdown**
///    - Ctrl+C stops the loop and flushes the output files
///
/// # Errors
///
/// Exits with status 1 if:
/// - The configuration cannot be loaded or is invalid
/// - The link cannot be opened or no vehicle is discovered in time
/// - An output file cannot be opened
/// - The link fails while running
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO mav_telemetry_logger: MAV Telemetry Logger v0.1.0 starting...
/// INFO mav_telemetry_logger::app: Waiting for system to connect...
/// INFO mav_telemetry_logger::link::source: Attempt 1: no system detected yet
/// INFO mav_telemetry_logger::app: System connected, System ID: 1
/// INFO mav_telemetry_logger::app: Listening for attitude, battery, and GPS data...
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout and the output files carry no log lines
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_writer(writer)
        .init();

    info!("MAV Telemetry Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run().await {
        error!("{:#}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::load(&path).with_context(|| format!("Failed to load configuration from {}", path))?
        }
        None => Config::default(),
    };

    app::run(&config, shutdown_signal()).await?;
    Ok(())
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
