//! # Application
//!
//! Startup sequence and main loop shared by the binary and the integration
//! tests.
//!
//! 1. Open the link named by the configuration
//! 2. Wait for a vehicle heartbeat (bounded)
//! 3. Open the output files
//! 4. Subscribe the telemetry handlers and start the reader
//! 5. Snapshot until shutdown or until the link fails

use std::future::Future;

use tokio::task::JoinError;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Result, TelemetryLoggerError};
use crate::link::{open_link, LinkIO, SourceIdentity, TelemetrySource};
use crate::telemetry::{register_handlers, SharedTelemetry, Sinks, Snapshotter};

/// Run the logger until `shutdown` resolves
///
/// # Errors
///
/// - `InvalidUrl` / `Transport`: the link could not be opened
/// - `DiscoveryTimeout`: no vehicle heartbeat within the discovery window
/// - `SinkOpen`: an output file could not be opened
/// - `Transport`: the link failed while running
pub async fn run<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let url = config.link.connection_url()?;
    let link = open_link(&url).await?;
    run_with_link(config, link, shutdown).await
}

/// Run the logger over an already opened link
pub async fn run_with_link<F>(config: &Config, link: Box<dyn LinkIO>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut source = TelemetrySource::new(link, SourceIdentity::from(&config.link));

    info!("Waiting for system to connect...");
    let system = tokio::select! {
        found = source.wait_for_system(config.link.discovery_attempts, config.link.discovery_interval()) => found?,
        _ = &mut shutdown => {
            info!("Shutdown requested before a system connected");
            return Ok(());
        }
    };
    info!("System connected, System ID: {}", system.system_id);

    let sinks = Sinks::open(config.output.path())?;
    let state = SharedTelemetry::new();
    register_handlers(&mut source, &state);

    info!("Listening for attitude, battery, and GPS data...");
    let mut reader = tokio::spawn(source.run());

    let mut link_failure = None;
    let stop = async {
        tokio::select! {
            _ = &mut shutdown => info!("Shutting down..."),
            finished = &mut reader => {
                let err = source_failure(finished);
                error!("Telemetry source stopped: {}", err);
                link_failure = Some(err);
            }
        }
    };

    let snapshotter = Snapshotter::new(state, sinks, config.snapshot.interval());
    let result = snapshotter.run_until(stop).await;
    reader.abort();

    if let Some(err) = link_failure {
        return Err(err);
    }
    result.map(drop)
}

fn source_failure(finished: std::result::Result<Result<()>, JoinError>) -> TelemetryLoggerError {
    match finished {
        Ok(Err(e)) => e,
        Ok(Ok(())) => TelemetryLoggerError::Transport("Telemetry source ended".to_string()),
        Err(e) => TelemetryLoggerError::Transport(format!("Telemetry source task failed: {}", e)),
    }
}
