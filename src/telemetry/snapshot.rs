//! # Snapshotter
//!
//! Periodically copies the telemetry state and appends it to the sinks. The
//! copy is taken in one critical section; formatting and file I/O happen after
//! the lock is released, on tokio's blocking pool.

use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::sink::{Sinks, TIMESTAMP_FORMAT};
use super::state::{SharedTelemetry, TelemetryState};
use crate::error::{Result, TelemetryLoggerError};

/// Default time between snapshots
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(500);

/// Single periodic reader of the telemetry state; owns the sinks
#[derive(Debug)]
pub struct Snapshotter<W: Write> {
    state: SharedTelemetry,
    sinks: Sinks<W>,
    interval: Duration,
    written: u64,
}

impl<W: Write> Snapshotter<W> {
    pub fn new(state: SharedTelemetry, sinks: Sinks<W>, interval: Duration) -> Self {
        Self {
            state,
            sinks,
            interval,
            written: 0,
        }
    }

    /// Take one snapshot stamped with the current local time
    pub fn tick(&mut self) -> Result<TelemetryState> {
        self.tick_at(Local::now().naive_local())
    }

    /// Take one snapshot stamped with `at`
    ///
    /// Returns the state that was written.
    ///
    /// # Errors
    ///
    /// Returns `SinkWrite` if any sink rejects the record
    pub fn tick_at(&mut self, at: NaiveDateTime) -> Result<TelemetryState> {
        let snapshot = self.state.snapshot();

        self.sinks.write_snapshot(&snapshot, &format_timestamp(at))?;
        self.written += 1;
        Ok(snapshot)
    }

    /// Snapshots written successfully so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn sinks(&self) -> &Sinks<W> {
        &self.sinks
    }
}

impl<W: Write + Send + 'static> Snapshotter<W> {
    /// Snapshot every interval until `shutdown` resolves
    ///
    /// Missed ticks are not caught up. A failed write is logged and the loop
    /// carries on with the next tick. Returns the flushed sinks.
    ///
    /// # Errors
    ///
    /// Returns `SinkWrite` if the final flush fails or a write task panics
    pub async fn run_until<F>(self, shutdown: F) -> Result<Sinks<W>>
    where
        F: Future<Output = ()>,
    {
        let Snapshotter { state, mut sinks, interval: period, mut written } = self;

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Writing snapshots every {}ms", period.as_millis());

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                _ = timer.tick() => {
                    let snapshot = state.snapshot();
                    let timestamp = format_timestamp(Local::now().naive_local());

                    let (returned, result) = write_blocking(sinks, snapshot, timestamp).await?;
                    sinks = returned;
                    match result {
                        Ok(()) => written += 1,
                        Err(e) => warn!("Skipping snapshot: {}", e),
                    }
                }
            }
        }

        debug!("Snapshotter stopping after {} snapshots", written);
        sinks.flush()?;
        Ok(sinks)
    }
}

fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Write one snapshot on the blocking pool, handing the sinks back
async fn write_blocking<W: Write + Send + 'static>(
    mut sinks: Sinks<W>,
    snapshot: TelemetryState,
    timestamp: String,
) -> Result<(Sinks<W>, Result<()>)> {
    tokio::task::spawn_blocking(move || {
        let result = sinks.write_snapshot(&snapshot, &timestamp);
        (sinks, result)
    })
    .await
    .map_err(|e| TelemetryLoggerError::SinkWrite(io::Error::new(io::ErrorKind::Other, e.to_string())))
}
