//! # Telemetry State
//!
//! Latest known value of every tracked field, shared between the message
//! handlers and the snapshotter.
//!
//! One mutex covers the whole record. Attitude, battery and position arrive in
//! independent messages, and a snapshot must see each group as written by a
//! single decode, so there are no per-field locks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::codec::protocol::{Attitude, BatteryStatus, GlobalPosition, BATTERY_CELL_COUNT};

/// Latest value of every tracked field
///
/// Battery cells are `None` until a reading for that cell arrives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryState {
    pub attitude: Attitude,
    pub battery: [Option<f64>; BATTERY_CELL_COUNT],
    pub position: GlobalPosition,
}

impl TelemetryState {
    /// Merge reported cells, leaving unreported ones untouched
    pub fn merge_battery(&mut self, status: &BatteryStatus) {
        for (slot, reading) in self.battery.iter_mut().zip(status.cells.iter()) {
            if let Some(volts) = reading {
                *slot = Some(*volts);
            }
        }
    }

    /// Known cell voltages in cell order
    pub fn known_voltages(&self) -> impl Iterator<Item = f64> + '_ {
        self.battery.iter().flatten().copied()
    }

    /// Sum of known cell voltages; unknown cells contribute nothing
    ///
    /// Cells are reported in whole millivolts, so the sum is taken in
    /// millivolts and converted once.
    pub fn total_voltage(&self) -> f64 {
        let millivolts: i64 = self
            .known_voltages()
            .map(|volts| (volts * 1000.0).round() as i64)
            .sum();
        millivolts as f64 / 1000.0
    }
}

/// Shared handle to the telemetry state
///
/// Cloning is cheap and every clone refers to the same record.
#[derive(Debug, Clone, Default)]
pub struct SharedTelemetry {
    inner: Arc<Mutex<TelemetryState>>,
}

impl SharedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    // Updates are whole-group assignments, so a poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, TelemetryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_attitude(&self, attitude: Attitude) {
        self.lock().attitude = attitude;
    }

    pub fn merge_battery(&self, status: &BatteryStatus) {
        self.lock().merge_battery(status);
    }

    pub fn set_position(&self, position: GlobalPosition) {
        self.lock().position = position;
    }

    /// Copy of every field taken under one lock acquisition
    pub fn snapshot(&self) -> TelemetryState {
        *self.lock()
    }
}
