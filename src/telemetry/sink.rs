//! # Output Sinks
//!
//! Text files emptied when the logger starts, then extended by one line per
//! snapshot:
//!
//! - `output.txt`: `pitch|roll|yaw|<v1>|...|<vk>|total|lat|lon|alt|`, known cells only
//! - `Altitude.txt`, `yaw.txt`, `roll.txt`: `<timestamp> <value>`
//! - `gps.txt`: `<timestamp> <lat>,<lon>`
//!
//! Numbers are written in shortest round-trip form with a fractional part
//! (`90.0`, `3.75`, `-122.0`). Timestamps are local time `YYYY-MM-DD HH:MM:SS`.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use super::state::TelemetryState;
use crate::codec::protocol::BATTERY_CELL_COUNT;
use crate::error::{Result, TelemetryLoggerError};

pub const COMBINED_FILE: &str = "output.txt";
pub const ALTITUDE_FILE: &str = "Altitude.txt";
pub const YAW_FILE: &str = "yaw.txt";
pub const ROLL_FILE: &str = "roll.txt";
pub const GPS_FILE: &str = "gps.txt";

/// Every file the logger writes, in the order they are opened
pub const OUTPUT_FILES: [&str; 5] = [COMBINED_FILE, ALTITUDE_FILE, YAW_FILE, ROLL_FILE, GPS_FILE];

/// Timestamp layout for per-field lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields in a combined record besides the voltages
const FIXED_FIELDS: usize = 7;

/// Format a value for the log files
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}

/// Format the combined pipe-delimited record (without line terminator)
pub fn format_combined_record(state: &TelemetryState) -> String {
    let mut record = String::with_capacity(128);

    for value in [state.attitude.pitch_deg, state.attitude.roll_deg, state.attitude.yaw_deg] {
        let _ = write!(record, "{:?}|", value);
    }
    for volts in state.known_voltages() {
        let _ = write!(record, "{:?}|", volts);
    }
    for value in [
        state.total_voltage(),
        state.position.latitude_deg,
        state.position.longitude_deg,
        state.position.altitude_m,
    ] {
        let _ = write!(record, "{:?}|", value);
    }

    record
}

/// Format a per-field line (without line terminator)
pub fn format_field_line(timestamp: &str, value: f64) -> String {
    format!("{} {:?}", timestamp, value)
}

/// Format a position line (without line terminator)
pub fn format_position_line(timestamp: &str, latitude_deg: f64, longitude_deg: f64) -> String {
    format!("{} {:?},{:?}", timestamp, latitude_deg, longitude_deg)
}

/// The output writers, owned by the snapshotter
#[derive(Debug)]
pub struct Sinks<W: Write> {
    pub combined: W,
    pub altitude: W,
    pub yaw: W,
    pub roll: W,
    pub gps: W,
}

fn open_truncated(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|source| TelemetryLoggerError::SinkOpen {
            path: path.to_path_buf(),
            source,
        })
}

impl Sinks<BufWriter<File>> {
    /// Create every output file in `dir`, emptying any left by an earlier run
    ///
    /// # Errors
    ///
    /// Returns `SinkOpen` naming the first file that could not be opened
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|source| TelemetryLoggerError::SinkOpen {
            path: dir.to_path_buf(),
            source,
        })?;

        let sinks = Self {
            combined: open_truncated(&dir.join(COMBINED_FILE))?,
            altitude: open_truncated(&dir.join(ALTITUDE_FILE))?,
            yaw: open_truncated(&dir.join(YAW_FILE))?,
            roll: open_truncated(&dir.join(ROLL_FILE))?,
            gps: open_truncated(&dir.join(GPS_FILE))?,
        };

        info!("Writing telemetry to {}", dir.display());
        Ok(sinks)
    }
}

impl<W: Write> Sinks<W> {
    /// Append one snapshot to every sink
    ///
    /// The combined record is flushed immediately; per-field sinks are buffered.
    ///
    /// # Errors
    ///
    /// Every sink is attempted even if an earlier one fails; the first
    /// failure is returned as `SinkWrite`
    pub fn write_snapshot(&mut self, state: &TelemetryState, timestamp: &str) -> Result<()> {
        self.write_all(state, timestamp).map_err(TelemetryLoggerError::SinkWrite)
    }

    fn write_all(&mut self, state: &TelemetryState, timestamp: &str) -> io::Result<()> {
        let results = [
            writeln!(self.combined, "{}", format_combined_record(state)).and_then(|()| self.combined.flush()),
            writeln!(self.altitude, "{}", format_field_line(timestamp, state.position.altitude_m)),
            writeln!(self.yaw, "{}", format_field_line(timestamp, state.attitude.yaw_deg)),
            writeln!(self.roll, "{}", format_field_line(timestamp, state.attitude.roll_deg)),
            writeln!(
                self.gps,
                "{}",
                format_position_line(timestamp, state.position.latitude_deg, state.position.longitude_deg)
            ),
        ];
        results.into_iter().collect()
    }

    /// Flush every sink, returning the first failure
    pub fn flush(&mut self) -> Result<()> {
        [&mut self.combined, &mut self.altitude, &mut self.yaw, &mut self.roll, &mut self.gps]
            .into_iter()
            .map(|sink| sink.flush())
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<io::Result<()>>()
            .map_err(TelemetryLoggerError::SinkWrite)
    }
}

/// A combined record read back from `output.txt`
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRecord {
    pub pitch_deg: f64,
    pub roll_deg: f64,
    pub yaw_deg: f64,
    /// Known cell voltages only
    pub voltages: Vec<f64>,
    pub total_voltage: f64,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

impl FromStr for CombinedRecord {
    type Err = TelemetryLoggerError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let body = line
            .strip_suffix('|')
            .ok_or_else(|| TelemetryLoggerError::Record(format!("missing trailing '|': {}", line)))?;

        let values = body
            .split('|')
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|_| TelemetryLoggerError::Record(format!("bad number '{}'", field)))
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.len() < FIXED_FIELDS || values.len() > FIXED_FIELDS + BATTERY_CELL_COUNT {
            return Err(TelemetryLoggerError::Record(format!(
                "expected {} to {} fields, got {}",
                FIXED_FIELDS,
                FIXED_FIELDS + BATTERY_CELL_COUNT,
                values.len()
            )));
        }

        let cell_count = values.len() - FIXED_FIELDS;
        let tail = &values[3 + cell_count..];

        Ok(Self {
            pitch_deg: values[0],
            roll_deg: values[1],
            yaw_deg: values[2],
            voltages: values[3..3 + cell_count].to_vec(),
            total_voltage: tail[0],
            latitude_deg: tail[1],
            longitude_deg: tail[2],
            altitude_m: tail[3],
        })
    }
}

/// Read the most recent record from a combined output file
///
/// Returns `Ok(None)` if the file holds no records yet.
pub fn read_last_record(path: &Path) -> Result<Option<CombinedRecord>> {
    let contents = fs::read_to_string(path)?;

    contents
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(str::parse)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::protocol::{Attitude, GlobalPosition};

    fn sample_state() -> TelemetryState {
        let mut state = TelemetryState {
            attitude: Attitude { roll_deg: 0.0, pitch_deg: 90.0, yaw_deg: -45.5 },
            position: GlobalPosition { latitude_deg: 37.3, longitude_deg: -122.0, altitude_m: 15.0 },
            ..TelemetryState::default()
        };
        state.battery[0] = Some(3.7);
        state.battery[2] = Some(3.75);
        state
    }

    fn memory_sinks() -> Sinks<Vec<u8>> {
        Sinks {
            combined: Vec::new(),
            altitude: Vec::new(),
            yaw: Vec::new(),
            roll: Vec::new(),
            gps: Vec::new(),
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(90.0), "90.0");
        assert_eq!(format_value(-122.0), "-122.0");
        assert_eq!(format_value(3.75), "3.75");
        assert_eq!(format_value(0.0), "0.0");
    }

    #[test]
    fn test_combined_record_layout() {
        assert_eq!(
            format_combined_record(&sample_state()),
            "90.0|0.0|-45.5|3.7|3.75|7.45|37.3|-122.0|15.0|"
        );
    }

    #[test]
    fn test_combined_record_without_known_cells() {
        assert_eq!(
            format_combined_record(&TelemetryState::default()),
            "0.0|0.0|0.0|0.0|0.0|0.0|0.0|"
        );
    }

    #[test]
    fn test_combined_record_total_is_exact() {
        let mut state = TelemetryState::default();
        state.battery[..3].fill(Some(4.1));

        let record = format_combined_record(&state);
        assert!(record.contains("|4.1|4.1|4.1|12.3|"), "unexpected record {}", record);
    }

    #[test]
    fn test_combined_record_is_stable() {
        let state = sample_state();
        assert_eq!(format_combined_record(&state), format_combined_record(&state));
    }

    #[test]
    fn test_field_lines() {
        assert_eq!(format_field_line("2024-05-01 12:00:00", 15.0), "2024-05-01 12:00:00 15.0");
        assert_eq!(
            format_position_line("2024-05-01 12:00:00", 37.3, -122.0),
            "2024-05-01 12:00:00 37.3,-122.0"
        );
    }

    #[test]
    fn test_write_snapshot_to_every_sink() {
        let mut sinks = memory_sinks();
        sinks.write_snapshot(&sample_state(), "2024-05-01 12:00:00").unwrap();

        assert_eq!(
            String::from_utf8(sinks.combined).unwrap(),
            "90.0|0.0|-45.5|3.7|3.75|7.45|37.3|-122.0|15.0|\n"
        );
        assert_eq!(String::from_utf8(sinks.altitude).unwrap(), "2024-05-01 12:00:00 15.0\n");
        assert_eq!(String::from_utf8(sinks.yaw).unwrap(), "2024-05-01 12:00:00 -45.5\n");
        assert_eq!(String::from_utf8(sinks.roll).unwrap(), "2024-05-01 12:00:00 0.0\n");
        assert_eq!(String::from_utf8(sinks.gps).unwrap(), "2024-05-01 12:00:00 37.3,-122.0\n");
    }

    /// Writer that either records everything or fails every write
    #[derive(Default)]
    struct TestWriter {
        fail: bool,
        written: Vec<u8>,
    }

    impl TestWriter {
        fn failing() -> Self {
            Self { fail: true, written: Vec::new() }
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_sink_write_error() {
        let mut sinks = Sinks {
            combined: TestWriter::failing(),
            altitude: TestWriter::failing(),
            yaw: TestWriter::failing(),
            roll: TestWriter::failing(),
            gps: TestWriter::failing(),
        };

        let result = sinks.write_snapshot(&sample_state(), "2024-05-01 12:00:00");
        assert!(matches!(result, Err(TelemetryLoggerError::SinkWrite(_))));
    }

    #[test]
    fn test_failed_sink_does_not_skip_the_others() {
        let mut sinks = Sinks {
            combined: TestWriter::failing(),
            altitude: TestWriter::default(),
            yaw: TestWriter::default(),
            roll: TestWriter::failing(),
            gps: TestWriter::default(),
        };

        let result = sinks.write_snapshot(&sample_state(), "2024-05-01 12:00:00");
        assert!(matches!(result, Err(TelemetryLoggerError::SinkWrite(_))));

        assert_eq!(String::from_utf8_lossy(&sinks.altitude.written), "2024-05-01 12:00:00 15.0\n");
        assert_eq!(String::from_utf8_lossy(&sinks.yaw.written), "2024-05-01 12:00:00 -45.5\n");
        assert_eq!(String::from_utf8_lossy(&sinks.gps.written), "2024-05-01 12:00:00 37.3,-122.0\n");
    }

    #[test]
    fn test_open_creates_files_and_second_open_starts_empty() {
        let dir = tempfile::tempdir().unwrap();

        let mut sinks = Sinks::open(dir.path()).unwrap();
        sinks.write_snapshot(&sample_state(), "2024-05-01 12:00:00").unwrap();
        sinks.flush().unwrap();
        drop(sinks);

        for name in OUTPUT_FILES {
            let contents = fs::read_to_string(dir.path().join(name)).unwrap();
            assert_eq!(contents.lines().count(), 1, "{} should hold the first run", name);
        }

        let sinks = Sinks::open(dir.path()).unwrap();
        drop(sinks);

        for name in OUTPUT_FILES {
            let contents = fs::read_to_string(dir.path().join(name)).unwrap();
            assert!(contents.is_empty(), "{} should be emptied by a second open", name);
        }
    }

    #[test]
    fn test_open_fails_for_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"").unwrap();

        let result = Sinks::open(&blocker);
        assert!(matches!(result, Err(TelemetryLoggerError::SinkOpen { .. })));
    }

    #[test]
    fn test_parse_combined_record() {
        let record: CombinedRecord = "90.0|0.0|-45.5|3.7|3.75|7.45|37.3|-122.0|15.0|".parse().unwrap();

        assert_eq!(record.pitch_deg, 90.0);
        assert_eq!(record.yaw_deg, -45.5);
        assert_eq!(record.voltages, vec![3.7, 3.75]);
        assert_eq!(record.total_voltage, 7.45);
        assert_eq!(record.latitude_deg, 37.3);
        assert_eq!(record.longitude_deg, -122.0);
        assert_eq!(record.altitude_m, 15.0);
    }

    #[test]
    fn test_parse_record_without_voltages() {
        let record: CombinedRecord = "1.0|2.0|3.0|0.0|4.0|5.0|6.0|".parse().unwrap();
        assert!(record.voltages.is_empty());
        assert_eq!(record.altitude_m, 6.0);
    }

    #[test]
    fn test_parse_rejects_malformed_records() {
        for line in ["1.0|2.0|3.0", "1.0|2.0|3.0|4.0|", "1.0|x|3.0|0.0|4.0|5.0|6.0|", ""] {
            assert!(line.parse::<CombinedRecord>().is_err(), "{:?} should be rejected", line);
        }
    }

    #[test]
    fn test_read_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COMBINED_FILE);

        fs::write(&path, "").unwrap();
        assert_eq!(read_last_record(&path).unwrap(), None);

        fs::write(&path, "1.0|2.0|3.0|0.0|4.0|5.0|6.0|\n90.0|0.0|0.0|3.7|3.7|0.0|0.0|0.0|\n\n").unwrap();
        let record = read_last_record(&path).unwrap().unwrap();
        assert_eq!(record.pitch_deg, 90.0);
        assert_eq!(record.voltages, vec![3.7]);
    }
}
