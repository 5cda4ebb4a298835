use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ImportError, Result};

// ── Measurement kinds ─────────────────────────────────────────────────────────

/// The sensor family a column comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Gps,
    Barometer,
    HeartRate,
    Motion,
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MeasurementKind::Gps => "gps",
            MeasurementKind::Barometer => "barometer",
            MeasurementKind::HeartRate => "heart rate",
            MeasurementKind::Motion => "motion",
        })
    }
}

/// One fixed column of the normalized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Latitude,
    Longitude,
    GpsAltitude,
    Pressure,
    BaroAltitude,
    HeartRate,
    Speed,
    Cadence,
    Temperature,
    Distance,
}

impl Column {
    /// Every measurement column, in table order.
    pub const ALL: [Column; 10] = [
        Column::Latitude,
        Column::Longitude,
        Column::GpsAltitude,
        Column::Pressure,
        Column::BaroAltitude,
        Column::HeartRate,
        Column::Speed,
        Column::Cadence,
        Column::Temperature,
        Column::Distance,
    ];

    /// Column name as it appears in table output.
    pub fn name(self) -> &'static str {
        match self {
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::GpsAltitude => "gps_altitude",
            Column::Pressure => "pressure",
            Column::BaroAltitude => "baro_altitude",
            Column::HeartRate => "heart_rate",
            Column::Speed => "speed",
            Column::Cadence => "cadence",
            Column::Temperature => "temperature",
            Column::Distance => "distance",
        }
    }

    /// The measurement column called `name`, if any.
    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn kind(self) -> MeasurementKind {
        match self {
            Column::Latitude | Column::Longitude | Column::GpsAltitude => MeasurementKind::Gps,
            Column::Pressure | Column::BaroAltitude => MeasurementKind::Barometer,
            Column::HeartRate => MeasurementKind::HeartRate,
            Column::Speed | Column::Cadence | Column::Temperature | Column::Distance => {
                MeasurementKind::Motion
            }
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single value pulled out of a raw record, resolved once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// A complete GPS fix. Half a fix is never represented.
    Position { latitude: f64, longitude: f64 },
    GpsAltitude(f64),
    Pressure(f64),
    BaroAltitude(f64),
    HeartRate(f64),
    Speed(f64),
    Cadence(f64),
    Temperature(f64),
    Distance(f64),
    /// R-R intervals in milliseconds, in recording order.
    Ibi(Vec<f64>),
}

impl Measurement {
    /// The `(column, value)` cells this measurement fills in a [`Sample`].
    ///
    /// R-R intervals are not row cells and yield nothing.
    pub fn cells(&self) -> Vec<(Column, f64)> {
        match *self {
            Measurement::Position {
                latitude,
                longitude,
            } => vec![(Column::Latitude, latitude), (Column::Longitude, longitude)],
            Measurement::GpsAltitude(v) => vec![(Column::GpsAltitude, v)],
            Measurement::Pressure(v) => vec![(Column::Pressure, v)],
            Measurement::BaroAltitude(v) => vec![(Column::BaroAltitude, v)],
            Measurement::HeartRate(v) => vec![(Column::HeartRate, v)],
            Measurement::Speed(v) => vec![(Column::Speed, v)],
            Measurement::Cadence(v) => vec![(Column::Cadence, v)],
            Measurement::Temperature(v) => vec![(Column::Temperature, v)],
            Measurement::Distance(v) => vec![(Column::Distance, v)],
            Measurement::Ibi(_) => Vec::new(),
        }
    }
}

// ── Sample ────────────────────────────────────────────────────────────────────

/// One recorded instant. Every measurement is either a value or `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    /// Absolute barometric pressure as reported by the device.
    pub pressure: Option<f64>,
    pub baro_altitude: Option<f64>,
    pub heart_rate: Option<f64>,
    pub speed: Option<f64>,
    pub cadence: Option<f64>,
    pub temperature: Option<f64>,
    pub distance: Option<f64>,
}

impl Sample {
    /// A sample with every measurement absent.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latitude: None,
            longitude: None,
            gps_altitude: None,
            pressure: None,
            baro_altitude: None,
            heart_rate: None,
            speed: None,
            cadence: None,
            temperature: None,
            distance: None,
        }
    }

    pub fn get(&self, column: Column) -> Option<f64> {
        match column {
            Column::Latitude => self.latitude,
            Column::Longitude => self.longitude,
            Column::GpsAltitude => self.gps_altitude,
            Column::Pressure => self.pressure,
            Column::BaroAltitude => self.baro_altitude,
            Column::HeartRate => self.heart_rate,
            Column::Speed => self.speed,
            Column::Cadence => self.cadence,
            Column::Temperature => self.temperature,
            Column::Distance => self.distance,
        }
    }

    fn slot(&mut self, column: Column) -> &mut Option<f64> {
        match column {
            Column::Latitude => &mut self.latitude,
            Column::Longitude => &mut self.longitude,
            Column::GpsAltitude => &mut self.gps_altitude,
            Column::Pressure => &mut self.pressure,
            Column::BaroAltitude => &mut self.baro_altitude,
            Column::HeartRate => &mut self.heart_rate,
            Column::Speed => &mut self.speed,
            Column::Cadence => &mut self.cadence,
            Column::Temperature => &mut self.temperature,
            Column::Distance => &mut self.distance,
        }
    }

    /// Store `value` in `column`, returning the value it replaced.
    pub fn set(&mut self, column: Column, value: f64) -> Option<f64> {
        self.slot(column).replace(value)
    }

    /// Fold `other` into `self` following the same-instant merge rule:
    /// present values in `other` win, absent values never clear `self`.
    ///
    /// Returns the columns where two different present values collided.
    pub fn merge_from(&mut self, other: &Sample) -> Vec<Column> {
        let mut conflicts = Vec::new();
        for column in Column::ALL {
            if let Some(incoming) = other.get(column) {
                if let Some(previous) = self.set(column, incoming) {
                    if previous != incoming {
                        conflicts.push(column);
                    }
                }
            }
        }
        conflicts
    }

    /// `true` when at least one measurement cell is present.
    pub fn has_measurements(&self) -> bool {
        Column::ALL.iter().any(|c| self.get(*c).is_some())
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Session-level facts recorded alongside the samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    /// Activity type, e.g. `"running"` or `"sleep"`.
    pub activity: String,
    /// Start of the recording. Falls back to the first sample when unknown.
    pub start_time: Option<DateTime<Utc>>,
    /// Device name or serial number.
    pub device: Option<String>,
    /// File the session was imported from.
    pub source: Option<PathBuf>,
}

fn default_activity() -> String {
    "unknown".to_string()
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            activity: default_activity(),
            start_time: None,
            device: None,
            source: None,
        }
    }
}

/// One heartbeat reconstructed from R-R intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Beat {
    pub timestamp: DateTime<Utc>,
    /// Interval to the previous beat, in milliseconds.
    pub ibi_ms: f64,
}

impl Beat {
    /// Instantaneous heart rate in beats per minute.
    pub fn bpm(&self) -> Option<f64> {
        (self.ibi_ms > 0.0).then(|| 60_000.0 / self.ibi_ms)
    }
}

/// A complete imported recording. Immutable once built.
#[derive(Debug, Clone)]
pub struct Session {
    metadata: SessionMetadata,
    samples: Vec<Sample>,
    beats: Vec<Beat>,
}

impl Session {
    /// Build a session from samples already in strictly increasing
    /// timestamp order.
    ///
    /// Fails with [`ImportError::EmptySession`] when `samples` is empty.
    /// When `metadata.start_time` is unset, the first sample's timestamp
    /// is used.
    pub fn new(mut metadata: SessionMetadata, samples: Vec<Sample>, beats: Vec<Beat>) -> Result<Self> {
        let first = samples.first().ok_or(ImportError::EmptySession)?;
        debug_assert!(
            samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp),
            "samples must be strictly increasing"
        );
        if metadata.start_time.is_none() {
            metadata.start_time = Some(first.timestamp);
        }
        Ok(Self {
            metadata,
            samples,
            beats,
        })
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    /// Timestamp of the last sample.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Seconds between the first and the last sample.
    pub fn duration_seconds(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        }
    }

    /// Mean heart rate over all reconstructed beats.
    pub fn mean_beat_bpm(&self) -> Option<f64> {
        let bpms: Vec<f64> = self.beats.iter().filter_map(Beat::bpm).collect();
        if bpms.is_empty() {
            None
        } else {
            Some(bpms.iter().sum::<f64>() / bpms.len() as f64)
        }
    }

    /// Build the caller-owned columnar table.
    pub fn to_table(&self) -> Table {
        Table::from_samples(&self.samples)
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// A named column of the table. `None` cells mean "no value".
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Normalized, timestamp-indexed output with a fixed measurement schema.
///
/// Every [`Column`] is always present, even when entirely absent. Derived
/// columns may be appended after the measurement columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<TableColumn>,
}

impl Table {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let timestamps = samples.iter().map(|s| s.timestamp).collect();
        let columns = Column::ALL
            .iter()
            .map(|&c| TableColumn {
                name: c.name().to_string(),
                values: samples.iter().map(|s| s.get(c)).collect(),
            })
            .collect();
        Self {
            timestamps,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name, measurement or derived.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Values of a fixed measurement column.
    pub fn measurement(&self, column: Column) -> &[Option<f64>] {
        self.column(column.name()).unwrap_or(&[])
    }

    /// Number of present cells in the named column.
    pub fn present_count(&self, name: &str) -> usize {
        self.column(name)
            .map(|v| v.iter().filter(|c| c.is_some()).count())
            .unwrap_or(0)
    }

    /// Append or replace a derived column.
    ///
    /// Measurement columns cannot be replaced.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(ImportError::ColumnLength {
                name,
                expected: self.len(),
                actual: values.len(),
            });
        }
        if Column::from_name(&name).is_some() {
            return Err(ImportError::UnsupportedFormat(format!(
                "cannot overwrite measurement column {}",
                name
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(TableColumn { name, values }),
        }
        Ok(())
    }

    /// Row-oriented JSON records; absent cells serialize as `null`.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        (0..self.len())
            .map(|i| {
                let mut map = serde_json::Map::new();
                map.insert(
                    "timestamp".to_string(),
                    serde_json::Value::String(self.timestamps[i].to_rfc3339()),
                );
                for column in &self.columns {
                    let cell = column.values[i]
                        .map(serde_json::Value::from)
                        .unwrap_or(serde_json::Value::Null);
                    map.insert(column.name.clone(), cell);
                }
                serde_json::Value::Object(map)
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_new_sample_has_no_measurements() {
        let s = Sample::new(ts(1));
        assert!(!s.has_measurements());
        assert!(Column::ALL.iter().all(|c| s.get(*c).is_none()));
    }

    #[test]
    fn test_set_returns_previous_value() {
        let mut s = Sample::new(ts(1));
        assert_eq!(s.set(Column::HeartRate, 140.0), None);
        assert_eq!(s.set(Column::HeartRate, 141.0), Some(140.0));
        assert_eq!(s.heart_rate, Some(141.0));
    }

    #[test]
    fn test_merge_fills_absent_cells() {
        let mut a = Sample::new(ts(1));
        a.heart_rate = Some(140.0);
        let mut b = Sample::new(ts(1));
        b.latitude = Some(10.0);
        b.longitude = Some(20.0);

        let conflicts = a.merge_from(&b);
        assert!(conflicts.is_empty());
        assert_eq!(a.heart_rate, Some(140.0));
        assert_eq!(a.latitude, Some(10.0));
        assert_eq!(a.longitude, Some(20.0));
    }

    #[test]
    fn test_merge_last_write_wins_on_conflict() {
        let mut a = Sample::new(ts(1));
        a.heart_rate = Some(140.0);
        a.speed = Some(3.0);
        let mut b = Sample::new(ts(1));
        b.heart_rate = Some(150.0);
        b.speed = Some(3.0);

        let conflicts = a.merge_from(&b);
        assert_eq!(conflicts, vec![Column::HeartRate]);
        assert_eq!(a.heart_rate, Some(150.0));
    }

    #[test]
    fn test_merge_absent_never_clears() {
        let mut a = Sample::new(ts(1));
        a.pressure = Some(101_325.0);
        let b = Sample::new(ts(1));
        a.merge_from(&b);
        assert_eq!(a.pressure, Some(101_325.0));
    }

    #[test]
    fn test_measurement_cells() {
        let m = Measurement::Position {
            latitude: 1.0,
            longitude: 2.0,
        };
        assert_eq!(m.cells(), vec![(Column::Latitude, 1.0), (Column::Longitude, 2.0)]);
        assert!(Measurement::Ibi(vec![800.0]).cells().is_empty());
    }

    #[test]
    fn test_column_kinds() {
        assert_eq!(Column::GpsAltitude.kind(), MeasurementKind::Gps);
        assert_eq!(Column::BaroAltitude.kind(), MeasurementKind::Barometer);
        assert_eq!(Column::HeartRate.kind(), MeasurementKind::HeartRate);
        assert_eq!(Column::Cadence.kind(), MeasurementKind::Motion);
        assert_eq!(Column::HeartRate.to_string(), "heart_rate");
        assert_eq!(MeasurementKind::HeartRate.to_string(), "heart rate");
    }

    #[test]
    fn test_column_from_name() {
        assert_eq!(Column::from_name("baro_altitude"), Some(Column::BaroAltitude));
        assert_eq!(Column::from_name("pace_min_per_km"), None);
    }

    #[test]
    fn test_session_new_rejects_empty() {
        let err = Session::new(SessionMetadata::default(), Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, ImportError::EmptySession));
    }

    #[test]
    fn test_session_start_time_falls_back_to_first_sample() {
        let session = Session::new(
            SessionMetadata::default(),
            vec![Sample::new(ts(5)), Sample::new(ts(65))],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(session.metadata().start_time, Some(ts(5)));
        assert_eq!(session.end_time(), Some(ts(65)));
        assert_eq!(session.duration_seconds(), 60.0);
    }

    #[test]
    fn test_session_mean_beat_bpm() {
        let beats = vec![
            Beat {
                timestamp: ts(1),
                ibi_ms: 1000.0,
            },
            Beat {
                timestamp: ts(2),
                ibi_ms: 500.0,
            },
        ];
        let session =
            Session::new(SessionMetadata::default(), vec![Sample::new(ts(1))], beats).unwrap();
        assert_eq!(session.mean_beat_bpm(), Some(90.0));
    }

    #[test]
    fn test_beat_bpm_zero_interval_is_absent() {
        let beat = Beat {
            timestamp: ts(1),
            ibi_ms: 0.0,
        };
        assert!(beat.bpm().is_none());
    }

    #[test]
    fn test_table_has_fixed_schema() {
        let mut s = Sample::new(ts(1));
        s.heart_rate = Some(140.0);
        let table = Table::from_samples(&[s]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.columns().len(), Column::ALL.len());
        assert_eq!(table.measurement(Column::HeartRate), &[Some(140.0)]);
        assert_eq!(table.measurement(Column::Latitude), &[None]);
        assert_eq!(table.present_count("latitude"), 0);
    }

    #[test]
    fn test_table_add_column_checks_length() {
        let mut table = Table::from_samples(&[Sample::new(ts(1)), Sample::new(ts(2))]);
        let err = table.add_column("pace", vec![Some(1.0)]).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ColumnLength {
                expected: 2,
                actual: 1,
                ..
            }
        ));

        table.add_column("pace", vec![Some(1.0), None]).unwrap();
        assert_eq!(table.column("pace"), Some(&[Some(1.0), None][..]));

        table.add_column("pace", vec![None, Some(2.0)]).unwrap();
        assert_eq!(table.column("pace"), Some(&[None, Some(2.0)][..]));
        assert_eq!(table.columns().len(), Column::ALL.len() + 1);
    }

    #[test]
    fn test_table_add_column_refuses_measurement_name() {
        let mut table = Table::from_samples(&[Sample::new(ts(1))]);
        assert!(table.add_column("heart_rate", vec![Some(0.0)]).is_err());
    }

    #[test]
    fn test_table_records_use_null_for_absent() {
        let mut s = Sample::new(ts(1));
        s.heart_rate = Some(140.0);
        let records = Table::from_samples(&[s]).to_records();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["heart_rate"], serde_json::json!(140.0));
        assert!(records[0]["latitude"].is_null());
        assert_eq!(records[0]["timestamp"], serde_json::json!("1970-01-01T00:00:01+00:00"));
    }
}
