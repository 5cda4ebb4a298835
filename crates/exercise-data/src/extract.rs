//! Field extraction from loosely-typed sample records.
//!
//! Every measurement kind has a fixed set of accepted key spellings. A record
//! is probed once and resolved into typed [`Measurement`]s; downstream code
//! never looks at the raw keys again.

use chrono::{DateTime, Utc};
use exercise_core::error::RecordError;
use exercise_core::models::Measurement;
use exercise_core::timestamps::TimestampProcessor;
use serde_json::{Map, Value};

// ── Key sets ──────────────────────────────────────────────────────────────────

pub const TIMESTAMP_KEYS: &[&str] = &["timestamp", "t", "time", "TimeISO8601"];

pub const LATITUDE_KEYS: &[&str] = &["lat", "latitude", "Latitude"];
pub const LONGITUDE_KEYS: &[&str] = &["lon", "lng", "longitude", "Longitude"];
pub const GPS_ALTITUDE_KEYS: &[&str] = &["gps_altitude", "GPSAltitude"];
pub const PRESSURE_KEYS: &[&str] = &["pressure", "AbsPressure", "SeaLevelPressure"];
pub const BARO_ALTITUDE_KEYS: &[&str] = &["altitude", "baro_altitude", "Altitude"];
pub const HEART_RATE_KEYS: &[&str] = &["hr", "heart_rate", "HR"];
pub const SPEED_KEYS: &[&str] = &["speed", "Speed"];
pub const CADENCE_KEYS: &[&str] = &["cadence", "Cadence"];
pub const TEMPERATURE_KEYS: &[&str] = &["temperature", "Temperature"];
pub const DISTANCE_KEYS: &[&str] = &["distance", "Distance"];
pub const IBI_KEYS: &[&str] = &["ibi", "IBI", "rr"];

/// Longest R-R interval accepted, in milliseconds.
pub const MAX_IBI_MS: f64 = 60_000.0;

/// Scalar measurements and the variant each one builds.
const SCALAR_KINDS: &[(&[&str], fn(f64) -> Measurement)] = &[
    (GPS_ALTITUDE_KEYS, Measurement::GpsAltitude),
    (PRESSURE_KEYS, Measurement::Pressure),
    (BARO_ALTITUDE_KEYS, Measurement::BaroAltitude),
    (HEART_RATE_KEYS, Measurement::HeartRate),
    (SPEED_KEYS, Measurement::Speed),
    (CADENCE_KEYS, Measurement::Cadence),
    (TEMPERATURE_KEYS, Measurement::Temperature),
    (DISTANCE_KEYS, Measurement::Distance),
];

fn is_known_key(key: &str) -> bool {
    [
        TIMESTAMP_KEYS,
        LATITUDE_KEYS,
        LONGITUDE_KEYS,
        GPS_ALTITUDE_KEYS,
        PRESSURE_KEYS,
        BARO_ALTITUDE_KEYS,
        HEART_RATE_KEYS,
        SPEED_KEYS,
        CADENCE_KEYS,
        TEMPERATURE_KEYS,
        DISTANCE_KEYS,
        IBI_KEYS,
    ]
    .iter()
    .any(|set| set.contains(&key))
}

// ── Extraction result ─────────────────────────────────────────────────────────

/// A non-fatal problem with one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIssue {
    /// The key is not part of any measurement key set; the field is ignored.
    UnknownKey(String),
    /// The key is known but its value is not a number (or number list).
    InvalidValue(String),
    /// Only one half of a GPS fix was present; the position is dropped.
    PartialPosition(String),
}

/// Everything recognised in one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub measurements: Vec<Measurement>,
    pub issues: Vec<FieldIssue>,
}

/// Outcome of probing one key set.
enum Probe {
    Missing,
    Value(f64),
    Invalid(String),
}

// ── MeasurementExtractor ──────────────────────────────────────────────────────

/// Resolves raw records into timestamps and typed measurements.
pub struct MeasurementExtractor;

impl MeasurementExtractor {
    /// Read the record timestamp from the first present timestamp key.
    pub fn timestamp(record: &Map<String, Value>) -> Result<DateTime<Utc>, RecordError> {
        let value = TIMESTAMP_KEYS
            .iter()
            .find_map(|k| record.get(*k).filter(|v| !v.is_null()))
            .ok_or(RecordError::MissingTimestamp)?;
        TimestampProcessor::parse(value).ok_or_else(|| RecordError::InvalidTimestamp(value.to_string()))
    }

    /// Extract every known measurement from `record`.
    ///
    /// Within a key set the first non-null key wins. `null` is treated as
    /// absent without complaint.
    pub fn extract(record: &Map<String, Value>) -> Extraction {
        let mut out = Extraction::default();

        let lat = Self::probe(record, LATITUDE_KEYS);
        let lon = Self::probe(record, LONGITUDE_KEYS);
        match (lat, lon) {
            (Probe::Value(latitude), Probe::Value(longitude)) => {
                out.measurements.push(Measurement::Position {
                    latitude,
                    longitude,
                });
            }
            (Probe::Missing, Probe::Missing) => {}
            (lat, lon) => {
                for (probe, keys) in [(lat, LATITUDE_KEYS), (lon, LONGITUDE_KEYS)] {
                    match probe {
                        Probe::Invalid(key) => out.issues.push(FieldIssue::InvalidValue(key)),
                        Probe::Value(_) => {
                            if let Some(key) = Self::first_present(record, keys) {
                                out.issues.push(FieldIssue::PartialPosition(key.to_string()));
                            }
                        }
                        Probe::Missing => {}
                    }
                }
            }
        }

        for (keys, build) in SCALAR_KINDS {
            match Self::probe(record, keys) {
                Probe::Value(v) => out.measurements.push(build(v)),
                Probe::Invalid(key) => out.issues.push(FieldIssue::InvalidValue(key)),
                Probe::Missing => {}
            }
        }

        if let Some((key, value)) = IBI_KEYS
            .iter()
            .find_map(|k| record.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
        {
            match Self::interval_list(value) {
                Some(list) if !list.is_empty() => out.measurements.push(Measurement::Ibi(list)),
                Some(_) => {}
                None => out.issues.push(FieldIssue::InvalidValue(key.to_string())),
            }
        }

        for key in record.keys() {
            if !is_known_key(key) {
                out.issues.push(FieldIssue::UnknownKey(key.clone()));
            }
        }

        out
    }

    fn first_present<'k>(record: &Map<String, Value>, keys: &[&'k str]) -> Option<&'k str> {
        keys.iter()
            .copied()
            .find(|k| record.get(*k).is_some_and(|v| !v.is_null()))
    }

    fn probe(record: &Map<String, Value>, keys: &[&str]) -> Probe {
        for &key in keys {
            match record.get(key) {
                None | Some(Value::Null) => continue,
                Some(v) => {
                    return match v.as_f64().filter(|f| f.is_finite()) {
                        Some(f) => Probe::Value(f),
                        None => Probe::Invalid(key.to_string()),
                    }
                }
            }
        }
        Probe::Missing
    }

    /// A single interval or an array of them. `None` unless every entry is
    /// a number in `(0, MAX_IBI_MS]`.
    fn interval_list(value: &Value) -> Option<Vec<f64>> {
        let valid = |v: &Value| v.as_f64().filter(|f| *f > 0.0 && *f <= MAX_IBI_MS);
        match value {
            Value::Number(_) => valid(value).map(|f| vec![f]),
            Value::Array(items) => items.iter().map(valid).collect(),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
