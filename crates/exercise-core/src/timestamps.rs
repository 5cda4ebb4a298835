use chrono::{DateTime, DurationRound, TimeDelta, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses sample timestamps from the formats found in exported recordings.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a [`serde_json::Value`] into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * `null`       → `None`
    /// * JSON string  → ISO 8601 / RFC 3339 (including `Z`-suffix and the
    ///   `TimeISO8601` field of vendor exports) or common naive patterns,
    ///   which are taken as UTC.
    /// * JSON number  → Unix timestamp (integer or float seconds).
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Null => None,
            Value::String(s) => Self::parse_str(s.trim()),
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    DateTime::from_timestamp(secs, 0)
                } else if let Some(f) = n.as_f64() {
                    if !f.is_finite() {
                        return None;
                    }
                    let secs = f.floor() as i64;
                    let nanos = ((f - f.floor()) * 1_000_000_000.0).round() as u32;
                    if nanos >= 1_000_000_000 {
                        DateTime::from_timestamp(secs + 1, 0)
                    } else {
                        DateTime::from_timestamp(secs, nanos)
                    }
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }

        // Offsets without a colon, e.g. `+0200`.
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        // A bare number inside a string is still a Unix timestamp.
        if let Ok(f) = s.parse::<f64>() {
            return Self::parse(&Value::from(f));
        }

        debug!("TimestampProcessor: could not parse timestamp string \"{}\"", s);
        None
    }

    /// Round `ts` to the nearest multiple of `resolution_ms` milliseconds.
    ///
    /// A resolution of `0` leaves the timestamp untouched. Exact midpoints
    /// round up.
    pub fn round_to_resolution(ts: DateTime<Utc>, resolution_ms: u64) -> DateTime<Utc> {
        if resolution_ms == 0 {
            return ts;
        }
        let Ok(ms) = i64::try_from(resolution_ms) else {
            return ts;
        };
        let step = TimeDelta::milliseconds(ms);
        let Ok(floor) = ts.duration_trunc(step) else {
            return ts;
        };
        if (ts - floor) * 2 >= step {
            floor + step
        } else {
            floor
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
