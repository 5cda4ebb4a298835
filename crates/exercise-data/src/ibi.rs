//! R-R interval (inter-beat interval) series.
//!
//! Devices report R-R intervals in batches, each stamped with the time the
//! batch was written. Beat times are reconstructed by anchoring the whole
//! series on the first batch: the first beat lies `sum(first batch)` before
//! the first stamp, and every following beat is the running sum of all
//! intervals from there.

use chrono::{DateTime, TimeDelta, Utc};
use exercise_core::models::Beat;
use tracing::warn;

/// Accumulates R-R batches in recording order.
#[derive(Debug, Clone, Default)]
pub struct IbiSeries {
    anchor: Option<DateTime<Utc>>,
    intervals: Vec<f64>,
    elapsed_ms: f64,
}

impl IbiSeries {
    /// Append one batch of intervals (milliseconds) stamped at `timestamp`.
    ///
    /// A batch with a non-positive interval, or one whose beats would fall
    /// outside the representable time range, is skipped.
    pub fn push(&mut self, timestamp: DateTime<Utc>, intervals: &[f64]) {
        if intervals.is_empty() {
            return;
        }
        if intervals.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            warn!("Skipping R-R batch at {}: non-positive interval", timestamp);
            return;
        }

        let batch_ms: f64 = intervals.iter().sum();
        let anchor = match self.anchor {
            Some(anchor) => Some(anchor),
            None => timestamp.checked_sub_signed(millis(batch_ms)),
        };
        let elapsed_ms = self.elapsed_ms + batch_ms;
        let Some(anchor) = anchor.filter(|a| a.checked_add_signed(millis(elapsed_ms)).is_some())
        else {
            warn!("Skipping R-R batch at {}: beat times out of range", timestamp);
            return;
        };

        self.anchor = Some(anchor);
        self.elapsed_ms = elapsed_ms;
        self.intervals.extend_from_slice(intervals);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Reconstruct one [`Beat`] per interval, in increasing time order.
    pub fn into_beats(self) -> Vec<Beat> {
        let Some(anchor) = self.anchor else {
            return Vec::new();
        };
        let mut elapsed = 0.0;
        self.intervals
            .into_iter()
            .map_while(|ibi_ms| {
                elapsed += ibi_ms;
                anchor
                    .checked_add_signed(millis(elapsed))
                    .map(|timestamp| Beat { timestamp, ibi_ms })
            })
            .collect()
    }
}

fn millis(ms: f64) -> TimeDelta {
    TimeDelta::microseconds((ms * 1000.0).round() as i64)
}

/// Summary statistics over a list of intervals, as read from exports that
/// carry no timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IbiSummary {
    pub count: usize,
    pub mean_ibi_ms: f64,
    pub mean_bpm: f64,
    pub min_ibi_ms: f64,
    pub max_ibi_ms: f64,
}

impl IbiSummary {
    /// `None` when no positive interval is present.
    pub fn from_intervals(intervals: &[f64]) -> Option<Self> {
        let valid: Vec<f64> = intervals.iter().copied().filter(|v| *v > 0.0).collect();
        if valid.is_empty() {
            return None;
        }
        let n = valid.len() as f64;
        let mean_ibi_ms = valid.iter().sum::<f64>() / n;
        let mean_bpm = valid.iter().map(|v| 60_000.0 / v).sum::<f64>() / n;
        Some(Self {
            count: valid.len(),
            mean_ibi_ms,
            mean_bpm,
            min_ibi_ms: valid.iter().copied().fold(f64::INFINITY, f64::min),
            max_ibi_ms: valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_empty_series_has_no_beats() {
        let series = IbiSeries::default();
        assert!(series.is_empty());
        assert!(series.into_beats().is_empty());
    }

    #[test]
    fn test_beats_anchor_on_first_batch() {
        let mut series = IbiSeries::default();
        series.push(ts(100), &[800.0, 1200.0]);
        series.push(ts(103), &[1000.0]);
        assert_eq!(series.len(), 3);

        let beats = series.into_beats();
        let millis: Vec<i64> = beats.iter().map(|b| b.timestamp.timestamp_millis()).collect();
        assert_eq!(millis, vec![98_800, 100_000, 101_000]);
        assert_eq!(beats[2].ibi_ms, 1000.0);
    }

    #[test]
    fn test_empty_batch_is_ignored() {
        let mut series = IbiSeries::default();
        series.push(ts(50), &[]);
        series.push(ts(100), &[1000.0]);
        let beats = series.into_beats();
        assert_eq!(beats[0].timestamp, ts(100));
    }

    #[test]
    fn test_out_of_range_batch_is_skipped() {
        let mut series = IbiSeries::default();
        series.push(ts(1), &[1e18]);
        assert!(series.is_empty());

        series.push(ts(100), &[1000.0]);
        series.push(ts(101), &[1e18]);
        let beats = series.into_beats();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].timestamp, ts(100));
    }

    #[test]
    fn test_non_positive_batch_is_skipped() {
        let mut series = IbiSeries::default();
        series.push(ts(10), &[1000.0, -5000.0, 1000.0]);
        series.push(ts(11), &[0.0]);
        assert!(series.is_empty());

        series.push(ts(20), &[500.0, 500.0]);
        let millis: Vec<i64> = series
            .into_beats()
            .iter()
            .map(|b| b.timestamp.timestamp_millis())
            .collect();
        assert_eq!(millis, vec![19_500, 20_000]);
    }

    #[test]
    fn test_summary() {
        let summary = IbiSummary::from_intervals(&[1000.0, 500.0, 0.0]).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean_ibi_ms, 750.0);
        assert_eq!(summary.mean_bpm, 90.0);
        assert_eq!(summary.min_ibi_ms, 500.0);
        assert_eq!(summary.max_ibi_ms, 1000.0);
    }

    #[test]
    fn test_summary_none_without_valid_intervals() {
        assert!(IbiSummary::from_intervals(&[]).is_none());
        assert!(IbiSummary::from_intervals(&[0.0, -3.0]).is_none());
    }
}
