//! The sample normalizer.
//!
//! Turns a sequence of heterogeneous per-sample records into one
//! [`Session`] whose samples are strictly ordered by timestamp, with every
//! missing measurement kept as `None`.
//!
//! Rules, applied per record in source order:
//!
//! * No timestamp, or one that cannot be parsed → record dropped.
//! * Timestamp earlier than the last accepted one → record dropped.
//! * Timestamp equal to the last accepted one → merged into that row.
//!   Present incoming values overwrite (last write wins), absent incoming
//!   values never clear a cell.
//! * Anything else → new row.
//!
//! Dropped records and ignored fields are reported as [`Diagnostic`]s. The
//! only failure is [`ImportError::EmptySession`].

use std::fmt;

use chrono::{DateTime, Utc};
use exercise_core::error::{ImportError, RecordError, Result};
use exercise_core::models::{Column, Measurement, Sample, Session, SessionMetadata};
use exercise_core::settings::NormalizerConfig;
use exercise_core::timestamps::TimestampProcessor;
use serde_json::Value;
use tracing::{debug, warn};

use crate::extract::{Extraction, FieldIssue, MeasurementExtractor};
use crate::ibi::IbiSeries;

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// What went wrong with one record.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// The whole record was dropped.
    MalformedRecord(RecordError),
    /// A key outside every measurement key set; the field was ignored.
    UnknownMeasurementKey(String),
    /// A known key with a non-numeric value; the field was ignored.
    InvalidValue(String),
    /// Half a GPS fix; the position was ignored.
    PartialMeasurement(String),
    /// Two records at the same instant disagreed; the later value was kept.
    ConflictingValue(Column),
}

/// A non-fatal problem found while normalizing, tied to the record's
/// zero-based position in the input sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub index: usize,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::MalformedRecord(e) => write!(f, "record {}: dropped, {}", self.index, e),
            DiagnosticKind::UnknownMeasurementKey(k) => {
                write!(f, "record {}: unknown key \"{}\" ignored", self.index, k)
            }
            DiagnosticKind::InvalidValue(k) => {
                write!(f, "record {}: non-numeric value for \"{}\" ignored", self.index, k)
            }
            DiagnosticKind::PartialMeasurement(k) => {
                write!(f, "record {}: incomplete GPS fix (only \"{}\")", self.index, k)
            }
            DiagnosticKind::ConflictingValue(c) => {
                write!(f, "record {}: {} overwritten by later value", self.index, c)
            }
        }
    }
}

/// Counters for one normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub records_read: usize,
    pub records_dropped: usize,
    pub records_merged: usize,
    pub rows: usize,
    /// Valid records without any recognised measurement.
    pub records_unparsed: usize,
}

/// The result of a successful normalization.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub session: Session,
    pub diagnostics: Vec<Diagnostic>,
    /// Raw records that carried no known measurement. Only filled when
    /// [`NormalizerConfig::keep_unparsed`] is set.
    pub unparsed: Vec<Value>,
    pub stats: NormalizeStats,
}

impl NormalizeOutcome {
    /// Diagnostics for dropped records only.
    pub fn dropped(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::MalformedRecord(_)))
    }
}

// ── SampleNormalizer ──────────────────────────────────────────────────────────

/// Stateless normalizer; every call works on its own data.
#[derive(Debug, Clone, Default)]
pub struct SampleNormalizer {
    config: NormalizerConfig,
}

impl SampleNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Consume `records` once and build a session.
    ///
    /// Fails with [`ImportError::EmptySession`] when no record survives.
    pub fn normalize<I>(&self, records: I, metadata: SessionMetadata) -> Result<NormalizeOutcome>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut samples: Vec<Sample> = Vec::new();
        let mut ibi = IbiSeries::default();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut unparsed: Vec<Value> = Vec::new();
        let mut stats = NormalizeStats::default();

        for (index, record) in records.into_iter().enumerate() {
            stats.records_read += 1;

            let (timestamp, extraction) = match self.accept(&record, samples.last()) {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Dropping record {}: {}", index, e);
                    stats.records_dropped += 1;
                    diagnostics.push(Diagnostic {
                        index,
                        kind: DiagnosticKind::MalformedRecord(e),
                    });
                    continue;
                }
            };

            for issue in extraction.issues {
                let kind = match issue {
                    FieldIssue::UnknownKey(k) => {
                        debug!("Record {}: ignoring unknown key \"{}\"", index, k);
                        DiagnosticKind::UnknownMeasurementKey(k)
                    }
                    FieldIssue::InvalidValue(k) => {
                        warn!("Record {}: non-numeric value for \"{}\"", index, k);
                        DiagnosticKind::InvalidValue(k)
                    }
                    FieldIssue::PartialPosition(k) => {
                        warn!("Record {}: incomplete GPS fix, only \"{}\"", index, k);
                        DiagnosticKind::PartialMeasurement(k)
                    }
                };
                diagnostics.push(Diagnostic { index, kind });
            }

            let mut row = Sample::new(timestamp);
            for measurement in &extraction.measurements {
                if let Measurement::Ibi(intervals) = measurement {
                    ibi.push(timestamp, intervals);
                }
                for (column, value) in measurement.cells() {
                    row.set(column, value);
                }
            }

            if extraction.measurements.is_empty() {
                stats.records_unparsed += 1;
                if self.config.keep_unparsed {
                    unparsed.push(record);
                }
            }

            match samples.last_mut() {
                Some(last) if last.timestamp == timestamp => {
                    stats.records_merged += 1;
                    for column in last.merge_from(&row) {
                        debug!("Record {}: {} overwritten at {}", index, column, timestamp);
                        diagnostics.push(Diagnostic {
                            index,
                            kind: DiagnosticKind::ConflictingValue(column),
                        });
                    }
                }
                _ => samples.push(row),
            }
        }

        stats.rows = samples.len();
        debug!(
            "Normalized {} records: {} rows, {} merged, {} dropped, {} unparsed",
            stats.records_read,
            stats.rows,
            stats.records_merged,
            stats.records_dropped,
            stats.records_unparsed,
        );

        if samples.is_empty() {
            warn!("No valid records among {} read", stats.records_read);
            return Err(ImportError::EmptySession);
        }

        let session = Session::new(metadata, samples, ibi.into_beats())?;
        Ok(NormalizeOutcome {
            session,
            diagnostics,
            unparsed,
            stats,
        })
    }

    /// Validate the record's shape and timestamp against the last row.
    fn accept(
        &self,
        record: &Value,
        last: Option<&Sample>,
    ) -> std::result::Result<(DateTime<Utc>, Extraction), RecordError> {
        let map = record.as_object().ok_or(RecordError::NotAnObject)?;
        let raw = MeasurementExtractor::timestamp(map)?;
        let timestamp = TimestampProcessor::round_to_resolution(raw, self.config.resolution_ms);

        if let Some(previous) = last {
            if timestamp < previous.timestamp {
                return Err(RecordError::NonIncreasingTimestamp {
                    timestamp: timestamp.to_rfc3339(),
                    previous: previous.timestamp.to_rfc3339(),
                });
            }
        }

        Ok((timestamp, MeasurementExtractor::extract(map)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
