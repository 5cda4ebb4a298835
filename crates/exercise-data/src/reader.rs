//! File discovery and document decoding.
//!
//! Reads exported recordings from disk and turns them into the flat
//! per-sample records consumed by the normalizer. Three shapes are
//! understood:
//!
//! * vendor app exports (`{"Samples": [...]}` with `suunto/sml` attributes),
//! * plain flat records (a JSON array, or one object per line),
//! * quantified-self.io exports, from which only the R-R stream is read.

use std::path::{Path, PathBuf};

use exercise_core::error::{ImportError, Result};
use exercise_core::models::SessionMetadata;
use exercise_core::timestamps::TimestampProcessor;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const SML_KEY: &str = "suunto/sml";

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Collect the documents to import from `path`.
///
/// A file is returned as-is. A directory is scanned recursively for `.json`
/// and `.jsonl` files, sorted by path.
pub fn find_input_files(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        warn!("Input path does not exist: {}", path.display());
        return Vec::new();
    }
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "json" || ext == "jsonl")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ImportError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse a whole JSON document.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = read_text(path)?;
    Ok(serde_json::from_str(&text)?)
}

// ── Vendor app export ─────────────────────────────────────────────────────────

/// A decoded vendor app export.
#[derive(Debug, Clone)]
pub struct SuuntoDocument {
    samples: Vec<Value>,
    header: Option<Value>,
}

impl SuuntoDocument {
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_value(read_document(path)?)
    }

    /// Fails with [`ImportError::MissingField`] when there is no `Samples`
    /// array.
    pub fn from_value(mut doc: Value) -> Result<Self> {
        let samples = match doc.get_mut("Samples").map(Value::take) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ImportError::UnsupportedFormat(
                    "\"Samples\" is not an array".to_string(),
                ))
            }
            None => return Err(ImportError::MissingField("Samples".to_string())),
        };

        let header = doc
            .get("DeviceLog")
            .and_then(|d| d.get("Header"))
            .or_else(|| doc.get("Header"))
            .cloned();

        debug!("Decoded vendor export with {} samples", samples.len());
        Ok(Self { samples, header })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Lazily flatten every sample into a normalizer record.
    pub fn records(&self) -> impl Iterator<Item = Value> + '_ {
        self.samples.iter().map(flatten_sample)
    }

    /// Session facts from the document header, where present.
    pub fn metadata(&self) -> SessionMetadata {
        let mut meta = SessionMetadata::default();
        let Some(header) = &self.header else {
            return meta;
        };

        if let Some(activity) = header
            .get("Activity")
            .or_else(|| header.get("ActivityType"))
            .and_then(scalar_to_string)
        {
            meta.activity = activity;
        }
        meta.start_time = header.get("DateTime").and_then(TimestampProcessor::parse);
        meta.device = header
            .get("Device")
            .and_then(|d| d.get("Name").or_else(|| d.get("SerialNumber")))
            .and_then(scalar_to_string);
        meta
    }

    /// `true` when the header names an activity.
    pub fn has_activity(&self) -> bool {
        self.header
            .as_ref()
            .is_some_and(|h| h.get("Activity").or_else(|| h.get("ActivityType")).is_some())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flatten one vendor sample.
///
/// * `R-R` entries become `{"TimeISO8601", "IBI"}`.
/// * `Sample` entries have their fields lifted to the top level.
/// * Any other attribute set (events, laps) is lifted unchanged so the
///   normalizer can report it.
///
/// Non-object samples are passed through for the normalizer to reject.
fn flatten_sample(sample: &Value) -> Value {
    let Some(obj) = sample.as_object() else {
        return sample.clone();
    };

    let mut record = Map::new();
    if let Some(t) = obj.get("TimeISO8601") {
        record.insert("TimeISO8601".to_string(), t.clone());
    }

    let sml = obj
        .get("Attributes")
        .and_then(|a| a.get(SML_KEY))
        .and_then(Value::as_object);

    if let Some(sml) = sml {
        if let Some(rr) = sml.get("R-R") {
            if let Some(ibi) = rr.get("IBI") {
                record.insert("IBI".to_string(), ibi.clone());
            }
        } else if let Some(fields) = sml.get("Sample").and_then(Value::as_object) {
            for (key, value) in fields {
                record.entry(key.clone()).or_insert_with(|| value.clone());
            }
        } else {
            for (key, value) in sml {
                record.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    Value::Object(record)
}

// ── Flat records ──────────────────────────────────────────────────────────────

/// Load flat records from a JSON array document or a JSON-lines file.
///
/// In JSON-lines input, lines that are not valid JSON are skipped.
pub fn load_flat_records(path: &Path) -> Result<Vec<Value>> {
    let text = read_text(path)?;
    let trimmed = text.trim_start();

    if trimmed.starts_with('[') {
        return match serde_json::from_str(trimmed)? {
            Value::Array(items) => Ok(items),
            _ => Err(ImportError::UnsupportedFormat(
                "expected a JSON array of records".to_string(),
            )),
        };
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(e) => {
                skipped += 1;
                debug!(
                    "Failed to parse JSON line {} in {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                );
            }
        }
    }

    debug!(
        "File {}: {} records, {} lines skipped",
        path.display(),
        records.len(),
        skipped
    );
    Ok(records)
}

// ── quantified-self.io export ─────────────────────────────────────────────────

/// Index of the R-R stream in exports that do not label their streams.
const QS_IBI_STREAM_INDEX: usize = 6;

/// Read the R-R intervals (milliseconds) of the first activity.
pub fn load_qs_intervals(path: &Path) -> Result<Vec<f64>> {
    qs_intervals(&read_document(path)?)
}

/// The R-R stream is the one typed `"IBI"`, or stream 6 when streams carry
/// no type. Non-numeric entries are skipped.
pub fn qs_intervals(doc: &Value) -> Result<Vec<f64>> {
    let streams = doc
        .get("activities")
        .and_then(|a| a.get(0))
        .and_then(|a| a.get("streams"))
        .and_then(Value::as_array)
        .ok_or_else(|| ImportError::MissingField("activities[0].streams".to_string()))?;

    let stream = streams
        .iter()
        .find(|s| s.get("type").and_then(Value::as_str) == Some("IBI"))
        .or_else(|| {
            let typed = streams.iter().any(|s| s.get("type").is_some());
            if typed {
                None
            } else {
                streams.get(QS_IBI_STREAM_INDEX)
            }
        })
        .ok_or_else(|| ImportError::MissingField("IBI stream".to_string()))?;

    let data = stream
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ImportError::MissingField("IBI stream data".to_string()))?;

    Ok(data.iter().filter_map(Value::as_f64).collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
