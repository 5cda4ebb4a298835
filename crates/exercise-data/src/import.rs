//! Import pipeline.
//!
//! Picks the reader for the configured input mode, feeds its records
//! through the [`SampleNormalizer`] and returns the result per file. Files
//! are processed one after another; a failing file does not stop the rest.

use std::path::{Path, PathBuf};

use exercise_core::error::Result;
use exercise_core::models::SessionMetadata;
use exercise_core::settings::{InputMode, NormalizerConfig};
use tracing::{debug, info, warn};

use crate::ibi::IbiSummary;
use crate::normalizer::{NormalizeOutcome, SampleNormalizer};
use crate::reader::{find_input_files, load_flat_records, load_qs_intervals, SuuntoDocument};

/// Options shared by every file of one import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub mode: InputMode,
    pub normalizer: NormalizerConfig,
    /// Activity type used when the document does not name one.
    pub activity: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            mode: InputMode::Suunto,
            normalizer: NormalizerConfig::default(),
            activity: None,
        }
    }
}

/// What one imported file produced.
#[derive(Debug, Clone)]
pub enum Imported {
    /// A normalized session.
    Session(Box<NormalizeOutcome>),
    /// Bare R-R intervals from an export without sample timestamps.
    Intervals {
        intervals: Vec<f64>,
        summary: Option<IbiSummary>,
    },
}

/// Import every document found under `path`.
pub fn import_path(path: &Path, options: &ImportOptions) -> Vec<(PathBuf, Result<Imported>)> {
    let files = find_input_files(path);
    if files.is_empty() {
        warn!("No input files found in {}", path.display());
        return Vec::new();
    }

    let results: Vec<(PathBuf, Result<Imported>)> = files
        .into_iter()
        .map(|file| {
            let result = import_file(&file, options);
            if let Err(e) = &result {
                warn!("Import of {} failed: {}", file.display(), e);
            }
            (file, result)
        })
        .collect();

    let ok = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!("Imported {} of {} files", ok, results.len());
    results
}

/// Import a single document.
pub fn import_file(path: &Path, options: &ImportOptions) -> Result<Imported> {
    debug!("Importing {} as {:?}", path.display(), options.mode);
    let normalizer = SampleNormalizer::new(options.normalizer.clone());

    match options.mode {
        InputMode::Suunto => {
            let doc = SuuntoDocument::load(path)?;
            let mut metadata = doc.metadata();
            if !doc.has_activity() {
                if let Some(activity) = &options.activity {
                    metadata.activity = activity.clone();
                }
            }
            metadata.source = Some(path.to_path_buf());
            let outcome = normalizer.normalize(doc.records(), metadata)?;
            Ok(Imported::Session(Box::new(outcome)))
        }
        InputMode::Records => {
            let records = load_flat_records(path)?;
            let metadata = SessionMetadata {
                activity: options
                    .activity
                    .clone()
                    .unwrap_or_else(|| SessionMetadata::default().activity),
                source: Some(path.to_path_buf()),
                ..SessionMetadata::default()
            };
            let outcome = normalizer.normalize(records, metadata)?;
            Ok(Imported::Session(Box::new(outcome)))
        }
        InputMode::Qs => {
            let intervals = load_qs_intervals(path)?;
            let summary = IbiSummary::from_intervals(&intervals);
            Ok(Imported::Intervals { intervals, summary })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exercise_core::error::ImportError;
    use exercise_core::models::Column;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn session(imported: Imported) -> NormalizeOutcome {
        match imported {
            Imported::Session(outcome) => *outcome,
            other => panic!("expected a session, got {:?}", other),
        }
    }

    #[test]
    fn test_import_suunto_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "run.json",
            &json!({
                "Samples": [
                    {"TimeISO8601": "2020-06-20T10:45:14.100+02:00",
                     "Attributes": {"suunto/sml": {"Sample": {"AbsPressure": 95_000, "HR": 2.3}}}},
                    {"TimeISO8601": "2020-06-20T10:45:13.900+02:00",
                     "Attributes": {"suunto/sml": {"Sample": {"Latitude": 0.83, "Longitude": 0.11}}}},
                    {"TimeISO8601": "2020-06-20T10:45:15.000+02:00",
                     "Attributes": {"suunto/sml": {"R-R": {"IBI": [420, 430]}}}}
                ]
            }),
        );
        let options = ImportOptions {
            normalizer: NormalizerConfig {
                resolution_ms: 1000,
                keep_unparsed: false,
            },
            activity: Some("running".to_string()),
            ..Default::default()
        };

        let outcome = session(import_file(&path, &options).unwrap());
        let table = outcome.session.to_table();

        // Both sub-second samples round to 10:45:14 and share one row.
        assert_eq!(table.len(), 2);
        assert_eq!(table.measurement(Column::Pressure)[0], Some(95_000.0));
        assert_eq!(table.measurement(Column::Latitude)[0], Some(0.83));
        assert_eq!(outcome.session.beats().len(), 2);
        assert_eq!(outcome.session.metadata().activity, "running");
        assert_eq!(outcome.session.metadata().source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_import_records_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "records.json",
            &json!([{"t": 1, "hr": 140}, {"t": 1, "lat": 10, "lon": 20}, {"t": 2, "hr": 142}]),
        );
        let options = ImportOptions {
            mode: InputMode::Records,
            ..Default::default()
        };

        let outcome = session(import_file(&path, &options).unwrap());
        assert_eq!(outcome.session.samples().len(), 2);
        assert_eq!(outcome.session.metadata().activity, "unknown");
    }

    #[test]
    fn test_import_empty_session_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "bad.json", &json!([{"hr": 140}, {"t": "never"}]));
        let options = ImportOptions {
            mode: InputMode::Records,
            ..Default::default()
        };
        assert!(matches!(import_file(&path, &options), Err(ImportError::EmptySession)));
    }

    #[test]
    fn test_import_qs_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "qs.json",
            &json!({"activities": [{"streams": [{"type": "IBI", "data": [1000, 500]}]}]}),
        );
        let options = ImportOptions {
            mode: InputMode::Qs,
            ..Default::default()
        };

        match import_file(&path, &options).unwrap() {
            Imported::Intervals { intervals, summary } => {
                assert_eq!(intervals, vec![1000.0, 500.0]);
                assert_eq!(summary.unwrap().mean_bpm, 90.0);
            }
            other => panic!("expected intervals, got {:?}", other),
        }
    }

    #[test]
    fn test_import_path_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", &json!({"no": "samples"}));
        write(
            dir.path(),
            "b.json",
            &json!({"Samples": [{"TimeISO8601": "2020-06-20T10:45:14Z",
                                 "Attributes": {"suunto/sml": {"Sample": {"HR": 2.0}}}}]}),
        );

        let results = import_path(dir.path(), &ImportOptions::default());
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].1, Err(ImportError::MissingField(_))));
        assert!(results[1].1.is_ok());
    }

    #[test]
    fn test_import_path_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(import_path(dir.path(), &ImportOptions::default()).is_empty());
    }
}
