use std::path::PathBuf;
use thiserror::Error;

/// All errors that can fail an import call.
#[derive(Error, Debug)]
pub enum ImportError {
    /// No record survived filtering; no table is produced.
    #[error("Session contains no valid records")]
    EmptySession,

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The document parsed but does not have the expected shape.
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// A derived column does not line up with the table rows.
    #[error("Column {name} has {actual} values, table has {expected} rows")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A required top-level field is missing from the document.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a single record was dropped by the normalizer.
///
/// These never fail an import; they are reported as diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no timestamp")]
    MissingTimestamp,

    #[error("unparsable timestamp: {0}")]
    InvalidTimestamp(String),

    /// The record's timestamp is earlier than the last accepted one.
    #[error("timestamp {timestamp} is earlier than previous {previous}")]
    NonIncreasingTimestamp { timestamp: String, previous: String },
}

/// Convenience alias used throughout the importer crates.
pub type Result<T> = std::result::Result<T, ImportError>;
