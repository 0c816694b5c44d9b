use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ETV analysis pipeline.
#[derive(Error, Debug)]
pub enum EtvError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file or directory could not be written.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A compact telemetry record or log line could not be decoded.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A compact telemetry record repeated a section key.
    #[error("Duplicate section: {0}")]
    DuplicateSection(char),

    /// A compact telemetry record did not carry the reserved ID section.
    #[error("Record has no ID section: {0}")]
    MissingId(String),

    /// A CSV row had an unparsable or missing field.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// A required CSV column was not found in the header.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Two inputs mapped to the same local day.
    #[error("Duplicate day {day} in {context}")]
    DuplicateDay { context: String, day: String },

    /// The HDD source was computed for a different base temperature.
    #[error("HDD baseline mismatch: expected {expected}C, found {found}C")]
    BaselineMismatch { expected: f64, found: f64 },

    /// A time zone identifier is not a recognised IANA zone.
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// No house/device grouping table exists, so segmentation is skipped.
    #[error("No grouping data at {0}")]
    NoGroupingData(PathBuf),

    /// Filtering removed every household at the named stage.
    #[error("No candidate households left after {0}")]
    NoCandidates(String),

    /// A CSV document could not be read.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EtvError {
    /// Whether this is the "skip segmentation" signal rather than a failure.
    pub fn is_skip_signal(&self) -> bool {
        matches!(self, EtvError::NoGroupingData(_))
    }
}

/// Convenience alias used throughout the ETV crates.
pub type Result<T> = std::result::Result<T, EtvError>;
