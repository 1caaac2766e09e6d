// People Import - Error Types
// One enum per layer; row-level problems are diagnostics, not errors

use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a whole import run.
///
/// Everything here stops the run before (or rolls back) any write to the
/// permanent store. Row-level malformation never shows up as an
/// `ImportError`; see [`RowDiagnostic`].
#[derive(Error, Debug)]
pub enum ImportError {
    /// Input file does not exist
    #[error("spreadsheet not found at '{}'", .0.display())]
    NotFound(PathBuf),

    /// File is empty or no data row survived the field-count check
    #[error("spreadsheet is empty or has no parseable rows: {0}")]
    EmptyInput(String),

    /// Caller passed a blank affiliation label
    #[error("affiliation label must not be empty")]
    MissingAffiliation,

    /// I/O failure while reading the input
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any failure while staging, merging or committing (transaction rolled back)
    #[error("load failed, transaction rolled back: {0}")]
    Load(#[from] rusqlite::Error),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// A skipped or dropped input row.
///
/// Produced by the parser for malformed lines and for rows whose identifier
/// is empty after normalization. Logged and reported, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDiagnostic {
    /// 1-based line number in the source file
    pub line: u64,
    pub message: String,
}

impl RowDiagnostic {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        RowDiagnostic {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RowDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for RowDiagnostic {}

/// Geographic reference lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("geographic service request failed: {0}")]
    Http(String),

    #[error("unknown region code: {0}")]
    UnknownRegion(String),
}

#[cfg(feature = "server")]
impl From<reqwest::Error> for GeoError {
    fn from(e: reqwest::Error) -> Self {
        GeoError::Http(e.to_string())
    }
}
