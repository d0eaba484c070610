//! Error types for paydate-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in paydate-core
#[derive(Debug, Error)]
pub enum Error {
    /// Text contained no digit run to use as an identifier
    #[error("no identifier found in '{0}'")]
    NoIdentifierFound(String),

    /// Digit run or identifier cell could not be parsed as an integer
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A required header is absent from the discovery range
    #[error("column '{header}' not found in sheet '{sheet}'")]
    ColumnNotFound { header: String, sheet: String },

    /// A range string is malformed or the resolved columns are out of order
    #[error("invalid range '{range}': {message}")]
    RangeInvalid { range: String, message: String },

    /// The tabular store could not be reached or the source does not exist
    #[error("tabular source '{source_id}' unavailable: {message}")]
    SourceUnavailable { source_id: String, message: String },

    /// The tabular store refused a write
    #[error("write to '{range}' rejected: {message}")]
    WriteRejected { range: String, message: String },

    /// An uploaded statement could not be decoded
    #[error("unreadable file '{path}': {message}")]
    UnreadableFile { path: PathBuf, message: String },

    /// A statement lacks one of the headers it is decoded by
    #[error("statement is missing the '{0}' column or it was renamed")]
    MissingExpectedColumn(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Configuration could not be parsed or serialized
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
