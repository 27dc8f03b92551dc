//! Error types for XLS reading.

use thiserror::Error;

/// Result alias for XLS operations.
pub type XlsResult<T> = Result<T, XlsError>;

/// Errors that can occur while reading XLS files.
#[derive(Error, Debug)]
pub enum XlsError {
    /// I/O error (file access or CFB container)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid XLS container
    #[error("Invalid XLS format: {0}")]
    InvalidFormat(String),

    /// The workbook stream is not BIFF8
    #[error("Unsupported BIFF version: {0}")]
    UnsupportedVersion(String),

    /// A record body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Building the persisted model failed
    #[error("Core error: {0}")]
    Core(#[from] sheetwright_core::Error),
}
