//! Error types for edit sessions

use sheetwright_xls::XlsError;
use sheetwright_xlsx::XlsxError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// A failure from one of the workbook format crates
#[derive(Debug, Error)]
pub enum FormatError {
    /// Modern (zip/XML) workbook
    #[error(transparent)]
    Xlsx(#[from] XlsxError),

    /// Legacy (BIFF8) workbook
    #[error(transparent)]
    Xls(#[from] XlsError),

    /// The file could not be read at all
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by an edit session
///
/// Every variant leaves the session in its last known good state; the caller
/// may retry the same or a different operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The bytes could not be parsed as a supported workbook
    #[error("Failed to load workbook: {0}")]
    LoadFailure(#[from] FormatError),

    /// The file name does not carry a supported extension
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// A sheet's entries span more cells than a view may hold
    #[error("Sheet '{sheet}' spans {cells} cells, more than the limit of {limit}")]
    SheetTooLarge {
        /// Sheet name
        sheet: String,
        /// Cells the view would need
        cells: u64,
        /// Configured limit
        limit: u64,
    },

    /// The translator errored or returned unparsable content
    #[error("Translation failed: {0}")]
    TranslationFailure(String),

    /// The translator succeeded but produced no usable updates
    #[error("No applicable changes: {explanation}")]
    EmptyResult {
        /// Whatever explanation the translator offered
        explanation: String,
    },

    /// Encoding the edited workbook failed
    #[error("Failed to write workbook: {0}")]
    SerializeFailure(#[source] XlsxError),

    /// An update named an invalid or out-of-range address
    ///
    /// Only ever reported per update inside a batch outcome.
    #[error("Invalid cell address '{address}': {reason}")]
    Address {
        /// The address as given
        address: String,
        /// What was wrong with it
        reason: String,
    },

    /// Another instruction is still in flight
    #[error("Another instruction is still being processed")]
    Busy,

    /// The operation needs a loaded workbook
    #[error("No workbook is loaded")]
    NoWorkbook,

    /// A completion arrived for an instruction that is no longer in flight
    #[error("Instruction #{0} is no longer in flight")]
    StaleInstruction(u64),
}

impl Error {
    /// Create a translation failure with a message
    pub fn translation<S: Into<String>>(msg: S) -> Self {
        Error::TranslationFailure(msg.into())
    }

    /// Whether the session can continue after this error
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Whether this is an informational notice rather than a failure
    pub fn is_notice(&self) -> bool {
        matches!(self, Error::EmptyResult { .. })
    }
}

impl From<XlsxError> for Error {
    fn from(err: XlsxError) -> Self {
        Error::LoadFailure(FormatError::Xlsx(err))
    }
}

impl From<XlsError> for Error {
    fn from(err: XlsError) -> Self {
        Error::LoadFailure(FormatError::Xls(err))
    }
}
