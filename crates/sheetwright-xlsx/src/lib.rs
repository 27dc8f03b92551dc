//! # sheetwright-xlsx
//!
//! XLSX (Office Open XML) reader and writer for sheetwright.
//!
//! The reader fills the persisted [`Workbook`](sheetwright_core::Workbook)
//! model with every cell the file declares (including value-less stubs that
//! only carry a style), the raw style table, merges, and row/column
//! formatting. The styles and theme parts are also retained verbatim so the
//! writer can re-emit them and keep every style index valid.

pub mod error;
pub mod reader;
pub mod writer;

mod escape;
mod formula;
mod styles;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use writer::{Compression, WriteOptions, XlsxWriter};

/// Path of the styles part inside the package
pub const STYLES_PART: &str = "xl/styles.xml";

/// Prefix of theme parts inside the package
pub const THEME_PREFIX: &str = "xl/theme/";
