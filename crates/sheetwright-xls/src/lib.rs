//! # sheetwright-xls
//!
//! Legacy XLS (BIFF8) reader for sheetwright.
//!
//! The workbook stream is pulled out of its Compound File Binary container,
//! split into BIFF records, and decoded into the same persisted
//! [`Workbook`](sheetwright_core::Workbook) model the XLSX reader produces:
//! values, decompiled formulas, style records resolved against the palette,
//! merges, column and row formatting. Blank-but-formatted cells are kept as
//! stubs so their formatting survives a rewrite.
//!
//! ```rust,no_run
//! use sheetwright_xls::XlsReader;
//!
//! let workbook = XlsReader::read_file("legacy.xls").unwrap();
//! println!("{:?}", workbook.sheet_names());
//! ```

pub mod biff;
pub mod error;
pub mod formula;
pub mod reader;
mod styles;

pub use error::{XlsError, XlsResult};
pub use reader::XlsReader;
