//! # sheetwright
//!
//! Format-preserving, instruction-driven cell editing for Excel workbooks.
//!
//! A [`Session`] loads an `.xlsx` or `.xls` file, exposes the active sheet
//! as a dense grid with decoded styles and merged regions, applies
//! address-keyed updates produced by an external [`Translator`], keeps a
//! bounded history with undo, and writes the edited workbook back as
//! `.xlsx` without disturbing the formatting of anything it did not touch.
//!
//! ## Features
//!
//! - Read XLSX/XLSM (Office Open XML) and XLS (legacy BIFF8) workbooks
//! - Styles, number formats, dates, merges, and column/row layout survive
//!   the round-trip
//! - Updates are applied independently; bad addresses are skipped, never fatal
//! - One instruction at a time, with a timeout on the translator call
//!
//! ## Example
//!
//! ```rust
//! use sheetwright::{CellUpdate, Session, SessionConfig, Translation};
//! use sheetwright_core::{CellAddress, CellValue, Sheet, StoredCell, Workbook};
//! use sheetwright_xlsx::{WriteOptions, XlsxWriter};
//!
//! // Build a small workbook to edit
//! let mut workbook = Workbook::new();
//! let mut sheet = Sheet::new("Prices");
//! sheet.set_cell(CellAddress::new(0, 0), StoredCell::with_value(CellValue::Number(100.0)));
//! workbook.push_sheet(sheet).unwrap();
//! let bytes = XlsxWriter::to_bytes(&workbook, &WriteOptions::default()).unwrap();
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.load_bytes("prices.xlsx", &bytes).unwrap();
//!
//! let translation = Translation {
//!     updates: vec![CellUpdate::new("A1").with_value(120.0)],
//!     explanation: "Raised the price".into(),
//! };
//! let report = session.apply_translation("raise the price", translation).unwrap();
//! assert_eq!(report.changes[0].after_value(), &CellValue::Number(120.0));
//! assert_eq!(session.history().len(), 1);
//! ```

pub mod applier;
pub mod config;
pub mod error;
pub mod format;
pub mod ledger;
pub mod naming;
pub mod serializer;
pub mod session;
pub mod translator;
pub mod view;

pub use applier::{apply_updates, ApplyOutcome, CellChange, CellUpdate, SkippedUpdate};
pub use config::{SessionConfig, DEFAULT_GRID_CELL_LIMIT, DEFAULT_OUTPUT_SUFFIX};
pub use error::{Error, FormatError, Result};
pub use format::FileFormat;
pub use ledger::{HistoryEntry, Ledger};
pub use naming::{output_file_name, output_file_name_with_suffix};
pub use serializer::{encode, reconcile, reconcile_cell, ReconcileStats, Reconciled};
pub use session::{EditReport, PendingInstruction, Session};
pub use translator::{
    extract_payload, parse_translation, BoxError, CellSnapshot, Translation, TranslationRequest,
    Translator,
};
pub use view::{load_sheet, load_sheet_within, occupied_range, Cell, Grid, SheetView, StyleMap};

// Re-export the persisted model
pub use sheetwright_core::{CellAddress, CellKind, CellRange, CellStyle, CellValue, Workbook};
