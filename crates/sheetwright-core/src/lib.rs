//! # sheetwright-core
//!
//! Core data structures for the sheetwright workbook editor.
//!
//! This crate provides the persisted side of the cell model:
//! - [`CellAddress`] and [`CellRange`] - A1 addressing, keyed structurally by (row, column)
//! - [`CellValue`] and [`CellKind`] - The closed set of cell values and their types
//! - [`StoredCell`], [`Sheet`], [`Workbook`] - The format-neutral persisted structure
//! - [`NamedRange`] and [`SheetState`] - Defined names and sheet visibility, carried through a round trip
//! - [`StyleTable`] and [`StyleRecord`] - Raw style records as read from the source file
//! - [`decode_style`] - The pure, total decoder from a raw style record to a [`CellStyle`]
//!
//! ## Example
//!
//! ```rust
//! use sheetwright_core::{CellAddress, CellValue, Sheet, StoredCell, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let mut sheet = Sheet::new("Prices");
//! sheet.set_cell(CellAddress::parse("B2").unwrap(), StoredCell::with_value(CellValue::Number(100.0)));
//! workbook.push_sheet(sheet).unwrap();
//!
//! let b2 = workbook.sheet("Prices").unwrap().cell(CellAddress::new(1, 1)).unwrap();
//! assert_eq!(b2.value, CellValue::Number(100.0));
//! ```

pub mod cell;
pub mod date;
pub mod error;
pub mod named_range;
pub mod sheet;
pub mod style;
pub mod workbook;

// Re-exports for convenience
pub use cell::{CellAddress, CellKind, CellRange, CellValue, StoredCell};
pub use error::{Error, Result};
pub use named_range::{NameScope, NamedRange};
pub use sheet::{ColumnInfo, RowInfo, Sheet, SheetState};
pub use workbook::{Workbook, WorkbookSettings};

pub use style::{
    decode_style, AlignmentRecord, BorderDeclaration, BorderRecord, CellStyle, ColorRef,
    EdgeRecord, FillRecord, FontRecord, StyleRecord, StyleTable,
};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
