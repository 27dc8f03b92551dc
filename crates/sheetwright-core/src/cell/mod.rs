//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellAddress`] - A cell's location, keyed by zero-based (row, column)
//! - [`CellRange`] - An inclusive rectangle of cells (e.g., "A1:B10")
//! - [`CellValue`] - The closed set of values a cell can hold
//! - [`StoredCell`] - The persisted entry for one address

mod address;
mod stored;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use stored::StoredCell;
pub use value::{CellKind, CellValue};
