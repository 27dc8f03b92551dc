//! The editable view of one sheet
//!
//! [`load_sheet`] walks a sheet's occupied rectangle and produces a
//! [`SheetView`]: a dense [`Grid`] of [`Cell`]s, the decoded styles keyed by
//! address, and the sheet's merged regions. The grid is what edits are
//! applied to; the persisted [`Sheet`] is only brought up to date by the
//! serializer.

use std::collections::BTreeMap;

use sheetwright_core::{
    decode_style, CellAddress, CellKind, CellRange, CellStyle, CellValue, Sheet, StoredCell,
    StyleTable, Workbook,
};

use crate::config::DEFAULT_GRID_CELL_LIMIT;
use crate::error::{Error, Result};

/// One cell of a [`Grid`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    /// Value (for formula cells, the last computed or assigned result)
    pub value: CellValue,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    /// Recorded type
    pub kind: Option<CellKind>,
    /// Decoded style, when at least one field is present
    pub style: Option<CellStyle>,
}

impl Cell {
    /// A cell holding `value`, with its type inferred
    pub fn new(value: CellValue) -> Self {
        Self {
            kind: value.inferred_kind(),
            value,
            ..Self::default()
        }
    }

    /// Derive a grid cell from a persisted entry
    pub fn from_stored(stored: &StoredCell, styles: &StyleTable) -> Self {
        let style = decode_style(stored.style_id.and_then(|id| styles.get(id)));
        Self {
            value: stored.value.clone(),
            formula: stored.formula.clone(),
            kind: stored.kind.filter(|kind| *kind != CellKind::Stub),
            style: (!style.is_empty()).then_some(style),
        }
    }

    /// Whether the cell has neither a value nor a formula
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}

/// A dense, row-major rectangle of cells
///
/// The grid covers exactly its [`CellRange`]; addresses are sheet
/// addresses, not offsets into the rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    range: CellRange,
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    /// A grid of blank cells covering `range`
    pub fn new(range: CellRange) -> Self {
        let rows = (0..range.row_count())
            .map(|_| vec![Cell::default(); range.col_count() as usize])
            .collect();
        Self { range, rows }
    }

    /// The rectangle covered by the grid
    pub fn range(&self) -> CellRange {
        self.range
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn col_count(&self) -> usize {
        self.range.col_count() as usize
    }

    /// Whether `addr` lies inside the grid
    pub fn contains(&self, addr: CellAddress) -> bool {
        self.range.contains(&addr)
    }

    fn offsets(&self, addr: CellAddress) -> Option<(usize, usize)> {
        self.contains(addr).then(|| {
            (
                (addr.row - self.range.start.row) as usize,
                (addr.col - self.range.start.col) as usize,
            )
        })
    }

    /// Get the cell at `addr`
    pub fn get(&self, addr: CellAddress) -> Option<&Cell> {
        let (r, c) = self.offsets(addr)?;
        self.rows.get(r)?.get(c)
    }

    /// Get a mutable reference to the cell at `addr`
    pub fn get_mut(&mut self, addr: CellAddress) -> Option<&mut Cell> {
        let (r, c) = self.offsets(addr)?;
        self.rows.get_mut(r)?.get_mut(c)
    }

    /// Replace the cell at `addr`, returning false when it is out of bounds
    pub fn set(&mut self, addr: CellAddress, cell: Cell) -> bool {
        match self.get_mut(addr) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Rows of cells, top to bottom
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Iterate over every cell with its address, row-major
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &Cell)> + '_ {
        let start = self.range.start;
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.iter().enumerate().map(move |(c, cell)| {
                (
                    CellAddress::new(start.row + r as u32, start.col + c as u16),
                    cell,
                )
            })
        })
    }
}

/// Decoded styles keyed by address, holding only non-empty styles
pub type StyleMap = BTreeMap<CellAddress, CellStyle>;

/// The loaded, editable state of the active sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetView {
    /// Name of the sheet the view was loaded from
    pub sheet_name: String,
    /// The editable cells
    pub grid: Grid,
    /// Decoded styles for preview
    pub styles: StyleMap,
    /// Merged regions, read-only
    pub merges: Vec<CellRange>,
}

impl SheetView {
    /// The merged region covering (`row`, `col`), if any
    pub fn merge_containing(&self, row: u32, col: u16) -> Option<&CellRange> {
        let addr = CellAddress::new(row, col);
        self.merges.iter().find(|range| range.contains(&addr))
    }

    /// Whether (`row`, `col`) is part of a merged region
    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        self.merge_containing(row, col).is_some()
    }

    /// Decoded style at `addr`
    pub fn style(&self, addr: CellAddress) -> Option<&CellStyle> {
        self.styles.get(&addr)
    }
}

/// The rectangle the loader walks for `sheet`
///
/// The declared dimension wins; a sheet without one falls back to the
/// bounding box of its entries, and an empty sheet to `A1`. A declared
/// dimension larger than `limit` cells is clipped to the entries it covers.
pub fn occupied_range(sheet: &Sheet, limit: u64) -> CellRange {
    let used = sheet.used_range();
    match sheet.dimension() {
        Some(declared) if declared.cell_count() <= limit => declared,
        Some(declared) => {
            let clipped = used
                .and_then(|used| declared.intersection(&used))
                .unwrap_or_else(|| CellRange::single(declared.start));
            log::warn!(
                "sheet '{}' declares {} ({} cells); loading {} instead",
                sheet.name(),
                declared,
                declared.cell_count(),
                clipped
            );
            clipped
        }
        None => used.unwrap_or_else(|| CellRange::single(CellAddress::new(0, 0))),
    }
}

/// Load the named sheet into a [`SheetView`] of at most
/// [`DEFAULT_GRID_CELL_LIMIT`] cells
pub fn load_sheet(workbook: &Workbook, name: &str) -> Result<Option<SheetView>> {
    load_sheet_within(workbook, name, DEFAULT_GRID_CELL_LIMIT)
}

/// Load the named sheet into a [`SheetView`]
///
/// Returns `Ok(None)` when the workbook has no such sheet, and
/// [`Error::SheetTooLarge`] when the sheet's entries span more than `limit`
/// cells.
pub fn load_sheet_within(
    workbook: &Workbook,
    name: &str,
    limit: u64,
) -> Result<Option<SheetView>> {
    let Some(sheet) = workbook.sheet(name) else {
        return Ok(None);
    };
    let range = occupied_range(sheet, limit);
    if range.cell_count() > limit {
        return Err(Error::SheetTooLarge {
            sheet: name.to_string(),
            cells: range.cell_count(),
            limit,
        });
    }

    let mut grid = Grid::new(range);
    let mut styles = StyleMap::new();

    for (addr, stored) in sheet.cells().filter(|(addr, _)| range.contains(addr)) {
        let cell = Cell::from_stored(stored, workbook.styles());
        if let Some(style) = &cell.style {
            styles.insert(addr, style.clone());
        }
        grid.set(addr, cell);
    }

    log::debug!(
        "loaded sheet '{}' ({}, {} styled cells, {} merges)",
        name,
        range,
        styles.len(),
        sheet.merges().len()
    );

    Ok(Some(SheetView {
        sheet_name: name.to_string(),
        grid,
        styles,
        merges: sheet.merges().to_vec(),
    }))
}
