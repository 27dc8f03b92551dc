//! Persisted sheet structure

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellRange, StoredCell};

/// Width and visibility for a span of columns (`min..=max`, 0-based)
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// First column of the span
    pub min: u16,
    /// Last column of the span
    pub max: u16,
    /// Width in characters
    pub width: Option<f64>,
    /// Default style index for the span
    pub style_id: Option<u32>,
    /// Whether the width was set explicitly
    pub custom_width: bool,
    /// Hidden flag
    pub hidden: bool,
}

/// Height and visibility for a single row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowInfo {
    /// Height in points
    pub height: Option<f64>,
    /// Whether the height was set explicitly
    pub custom_height: bool,
    /// Hidden flag
    pub hidden: bool,
}

impl RowInfo {
    /// True when the row carries nothing worth writing
    pub fn is_default(&self) -> bool {
        !self.hidden && !(self.custom_height && self.height.is_some())
    }
}

/// Sheet visibility as stored in the workbook part
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SheetState {
    #[default]
    Visible,
    Hidden,
    /// Only unhidden programmatically
    VeryHidden,
}

impl SheetState {
    /// Parse the `state` attribute; unknown values read as visible
    pub fn from_attr(value: &str) -> Self {
        match value {
            "hidden" => SheetState::Hidden,
            "veryHidden" => SheetState::VeryHidden,
            _ => SheetState::Visible,
        }
    }

    /// The `state` attribute value, `None` when visible
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            SheetState::Visible => None,
            SheetState::Hidden => Some("hidden"),
            SheetState::VeryHidden => Some("veryHidden"),
        }
    }
}

/// A sheet in the persisted workbook structure
///
/// Cells are keyed structurally by [`CellAddress`] and iterate in row-major
/// order. Only addresses present in the source file (or synthesized by an
/// edit) have entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    state: SheetState,
    cells: BTreeMap<CellAddress, StoredCell>,
    dimension: Option<CellRange>,
    merges: Vec<CellRange>,
    columns: Vec<ColumnInfo>,
    rows: BTreeMap<u32, RowInfo>,
}

impl Sheet {
    /// Create a new, empty sheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            state: SheetState::Visible,
            cells: BTreeMap::new(),
            dimension: None,
            merges: Vec::new(),
            columns: Vec::new(),
            rows: BTreeMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Visibility of the sheet
    pub fn state(&self) -> SheetState {
        self.state
    }

    /// Set the sheet's visibility
    pub fn set_state(&mut self, state: SheetState) {
        self.state = state;
    }

    /// Get the persisted entry at `addr`
    pub fn cell(&self, addr: CellAddress) -> Option<&StoredCell> {
        self.cells.get(&addr)
    }

    /// Get a mutable reference to the persisted entry at `addr`
    pub fn cell_mut(&mut self, addr: CellAddress) -> Option<&mut StoredCell> {
        self.cells.get_mut(&addr)
    }

    /// Get the entry at `addr`, inserting an empty one first if absent
    pub fn cell_or_insert(&mut self, addr: CellAddress) -> &mut StoredCell {
        self.cells.entry(addr).or_default()
    }

    /// Insert or replace the entry at `addr`
    pub fn set_cell(&mut self, addr: CellAddress, cell: StoredCell) {
        self.cells.insert(addr, cell);
    }

    /// Remove the entry at `addr`, returning it
    pub fn remove_cell(&mut self, addr: CellAddress) -> Option<StoredCell> {
        self.cells.remove(&addr)
    }

    /// Iterate over persisted entries in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellAddress, &StoredCell)> {
        self.cells.iter().map(|(addr, cell)| (*addr, cell))
    }

    /// Number of persisted entries
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The occupied rectangle declared by the source file, if any
    pub fn dimension(&self) -> Option<CellRange> {
        self.dimension
    }

    /// Set the declared occupied rectangle
    pub fn set_dimension(&mut self, range: Option<CellRange>) {
        self.dimension = range;
    }

    /// Bounding rectangle of the persisted entries
    pub fn used_range(&self) -> Option<CellRange> {
        let mut keys = self.cells.keys();
        let first = *keys.next()?;
        Some(keys.fold(CellRange::single(first), |range, addr| {
            range.expanded_to(*addr)
        }))
    }

    /// Declared rectangle grown to cover every persisted entry
    pub fn extent(&self) -> Option<CellRange> {
        match (self.dimension, self.used_range()) {
            (Some(declared), Some(used)) => {
                Some(declared.expanded_to(used.start).expanded_to(used.end))
            }
            (declared, used) => declared.or(used),
        }
    }

    /// Merged regions
    pub fn merges(&self) -> &[CellRange] {
        &self.merges
    }

    /// Record a merged region
    pub fn add_merge(&mut self, range: CellRange) {
        if !self.merges.contains(&range) {
            self.merges.push(range);
        }
    }

    /// Column spans
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Record a column span
    pub fn add_column(&mut self, info: ColumnInfo) {
        self.columns.push(info);
    }

    /// Row formatting entries
    pub fn rows(&self) -> &BTreeMap<u32, RowInfo> {
        &self.rows
    }

    /// Record row formatting
    pub fn set_row(&mut self, row: u32, info: RowInfo) {
        if info.is_default() {
            self.rows.remove(&row);
        } else {
            self.rows.insert(row, info);
        }
    }
}
