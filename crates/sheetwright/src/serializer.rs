//! Writing the grid back into the persisted workbook and encoding it
//!
//! [`reconcile`] is the only path by which edits reach a [`Sheet`]. It walks
//! the grid row-major and, per address, either leaves the persisted entry
//! alone, deletes it, or overwrites its value, type and formula. Style
//! indices and any field not named here are never touched on an overwrite.
//!
//! [`saved_entries`] and [`restore_entries`] capture and put back the exact
//! persisted entries around a batch, which is how undo gets style indices
//! and cached display text back for cells a batch deleted or rewrote.

use std::collections::BTreeSet;

use sheetwright_core::{CellAddress, CellKind, Sheet, StoredCell, Workbook};
use sheetwright_xlsx::{WriteOptions, XlsxWriter};

use crate::error::{Error, Result};
use crate::view::{Cell, Grid};

/// Counts from one reconcile pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Entries whose value, type or formula were written
    pub written: usize,
    /// Entries deleted
    pub cleared: usize,
}

/// What [`reconcile_cell`] did to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Value, type or formula were written
    Written,
    /// The entry was deleted
    Cleared,
}

/// A persisted entry as it was before a batch (`None`: no entry)
pub type SavedEntry = (CellAddress, Option<StoredCell>);

/// Bring the persisted entry at `addr` in line with `cell`
///
/// Returns which kind of change (if any) was made.
pub fn reconcile_cell(sheet: &mut Sheet, addr: CellAddress, cell: &Cell) -> Option<Reconciled> {
    if cell.is_blank() {
        let existing = sheet.cell(addr)?;
        if existing.value.is_empty() && existing.formula.is_none() {
            // Never held a value; an untouched stub stays as it is
            return None;
        }
        // No value and no formula left: the entry goes, style index included
        sheet.remove_cell(addr);
        return Some(Reconciled::Cleared);
    }

    let existing = sheet.cell(addr);
    let mut next = existing.cloned().unwrap_or_default();
    next.kind = cell
        .kind
        .or_else(|| next.kind.filter(|kind| *kind != CellKind::Stub))
        .or_else(|| cell.value.inferred_kind());
    next.formula = cell.formula.clone();
    if !cell.value.is_empty() && next.value != cell.value {
        next.value = cell.value.clone();
        // The cached display text belonged to the old value
        next.display = None;
    }

    if existing == Some(&next) {
        return None;
    }
    sheet.set_cell(addr, next);
    Some(Reconciled::Written)
}

/// Reconcile every cell of `grid` into `sheet`
///
/// Entries outside the grid's rectangle are left untouched.
pub fn reconcile(grid: &Grid, sheet: &mut Sheet) -> ReconcileStats {
    let mut stats = ReconcileStats::default();
    for (addr, cell) in grid.cells() {
        match reconcile_cell(sheet, addr, cell) {
            Some(Reconciled::Written) => stats.written += 1,
            Some(Reconciled::Cleared) => stats.cleared += 1,
            None => {}
        }
    }
    log::debug!(
        "reconciled '{}' over {}: {} written, {} cleared",
        sheet.name(),
        grid.range(),
        stats.written,
        stats.cleared
    );
    stats
}

/// Copy the persisted entries at `addrs`, keeping the first of any repeats
pub fn saved_entries<I>(sheet: &Sheet, addrs: I) -> Vec<SavedEntry>
where
    I: IntoIterator<Item = CellAddress>,
{
    let mut seen = BTreeSet::new();
    addrs
        .into_iter()
        .filter(|addr| seen.insert(*addr))
        .map(|addr| (addr, sheet.cell(addr).cloned()))
        .collect()
}

/// Put saved entries back verbatim, deleting those that did not exist
pub fn restore_entries(sheet: &mut Sheet, saved: &[SavedEntry]) {
    for (addr, entry) in saved {
        match entry {
            Some(stored) => sheet.set_cell(*addr, stored.clone()),
            None => {
                sheet.remove_cell(*addr);
            }
        }
    }
}

/// Encode `workbook` as xlsx with styles, shared strings and compression
pub fn encode(workbook: &Workbook) -> Result<Vec<u8>> {
    let bytes =
        XlsxWriter::to_bytes(workbook, &WriteOptions::default()).map_err(Error::SerializeFailure)?;
    log::debug!(
        "encoded workbook: {} sheets, {} bytes",
        workbook.sheet_count(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetwright_core::{CellRange, CellValue};

    fn sheet() -> Sheet {
        let mut sheet = Sheet::new("Prices");
        sheet.set_cell(CellAddress::new(0, 0), StoredCell::with_value("Item".into()));
        sheet.set_cell(
            CellAddress::new(1, 1),
            StoredCell::with_value(CellValue::Number(100.0)).styled(3),
        );
        sheet.set_cell(CellAddress::new(2, 1), StoredCell::stub(Some(3)));
        sheet.set_cell(
            CellAddress::new(5, 5),
            StoredCell::with_value("outside".into()),
        );
        sheet.set_dimension(Some(CellRange::from_indices(0, 0, 2, 1)));
        sheet
    }

    fn grid_of(sheet: &Sheet) -> Grid {
        let range = CellRange::from_indices(0, 0, 2, 1);
        let mut grid = Grid::new(range);
        for (addr, stored) in sheet.cells().filter(|(a, _)| range.contains(a)) {
            grid.set(
                addr,
                Cell {
                    value: stored.value.clone(),
                    formula: stored.formula.clone(),
                    kind: stored.kind.filter(|k| *k != CellKind::Stub),
                    style: None,
                },
            );
        }
        grid
    }

    #[test]
    fn test_unchanged_grid_is_noop() {
        let mut persisted = sheet();
        let before = persisted.clone();
        let stats = reconcile(&grid_of(&before), &mut persisted);

        assert_eq!(stats, ReconcileStats::default());
        assert_eq!(persisted, before);
    }

    #[test]
    fn test_value_overwrite_keeps_style() {
        let mut persisted = sheet();
        let mut grid = grid_of(&persisted);
        grid.set(CellAddress::new(1, 1), Cell::new(CellValue::Number(120.0)));

        let stats = reconcile(&grid, &mut persisted);

        assert_eq!(stats.written, 1);
        let b2 = persisted.cell(CellAddress::new(1, 1)).unwrap();
        assert_eq!(b2.value, CellValue::Number(120.0));
        assert_eq!(b2.style_id, Some(3));
        assert_eq!(b2.kind, Some(CellKind::Number));
    }

    #[test]
    fn test_new_entry_is_synthesized() {
        let mut persisted = sheet();
        let mut grid = grid_of(&persisted);
        grid.set(
            CellAddress::new(2, 0),
            Cell {
                formula: Some("B2*2".into()),
                ..Cell::new(CellValue::Number(200.0))
            },
        );

        reconcile(&grid, &mut persisted);

        let a3 = persisted.cell(CellAddress::new(2, 0)).unwrap();
        assert_eq!(a3.formula.as_deref(), Some("B2*2"));
        assert_eq!(a3.value, CellValue::Number(200.0));
        assert_eq!(a3.style_id, None);
    }

    #[test]
    fn test_cleared_cells() {
        let mut persisted = sheet();
        let mut grid = grid_of(&persisted);
        grid.set(CellAddress::new(0, 0), Cell::default());
        grid.set(CellAddress::new(1, 1), Cell::default());

        let stats = reconcile(&grid, &mut persisted);
        assert_eq!(stats.cleared, 2);

        // Both entries are deleted, the styled one included
        assert!(persisted.cell(CellAddress::new(0, 0)).is_none());
        assert!(persisted.cell(CellAddress::new(1, 1)).is_none());
        // A stub that never held a value is left alone
        assert_eq!(
            persisted.cell(CellAddress::new(2, 1)),
            Some(&StoredCell::stub(Some(3)))
        );
        // Nothing outside the grid moves
        assert_eq!(
            persisted.cell(CellAddress::new(5, 5)).unwrap().value,
            CellValue::text("outside")
        );
    }

    #[test]
    fn test_cleared_formula_cell_is_deleted() {
        let mut persisted = sheet();
        persisted.set_cell(
            CellAddress::new(0, 1),
            StoredCell::with_value(CellValue::Number(2.0))
                .with_formula("1+1")
                .styled(3),
        );
        let mut grid = grid_of(&persisted);
        grid.set(CellAddress::new(0, 1), Cell::default());

        assert_eq!(
            reconcile_cell(&mut persisted, CellAddress::new(0, 1), &Cell::default()),
            Some(Reconciled::Cleared)
        );
        assert!(persisted.cell(CellAddress::new(0, 1)).is_none());
        assert_eq!(reconcile(&grid, &mut persisted), ReconcileStats::default());
    }

    #[test]
    fn test_saved_entries_restore_verbatim() {
        let mut persisted = sheet();
        let mut shown = StoredCell::with_value(CellValue::Number(100.0)).styled(3);
        shown.display = Some("$100.00".into());
        shown.number_format = Some("\"$\"#,##0.00".into());
        persisted.set_cell(CellAddress::new(1, 1), shown.clone());
        let original = persisted.clone();

        let b2 = CellAddress::new(1, 1);
        let a3 = CellAddress::new(2, 0);
        let saved = saved_entries(&persisted, [b2, a3, b2]);
        assert_eq!(saved, vec![(b2, Some(shown)), (a3, None)]);

        let mut grid = grid_of(&persisted);
        grid.set(b2, Cell::default());
        grid.set(a3, Cell::new(CellValue::Number(1.0)));
        reconcile(&grid, &mut persisted);
        assert!(persisted.cell(b2).is_none());
        assert!(persisted.cell(a3).is_some());

        restore_entries(&mut persisted, &saved);
        assert_eq!(persisted, original);
    }

    #[test]
    fn test_formula_cleared_when_grid_has_none() {
        let mut persisted = sheet();
        persisted.set_cell(
            CellAddress::new(0, 1),
            StoredCell::with_value(CellValue::Number(2.0)).with_formula("1+1"),
        );
        let mut grid = grid_of(&persisted);
        grid.get_mut(CellAddress::new(0, 1)).unwrap().formula = None;

        reconcile(&grid, &mut persisted);

        let b1 = persisted.cell(CellAddress::new(0, 1)).unwrap();
        assert_eq!(b1.formula, None);
        assert_eq!(b1.value, CellValue::Number(2.0));
    }

    #[test]
    fn test_formula_only_keeps_cached_value() {
        let mut persisted = sheet();
        let mut grid = grid_of(&persisted);
        grid.set(
            CellAddress::new(1, 1),
            Cell {
                formula: Some("A1".into()),
                ..Cell::default()
            },
        );

        reconcile(&grid, &mut persisted);

        let b2 = persisted.cell(CellAddress::new(1, 1)).unwrap();
        assert_eq!(b2.formula.as_deref(), Some("A1"));
        assert_eq!(b2.value, CellValue::Number(100.0));
        assert_eq!(b2.kind, Some(CellKind::Number));
    }
}
