//! Applying address-keyed updates to a grid

use sheetwright_core::{CellAddress, CellValue};

use crate::error::Error;
use crate::view::{Cell, Grid};

/// One requested change to a cell
///
/// Each field distinguishes "leave alone" (`None`) from "set", and setting
/// includes clearing: `value: Some(CellValue::Empty)` empties the value and
/// `formula: Some(None)` removes the formula.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellUpdate {
    /// Target address in A1 notation
    pub address: String,
    /// New value
    pub value: Option<CellValue>,
    /// New formula, without the leading `=`
    pub formula: Option<Option<String>>,
}

impl CellUpdate {
    /// An update for `address` that changes nothing yet
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Set the value
    pub fn with_value<V: Into<CellValue>>(mut self, value: V) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the formula; a leading `=` is dropped and an empty formula clears
    pub fn with_formula<S: AsRef<str>>(mut self, formula: S) -> Self {
        self.formula = Some(normalize_formula(formula.as_ref()));
        self
    }

    /// Remove the formula
    pub fn clear_formula(mut self) -> Self {
        self.formula = Some(None);
        self
    }
}

/// Strip the leading `=` from formula text, mapping blank text to `None`
pub fn normalize_formula(formula: &str) -> Option<String> {
    let trimmed = formula.trim();
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed).trim_start();
    (!body.is_empty()).then(|| body.to_string())
}

/// A change applied to one cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    /// Address of the changed cell
    pub address: CellAddress,
    /// The cell before the update
    pub before: Cell,
    /// The cell after the update
    pub after: Cell,
}

impl CellChange {
    /// Value before the update
    pub fn before_value(&self) -> &CellValue {
        &self.before.value
    }

    /// Value after the update
    pub fn after_value(&self) -> &CellValue {
        &self.after.value
    }
}

/// An update that was dropped without touching the grid
#[derive(Debug)]
pub struct SkippedUpdate {
    /// The update as requested
    pub update: CellUpdate,
    /// Why it was dropped, always [`Error::Address`]
    pub reason: Error,
}

/// Result of applying a batch
#[derive(Debug)]
pub struct ApplyOutcome {
    /// The updated grid; the input grid is left as it was
    pub grid: Grid,
    /// Applied changes, in update order
    pub changes: Vec<CellChange>,
    /// Updates that were dropped
    pub skipped: Vec<SkippedUpdate>,
}

impl ApplyOutcome {
    /// Whether no update was applied
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn resolve_address(grid: &Grid, address: &str) -> Result<CellAddress, Error> {
    let addr = CellAddress::parse(address.trim()).map_err(|e| Error::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    if !grid.contains(addr) {
        return Err(Error::Address {
            address: address.to_string(),
            reason: format!("outside the sheet's {} range", grid.range()),
        });
    }
    Ok(addr)
}

/// Apply `updates` in order to a copy of `grid`
///
/// Updates are independent: a bad address drops that update only. Cells not
/// named by any update are carried over unchanged, style included.
pub fn apply_updates(grid: &Grid, updates: &[CellUpdate]) -> ApplyOutcome {
    let mut next = grid.clone();
    let mut changes = Vec::with_capacity(updates.len());
    let mut skipped = Vec::new();

    for update in updates {
        let addr = match resolve_address(&next, &update.address) {
            Ok(addr) => addr,
            Err(reason) => {
                log::warn!("skipping update: {}", reason);
                skipped.push(SkippedUpdate {
                    update: update.clone(),
                    reason,
                });
                continue;
            }
        };
        let Some(slot) = next.get_mut(addr) else {
            continue;
        };

        let before = slot.clone();
        let mut after = before.clone();
        if let Some(value) = &update.value {
            after.value = value.clone();
            after.kind = value.inferred_kind();
        }
        if let Some(formula) = &update.formula {
            after.formula = formula.clone();
        }

        *slot = after.clone();
        changes.push(CellChange {
            address: addr,
            before,
            after,
        });
    }

    ApplyOutcome {
        grid: next,
        changes,
        skipped,
    }
}
