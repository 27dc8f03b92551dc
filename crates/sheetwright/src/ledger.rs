//! Bounded edit history

use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::applier::CellChange;
use crate::serializer::SavedEntry;

/// One applied instruction
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Sequence number, unique within a session
    pub id: u64,
    /// When the batch was applied
    pub timestamp: DateTime<Local>,
    /// The instruction text
    pub instruction: String,
    /// Explanation returned by the translator
    pub explanation: String,
    /// Sheet the changes were applied to
    pub sheet: String,
    /// Per-cell changes, in application order
    pub changes: Vec<CellChange>,
    /// Whether every changed cell kept its style
    pub format_preserved: bool,
    /// Persisted entries at the changed addresses before the batch
    pub saved: Vec<SavedEntry>,
}

/// Append-only log of the most recent applied instructions
#[derive(Debug, Clone)]
pub struct Ledger {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
    next_id: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Ledger {
    /// An empty ledger keeping at most `limit` entries
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
            next_id: 1,
        }
    }

    /// Maximum number of entries kept
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append an entry, dropping the oldest past the limit
    ///
    /// Returns the new entry's id.
    pub fn record(
        &mut self,
        instruction: &str,
        explanation: &str,
        sheet: &str,
        changes: Vec<CellChange>,
        saved: Vec<SavedEntry>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let format_preserved = changes.iter().all(|c| c.before.style == c.after.style);
        self.entries.push_back(HistoryEntry {
            id,
            timestamp: Local::now(),
            instruction: instruction.to_string(),
            explanation: explanation.to_string(),
            sheet: sheet.to_string(),
            changes,
            format_preserved,
            saved,
        });
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        id
    }

    /// Remove and return the most recent entry
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    /// The most recent entry
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Cell;
    use pretty_assertions::assert_eq;
    use sheetwright_core::{CellAddress, CellStyle, CellValue};

    fn change(before: f64, after: f64) -> CellChange {
        CellChange {
            address: CellAddress::new(1, 1),
            before: Cell::new(CellValue::Number(before)),
            after: Cell::new(CellValue::Number(after)),
        }
    }

    #[test]
    fn test_bounded_to_limit() {
        let mut ledger = Ledger::new(10);
        for i in 0..12 {
            ledger.record(
                &format!("edit {}", i),
                "",
                "Sheet1",
                vec![change(0.0, 1.0)],
                Vec::new(),
            );
        }

        assert_eq!(ledger.len(), 10);
        let ids: Vec<u64> = ledger.iter().map(|e| e.id).collect();
        assert_eq!(ids, (3..=12).collect::<Vec<u64>>());
        assert_eq!(ledger.iter().next().unwrap().instruction, "edit 2");
        assert_eq!(ledger.last().unwrap().instruction, "edit 11");
    }

    #[test]
    fn test_pop_and_clear() {
        let mut ledger = Ledger::default();
        assert_eq!(ledger.limit(), 10);
        assert_eq!(ledger.pop(), None);

        let first = ledger.record("raise", "done", "Prices", vec![change(100.0, 120.0)], vec![]);
        let second = ledger.record("lower", "done", "Prices", vec![change(120.0, 90.0)], vec![]);
        assert!(second > first);

        let popped = ledger.pop().unwrap();
        assert_eq!(popped.id, second);
        assert_eq!(popped.changes[0].before_value(), &CellValue::Number(120.0));
        assert_eq!(ledger.len(), 1);

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_format_preserved_flag() {
        let mut ledger = Ledger::default();
        ledger.record("plain", "", "S", vec![change(1.0, 2.0)], Vec::new());
        assert!(ledger.last().unwrap().format_preserved);

        let mut restyled = change(1.0, 2.0);
        restyled.after.style = Some(CellStyle {
            bold: Some(true),
            ..Default::default()
        });
        ledger.record("restyle", "", "S", vec![restyled], Vec::new());
        assert!(!ledger.last().unwrap().format_preserved);
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut ledger = Ledger::new(0);
        ledger.record("x", "", "S", vec![change(1.0, 2.0)], Vec::new());
        assert!(ledger.is_empty());
    }
}
