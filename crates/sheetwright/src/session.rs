//! The edit session
//!
//! A [`Session`] owns everything derived from one uploaded workbook: the
//! persisted [`Workbook`], the [`SheetView`] of the active sheet, and the
//! [`Ledger`] of applied instructions. The view's grid is the mutable source
//! of truth; the workbook is brought up to date by the serializer's
//! reconcile pass after every applied batch, before switching sheets, and
//! before every download. Undo puts back the entries saved with the batch.
//!
//! Instructions run one at a time. [`Session::begin_instruction`] takes the
//! snapshot and marks the session busy; until the matching
//! [`Session::complete_instruction`] or [`Session::abandon`], every other
//! state-changing call fails with [`Error::Busy`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sheetwright::{Session, SessionConfig, Translator, TranslationRequest, BoxError};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.load_path("prices.xlsx")?;
//!
//! let translator: Arc<dyn Translator> = Arc::new(|_: &TranslationRequest| -> Result<String, BoxError> {
//!     Ok(r#"{"updates": [{"address": "B2", "value": 120}], "explanation": "Raised B2"}"#.into())
//! });
//! let report = session.run_instruction(translator, "raise the widget price to 120")?;
//! println!("{} cells changed", report.changes.len());
//!
//! let (name, bytes) = session.download()?;
//! std::fs::write(name, bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;

use chrono::{Local, NaiveDate};
use sheetwright_core::{Sheet, Workbook};

use crate::applier::{apply_updates, ApplyOutcome, CellChange, SkippedUpdate};
use crate::config::SessionConfig;
use crate::error::{Error, FormatError, Result};
use crate::format::FileFormat;
use crate::ledger::{HistoryEntry, Ledger};
use crate::naming::output_file_name_with_suffix;
use crate::serializer::{encode, reconcile, restore_entries, saved_entries};
use crate::translator::{parse_translation, BoxError, Translation, TranslationRequest, Translator};
use crate::view::{load_sheet_within, SheetView};

/// An instruction whose translation is outstanding
///
/// Obtained from [`Session::begin_instruction`] and handed back to
/// [`Session::complete_instruction`] or [`Session::abandon`].
#[derive(Debug)]
pub struct PendingInstruction {
    ticket: u64,
    instruction: String,
    request: TranslationRequest,
}

impl PendingInstruction {
    /// Ticket number identifying this instruction
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// The instruction text
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// The request to send to the translator
    pub fn request(&self) -> &TranslationRequest {
        &self.request
    }
}

/// What an applied instruction did
#[derive(Debug)]
pub struct EditReport {
    /// Id of the history entry recorded for this batch
    pub entry_id: u64,
    /// Explanation from the translator
    pub explanation: String,
    /// Applied changes, in update order
    pub changes: Vec<CellChange>,
    /// Updates that were dropped
    pub skipped: Vec<SkippedUpdate>,
}

/// One user's editing session over one workbook
#[derive(Debug, Default)]
pub struct Session {
    config: SessionConfig,
    workbook: Option<Workbook>,
    source_name: Option<String>,
    view: Option<SheetView>,
    ledger: Ledger,
    in_flight: Option<u64>,
    next_ticket: u64,
}

impl Session {
    /// Create an empty session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            ledger: Ledger::new(config.history_limit),
            config,
            ..Self::default()
        }
    }

    /// The session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The loaded workbook, as of the last sync
    pub fn workbook(&self) -> Option<&Workbook> {
        self.workbook.as_ref()
    }

    /// Name of the file the workbook was loaded from
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// The active sheet's view
    pub fn view(&self) -> Option<&SheetView> {
        self.view.as_ref()
    }

    /// Name of the active sheet
    pub fn active_sheet(&self) -> Option<&str> {
        self.view.as_ref().map(|v| v.sheet_name.as_str())
    }

    /// Sheet names of the loaded workbook
    pub fn sheet_names(&self) -> Vec<&str> {
        self.workbook
            .as_ref()
            .map(Workbook::sheet_names)
            .unwrap_or_default()
    }

    /// Edit history, oldest first
    pub fn history(&self) -> &Ledger {
        &self.ledger
    }

    /// Whether an instruction is in flight
    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.in_flight {
            Some(_) => Err(Error::Busy),
            None => Ok(()),
        }
    }

    /// Load a workbook from bytes, choosing the reader by `name`'s extension
    ///
    /// On success every previous piece of state is replaced and the first
    /// sheet becomes active. On failure nothing changes.
    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.ensure_idle()?;
        let format = FileFormat::detect(name)?;
        let workbook = format.read(bytes)?;

        for part in workbook.dropped_parts() {
            log::warn!("'{}': {} will not be kept", name, part);
        }
        let view = match workbook.sheet_names().first() {
            Some(first) => load_sheet_within(&workbook, first, self.config.grid_cell_limit)?,
            None => None,
        };
        log::debug!(
            "loaded '{}' as {:?}: {} sheets",
            name,
            format,
            workbook.sheet_count()
        );

        self.workbook = Some(workbook);
        self.view = view;
        self.source_name = Some(name.to_string());
        self.ledger.clear();
        Ok(())
    }

    /// Load a workbook from disk
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.ensure_idle()?;
        let path = path.as_ref();
        FileFormat::detect(path)?;
        let bytes = std::fs::read(path).map_err(FormatError::Io)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_bytes(&name, &bytes)
    }

    /// Write the active grid back into the workbook
    fn sync(&mut self) -> Result<()> {
        let workbook = self.workbook.as_mut().ok_or(Error::NoWorkbook)?;
        if let Some(view) = &self.view {
            if let Some(sheet) = workbook.sheet_mut(&view.sheet_name) {
                reconcile(&view.grid, sheet);
            }
        }
        Ok(())
    }

    /// Make `name` the active sheet
    ///
    /// The current grid is synced first. Returns `Ok(false)` and changes
    /// nothing when the workbook has no such sheet; a sheet too large to
    /// view leaves the current view in place as well.
    pub fn select_sheet(&mut self, name: &str) -> Result<bool> {
        self.ensure_idle()?;
        let exists = self
            .workbook
            .as_ref()
            .ok_or(Error::NoWorkbook)?
            .sheet(name)
            .is_some();
        if !exists {
            log::debug!("no sheet named '{}'; keeping current view", name);
            return Ok(false);
        }

        self.sync()?;
        let limit = self.config.grid_cell_limit;
        let view = match self.workbook.as_ref() {
            Some(workbook) => load_sheet_within(workbook, name, limit)?,
            None => None,
        };
        match view {
            Some(view) => {
                self.view = Some(view);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Start an instruction: snapshot the active grid and mark the session busy
    pub fn begin_instruction(&mut self, instruction: &str) -> Result<PendingInstruction> {
        self.ensure_idle()?;
        let view = self.view.as_ref().ok_or(Error::NoWorkbook)?;
        let request = TranslationRequest::new(instruction, &view.grid);

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight = Some(ticket);
        log::debug!(
            "instruction #{} started with {} non-empty cells",
            ticket,
            request.cells.len()
        );

        Ok(PendingInstruction {
            ticket,
            instruction: instruction.to_string(),
            request,
        })
    }

    /// Finish an instruction with the translator's response
    ///
    /// A translator error or an unparsable response is a
    /// [`Error::TranslationFailure`]; a response with no usable updates is
    /// [`Error::EmptyResult`]. Either way the grid is untouched and the
    /// session is idle again.
    pub fn complete_instruction(
        &mut self,
        pending: PendingInstruction,
        response: std::result::Result<String, BoxError>,
    ) -> Result<EditReport> {
        if self.in_flight != Some(pending.ticket) {
            return Err(Error::StaleInstruction(pending.ticket));
        }
        self.in_flight = None;

        let text = response.map_err(|e| {
            log::warn!("translator failed for instruction #{}: {}", pending.ticket, e);
            Error::translation(e.to_string())
        })?;
        let translation = parse_translation(&text)?;
        self.commit(&pending.instruction, translation)
    }

    /// Give up on an instruction; nothing from it will be applied
    pub fn abandon(&mut self, pending: PendingInstruction) {
        if self.in_flight == Some(pending.ticket) {
            self.in_flight = None;
            log::warn!("instruction #{} abandoned", pending.ticket);
        }
    }

    /// Run an instruction end to end through `translator`
    ///
    /// The translator is called on its own thread. If it does not answer
    /// within the configured timeout the call is abandoned and its eventual
    /// answer discarded.
    pub fn run_instruction(
        &mut self,
        translator: Arc<dyn Translator>,
        instruction: &str,
    ) -> Result<EditReport> {
        let pending = self.begin_instruction(instruction)?;
        let request = pending.request.clone();
        let (tx, rx) = mpsc::sync_channel(1);

        let spawned = thread::Builder::new()
            .name("sheetwright-translator".into())
            .spawn(move || {
                // The receiver is gone once the call has been abandoned
                let _ = tx.send(translator.translate(&request));
            });
        if let Err(e) = spawned {
            self.abandon(pending);
            return Err(Error::translation(format!("could not start translator: {}", e)));
        }

        let received = match self.config.translator_timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                mpsc::RecvTimeoutError::Timeout => format!("no response within {:?}", timeout),
                mpsc::RecvTimeoutError::Disconnected => "translator stopped without responding".into(),
            }),
            None => rx
                .recv()
                .map_err(|_| "translator stopped without responding".to_string()),
        };

        match received {
            Ok(response) => self.complete_instruction(pending, response),
            Err(reason) => {
                log::warn!("instruction #{}: {}", pending.ticket, reason);
                self.abandon(pending);
                Err(Error::TranslationFailure(reason))
            }
        }
    }

    /// Apply an already-decoded translation to the active sheet
    pub fn apply_translation(
        &mut self,
        instruction: &str,
        translation: Translation,
    ) -> Result<EditReport> {
        self.ensure_idle()?;
        self.commit(instruction, translation)
    }

    fn commit(&mut self, instruction: &str, translation: Translation) -> Result<EditReport> {
        let view = self.view.as_mut().ok_or(Error::NoWorkbook)?;
        let workbook = self.workbook.as_mut().ok_or(Error::NoWorkbook)?;
        let Translation {
            updates,
            explanation,
        } = translation;

        if updates.is_empty() {
            log::info!("translator returned no updates");
            return Err(Error::EmptyResult { explanation });
        }

        let outcome = apply_updates(&view.grid, &updates);
        if outcome.is_empty() {
            log::info!("none of {} updates could be applied", updates.len());
            return Err(Error::EmptyResult { explanation });
        }

        let ApplyOutcome {
            grid,
            mut changes,
            skipped,
        } = outcome;
        view.grid = grid;
        let saved = match workbook.sheet_mut(&view.sheet_name) {
            Some(sheet) => {
                let saved = saved_entries(sheet, changes.iter().map(|c| c.address));
                reconcile(&view.grid, sheet);
                forget_deleted_styles(view, sheet, &mut changes);
                saved
            }
            None => Vec::new(),
        };

        let entry_id = self.ledger.record(
            instruction,
            &explanation,
            &view.sheet_name,
            changes.clone(),
            saved,
        );
        log::info!(
            "applied {} updates to '{}' ({} skipped)",
            changes.len(),
            view.sheet_name,
            skipped.len()
        );

        Ok(EditReport {
            entry_id,
            explanation,
            changes,
            skipped,
        })
    }

    /// Revert the most recent history entry
    ///
    /// Every changed cell gets its before state back, in the grid when its
    /// sheet is active and in the workbook either way. Persisted entries are
    /// restored verbatim, so a deleted cell regains its style index and a
    /// rewritten one its cached display text. Returns the reverted entry, or
    /// `None` when the history is empty.
    pub fn undo(&mut self) -> Result<Option<HistoryEntry>> {
        self.ensure_idle()?;
        let Some(entry) = self.ledger.pop() else {
            return Ok(None);
        };
        let Some(workbook) = self.workbook.as_mut() else {
            return Ok(Some(entry));
        };
        let Some(sheet) = workbook.sheet_mut(&entry.sheet) else {
            return Ok(Some(entry));
        };

        if let Some(view) = self.view.as_mut().filter(|v| v.sheet_name == entry.sheet) {
            for change in entry.changes.iter().rev() {
                view.grid.set(change.address, change.before.clone());
                match &change.before.style {
                    Some(style) => {
                        view.styles.insert(change.address, style.clone());
                    }
                    None => {
                        view.styles.remove(&change.address);
                    }
                }
            }
        }
        restore_entries(sheet, &entry.saved);

        log::info!(
            "undid entry #{} ({} cells on '{}')",
            entry.id,
            entry.changes.len(),
            entry.sheet
        );
        Ok(Some(entry))
    }

    /// Drop the most recent history entry without reverting anything
    pub fn dismiss_last_entry(&mut self) -> Result<Option<HistoryEntry>> {
        self.ensure_idle()?;
        Ok(self.ledger.pop())
    }

    /// Discard the workbook, view and history
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.workbook = None;
        self.view = None;
        self.source_name = None;
        self.ledger.clear();
        log::debug!("session reset");
        Ok(())
    }

    /// Sync and encode the workbook, named for today
    pub fn download(&mut self) -> Result<(String, Vec<u8>)> {
        self.download_as_of(Local::now().date_naive())
    }

    /// Sync and encode the workbook, named for `date`
    pub fn download_as_of(&mut self, date: NaiveDate) -> Result<(String, Vec<u8>)> {
        self.ensure_idle()?;
        self.sync()?;
        let workbook = self.workbook.as_ref().ok_or(Error::NoWorkbook)?;
        let bytes = encode(workbook)?;
        let name = output_file_name_with_suffix(
            self.source_name.as_deref().unwrap_or_default(),
            &self.config.output_suffix,
            date,
        );
        Ok((name, bytes))
    }
}

/// Drop the grid style of cleared cells whose entries reconcile deleted
///
/// The change records follow, so the history shows the formatting as lost.
fn forget_deleted_styles(view: &mut SheetView, sheet: &Sheet, changes: &mut [CellChange]) {
    for change in changes.iter_mut() {
        if !change.after.is_blank() || sheet.cell(change.address).is_some() {
            continue;
        }
        change.after.style = None;
        if let Some(cell) = view.grid.get_mut(change.address) {
            cell.style = None;
        }
        view.styles.remove(&change.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::CellUpdate;
    use crate::view::{load_sheet, Grid};
    use pretty_assertions::assert_eq;
    use sheetwright_core::{CellAddress, CellRange, CellValue, StoredCell};

    fn pending(ticket: u64) -> PendingInstruction {
        let grid = Grid::new(CellRange::single(CellAddress::new(0, 0)));
        PendingInstruction {
            ticket,
            instruction: "late".into(),
            request: TranslationRequest::new("late", &grid),
        }
    }

    #[test]
    fn test_stale_completion_is_rejected() {
        let mut session = Session::new(SessionConfig::default());
        let err = session
            .complete_instruction(pending(7), Ok("{}".into()))
            .unwrap_err();
        assert!(matches!(err, Error::StaleInstruction(7)));
    }

    #[test]
    fn test_abandoning_a_stale_ticket_keeps_the_live_one() {
        let mut session = Session::new(SessionConfig::default());
        session.in_flight = Some(2);
        session.abandon(pending(1));
        assert!(session.is_processing());
        assert!(matches!(session.reset(), Err(Error::Busy)));
    }

    #[test]
    fn test_no_workbook() {
        let mut session = Session::new(SessionConfig::default());
        assert!(matches!(session.begin_instruction("x"), Err(Error::NoWorkbook)));
        assert!(matches!(session.download(), Err(Error::NoWorkbook)));
        assert!(matches!(session.select_sheet("Sheet1"), Err(Error::NoWorkbook)));
        assert!(session.undo().unwrap().is_none());
        assert!(session.sheet_names().is_empty());
    }

    #[test]
    fn test_undo_restores_cached_display() {
        let b2 = CellAddress::new(1, 1);
        let mut shown = StoredCell::with_value(CellValue::Number(100.0)).styled(0);
        shown.display = Some("$100.00".into());
        let mut sheet = Sheet::new("Prices");
        sheet.set_cell(CellAddress::new(0, 0), StoredCell::with_value("Item".into()));
        sheet.set_cell(b2, shown.clone());
        let mut workbook = Workbook::new();
        workbook.push_sheet(sheet).unwrap();

        let mut session = Session::new(SessionConfig::default());
        session.view = load_sheet(&workbook, "Prices").unwrap();
        session.workbook = Some(workbook);

        for value in [CellValue::Number(120.0), CellValue::Empty] {
            let translation = Translation {
                updates: vec![CellUpdate::new("B2").with_value(value)],
                explanation: String::new(),
            };
            session.apply_translation("edit", translation).unwrap();
        }
        let prices = |session: &Session| session.workbook().unwrap().sheet("Prices").cloned();
        assert!(prices(&session).unwrap().cell(b2).is_none());

        session.undo().unwrap();
        let restored = prices(&session).unwrap();
        assert_eq!(restored.cell(b2).unwrap().value, CellValue::Number(120.0));
        assert_eq!(restored.cell(b2).unwrap().display, None);

        session.undo().unwrap();
        assert_eq!(prices(&session).unwrap().cell(b2), Some(&shown));
        assert_eq!(
            session.view().unwrap().grid.get(b2).unwrap().value,
            CellValue::Number(100.0)
        );
    }
}
