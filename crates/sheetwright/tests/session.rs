//! End-to-end tests for the edit session (load -> instruct -> apply -> download)

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use common::*;
use pretty_assertions::assert_eq;
use sheetwright::{
    BoxError, CellAddress, CellKind, CellUpdate, CellValue, Error, Session, SessionConfig,
    Translation, TranslationRequest, Translator,
};
use sheetwright::CellRange;
use sheetwright_core::{decode_style, NamedRange, Sheet, StoredCell, Workbook};
use sheetwright_xlsx::{WriteOptions, XlsxReader, XlsxWriter};

fn raise_price() -> Translation {
    Translation {
        updates: vec![CellUpdate::new("B2").with_value(120.0)],
        explanation: "Raised the widget price".into(),
    }
}

/// The worked example: B2 100 -> 120 keeps bold and yellow, nothing else moves
#[test]
fn test_price_update_keeps_formatting() {
    let mut session = loaded_session(SessionConfig::default());
    assert_eq!(session.active_sheet(), Some("Prices"));

    let report = session
        .apply_translation("set the widget price to 120", raise_price())
        .unwrap();
    assert_eq!(report.changes.len(), 1);
    assert!(report.skipped.is_empty());

    let view = session.view().unwrap();
    let b2 = view.grid.get(CellAddress::new(1, 1)).unwrap();
    assert_eq!(b2.value, CellValue::Number(120.0));
    let style = b2.style.as_ref().unwrap();
    assert_eq!(style.bold, Some(true));
    assert_eq!(style.background_color.as_deref(), Some("#FFFF00"));

    assert_eq!(grid_value(&session, "A1"), CellValue::text("Item"));
    assert_eq!(grid_value(&session, "B1"), CellValue::text("Price"));
    assert_eq!(grid_value(&session, "A2"), CellValue::text("Widget"));

    let history: Vec<_> = session.history().iter().collect();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].instruction, "set the widget price to 120");
    assert_eq!(history[0].sheet, "Prices");
    assert!(history[0].format_preserved);
    assert_eq!(history[0].changes[0].before_value(), &CellValue::Number(100.0));
    assert_eq!(history[0].changes[0].after_value(), &CellValue::Number(120.0));

    // The persisted workbook was synced after the batch
    assert_eq!(stored_value(&session, "Prices", "B2"), CellValue::Number(120.0));
}

/// The downloaded file carries the edit and the original style
#[test]
fn test_download_preserves_styles() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    let (name, bytes) = session.download_as_of(day).unwrap();
    assert_eq!(name, "prices_edited_20240307.xlsx");

    let reread = XlsxReader::read_bytes(&bytes).unwrap();
    assert_eq!(reread.sheet_names(), vec!["Prices", "Notes"]);
    let prices = reread.sheet("Prices").unwrap();
    let b2 = prices.cell(CellAddress::new(1, 1)).unwrap();
    assert_eq!(b2.value, CellValue::Number(120.0));

    let style = decode_style(b2.style_id.and_then(|id| reread.styles().get(id)));
    assert_eq!(style.bold, Some(true));
    assert_eq!(style.background_color.as_deref(), Some("#FFFF00"));

    // Formula, styled blank and merge survive
    let b3 = prices.cell(CellAddress::new(2, 1)).unwrap();
    assert_eq!(b3.formula.as_deref(), Some("B2*2"));
    assert_eq!(
        prices.cell(CellAddress::new(2, 0)).unwrap().kind,
        Some(CellKind::Stub)
    );
    assert_eq!(prices.merges().len(), 1);

    // Defined names the formulas may use are written back
    assert_eq!(
        reread.named_ranges(),
        &[NamedRange::new("WidgetPrice", "Prices!$B$2")]
    );
}

/// Downloading without edits leaves every populated cell as it was
#[test]
fn test_round_trip_without_edits() {
    let mut session = loaded_session(SessionConfig::default());
    let original = session.workbook().unwrap().clone();

    let (_, bytes) = session.download().unwrap();
    let reread = XlsxReader::read_bytes(&bytes).unwrap();

    for sheet in original.sheets() {
        let copy = reread.sheet(sheet.name()).unwrap();
        for (addr, cell) in sheet.cells() {
            let other = copy.cell(addr).unwrap();
            assert_eq!(other.value, cell.value, "{}!{}", sheet.name(), addr);
            assert_eq!(other.formula, cell.formula, "{}!{}", sheet.name(), addr);
            assert_eq!(
                decode_style(other.style_id.and_then(|id| reread.styles().get(id))),
                decode_style(cell.style_id.and_then(|id| original.styles().get(id))),
                "{}!{}",
                sheet.name(),
                addr
            );
        }
    }
}

/// One valid update and one beyond the grid: the valid one lands, nothing else moves
#[test]
fn test_out_of_bounds_update_is_skipped() {
    let mut session = loaded_session(SessionConfig::default());
    let rows_before = session.view().unwrap().grid.row_count();

    let report = session
        .apply_translation(
            "fix prices",
            Translation {
                updates: vec![
                    CellUpdate::new("B2").with_value(120.0),
                    CellUpdate::new("B40").with_value(1.0),
                ],
                explanation: String::new(),
            },
        )
        .unwrap();

    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].update.address, "B40");
    assert_eq!(session.view().unwrap().grid.row_count(), rows_before);
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(120.0));
    assert!(session
        .workbook()
        .unwrap()
        .sheet("Prices")
        .unwrap()
        .cell(CellAddress::new(39, 1))
        .is_none());
}

/// Unparsable translator output: failure surfaced, grid and history unchanged
#[test]
fn test_unparsable_translation() {
    let mut session = loaded_session(SessionConfig::default());
    let before = session.view().unwrap().clone();

    let pending = session.begin_instruction("do something").unwrap();
    let err = session
        .complete_instruction(pending, Ok("I'm sorry, I can't help with that.".into()))
        .unwrap_err();

    assert!(matches!(err, Error::TranslationFailure(_)));
    assert!(err.is_recoverable());
    assert_eq!(session.view().unwrap(), &before);
    assert!(session.history().is_empty());
    assert!(!session.is_processing());
}

#[test]
fn test_translator_error_is_translation_failure() {
    let mut session = loaded_session(SessionConfig::default());
    let pending = session.begin_instruction("anything").unwrap();
    let err = session
        .complete_instruction(pending, Err("connection refused".into()))
        .unwrap_err();

    assert!(matches!(&err, Error::TranslationFailure(msg) if msg == "connection refused"));
    assert!(session.history().is_empty());
}

#[test]
fn test_empty_result_is_a_notice() {
    let mut session = loaded_session(SessionConfig::default());

    let pending = session.begin_instruction("nothing").unwrap();
    let err = session
        .complete_instruction(
            pending,
            Ok(r#"{"updates": [], "explanation": "Nothing to change"}"#.into()),
        )
        .unwrap_err();
    assert!(err.is_notice());
    assert!(matches!(&err, Error::EmptyResult { explanation } if explanation == "Nothing to change"));

    // Every update unusable counts the same
    let err = session
        .apply_translation(
            "nowhere",
            Translation {
                updates: vec![CellUpdate::new("ZZ999").with_value(1.0)],
                explanation: String::new(),
            },
        )
        .unwrap_err();
    assert!(err.is_notice());
    assert!(session.history().is_empty());
}

/// After 12 applied edits the history holds the latest 10
#[test]
fn test_history_is_bounded() {
    let mut session = loaded_session(SessionConfig::default());
    for i in 0..12 {
        let translation = Translation {
            updates: vec![CellUpdate::new("B2").with_value(i as f64)],
            explanation: String::new(),
        };
        session
            .apply_translation(&format!("edit {}", i), translation)
            .unwrap();
    }

    let history: Vec<_> = session.history().iter().collect();
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].instruction, "edit 2");
    assert_eq!(history[9].instruction, "edit 11");
}

#[test]
fn test_undo_restores_cells() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();
    session
        .apply_translation(
            "make it a formula",
            Translation {
                updates: vec![
                    CellUpdate::new("B2").with_formula("=B1&\"!\""),
                    CellUpdate::new("A2").with_value(CellValue::Empty),
                ],
                explanation: String::new(),
            },
        )
        .unwrap();
    assert_eq!(stored_value(&session, "Prices", "A2"), CellValue::Empty);

    let undone = session.undo().unwrap().unwrap();
    assert_eq!(undone.instruction, "make it a formula");
    let b2 = session
        .view()
        .unwrap()
        .grid
        .get(CellAddress::new(1, 1))
        .unwrap()
        .clone();
    assert_eq!(b2.formula, None);
    assert_eq!(b2.value, CellValue::Number(120.0));
    assert_eq!(grid_value(&session, "A2"), CellValue::text("Widget"));
    assert_eq!(stored_value(&session, "Prices", "A2"), CellValue::text("Widget"));

    session.undo().unwrap().unwrap();
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(100.0));
    assert_eq!(stored_value(&session, "Prices", "B2"), CellValue::Number(100.0));

    assert!(session.undo().unwrap().is_none());
}

#[test]
fn test_undo_on_inactive_sheet() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();
    assert!(session.select_sheet("Notes").unwrap());

    session.undo().unwrap().unwrap();
    assert_eq!(stored_value(&session, "Prices", "B2"), CellValue::Number(100.0));

    assert!(session.select_sheet("Prices").unwrap());
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(100.0));
}

#[test]
fn test_dismiss_last_entry_keeps_values() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();

    let dismissed = session.dismiss_last_entry().unwrap().unwrap();
    assert_eq!(dismissed.instruction, "raise");
    assert!(session.history().is_empty());
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(120.0));
}

#[test]
fn test_busy_guard() {
    let mut session = loaded_session(SessionConfig::default());
    let pending = session.begin_instruction("first").unwrap();
    assert!(session.is_processing());

    assert!(matches!(session.begin_instruction("second"), Err(Error::Busy)));
    assert!(matches!(
        session.apply_translation("direct", raise_price()),
        Err(Error::Busy)
    ));
    assert!(matches!(session.undo(), Err(Error::Busy)));
    assert!(matches!(session.select_sheet("Notes"), Err(Error::Busy)));
    assert!(matches!(session.download(), Err(Error::Busy)));
    assert!(matches!(session.reset(), Err(Error::Busy)));
    assert!(matches!(
        session.load_bytes("other.xlsx", &price_list_xlsx()),
        Err(Error::Busy)
    ));

    let ticket = pending.ticket();
    session.abandon(pending);
    assert!(!session.is_processing());

    // A fresh instruction can start; the abandoned one never lands
    let next = session.begin_instruction("third").unwrap();
    assert!(next.ticket() > ticket);
    session.abandon(next);
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(100.0));
}

#[test]
fn test_abandoned_instruction_never_lands() {
    let mut session = loaded_session(SessionConfig::default());
    let first = session.begin_instruction("first").unwrap();
    session.abandon(first);

    let second = session.begin_instruction("second").unwrap();
    let report = session
        .complete_instruction(
            second,
            Ok(r#"{"updates": [{"address": "B2", "value": 120}]}"#.into()),
        )
        .unwrap();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().last().unwrap().instruction, "second");
}

#[test]
fn test_run_instruction_through_translator() {
    let mut session = loaded_session(SessionConfig::default());
    let translator: Arc<dyn Translator> =
        Arc::new(|request: &TranslationRequest| -> Result<String, BoxError> {
            let b2 = request
                .cells
                .iter()
                .find(|cell| cell.address == "B2")
                .ok_or("no B2 in snapshot")?;
            let raised = b2.value.as_f64().ok_or("B2 is not numeric")? + 20.0;
            Ok(format!(
                "Here are the changes:\n{{\"updates\": [{{\"address\": \"B2\", \"value\": {}}}], \"explanation\": \"+20\"}}",
                raised
            ))
        });

    let report = session
        .run_instruction(translator, "raise B2 by 20")
        .unwrap();
    assert_eq!(report.explanation, "+20");
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(120.0));
    assert!(!session.is_processing());
}

#[test]
fn test_run_instruction_times_out() {
    let config = SessionConfig::default().with_translator_timeout(Some(Duration::from_millis(50)));
    let mut session = loaded_session(config);
    let before = session.view().unwrap().clone();

    let slow: Arc<dyn Translator> =
        Arc::new(|_: &TranslationRequest| -> Result<String, BoxError> {
            thread::sleep(Duration::from_millis(500));
            Ok(r#"{"updates": [{"address": "B2", "value": 1}]}"#.into())
        });

    let err = session.run_instruction(slow, "slow").unwrap_err();
    assert!(matches!(err, Error::TranslationFailure(_)));
    assert!(!session.is_processing());
    assert_eq!(session.view().unwrap(), &before);
    assert!(session.history().is_empty());
}

#[test]
fn test_run_instruction_with_fixed_answer() {
    let mut session = loaded_session(SessionConfig::default());
    let translator: Arc<dyn Translator> =
        Arc::new(answering(r#"[{"address": "A2", "value": "Gadget"}]"#));

    session.run_instruction(translator, "rename").unwrap();
    assert_eq!(grid_value(&session, "A2"), CellValue::text("Gadget"));
}

#[test]
fn test_select_sheet() {
    let mut session = loaded_session(SessionConfig::default());
    assert_eq!(session.sheet_names(), vec!["Prices", "Notes"]);
    session.apply_translation("raise", raise_price()).unwrap();

    assert!(!session.select_sheet("Missing").unwrap());
    assert_eq!(session.active_sheet(), Some("Prices"));

    assert!(session.select_sheet("Notes").unwrap());
    assert_eq!(grid_value(&session, "A1"), CellValue::text("memo"));
    assert_eq!(session.view().unwrap().grid.row_count(), 1);

    // Edits made before switching are kept
    assert!(session.select_sheet("Prices").unwrap());
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(120.0));
}

#[test]
fn test_merge_queries_on_loaded_sheet() {
    let session = loaded_session(SessionConfig::default());
    let view = session.view().unwrap();
    assert!(view.is_merged(2, 0));
    assert!(!view.is_merged(2, 1));
}

#[test]
fn test_reset() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();

    session.reset().unwrap();
    assert!(session.workbook().is_none());
    assert!(session.view().is_none());
    assert!(session.history().is_empty());
    assert!(session.sheet_names().is_empty());
    assert!(matches!(session.download(), Err(Error::NoWorkbook)));
    assert!(matches!(session.begin_instruction("x"), Err(Error::NoWorkbook)));
}

#[test]
fn test_failed_load_keeps_state() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();

    assert!(matches!(
        session.load_bytes("broken.xlsx", b"not a zip"),
        Err(Error::LoadFailure(_))
    ));
    assert!(matches!(
        session.load_bytes("notes.csv", b"a,b"),
        Err(Error::UnsupportedFormat(_))
    ));

    assert_eq!(session.source_name(), Some("prices.xlsx"));
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(120.0));
    assert_eq!(session.history().len(), 1);
}

#[test]
fn test_new_load_discards_history() {
    let mut session = loaded_session(SessionConfig::default());
    session.apply_translation("raise", raise_price()).unwrap();

    session.load_bytes("again.xlsx", &price_list_xlsx()).unwrap();
    assert!(session.history().is_empty());
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(100.0));
}

#[test]
fn test_load_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Quarterly Prices.xlsx");
    std::fs::write(&path, price_list_xlsx()).unwrap();

    let mut session = Session::new(SessionConfig::default());
    session.load_path(&path).unwrap();
    assert_eq!(session.source_name(), Some("Quarterly Prices.xlsx"));

    let day = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
    let (name, _) = session.download_as_of(day).unwrap();
    assert_eq!(name, "Quarterly Prices_edited_20250131.xlsx");

    assert!(matches!(
        session.load_path(dir.path().join("missing.xlsx")),
        Err(Error::LoadFailure(_))
    ));
}

/// A legacy workbook is edited and comes back as xlsx with its styles
#[test]
fn test_xls_load_and_download() {
    let mut session = Session::new(SessionConfig::default());
    session.load_bytes("legacy.xls", &price_list_xls()).unwrap();
    assert_eq!(session.sheet_names(), vec!["Legacy"]);

    let b2 = session
        .view()
        .unwrap()
        .grid
        .get(CellAddress::new(1, 1))
        .unwrap()
        .clone();
    assert_eq!(b2.value, CellValue::Number(100.0));
    assert_eq!(b2.style.as_ref().unwrap().bold, Some(true));
    assert_eq!(
        b2.style.as_ref().unwrap().background_color.as_deref(),
        Some("#FFFF00")
    );

    session.apply_translation("raise", raise_price()).unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    let (name, bytes) = session.download_as_of(day).unwrap();
    assert_eq!(name, "legacy_edited_20240307.xlsx");

    let reread = XlsxReader::read_bytes(&bytes).unwrap();
    let sheet = reread.sheet("Legacy").unwrap();
    let cell = sheet.cell(CellAddress::new(1, 1)).unwrap();
    assert_eq!(cell.value, CellValue::Number(120.0));
    let style = decode_style(cell.style_id.and_then(|id| reread.styles().get(id)));
    assert_eq!(style.bold, Some(true));
    assert_eq!(style.background_color.as_deref(), Some("#FFFF00"));
    assert_eq!(
        sheet.cell(CellAddress::new(1, 0)).unwrap().value,
        CellValue::text("Widget")
    );
}

/// Clearing a cell deletes its entry, style included; undo brings it back
#[test]
fn test_clearing_a_styled_cell() {
    let mut session = loaded_session(SessionConfig::default());
    session
        .apply_translation(
            "clear the price",
            Translation {
                updates: vec![CellUpdate::new("B2").with_value(CellValue::Empty)],
                explanation: String::new(),
            },
        )
        .unwrap();

    let b2 = CellAddress::new(1, 1);
    assert!(!session.history().last().unwrap().format_preserved);
    assert_eq!(session.view().unwrap().grid.get(b2).unwrap().style, None);
    assert!(session.view().unwrap().style(b2).is_none());

    let (_, bytes) = session.download().unwrap();
    let reread = XlsxReader::read_bytes(&bytes).unwrap();
    let prices = reread.sheet("Prices").unwrap();
    assert!(prices.cell(b2).is_none());
    // The untouched styled blank next to it is still there
    assert_eq!(
        prices.cell(CellAddress::new(2, 0)).unwrap().kind,
        Some(CellKind::Stub)
    );

    session.undo().unwrap().unwrap();
    assert_eq!(session.view().unwrap().style(b2).unwrap().bold, Some(true));
    let (_, bytes) = session.download().unwrap();
    let reread = XlsxReader::read_bytes(&bytes).unwrap();
    let restored = reread.sheet("Prices").unwrap().cell(b2).unwrap();
    assert_eq!(restored.value, CellValue::Number(100.0));
    let style = decode_style(restored.style_id.and_then(|id| reread.styles().get(id)));
    assert_eq!(style.bold, Some(true));
    assert_eq!(style.background_color.as_deref(), Some("#FFFF00"));
}

/// A value written into a cleared cell starts unformatted, in grid and file
#[test]
fn test_refilling_a_cleared_cell() {
    let mut session = loaded_session(SessionConfig::default());
    for value in [CellValue::Empty, CellValue::Number(5.0)] {
        let translation = Translation {
            updates: vec![CellUpdate::new("B2").with_value(value)],
            explanation: String::new(),
        };
        session.apply_translation("edit", translation).unwrap();
    }

    let b2 = CellAddress::new(1, 1);
    assert_eq!(session.view().unwrap().grid.get(b2).unwrap().style, None);
    let (_, bytes) = session.download().unwrap();
    let reread = XlsxReader::read_bytes(&bytes).unwrap();
    let cell = reread.sheet("Prices").unwrap().cell(b2).unwrap();
    assert_eq!(cell.value, CellValue::Number(5.0));
    let style = decode_style(cell.style_id.and_then(|id| reread.styles().get(id)));
    assert_ne!(style.bold, Some(true));
}

/// A sheet declaring the whole worksheet as its dimension loads as its entries
#[test]
fn test_oversized_dimension_loads() {
    let mut sheet = Sheet::new("Huge");
    sheet.set_dimension(Some(CellRange::parse("A1:XFD1048576").unwrap()));
    sheet.set_cell(CellAddress::new(0, 0), StoredCell::with_value("only".into()));
    let mut workbook = Workbook::new();
    workbook.push_sheet(sheet).unwrap();
    let bytes = XlsxWriter::to_bytes(&workbook, &WriteOptions::default()).unwrap();

    let mut session = Session::new(SessionConfig::default());
    session.load_bytes("huge.xlsx", &bytes).unwrap();
    let view = session.view().unwrap();
    assert_eq!(view.grid.range(), CellRange::parse("A1").unwrap());
    assert_eq!(grid_value(&session, "A1"), CellValue::text("only"));
}

/// A sheet whose entries span more than the limit is refused, state kept
#[test]
fn test_oversized_sheet_is_refused() {
    let mut sheet = Sheet::new("Corners");
    sheet.set_cell(CellAddress::new(0, 0), StoredCell::with_value(1.0.into()));
    sheet.set_cell(CellAddress::new(99, 99), StoredCell::with_value(2.0.into()));
    let mut workbook = Workbook::new();
    workbook.push_sheet(sheet).unwrap();
    let bytes = XlsxWriter::to_bytes(&workbook, &WriteOptions::default()).unwrap();

    let mut session = loaded_session(SessionConfig::default().with_grid_cell_limit(1_000));
    let err = session.load_bytes("corners.xlsx", &bytes).unwrap_err();
    assert!(matches!(
        err,
        Error::SheetTooLarge { cells: 10_000, limit: 1_000, .. }
    ));
    assert!(err.is_recoverable());
    assert_eq!(session.source_name(), Some("prices.xlsx"));
    assert_eq!(grid_value(&session, "B2"), CellValue::Number(100.0));
}
