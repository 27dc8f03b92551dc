//! Worksheet part parsing

use quick_xml::events::BytesStart;

use super::{
    attr_parse, attr_string, column_info, decode_cell, parse_range, row_info, SharedFormulas,
};
use crate::error::{XlsxError, XlsxResult};
use sheetwright_core::{CellAddress, Sheet, StyleTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    Value,
    Formula,
    Inline,
}

#[derive(Debug)]
struct PendingCell {
    addr: CellAddress,
    cell_type: Option<String>,
    style_id: Option<u32>,
    value: Option<String>,
    formula: Option<String>,
    /// `si` of a shared formula, and whether this cell is its anchor
    shared: Option<(u32, bool)>,
    inline: Option<String>,
}

/// Streaming state for one `<worksheet>` part
pub(crate) struct WorksheetParser<'a> {
    sheet: Sheet,
    shared_strings: &'a [String],
    styles: &'a StyleTable,
    date_1904: bool,
    shared_formulas: SharedFormulas,
    row: Option<u32>,
    next_col: u16,
    cell: Option<PendingCell>,
    target: Option<TextTarget>,
    in_inline: bool,
    in_phonetic: bool,
}

impl<'a> WorksheetParser<'a> {
    pub(crate) fn new(
        sheet: Sheet,
        shared_strings: &'a [String],
        styles: &'a StyleTable,
        date_1904: bool,
    ) -> Self {
        Self {
            sheet,
            shared_strings,
            styles,
            date_1904,
            shared_formulas: SharedFormulas::default(),
            row: None,
            next_col: 0,
            cell: None,
            target: None,
            in_inline: false,
            in_phonetic: false,
        }
    }

    pub(crate) fn wants_text(&self) -> bool {
        self.target.is_some()
    }

    pub(crate) fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<()> {
        match e.name().as_ref() {
            b"dimension" => {
                if let Some(range) = attr_string(e, b"ref").as_deref().and_then(parse_range) {
                    self.sheet.set_dimension(Some(range));
                }
            }
            b"col" => {
                if let Some(info) = column_info(e) {
                    self.sheet.add_column(info);
                }
            }
            b"row" => {
                let row = match attr_parse::<u32>(e, b"r") {
                    Some(r) => r.saturating_sub(1),
                    None => self.row.map_or(0, |r| r + 1),
                };
                self.row = Some(row);
                self.next_col = 0;
                self.sheet.set_row(row, row_info(e));
            }
            b"c" => {
                let addr = match attr_string(e, b"r") {
                    Some(r) => CellAddress::parse(&r).map_err(|err| {
                        XlsxError::Parse(format!("Invalid cell reference '{}': {}", r, err))
                    })?,
                    None => CellAddress::new(self.row.unwrap_or(0), self.next_col),
                };
                self.cell = Some(PendingCell {
                    addr,
                    cell_type: attr_string(e, b"t"),
                    style_id: attr_parse(e, b"s"),
                    value: None,
                    formula: None,
                    shared: None,
                    inline: None,
                });
            }
            b"v" => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.value = Some(String::new());
                    self.target = Some(TextTarget::Value);
                }
            }
            b"f" => {
                if let Some(cell) = self.cell.as_mut() {
                    if attr_string(e, b"t").as_deref() == Some("shared") {
                        if let Some(si) = attr_parse::<u32>(e, b"si") {
                            cell.shared = Some((si, !empty));
                        }
                    }
                    if !empty {
                        cell.formula = Some(String::new());
                        self.target = Some(TextTarget::Formula);
                    }
                }
            }
            b"is" => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.inline = Some(String::new());
                    self.in_inline = true;
                }
            }
            b"rPh" => self.in_phonetic = true,
            b"t" if self.in_inline && !self.in_phonetic => {
                self.target = Some(TextTarget::Inline);
            }
            b"mergeCell" => {
                if let Some(range) = attr_string(e, b"ref").as_deref().and_then(parse_range) {
                    self.sheet.add_merge(range);
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        let slot = match self.target {
            Some(TextTarget::Value) => &mut cell.value,
            Some(TextTarget::Formula) => &mut cell.formula,
            Some(TextTarget::Inline) => &mut cell.inline,
            None => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    pub(crate) fn close(&mut self, name: &[u8]) -> XlsxResult<()> {
        match name {
            b"v" | b"f" | b"t" => self.target = None,
            b"is" => self.in_inline = false,
            b"rPh" => self.in_phonetic = false,
            b"c" => {
                if let Some(cell) = self.cell.take() {
                    self.finish_cell(cell)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_cell(&mut self, mut cell: PendingCell) -> XlsxResult<()> {
        let mut formula = cell.formula.take().filter(|f| !f.is_empty());
        if let Some((si, anchor)) = cell.shared {
            if formula.is_none() {
                formula = self.shared_formulas.expand(si, cell.addr);
            } else if let (true, Some(text)) = (anchor, formula.as_ref()) {
                self.shared_formulas.define(si, cell.addr, text.clone());
            }
        }
        let formula = formula.map(|f| match f.strip_prefix('=') {
            Some(rest) => rest.to_string(),
            None => f,
        });

        let cell_type = cell.cell_type.as_deref();
        let value = match cell_type {
            Some("inlineStr") => cell.inline.take(),
            Some("str") => cell.value.take(),
            _ => cell.value.take().filter(|v| !v.is_empty()),
        };

        let stored = decode_cell(
            cell_type,
            value.as_deref(),
            formula,
            cell.style_id,
            self.shared_strings,
            self.styles,
            self.date_1904,
        )?;
        self.sheet.set_cell(cell.addr, stored);
        self.next_col = cell.addr.col.saturating_add(1);
        Ok(())
    }

    pub(crate) fn finish(self) -> Sheet {
        self.sheet
    }
}
