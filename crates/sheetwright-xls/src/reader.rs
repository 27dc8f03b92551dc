//! XLS (BIFF8) reader.
//!
//! Opens the Compound File Binary container, reads the `Workbook` stream,
//! and decodes it into a [`Workbook`]: globals first (shared strings, style
//! records, sheet directory, date system), then each worksheet substream
//! located through the stream offset its BOUNDSHEET record points at.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use sheetwright_core::date::serial_to_datetime;
use sheetwright_core::{
    CellAddress, CellKind, CellRange, CellValue, ColumnInfo, RowInfo, Sheet, SheetState,
    StoredCell, StyleTable, Workbook, MAX_COLS, MAX_ROWS,
};

use crate::biff::strings::{parse_sst, read_short_string, read_unicode_string};
use crate::biff::{self, records, BiffRecord};
use crate::error::{XlsError, XlsResult};
use crate::formula::{decompile, error_literal};
use crate::styles::{self, StyleContext};

/// Index of the default cell XF written by Excel
const DEFAULT_CELL_XF: u16 = 15;

/// Marker in a SUPBOOK record for the workbook's own sheets
const SUPBOOK_SELF: u16 = 0x0401;

/// XLS file reader.
pub struct XlsReader;

/// A BOUNDSHEET entry.
#[derive(Debug)]
struct SheetEntry {
    /// Stream offset of the sheet's BOF record
    offset: usize,
    state: SheetState,
    /// 0 = worksheet, 1 = macro sheet, 2 = chart, 6 = VBA module
    sheet_type: u8,
    name: String,
}

/// Everything collected from the workbook globals substream.
struct Globals {
    sst: Vec<String>,
    sheets: Vec<SheetEntry>,
    date_1904: bool,
    styles: StyleContext,
    /// Per SUPBOOK: whether it refers to this workbook
    supbooks: Vec<bool>,
    /// Per EXTERNSHEET entry: (supbook, first sheet, last sheet)
    externsheets: Vec<(u16, u16, u16)>,
}

impl Globals {
    /// Sheet names addressable from formulas, by EXTERNSHEET index
    fn sheet_refs(&self) -> Vec<Option<String>> {
        self.externsheets
            .iter()
            .map(|&(supbook, first, last)| {
                let internal = self.supbooks.get(supbook as usize).copied() == Some(true);
                if !internal || first != last {
                    return None;
                }
                self.sheets.get(first as usize).map(|s| s.name.clone())
            })
            .collect()
    }
}

impl XlsReader {
    /// Read an XLS file from a filesystem path.
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file)
    }

    /// Read an XLS file held in memory.
    pub fn read_bytes(bytes: &[u8]) -> XlsResult<Workbook> {
        Self::read(Cursor::new(bytes))
    }

    /// Read an XLS file from any `Read + Seek` source.
    pub fn read<R: Read + Seek>(reader: R) -> XlsResult<Workbook> {
        let mut cfb = cfb::CompoundFile::open(reader)
            .map_err(|e| XlsError::InvalidFormat(format!("not a compound file: {e}")))?;

        let stream_path = if cfb.exists("/Workbook") {
            "/Workbook"
        } else if cfb.exists("/Book") {
            return Err(XlsError::UnsupportedVersion(
                "BIFF5 'Book' stream; only BIFF8 is supported".into(),
            ));
        } else {
            return Err(XlsError::InvalidFormat(
                "no Workbook stream found in compound file".into(),
            ));
        };
        let has_vba = cfb.exists("/_VBA_PROJECT_CUR");

        let mut stream = Vec::new();
        cfb.open_stream(stream_path)?.read_to_end(&mut stream)?;

        let mut workbook = Self::read_stream(&stream)?;
        if has_vba {
            workbook.note_dropped_part("VBA project");
        }
        Ok(workbook)
    }

    /// Decode a raw BIFF8 workbook stream.
    pub fn read_stream(stream: &[u8]) -> XlsResult<Workbook> {
        let all_records = biff::split_records(stream);
        let globals = Self::read_globals(&all_records)?;

        let mut workbook = Workbook::new();
        workbook.settings_mut().date_1904 = globals.date_1904;
        *workbook.styles_mut() = globals.styles.build_style_table();

        let sheet_refs = globals.sheet_refs();
        for entry in &globals.sheets {
            if entry.sheet_type != 0 {
                workbook.note_dropped_part(format!("non-worksheet sheet '{}'", entry.name));
                continue;
            }

            let start = all_records.iter().position(|rec| {
                rec.stream_offset == entry.offset && rec.record_type == records::BOF
            });
            let mut parser = SheetParser {
                sheet: Sheet::new(entry.name.as_str()),
                sst: &globals.sst,
                styles: workbook.styles(),
                sheet_refs: &sheet_refs,
                date_1904: globals.date_1904,
                pending_string: None,
                has_drawing: false,
                has_embedded_chart: false,
            };
            match start {
                Some(idx) => parser.parse(&all_records[idx + 1..])?,
                None => log::warn!(
                    "sheet '{}' points at offset {} with no BOF record; read as empty",
                    entry.name,
                    entry.offset
                ),
            }

            let (drawing, chart) = (parser.has_drawing, parser.has_embedded_chart);
            let mut sheet = parser.sheet;
            sheet.set_state(entry.state);
            if drawing {
                workbook.note_dropped_part(format!("drawing on sheet '{}'", entry.name));
            }
            if chart {
                workbook.note_dropped_part(format!("chart on sheet '{}'", entry.name));
            }
            workbook.push_sheet(sheet)?;
        }

        if workbook.is_empty() {
            workbook.push_sheet(Sheet::new("Sheet1"))?;
        }

        log::debug!(
            "read XLS workbook: {} sheets, {} styles, {} shared strings",
            workbook.sheet_count(),
            workbook.styles().len(),
            globals.sst.len()
        );
        Ok(workbook)
    }

    fn read_globals(all_records: &[BiffRecord]) -> XlsResult<Globals> {
        let first = all_records
            .first()
            .filter(|rec| rec.record_type == records::BOF)
            .ok_or_else(|| {
                XlsError::InvalidFormat("workbook stream does not start with BOF".into())
            })?;
        let (version, substream) = biff::parse_bof(&first.data)?;
        if substream != records::BOF_WORKBOOK_GLOBALS {
            return Err(XlsError::InvalidFormat(format!(
                "first substream is 0x{substream:04X}, expected workbook globals"
            )));
        }
        if version != records::BIFF8_VERSION {
            return Err(XlsError::UnsupportedVersion(format!(
                "expected BIFF8 (0x0600), got 0x{version:04X}"
            )));
        }

        let mut globals = Globals {
            sst: Vec::new(),
            sheets: Vec::new(),
            date_1904: false,
            styles: StyleContext::new(),
            supbooks: Vec::new(),
            externsheets: Vec::new(),
        };

        for rec in &all_records[1..] {
            match rec.record_type {
                records::EOF => break,
                records::SST => globals.sst = parse_sst(rec)?,
                records::BOUNDSHEET => globals.sheets.push(parse_boundsheet(&rec.data)?),
                records::DATEMODE => {
                    globals.date_1904 = rec.reader().u16().map(|mode| mode == 1).unwrap_or(false);
                }
                records::FONT => match styles::parse_font(&rec.data) {
                    Ok(font) => globals.styles.fonts.push(font),
                    Err(e) => log::warn!("skipping FONT record: {e}"),
                },
                records::FORMAT => match styles::parse_format(&rec.data) {
                    Ok((id, code)) => {
                        globals.styles.formats.insert(id, code);
                    }
                    Err(e) => log::warn!("skipping FORMAT record: {e}"),
                },
                records::XF => match styles::parse_xf(&rec.data) {
                    Ok(xf) => globals.styles.xfs.push(xf),
                    Err(e) => {
                        // keep indices aligned with the file's XF numbering
                        log::warn!("unreadable XF record replaced by default: {e}");
                        globals.styles.xfs.push(Default::default());
                    }
                },
                records::PALETTE => {
                    if let Err(e) = styles::apply_palette(&rec.data, &mut globals.styles.palette) {
                        log::warn!("ignoring PALETTE record: {e}");
                    }
                }
                records::SUPBOOK => {
                    let mut r = rec.reader();
                    let is_self = r.u16().and_then(|_| r.u16()).map(|m| m == SUPBOOK_SELF);
                    globals.supbooks.push(is_self.unwrap_or(false));
                }
                records::EXTERNSHEET => {
                    let mut r = rec.reader();
                    let count = r.u16()?;
                    for _ in 0..count {
                        globals.externsheets.push((r.u16()?, r.u16()?, r.u16()?));
                    }
                }
                _ => {}
            }
        }

        Ok(globals)
    }
}

/// BOUNDSHEET: stream offset u32, visibility u8, type u8, name
fn parse_boundsheet(data: &[u8]) -> XlsResult<SheetEntry> {
    let mut r = biff::parser::ByteReader::new(data);
    let offset = r.u32()? as usize;
    let state = match r.u8()? & 0x03 {
        1 => SheetState::Hidden,
        2 => SheetState::VeryHidden,
        _ => SheetState::Visible,
    };
    let sheet_type = r.u8()?;
    let name = read_short_string(&mut r)?;
    Ok(SheetEntry {
        offset,
        state,
        sheet_type,
        name,
    })
}

/// Decodes one worksheet substream into a [`Sheet`].
struct SheetParser<'a> {
    sheet: Sheet,
    sst: &'a [String],
    styles: &'a StyleTable,
    sheet_refs: &'a [Option<String>],
    date_1904: bool,
    /// Formula cell waiting for its STRING record
    pending_string: Option<CellAddress>,
    has_drawing: bool,
    has_embedded_chart: bool,
}

impl SheetParser<'_> {
    /// Consume records up to the substream's EOF.
    fn parse(&mut self, recs: &[BiffRecord]) -> XlsResult<()> {
        let mut depth = 0usize;

        for rec in recs {
            match (rec.record_type, depth) {
                (records::BOF, _) => {
                    depth += 1;
                    self.has_embedded_chart = true;
                }
                (records::EOF, 0) => break,
                (records::EOF, _) => depth -= 1,
                (_, 0) => self.record(rec)?,
                _ => {}
            }
        }

        Ok(())
    }

    fn record(&mut self, rec: &BiffRecord) -> XlsResult<()> {
        if rec.record_type != records::STRING {
            self.pending_string = None;
        }

        let mut r = rec.reader();
        match rec.record_type {
            records::DIMENSION => {
                let first_row = r.u32()?;
                let last_row_excl = r.u32()?;
                let first_col = r.u16()?;
                let last_col_excl = r.u16()?;
                if last_row_excl > first_row && last_col_excl > first_col {
                    self.sheet.set_dimension(Some(CellRange::from_indices(
                        first_row,
                        first_col,
                        (last_row_excl - 1).min(MAX_ROWS - 1),
                        (last_col_excl - 1).min(MAX_COLS - 1),
                    )));
                }
            }
            records::LABELSST => {
                let (addr, xf) = (cell_address(r.u16()?, r.u16()?), r.u16()?);
                let index = r.u32()? as usize;
                match self.sst.get(index) {
                    Some(text) => {
                        let cell = self.cell(CellValue::Text(text.clone()), CellKind::Text, xf);
                        self.sheet.set_cell(addr, cell);
                    }
                    None => {
                        log::warn!("{addr}: shared string {index} missing; kept as blank");
                        let cell = self.blank(xf);
                        self.sheet.set_cell(addr, cell);
                    }
                }
            }
            records::LABEL => {
                let (addr, xf) = (cell_address(r.u16()?, r.u16()?), r.u16()?);
                let text = read_unicode_string(&mut r)?;
                let cell = self.cell(CellValue::Text(text), CellKind::Text, xf);
                self.sheet.set_cell(addr, cell);
            }
            records::NUMBER => {
                let (addr, xf) = (cell_address(r.u16()?, r.u16()?), r.u16()?);
                let cell = self.number(r.f64()?, xf);
                self.sheet.set_cell(addr, cell);
            }
            records::RK => {
                let (addr, xf) = (cell_address(r.u16()?, r.u16()?), r.u16()?);
                let cell = self.number(r.rk()?, xf);
                self.sheet.set_cell(addr, cell);
            }
            records::MULRK => {
                // row, first col, (xf, rk)*, last col
                let row = r.u16()?;
                let first_col = r.u16()?;
                let count = r.remaining().saturating_sub(2) / 6;
                for i in 0..count {
                    let xf = r.u16()?;
                    let cell = self.number(r.rk()?, xf);
                    self.sheet.set_cell(cell_address(row, first_col + i as u16), cell);
                }
            }
            records::BLANK => {
                let (addr, xf) = (cell_address(r.u16()?, r.u16()?), r.u16()?);
                let cell = self.blank(xf);
                self.sheet.set_cell(addr, cell);
            }
            records::MULBLANK => {
                // row, first col, xf*, last col
                let row = r.u16()?;
                let first_col = r.u16()?;
                let count = r.remaining().saturating_sub(2) / 2;
                for i in 0..count {
                    let cell = self.blank(r.u16()?);
                    self.sheet.set_cell(cell_address(row, first_col + i as u16), cell);
                }
            }
            records::BOOLERR => {
                let (addr, xf) = (cell_address(r.u16()?, r.u16()?), r.u16()?);
                let value = r.u8()?;
                let cell = if r.u8()? != 0 {
                    self.cell(
                        CellValue::text(error_literal(value)),
                        CellKind::Error,
                        xf,
                    )
                } else {
                    self.cell(CellValue::Bool(value != 0), CellKind::Bool, xf)
                };
                self.sheet.set_cell(addr, cell);
            }
            records::FORMULA => self.formula(rec)?,
            records::STRING => {
                if let Some(addr) = self.pending_string.take() {
                    let text = read_unicode_string(&mut r)?;
                    if let Some(cell) = self.sheet.cell_mut(addr) {
                        cell.display = Some(text.clone());
                        cell.value = CellValue::Text(text);
                    }
                }
            }
            records::MERGECELLS => {
                let count = r.u16()?;
                for _ in 0..count {
                    let first_row = r.u16()?;
                    let last_row = r.u16()?;
                    let first_col = r.u16()?;
                    let last_col = r.u16()?;
                    self.sheet.add_merge(CellRange::from_indices(
                        first_row.into(),
                        first_col,
                        last_row.into(),
                        last_col,
                    ));
                }
            }
            records::ROW => {
                // row, first col, last col + 1, height, reserved, unused, options
                let row = r.u16()?;
                r.skip(4)?;
                let height = r.u16()? & 0x7FFF;
                r.skip(4)?;
                let options = r.u32().unwrap_or(0);
                self.sheet.set_row(
                    row.into(),
                    RowInfo {
                        height: Some(f64::from(height) / 20.0).filter(|h| *h > 0.0),
                        custom_height: options & 0x40 != 0,
                        hidden: options & 0x20 != 0,
                    },
                );
            }
            records::COLINFO => {
                // first col, last col, width (1/256 char), xf, options
                let min = r.u16()?;
                let max = r.u16()?.min(MAX_COLS - 1);
                let width = r.u16()?;
                let xf = r.u16()?;
                let options = r.u16()?;
                if min <= max {
                    self.sheet.add_column(ColumnInfo {
                        min,
                        max,
                        width: Some(f64::from(width) / 256.0).filter(|w| *w > 0.0),
                        style_id: self
                            .style_id(xf)
                            .filter(|_| xf != DEFAULT_CELL_XF),
                        custom_width: options & 0x02 != 0,
                        hidden: options & 0x01 != 0,
                    });
                }
            }
            records::MSODRAWING => self.has_drawing = true,
            _ => {}
        }

        Ok(())
    }

    /// FORMULA: row, col, xf, cached result (8), options u16, chn u32,
    /// token count u16, tokens
    fn formula(&mut self, rec: &BiffRecord) -> XlsResult<()> {
        let mut r = rec.reader();
        let addr = cell_address(r.u16()?, r.u16()?);
        let xf = r.u16()?;
        let result = r.bytes(8)?;
        r.skip(6)?;
        let size = r.u16()? as usize;
        let available = r.remaining();
        let tokens = r.bytes(size.min(available))?;

        let formula = match decompile(tokens, self.sheet_refs) {
            Ok(text) => Some(text),
            Err(e) => {
                log::debug!("{addr}: formula kept as cached value only ({e})");
                None
            }
        };

        let mut cell = if result[6] == 0xFF && result[7] == 0xFF {
            match result[0] {
                0x00 => {
                    self.pending_string = Some(addr);
                    self.cell(CellValue::text(""), CellKind::Text, xf)
                }
                0x01 => self.cell(CellValue::Bool(result[2] != 0), CellKind::Bool, xf),
                0x02 => self.cell(
                    CellValue::text(error_literal(result[2])),
                    CellKind::Error,
                    xf,
                ),
                0x03 => self.cell(CellValue::text(""), CellKind::Text, xf),
                _ => self.blank(xf),
            }
        } else {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(result);
            self.number(f64::from_le_bytes(raw), xf)
        };

        if formula.is_some() && cell.kind == Some(CellKind::Stub) {
            cell.kind = None;
        }
        cell.formula = formula;
        self.sheet.set_cell(addr, cell);
        Ok(())
    }

    fn style_id(&self, xf: u16) -> Option<u32> {
        let id = u32::from(xf);
        if self.styles.get(id).is_some() {
            Some(id)
        } else {
            log::debug!("XF index {xf} outside the style table; cell left unstyled");
            None
        }
    }

    fn cell(&self, value: CellValue, kind: CellKind, xf: u16) -> StoredCell {
        let style_id = self.style_id(xf);
        StoredCell {
            kind: Some(kind),
            value,
            formula: None,
            display: None,
            number_format: self.number_format(style_id),
            style_id,
        }
    }

    fn blank(&self, xf: u16) -> StoredCell {
        let style_id = self.style_id(xf);
        let mut cell = StoredCell::stub(style_id);
        cell.number_format = self.number_format(style_id);
        cell
    }

    fn number(&self, n: f64, xf: u16) -> StoredCell {
        let is_date = self
            .style_id(xf)
            .and_then(|id| self.styles.get(id))
            .map_or(false, |record| record.is_date_format());
        match is_date.then(|| serial_to_datetime(n, self.date_1904)).flatten() {
            Some(date) => self.cell(CellValue::Date(date), CellKind::Date, xf),
            None => self.cell(CellValue::Number(n), CellKind::Number, xf),
        }
    }

    fn number_format(&self, style_id: Option<u32>) -> Option<String> {
        style_id
            .and_then(|id| self.styles.get(id))
            .filter(|record| record.num_fmt_id != 0)
            .and_then(|record| record.format_code())
            .map(str::to_string)
    }
}

fn cell_address(row: u16, col: u16) -> CellAddress {
    CellAddress::new(row.into(), col)
}
