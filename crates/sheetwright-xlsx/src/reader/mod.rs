//! XLSX reader

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::decode_excel_escapes;
use crate::formula::shift_formula;
use crate::styles::read_styles_xml;
use crate::{STYLES_PART, THEME_PREFIX};
use sheetwright_core::date::serial_to_datetime;
use sheetwright_core::{
    CellAddress, CellKind, CellRange, CellValue, ColumnInfo, NameScope, NamedRange, RowInfo,
    Sheet, SheetState, StoredCell, StyleTable, Workbook,
};

mod worksheet;

use worksheet::WorksheetParser;

/// Parts the reader consumes itself; anything else in the package is dropped
const KNOWN_PARTS: &[&str] = &[
    "[Content_Types].xml",
    "_rels/.rels",
    "xl/workbook.xml",
    "xl/_rels/workbook.xml.rels",
    "xl/sharedStrings.xml",
    STYLES_PART,
];

/// Worksheet entry from workbook.xml
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    r_id: String,
    state: SheetState,
}

/// What workbook.xml declares besides the sheet parts
#[derive(Debug, Default)]
struct WorkbookPart {
    sheets: Vec<SheetEntry>,
    /// Defined names; a sheet scope indexes `sheets`
    names: Vec<NamedRange>,
    date_1904: bool,
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a workbook from an in-memory buffer
    pub fn read_bytes(bytes: &[u8]) -> XlsxResult<Workbook> {
        Self::read(Cursor::new(bytes))
    }

    /// Read a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let mut workbook = Workbook::new();

        let shared_strings = Self::read_shared_strings(&mut archive)?;

        // Styles are parsed and also kept verbatim for the writer
        if let Some(bytes) = Self::read_part(&mut archive, STYLES_PART)? {
            *workbook.styles_mut() = read_styles_xml(bytes.as_slice())?;
            workbook.retain_part(STYLES_PART, bytes);
        } else {
            *workbook.styles_mut() = std::iter::once(Default::default()).collect();
        }

        let part = Self::read_workbook_xml(&mut archive)?;
        let date_1904 = part.date_1904;
        workbook.settings_mut().date_1904 = date_1904;

        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let mut consumed: Vec<String> = Vec::new();
        // Declared sheet position to loaded sheet index
        let mut loaded: HashMap<usize, usize> = HashMap::new();
        for (declared, entry) in part.sheets.iter().enumerate() {
            let Some(path) = sheet_paths.get(&entry.r_id) else {
                log::warn!("sheet '{}' has no worksheet part; skipped", entry.name);
                continue;
            };
            let mut sheet = Self::read_worksheet(
                &mut archive,
                path,
                &entry.name,
                &shared_strings,
                workbook.styles(),
                date_1904,
            )?;
            sheet.set_state(entry.state);
            loaded.insert(declared, workbook.push_sheet(sheet)?);
            consumed.push(path.clone());
        }

        for mut named in part.names {
            if let NameScope::Sheet(declared) = named.scope {
                match loaded.get(&declared) {
                    Some(&index) => named.scope = NameScope::Sheet(index),
                    None => {
                        log::warn!(
                            "defined name '{}' is local to a missing sheet; skipped",
                            named.name
                        );
                        continue;
                    }
                }
            }
            workbook.define_name(named)?;
        }

        // Ensure at least one sheet exists
        if workbook.is_empty() {
            workbook.push_sheet(Sheet::new("Sheet1"))?;
        }

        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        for name in names {
            if name.starts_with(THEME_PREFIX) && name.ends_with(".xml") {
                if let Some(bytes) = Self::read_part(&mut archive, &name)? {
                    workbook.retain_part(name, bytes);
                }
            } else if !(KNOWN_PARTS.contains(&name.as_str())
                || consumed.contains(&name)
                || name.starts_with("docProps/")
                || name.ends_with('/'))
            {
                workbook.note_dropped_part(name);
            }
        }

        log::debug!(
            "read xlsx: {} sheet(s), {} style record(s), {} shared string(s)",
            workbook.sheet_count(),
            workbook.styles().len(),
            shared_strings.len()
        );

        Ok(workbook)
    }

    fn read_part<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        name: &str,
    ) -> XlsxResult<Option<Vec<u8>>> {
        let mut file = match archive.by_name(name) {
            Ok(f) => f,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(false);

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        // Phonetic runs repeat the text and are not part of the value
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current_string.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml: sheets with their rIds and state, defined names, and the date system
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<WorkbookPart> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut part = WorkbookPart::default();
        let mut pending_name: Option<NamedRange> = None;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) if e.name().as_ref() == b"definedName" => {
                    log::warn!("empty defined name skipped");
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"sheet" => {
                        let name = attr_string(&e, b"name");
                        let r_id = attr_string(&e, b"r:id");
                        if let (Some(name), Some(r_id)) = (name, r_id) {
                            let state = attr_string(&e, b"state")
                                .map_or(SheetState::Visible, |s| SheetState::from_attr(&s));
                            part.sheets.push(SheetEntry { name, r_id, state });
                        }
                    }
                    b"workbookPr" => {
                        part.date_1904 = attr_bool(&e, b"date1904");
                    }
                    b"definedName" => {
                        if let Some(name) = attr_string(&e, b"name") {
                            let mut named = NamedRange::new(name, String::new());
                            if let Some(index) = attr_parse::<usize>(&e, b"localSheetId") {
                                named = named.local_to(index);
                            }
                            named.hidden = attr_bool(&e, b"hidden");
                            named.comment = attr_string(&e, b"comment");
                            pending_name = Some(named);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(named) = pending_name.as_mut() {
                        let text = e.unescape().map_err(XlsxError::Xml)?;
                        named.refers_to.push_str(&text);
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"definedName" => {
                    if let Some(named) = pending_name.take() {
                        if named.refers_to.is_empty() {
                            log::warn!("defined name '{}' has no reference; skipped", named.name);
                        } else {
                            part.names.push(named);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(part)
    }

    /// Read workbook.xml.rels to get worksheet part paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attr_string(&e, b"Id");
                    let target = attr_string(&e, b"Target");
                    let rel_type = attr_string(&e, b"Type");

                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to the xl/ folder unless absolute
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        name: &str,
        shared_strings: &[String],
        styles: &StyleTable,
        date_1904: bool,
    ) -> XlsxResult<Sheet> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(false);

        let mut parser = WorksheetParser::new(Sheet::new(name), shared_strings, styles, date_1904);
        let mut buf = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => parser.open(&e, false)?,
                Ok(Event::Empty(e)) => {
                    parser.open(&e, true)?;
                    parser.close(e.name().as_ref())?;
                }
                Ok(Event::End(e)) => parser.close(e.name().as_ref())?,
                Ok(Event::Text(e)) => {
                    if parser.wants_text() {
                        let text = e.unescape()?;
                        parser.text(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        let sheet = parser.finish();
        log::debug!(
            "read sheet '{}': {} cell(s), dimension {:?}",
            sheet.name(),
            sheet.cell_count(),
            sheet.dimension().map(|d| d.to_a1_string())
        );
        Ok(sheet)
    }
}

pub(crate) fn attr_string(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

pub(crate) fn attr_parse<T: std::str::FromStr>(e: &BytesStart<'_>, name: &[u8]) -> Option<T> {
    attr_string(e, name).and_then(|s| s.parse().ok())
}

pub(crate) fn attr_bool(e: &BytesStart<'_>, name: &[u8]) -> bool {
    attr_string(e, name).map_or(false, |s| s == "1" || s == "true")
}

/// Convert a raw `<c>` into a stored cell
///
/// `cell_type` is the `t` attribute; `value` the `<v>` text (or the inline
/// string for `inlineStr`).
pub(crate) fn decode_cell(
    cell_type: Option<&str>,
    value: Option<&str>,
    formula: Option<String>,
    style_id: Option<u32>,
    shared_strings: &[String],
    styles: &StyleTable,
    date_1904: bool,
) -> XlsxResult<StoredCell> {
    let record = style_id.and_then(|id| styles.get(id));
    let number_format = record
        .filter(|r| r.num_fmt_id != 0)
        .and_then(|r| r.format_code())
        .map(str::to_string);

    let Some(value) = value else {
        let mut cell = match formula {
            Some(f) => StoredCell::default().with_formula(f),
            None => StoredCell::stub(style_id),
        };
        cell.style_id = style_id;
        cell.number_format = number_format;
        return Ok(cell);
    };

    let (value, kind) = match cell_type {
        Some("s") => {
            let idx: usize = value.trim().parse().map_err(|_| {
                XlsxError::Parse(format!("Invalid shared string index: {}", value))
            })?;
            let s = shared_strings.get(idx).ok_or_else(|| {
                XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
            })?;
            (CellValue::Text(s.clone()), CellKind::Text)
        }
        Some("b") => (
            CellValue::Bool(value == "1" || value.eq_ignore_ascii_case("true")),
            CellKind::Bool,
        ),
        Some("e") => (CellValue::Text(value.to_string()), CellKind::Error),
        Some("str") | Some("inlineStr") => {
            (CellValue::Text(decode_excel_escapes(value)), CellKind::Text)
        }
        Some("d") => match parse_iso_datetime(value) {
            Some(d) => (CellValue::Date(d), CellKind::Date),
            None => (CellValue::Text(value.to_string()), CellKind::Text),
        },
        None | Some("n") => match value.trim().parse::<f64>() {
            Ok(n) => match record.filter(|r| r.is_date_format()) {
                Some(_) => match serial_to_datetime(n, date_1904) {
                    Some(d) => (CellValue::Date(d), CellKind::Date),
                    None => (CellValue::Number(n), CellKind::Number),
                },
                None => (CellValue::Number(n), CellKind::Number),
            },
            Err(_) => (CellValue::Text(value.to_string()), CellKind::Text),
        },
        Some(other) => {
            log::debug!("unknown cell type '{}', read as text", other);
            (CellValue::Text(value.to_string()), CellKind::Text)
        }
    };

    Ok(StoredCell {
        kind: Some(kind),
        value,
        formula,
        display: None,
        number_format,
        style_id,
    })
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Shared formula anchors by `si`
#[derive(Debug, Default)]
pub(crate) struct SharedFormulas {
    anchors: HashMap<u32, (CellAddress, String)>,
}

impl SharedFormulas {
    pub(crate) fn define(&mut self, si: u32, anchor: CellAddress, text: String) {
        self.anchors.insert(si, (anchor, text));
    }

    pub(crate) fn expand(&self, si: u32, at: CellAddress) -> Option<String> {
        let (anchor, text) = self.anchors.get(&si)?;
        Some(shift_formula(
            text,
            i64::from(at.row) - i64::from(anchor.row),
            i64::from(at.col) - i64::from(anchor.col),
        ))
    }
}

pub(crate) fn column_info(e: &BytesStart<'_>) -> Option<ColumnInfo> {
    let min: u16 = attr_parse(e, b"min")?;
    let max: u16 = attr_parse(e, b"max")?;
    Some(ColumnInfo {
        min: min.saturating_sub(1),
        max: max.saturating_sub(1),
        width: attr_parse(e, b"width"),
        style_id: attr_parse(e, b"style"),
        custom_width: attr_bool(e, b"customWidth"),
        hidden: attr_bool(e, b"hidden"),
    })
}

pub(crate) fn row_info(e: &BytesStart<'_>) -> RowInfo {
    RowInfo {
        height: attr_parse(e, b"ht"),
        custom_height: attr_bool(e, b"customHeight"),
        hidden: attr_bool(e, b"hidden"),
    }
}

pub(crate) fn parse_range(s: &str) -> Option<CellRange> {
    CellRange::parse(s).ok()
}
