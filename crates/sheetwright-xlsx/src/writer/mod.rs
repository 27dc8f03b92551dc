//! XLSX writer

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use ahash::AHashMap;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::XlsxResult;
use crate::escape::{encode_excel_escapes, escape_xml, escape_xml_attr};
use crate::styles::write_styles_xml;
use crate::{STYLES_PART, THEME_PREFIX};
use sheetwright_core::date::datetime_to_serial;
use sheetwright_core::{CellAddress, CellKind, CellValue, Sheet, StoredCell, Workbook};

/// Compression used for package entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Deflate (the standard for xlsx packages)
    #[default]
    Deflate,
    /// No compression
    Store,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Store => CompressionMethod::Stored,
        }
    }
}

/// Options for [`XlsxWriter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Entry compression
    pub compression: Compression,
    /// Re-emit the source styles part verbatim when the workbook retained one
    pub preserve_styles: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
            preserve_styles: true,
        }
    }
}

impl WriteOptions {
    /// Default options: deflate, preserve styles
    pub fn new() -> Self {
        Self::default()
    }

    /// Set entry compression
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set whether the source styles part is re-emitted verbatim
    pub fn with_preserve_styles(mut self, preserve: bool) -> Self {
        self.preserve_styles = preserve;
        self
    }
}

/// Workbook-wide shared string table, deduplicated in first-use order
#[derive(Debug, Default)]
struct SharedStrings {
    strings: Vec<String>,
    index: AHashMap<String, u32>,
    references: usize,
}

impl SharedStrings {
    fn intern(&mut self, s: &str) -> u32 {
        self.references += 1;
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">"#,
            self.references,
            self.strings.len()
        );
        for s in &self.strings {
            let text = escape_xml(&encode_excel_escapes(s));
            if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                xml.push_str(&format!("<si><t xml:space=\"preserve\">{}</t></si>", text));
            } else {
                xml.push_str(&format!("<si><t>{}</t></si>", text));
            }
        }
        xml.push_str("</sst>");
        xml
    }
}

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(
        workbook: &Workbook,
        path: P,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write(workbook, &mut writer, options)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a workbook into a new buffer
    pub fn to_bytes(workbook: &Workbook, options: &WriteOptions) -> XlsxResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        Self::write(workbook, &mut cursor, options)?;
        Ok(cursor.into_inner())
    }

    /// Write a workbook to a writer
    pub fn write<W: Write + Seek>(
        workbook: &Workbook,
        writer: W,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        for part in workbook.dropped_parts() {
            log::warn!("part '{}' from the source file is not written back", part);
        }

        let mut zip = zip::ZipWriter::new(writer);
        let file_options =
            SimpleFileOptions::default().compression_method(options.compression.method());

        // Sheets first: they populate the shared string table
        let mut sst = SharedStrings::default();
        let date_1904 = workbook.settings().date_1904;
        let sheet_parts: Vec<String> = workbook
            .sheets()
            .map(|sheet| Self::worksheet_xml(sheet, &mut sst, date_1904))
            .collect();

        let themes: Vec<(&str, &[u8])> =
            workbook.retained_parts_with_prefix(THEME_PREFIX).collect();
        let has_formulas = workbook
            .sheets()
            .any(|s| s.cells().any(|(_, c)| c.has_formula()));

        let content_types = Self::content_types(workbook, &themes);
        Self::put(&mut zip, file_options, "[Content_Types].xml", content_types.as_bytes())?;
        Self::put(&mut zip, file_options, "_rels/.rels", ROOT_RELS.as_bytes())?;

        let workbook_xml = Self::workbook_xml(workbook, has_formulas);
        Self::put(&mut zip, file_options, "xl/workbook.xml", workbook_xml.as_bytes())?;

        let workbook_rels = Self::workbook_rels(workbook, &themes);
        Self::put(
            &mut zip,
            file_options,
            "xl/_rels/workbook.xml.rels",
            workbook_rels.as_bytes(),
        )?;

        match workbook.retained_part(STYLES_PART) {
            Some(bytes) if options.preserve_styles => {
                Self::put(&mut zip, file_options, STYLES_PART, bytes)?;
            }
            _ => {
                let xml = write_styles_xml(workbook.styles());
                Self::put(&mut zip, file_options, STYLES_PART, xml.as_bytes())?;
            }
        }

        for (path, bytes) in &themes {
            Self::put(&mut zip, file_options, path, bytes)?;
        }

        for (i, xml) in sheet_parts.iter().enumerate() {
            let path = format!("xl/worksheets/sheet{}.xml", i + 1);
            Self::put(&mut zip, file_options, &path, xml.as_bytes())?;
        }

        let sst_xml = sst.to_xml();
        Self::put(&mut zip, file_options, "xl/sharedStrings.xml", sst_xml.as_bytes())?;

        zip.finish()?;

        log::debug!(
            "wrote xlsx: {} sheet(s), {} unique string(s)",
            sheet_parts.len(),
            sst.strings.len()
        );
        Ok(())
    }

    fn put<W: Write + Seek>(
        zip: &mut zip::ZipWriter<W>,
        options: SimpleFileOptions,
        name: &str,
        bytes: &[u8],
    ) -> XlsxResult<()> {
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
        Ok(())
    }

    fn content_types(workbook: &Workbook, themes: &[(&str, &[u8])]) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
    <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
        );

        for i in 0..workbook.sheet_count() {
            content.push_str(&format!(
                r#"
    <Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                i + 1
            ));
        }

        for (path, _) in themes {
            content.push_str(&format!(
                r#"
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
                escape_xml_attr(path)
            ));
        }

        content.push_str("\n</Types>");
        content
    }

    fn workbook_xml(workbook: &Workbook, has_formulas: bool) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        if workbook.settings().date_1904 {
            content.push_str("\n    <workbookPr date1904=\"1\"/>");
        }

        content.push_str("\n    <sheets>");
        for (i, sheet) in workbook.sheets().enumerate() {
            let state = sheet
                .state()
                .as_attr()
                .map(|s| format!(r#" state="{}""#, s))
                .unwrap_or_default();
            content.push_str(&format!(
                r#"
        <sheet name="{}" sheetId="{}"{} r:id="rId{}"/>"#,
                escape_xml_attr(sheet.name()),
                i + 1,
                state,
                i + 1
            ));
        }
        content.push_str("\n    </sheets>");

        if !workbook.named_ranges().is_empty() {
            content.push_str("\n    <definedNames>");
            for named in workbook.named_ranges() {
                content.push_str(&format!(
                    r#"
        <definedName name="{}""#,
                    escape_xml_attr(&named.name)
                ));
                if let Some(comment) = &named.comment {
                    content.push_str(&format!(r#" comment="{}""#, escape_xml_attr(comment)));
                }
                if let Some(index) = named.local_sheet() {
                    content.push_str(&format!(r#" localSheetId="{}""#, index));
                }
                if named.hidden {
                    content.push_str(r#" hidden="1""#);
                }
                content.push_str(&format!(">{}</definedName>", escape_xml(&named.refers_to)));
            }
            content.push_str("\n    </definedNames>");
        }

        // Cached formula results may be stale after edits
        if has_formulas {
            content.push_str("\n    <calcPr calcId=\"0\" fullCalcOnLoad=\"1\"/>");
        }

        content.push_str("\n</workbook>");
        content
    }

    fn workbook_rels(workbook: &Workbook, themes: &[(&str, &[u8])]) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );

        let sheet_count = workbook.sheet_count();
        for i in 0..sheet_count {
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            ));
        }

        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
            sheet_count + 1,
            sheet_count + 2
        ));

        for (i, (path, _)) in themes.iter().enumerate() {
            let target = path.strip_prefix("xl/").unwrap_or(path);
            content.push_str(&format!(
                r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="{}"/>"#,
                sheet_count + 3 + i,
                escape_xml_attr(target)
            ));
        }

        content.push_str("\n</Relationships>");
        content
    }

    fn worksheet_xml(sheet: &Sheet, sst: &mut SharedStrings, date_1904: bool) -> String {
        let mut content = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        let dimension = sheet
            .extent()
            .map_or_else(|| "A1".to_string(), |r| r.to_a1_string());
        content.push_str(&format!("\n    <dimension ref=\"{}\"/>", dimension));

        if !sheet.columns().is_empty() {
            content.push_str("\n    <cols>");
            for col in sheet.columns() {
                content.push_str(&format!(
                    "\n        <col min=\"{}\" max=\"{}\" width=\"{}\"",
                    u32::from(col.min) + 1,
                    u32::from(col.max) + 1,
                    col.width.unwrap_or(8.43)
                ));
                if let Some(style) = col.style_id {
                    content.push_str(&format!(" style=\"{}\"", style));
                }
                if col.custom_width {
                    content.push_str(" customWidth=\"1\"");
                }
                if col.hidden {
                    content.push_str(" hidden=\"1\"");
                }
                content.push_str("/>");
            }
            content.push_str("\n    </cols>");
        }

        content.push_str("\n    <sheetData>");

        let rows: BTreeSet<u32> = sheet
            .cells()
            .map(|(addr, _)| addr.row)
            .chain(sheet.rows().keys().copied())
            .collect();
        let mut cells = sheet.cells().peekable();

        for row in rows {
            content.push_str(&format!("\n        <row r=\"{}\"", row + 1));
            if let Some(info) = sheet.rows().get(&row) {
                if let (true, Some(height)) = (info.custom_height, info.height) {
                    content.push_str(&format!(" ht=\"{}\" customHeight=\"1\"", height));
                }
                if info.hidden {
                    content.push_str(" hidden=\"1\"");
                }
            }
            content.push('>');

            while let Some((addr, cell)) = cells.next_if(|(addr, _)| addr.row == row) {
                content.push_str("\n            ");
                write_cell(&mut content, addr, cell, sst, date_1904);
            }

            content.push_str("\n        </row>");
        }

        content.push_str("\n    </sheetData>");

        let merges = sheet.merges();
        if !merges.is_empty() {
            content.push_str(&format!("\n    <mergeCells count=\"{}\">", merges.len()));
            for range in merges {
                content.push_str(&format!("\n        <mergeCell ref=\"{}\"/>", range));
            }
            content.push_str("\n    </mergeCells>");
        }

        content.push_str("\n</worksheet>");
        content
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

/// Cached value text and `t` attribute for a value
fn value_parts(
    cell: &StoredCell,
    sst: Option<&mut SharedStrings>,
    date_1904: bool,
) -> Option<(Option<&'static str>, String)> {
    match &cell.value {
        CellValue::Empty => None,
        CellValue::Text(s) if cell.kind == Some(CellKind::Error) => {
            Some((Some("e"), escape_xml(s)))
        }
        CellValue::Text(s) => match sst {
            Some(sst) => Some((Some("s"), sst.intern(s).to_string())),
            None => Some((Some("str"), escape_xml(&encode_excel_escapes(s)))),
        },
        CellValue::Number(n) if n.is_finite() => Some((None, n.to_string())),
        CellValue::Number(n) => {
            log::warn!("non-finite number {} cannot be stored; written empty", n);
            None
        }
        CellValue::Date(d) => Some((None, datetime_to_serial(*d, date_1904).to_string())),
        CellValue::Bool(b) => Some((Some("b"), if *b { "1" } else { "0" }.to_string())),
    }
}

fn write_cell(
    out: &mut String,
    addr: CellAddress,
    cell: &StoredCell,
    sst: &mut SharedStrings,
    date_1904: bool,
) {
    out.push_str(&format!("<c r=\"{}\"", addr));
    if let Some(style) = cell.style_id.filter(|&s| s != 0) {
        out.push_str(&format!(" s=\"{}\"", style));
    }

    match &cell.formula {
        Some(formula) => {
            // Formula results are stored inline, never in the shared table
            let parts = value_parts(cell, None, date_1904);
            if let Some((Some(t), _)) = &parts {
                out.push_str(&format!(" t=\"{}\"", t));
            }
            out.push_str(&format!("><f>{}</f>", escape_xml(formula)));
            if let Some((_, v)) = parts {
                out.push_str(&format!("<v>{}</v>", v));
            }
            out.push_str("</c>");
        }
        None => match value_parts(cell, Some(sst), date_1904) {
            Some((t, v)) => {
                if let Some(t) = t {
                    out.push_str(&format!(" t=\"{}\"", t));
                }
                out.push_str(&format!("><v>{}</v></c>", v));
            }
            None => out.push_str("/>"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XlsxReader;
    use pretty_assertions::assert_eq;
    use sheetwright_core::{FontRecord, NamedRange, SheetState, StyleRecord};
    use std::io::Read;

    fn part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut s = String::new();
        file.read_to_string(&mut s).unwrap();
        s
    }

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        let bold = wb.styles_mut().push(StyleRecord {
            font: Some(FontRecord {
                bold: true,
                ..Default::default()
            }),
            ..Default::default()
        });

        let mut sheet = Sheet::new("Q1 & Q2");
        sheet.set_cell(CellAddress::new(0, 0), StoredCell::with_value("Item".into()));
        sheet.set_cell(CellAddress::new(1, 0), StoredCell::with_value("Item".into()));
        sheet.set_cell(
            CellAddress::new(1, 1),
            StoredCell::with_value(CellValue::Number(100.0)).styled(bold),
        );
        sheet.set_cell(CellAddress::new(2, 1), StoredCell::stub(Some(bold)));
        sheet.set_cell(
            CellAddress::new(3, 1),
            StoredCell::with_value(CellValue::Number(200.0)).with_formula("B2*2"),
        );
        wb.push_sheet(sheet).unwrap();
        wb
    }

    #[test]
    fn test_shared_strings_dedup() {
        let bytes = XlsxWriter::to_bytes(&sample(), &WriteOptions::default()).unwrap();
        let sst = part(&bytes, "xl/sharedStrings.xml");
        assert!(sst.contains("count=\"2\" uniqueCount=\"1\""));
    }

    #[test]
    fn test_cell_markup() {
        let bytes = XlsxWriter::to_bytes(&sample(), &WriteOptions::default()).unwrap();
        let sheet = part(&bytes, "xl/worksheets/sheet1.xml");

        assert!(sheet.contains("<dimension ref=\"A1:B4\"/>"));
        assert!(sheet.contains("<c r=\"A1\" t=\"s\"><v>0</v></c>"));
        assert!(sheet.contains("<c r=\"B2\" s=\"1\"><v>100</v></c>"));
        assert!(sheet.contains("<c r=\"B3\" s=\"1\"/>"));
        assert!(sheet.contains("<c r=\"B4\"><f>B2*2</f><v>200</v></c>"));

        let workbook = part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains("name=\"Q1 &amp; Q2\""));
        assert!(workbook.contains("fullCalcOnLoad=\"1\""));
    }

    #[test]
    fn test_workbook_names_and_state() {
        let mut wb = sample();
        let mut lookup = Sheet::new("Lookup");
        lookup.set_state(SheetState::Hidden);
        wb.push_sheet(lookup).unwrap();
        wb.define_name(NamedRange::new("Rate", "'Q1 & Q2'!$B$2"))
            .unwrap();
        wb.define_name(
            NamedRange::new("_xlnm._FilterDatabase", "Lookup!$A$1:$A$3")
                .local_to(1)
                .hidden(),
        )
        .unwrap();

        let bytes = XlsxWriter::to_bytes(&wb, &WriteOptions::default()).unwrap();
        let workbook = part(&bytes, "xl/workbook.xml");

        assert!(workbook.contains(r#"<sheet name="Lookup" sheetId="2" state="hidden" r:id="rId2"/>"#));
        assert!(workbook.contains(r#"<definedName name="Rate">'Q1 &amp; Q2'!$B$2</definedName>"#));
        assert!(workbook.contains(
            r#"<definedName name="_xlnm._FilterDatabase" localSheetId="1" hidden="1">Lookup!$A$1:$A$3</definedName>"#
        ));
        assert!(workbook.find("</sheets>") < workbook.find("<definedNames>"));
        assert!(workbook.find("</definedNames>") < workbook.find("<calcPr"));
    }

    #[test]
    fn test_styles_preserved_verbatim() {
        let mut wb = sample();
        let original = br#"<?xml version="1.0"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf/><xf/></cellXfs></styleSheet>"#;
        wb.retain_part(STYLES_PART, original.to_vec());

        let bytes = XlsxWriter::to_bytes(&wb, &WriteOptions::default()).unwrap();
        assert_eq!(part(&bytes, STYLES_PART).as_bytes(), &original[..]);

        let rebuilt =
            XlsxWriter::to_bytes(&wb, &WriteOptions::new().with_preserve_styles(false)).unwrap();
        assert!(part(&rebuilt, STYLES_PART).contains("<b/>"));
    }

    #[test]
    fn test_reads_back() {
        let bytes = XlsxWriter::to_bytes(
            &sample(),
            &WriteOptions::new().with_compression(Compression::Store),
        )
        .unwrap();
        let wb = XlsxReader::read_bytes(&bytes).unwrap();
        let sheet = wb.sheet("Q1 & Q2").unwrap();

        assert_eq!(sheet.cell_count(), 5);
        let b2 = sheet.cell(CellAddress::new(1, 1)).unwrap();
        assert_eq!(b2.value, CellValue::Number(100.0));
        assert!(wb.styles().get(b2.style_id.unwrap()).unwrap().font.as_ref().unwrap().bold);
        assert_eq!(
            sheet.cell(CellAddress::new(3, 1)).unwrap().formula.as_deref(),
            Some("B2*2")
        );
    }
}
