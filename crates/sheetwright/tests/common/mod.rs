//! Workbook fixtures shared by the session tests

#![allow(dead_code)]

use std::io::{Cursor, Write};

use sheetwright::{BoxError, CellAddress, CellValue, Session, SessionConfig, TranslationRequest};
use sheetwright_xls::biff::records;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="2">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><sz val="11"/><name val="Calibri"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/>
  </cellXfs>
</styleSheet>"#;

/// A1 Item, B1 Price, A2 Widget, B2 100 (bold, yellow); row 3 holds a
/// formula and a styled blank
const PRICES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1:B3"/>
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
    <row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2" s="1"><v>100</v></c></row>
    <row r="3"><c r="A3" s="1"/><c r="B3"><f>B2*2</f><v>200</v></c></row>
  </sheetData>
  <mergeCells count="1"><mergeCell ref="A3:A4"/></mergeCells>
</worksheet>"#;

const NOTES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1"/>
  <sheetData><row r="1"><c r="A1" t="s"><v>3</v></c></row></sheetData>
</worksheet>"#;

const SHARED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
  <si><t>Item</t></si><si><t>Price</t></si><si><t>Widget</t></si><si><t>memo</t></si>
</sst>"#;

/// The price list as an xlsx package
pub fn price_list_xlsx() -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        let parts: [(&str, &str); 8] = [
            ("[Content_Types].xml", r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#),
            ("_rels/.rels", r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#),
            ("xl/workbook.xml", r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Prices" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets><definedNames><definedName name="WidgetPrice">Prices!$B$2</definedName></definedNames></workbook>"#),
            ("xl/_rels/workbook.xml.rels", r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/></Relationships>"#),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/sheet1.xml", PRICES),
            ("xl/worksheets/sheet2.xml", NOTES),
        ];
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn record(stream: &mut Vec<u8>, kind: u16, body: &[u8]) -> usize {
    let at = stream.len();
    stream.extend_from_slice(&kind.to_le_bytes());
    stream.extend_from_slice(&(body.len() as u16).to_le_bytes());
    stream.extend_from_slice(body);
    at
}

fn le16(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bof(stream: &mut Vec<u8>, substream: u16) -> usize {
    let mut body = le16(&[records::BIFF8_VERSION, substream]);
    body.extend_from_slice(&[0; 12]);
    record(stream, records::BOF, &body)
}

fn font(weight: u16) -> Vec<u8> {
    let mut body = le16(&[220, 0, 0x7FFF, weight, 0]);
    body.extend_from_slice(&[0, 0, 0, 0, 5, 0]);
    body.extend_from_slice(b"Arial");
    body
}

fn xf(font: u16, pattern: u32, colors: u16) -> Vec<u8> {
    let mut body = le16(&[font, 0, 0]);
    body.extend_from_slice(&[0x20, 0, 0, 0]);
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&(pattern << 26).to_le_bytes());
    body.extend_from_slice(&colors.to_le_bytes());
    body
}

fn label(row: u16, col: u16, text: &str) -> Vec<u8> {
    let mut body = le16(&[row, col, 0, text.len() as u16]);
    body.push(0);
    body.extend_from_slice(text.as_bytes());
    body
}

/// The same price list as a legacy BIFF8 compound file (one sheet, "Legacy")
pub fn price_list_xls() -> Vec<u8> {
    let mut stream = Vec::new();
    bof(&mut stream, records::BOF_WORKBOOK_GLOBALS);
    record(&mut stream, records::FONT, &font(400));
    record(&mut stream, records::FONT, &font(700));
    record(&mut stream, records::XF, &xf(0, 0, 64 | (65 << 7)));
    // bold, solid fill in palette yellow
    record(&mut stream, records::XF, &xf(1, 1, 13 | (64 << 7)));
    let mut sheet_entry = vec![0, 0, 0, 0, 0, 0, 6, 0];
    sheet_entry.extend_from_slice(b"Legacy");
    let entry = record(&mut stream, records::BOUNDSHEET, &sheet_entry);
    record(&mut stream, records::EOF, &[]);

    let sheet = bof(&mut stream, records::BOF_WORKSHEET);
    let mut dimension = 0u32.to_le_bytes().to_vec();
    dimension.extend_from_slice(&2u32.to_le_bytes());
    dimension.extend_from_slice(&le16(&[0, 2, 0]));
    record(&mut stream, records::DIMENSION, &dimension);
    record(&mut stream, records::LABEL, &label(0, 0, "Item"));
    record(&mut stream, records::LABEL, &label(0, 1, "Price"));
    record(&mut stream, records::LABEL, &label(1, 0, "Widget"));
    let mut number = le16(&[1, 1, 1]);
    number.extend_from_slice(&100.0f64.to_le_bytes());
    record(&mut stream, records::NUMBER, &number);
    record(&mut stream, records::EOF, &[]);

    let offset = (sheet as u32).to_le_bytes();
    stream[entry + 4..entry + 8].copy_from_slice(&offset);

    let mut comp = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    {
        let mut workbook = comp.create_stream("/Workbook").unwrap();
        workbook.write_all(&stream).unwrap();
        workbook.flush().unwrap();
    }
    comp.flush().unwrap();
    comp.into_inner().into_inner()
}

/// A session with the xlsx price list loaded
pub fn loaded_session(config: SessionConfig) -> Session {
    let mut session = Session::new(config);
    session
        .load_bytes("prices.xlsx", &price_list_xlsx())
        .unwrap();
    session
}

/// Value of `addr` in the active grid
pub fn grid_value(session: &Session, addr: &str) -> CellValue {
    let addr = CellAddress::parse(addr).unwrap();
    session
        .view()
        .unwrap()
        .grid
        .get(addr)
        .map(|cell| cell.value.clone())
        .unwrap_or_default()
}

/// Value of `addr` in the persisted workbook
pub fn stored_value(session: &Session, sheet: &str, addr: &str) -> CellValue {
    let addr = CellAddress::parse(addr).unwrap();
    session
        .workbook()
        .unwrap()
        .sheet(sheet)
        .unwrap()
        .cell(addr)
        .map(|cell| cell.value.clone())
        .unwrap_or_default()
}

/// A translator that always answers with `text`
pub fn answering(
    text: &'static str,
) -> impl Fn(&TranslationRequest) -> Result<String, BoxError> + Send + Sync {
    move |_: &TranslationRequest| Ok(text.to_string())
}
