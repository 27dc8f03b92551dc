//! XLSX styles (styles.xml) read/write helpers

use std::collections::BTreeMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::escape_xml_attr;
use sheetwright_core::style::number_format::{builtin_format_code, FIRST_CUSTOM_FORMAT_ID};
use sheetwright_core::{
    AlignmentRecord, BorderRecord, ColorRef, EdgeRecord, FillRecord, FontRecord, StyleRecord,
    StyleTable,
};

// === Reading ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
    /// cellStyleXfs, dxfs and friends: children look alike but are not ours
    Other,
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, Default)]
struct XfIds {
    num_fmt_id: u32,
    font_id: u32,
    fill_id: u32,
    border_id: u32,
}

struct StylesParser {
    section: Section,
    numfmts: BTreeMap<u32, String>,
    fonts: Vec<FontRecord>,
    fills: Vec<FillRecord>,
    borders: Vec<BorderRecord>,
    xfs: Vec<(XfIds, Option<AlignmentRecord>)>,

    font: Option<FontRecord>,
    fill: Option<FillRecord>,
    border: Option<BorderRecord>,
    edge: Option<Edge>,
    xf: Option<(XfIds, Option<AlignmentRecord>)>,
}

fn attr_string(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

fn attr_u32(e: &BytesStart<'_>, name: &[u8]) -> Option<u32> {
    attr_string(e, name).and_then(|s| s.parse().ok())
}

/// Boolean flag element such as `<b/>` or `<b val="0"/>`
fn flag(e: &BytesStart<'_>) -> bool {
    attr_string(e, b"val").map_or(true, |v| v != "0" && v != "false")
}

fn parse_color_attrs(e: &BytesStart<'_>) -> Option<ColorRef> {
    let mut rgb = None;
    let mut theme = None;
    let mut tint = None;
    let mut indexed = None;
    let mut auto = false;

    for attr in e.attributes().flatten() {
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        match attr.key.as_ref() {
            b"rgb" => rgb = Some(value.to_string()),
            b"theme" => theme = value.parse::<u32>().ok(),
            b"tint" => tint = value.parse::<f64>().ok(),
            b"indexed" => indexed = value.parse::<u32>().ok(),
            b"auto" => auto = value.as_ref() == "1" || value.as_ref() == "true",
            _ => {}
        }
    }

    // Priority: rgb > theme > indexed > auto
    if let Some(rgb) = rgb {
        return Some(ColorRef::rgb(rgb));
    }
    if let Some(index) = theme {
        return Some(ColorRef::Theme { index, tint });
    }
    if let Some(i) = indexed {
        return Some(ColorRef::Indexed(i));
    }
    if auto {
        return Some(ColorRef::Auto);
    }
    None
}

impl StylesParser {
    fn new() -> Self {
        Self {
            section: Section::None,
            numfmts: BTreeMap::new(),
            fonts: Vec::new(),
            fills: Vec::new(),
            borders: Vec::new(),
            xfs: Vec::new(),
            font: None,
            fill: None,
            border: None,
            edge: None,
            xf: None,
        }
    }

    fn open(&mut self, e: &BytesStart<'_>) {
        let name = e.name();
        match (self.section, name.as_ref()) {
            (_, b"numFmts") => self.section = Section::NumFmts,
            (_, b"fonts") => self.section = Section::Fonts,
            (_, b"fills") => self.section = Section::Fills,
            (_, b"borders") => self.section = Section::Borders,
            (_, b"cellXfs") => self.section = Section::CellXfs,
            (_, b"cellStyleXfs") | (_, b"dxfs") | (_, b"cellStyles") | (_, b"colors") => {
                self.section = Section::Other
            }

            (Section::NumFmts, b"numFmt") => {
                if let (Some(id), Some(code)) =
                    (attr_u32(e, b"numFmtId"), attr_string(e, b"formatCode"))
                {
                    self.numfmts.insert(id, code);
                }
            }

            (Section::Fonts, b"font") => self.font = Some(FontRecord::default()),
            (Section::Fonts, tag) => {
                if let Some(font) = self.font.as_mut() {
                    match tag {
                        b"b" => font.bold = flag(e),
                        b"i" => font.italic = flag(e),
                        b"strike" => font.strike = flag(e),
                        b"u" => {
                            font.underline = attr_string(e, b"val").map_or(true, |v| v != "none")
                        }
                        b"sz" => {
                            font.size = attr_string(e, b"val").and_then(|v| v.parse::<f64>().ok())
                        }
                        b"name" => font.name = attr_string(e, b"val"),
                        b"color" => font.color = parse_color_attrs(e),
                        _ => {}
                    }
                }
            }

            (Section::Fills, b"fill") => self.fill = Some(FillRecord::default()),
            (Section::Fills, tag) => {
                if let Some(fill) = self.fill.as_mut() {
                    match tag {
                        b"patternFill" => fill.pattern = attr_string(e, b"patternType"),
                        b"fgColor" => fill.fg = parse_color_attrs(e),
                        b"bgColor" => fill.bg = parse_color_attrs(e),
                        _ => {}
                    }
                }
            }

            (Section::Borders, b"border") => self.border = Some(BorderRecord::default()),
            (Section::Borders, tag) => {
                let Some(border) = self.border.as_mut() else {
                    return;
                };
                let edge = match tag {
                    b"left" | b"start" => Some(Edge::Left),
                    b"right" | b"end" => Some(Edge::Right),
                    b"top" => Some(Edge::Top),
                    b"bottom" => Some(Edge::Bottom),
                    _ => None,
                };
                if let Some(edge) = edge {
                    let style = attr_string(e, b"style").filter(|s| s != "none");
                    let slot = match edge {
                        Edge::Left => &mut border.left,
                        Edge::Right => &mut border.right,
                        Edge::Top => &mut border.top,
                        Edge::Bottom => &mut border.bottom,
                    };
                    *slot = Some(EdgeRecord { style, color: None });
                    self.edge = Some(edge);
                } else if tag == b"color" {
                    if let Some(edge) = self.edge {
                        let slot = match edge {
                            Edge::Left => &mut border.left,
                            Edge::Right => &mut border.right,
                            Edge::Top => &mut border.top,
                            Edge::Bottom => &mut border.bottom,
                        };
                        if let Some(record) = slot.as_mut() {
                            record.color = parse_color_attrs(e);
                        }
                    }
                }
            }

            (Section::CellXfs, b"xf") => {
                let ids = XfIds {
                    num_fmt_id: attr_u32(e, b"numFmtId").unwrap_or(0),
                    font_id: attr_u32(e, b"fontId").unwrap_or(0),
                    fill_id: attr_u32(e, b"fillId").unwrap_or(0),
                    border_id: attr_u32(e, b"borderId").unwrap_or(0),
                };
                self.xf = Some((ids, None));
            }
            (Section::CellXfs, b"alignment") => {
                if let Some((_, alignment)) = self.xf.as_mut() {
                    *alignment = Some(AlignmentRecord {
                        horizontal: attr_string(e, b"horizontal"),
                        vertical: attr_string(e, b"vertical"),
                        wrap_text: attr_string(e, b"wrapText")
                            .map_or(false, |v| v == "1" || v == "true"),
                    });
                }
            }

            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" | b"cellStyleXfs"
            | b"dxfs" | b"cellStyles" | b"colors" => self.section = Section::None,
            b"font" if self.section == Section::Fonts => {
                if let Some(font) = self.font.take() {
                    self.fonts.push(font);
                }
            }
            b"fill" if self.section == Section::Fills => {
                if let Some(fill) = self.fill.take() {
                    self.fills.push(fill);
                }
            }
            b"border" if self.section == Section::Borders => {
                if let Some(border) = self.border.take() {
                    self.borders.push(border);
                }
                self.edge = None;
            }
            b"left" | b"right" | b"top" | b"bottom" | b"start" | b"end"
                if self.section == Section::Borders =>
            {
                self.edge = None
            }
            b"xf" if self.section == Section::CellXfs => {
                if let Some(xf) = self.xf.take() {
                    self.xfs.push(xf);
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> StyleTable {
        let StylesParser {
            numfmts,
            fonts,
            fills,
            borders,
            xfs,
            ..
        } = self;

        let table: StyleTable = xfs
            .into_iter()
            .map(|(ids, alignment)| StyleRecord {
                font: fonts.get(ids.font_id as usize).cloned(),
                fill: fills.get(ids.fill_id as usize).cloned(),
                border: borders.get(ids.border_id as usize).cloned(),
                alignment,
                num_fmt_id: ids.num_fmt_id,
                num_fmt_code: numfmts
                    .get(&ids.num_fmt_id)
                    .cloned()
                    .or_else(|| builtin_format_code(ids.num_fmt_id).map(str::to_string)),
            })
            .collect();

        if table.is_empty() {
            std::iter::once(StyleRecord::default()).collect()
        } else {
            table
        }
    }
}

/// Parse styles.xml into the raw style table (one record per cellXfs entry)
pub(crate) fn read_styles_xml<R: Read>(reader: R) -> XlsxResult<StyleTable> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut parser = StylesParser::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => parser.open(&e),
            Ok(Event::Empty(e)) => {
                parser.open(&e);
                parser.close(e.name().as_ref());
            }
            Ok(Event::End(e)) => parser.close(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(parser.finish())
}

// === Writing ===

fn default_font() -> FontRecord {
    FontRecord {
        name: Some("Calibri".into()),
        size: Some(11.0),
        ..Default::default()
    }
}

fn intern<T: PartialEq + Clone>(items: &mut Vec<T>, item: &T) -> u32 {
    match items.iter().position(|x| x == item) {
        Some(i) => i as u32,
        None => {
            items.push(item.clone());
            (items.len() - 1) as u32
        }
    }
}

fn write_color(tag: &str, color: &ColorRef) -> String {
    match color {
        ColorRef::Auto => format!("<{tag} auto=\"1\"/>"),
        ColorRef::Rgb(hex) if hex.len() == 6 => {
            format!("<{tag} rgb=\"FF{}\"/>", escape_xml_attr(hex))
        }
        ColorRef::Rgb(hex) => format!("<{tag} rgb=\"{}\"/>", escape_xml_attr(hex)),
        ColorRef::Indexed(i) => format!("<{tag} indexed=\"{}\"/>", i),
        ColorRef::Theme { index, tint } => match tint {
            Some(t) if *t != 0.0 => format!("<{tag} theme=\"{}\" tint=\"{}\"/>", index, t),
            _ => format!("<{tag} theme=\"{}\"/>", index),
        },
    }
}

fn write_font(font: &FontRecord) -> String {
    let mut s = String::from("<font>");
    if font.bold {
        s.push_str("<b/>");
    }
    if font.italic {
        s.push_str("<i/>");
    }
    if font.strike {
        s.push_str("<strike/>");
    }
    if font.underline {
        s.push_str("<u/>");
    }
    if let Some(size) = font.size {
        s.push_str(&format!("<sz val=\"{}\"/>", size));
    }
    if let Some(color) = &font.color {
        s.push_str(&write_color("color", color));
    }
    if let Some(name) = &font.name {
        s.push_str(&format!("<name val=\"{}\"/>", escape_xml_attr(name)));
    }
    s.push_str("</font>");
    s
}

fn write_fill(fill: &FillRecord) -> String {
    let pattern = fill.pattern.as_deref().unwrap_or("none");
    if fill.fg.is_none() && fill.bg.is_none() {
        return format!(
            "<fill><patternFill patternType=\"{}\"/></fill>",
            escape_xml_attr(pattern)
        );
    }
    let mut s = format!(
        "<fill><patternFill patternType=\"{}\">",
        escape_xml_attr(pattern)
    );
    if let Some(fg) = &fill.fg {
        s.push_str(&write_color("fgColor", fg));
    }
    if let Some(bg) = &fill.bg {
        s.push_str(&write_color("bgColor", bg));
    }
    s.push_str("</patternFill></fill>");
    s
}

fn write_border_edge(tag: &str, edge: &Option<EdgeRecord>) -> String {
    match edge.as_ref().and_then(|e| e.style.as_ref().map(|s| (s, &e.color))) {
        Some((style, color)) => {
            let mut s = format!("<{tag} style=\"{}\">", escape_xml_attr(style));
            if let Some(color) = color {
                s.push_str(&write_color("color", color));
            }
            s.push_str(&format!("</{tag}>"));
            s
        }
        None => format!("<{tag}/>"),
    }
}

fn write_border(border: &BorderRecord) -> String {
    format!(
        "<border>{}{}{}{}<diagonal/></border>",
        write_border_edge("left", &border.left),
        write_border_edge("right", &border.right),
        write_border_edge("top", &border.top),
        write_border_edge("bottom", &border.bottom),
    )
}

/// Build styles.xml from the raw style table
///
/// Record `i` of the table becomes `cellXfs` entry `i`, so style indices in
/// the sheets stay valid.
pub(crate) fn write_styles_xml(table: &StyleTable) -> String {
    let default_record = [StyleRecord::default()];
    let records: Vec<&StyleRecord> = if table.is_empty() {
        default_record.iter().collect()
    } else {
        table.iter().collect()
    };

    let mut fonts = vec![records
        .first()
        .and_then(|r| r.font.clone())
        .unwrap_or_else(default_font)];
    // Excel requires the first two fills to be none and gray125
    let mut fills = vec![
        FillRecord {
            pattern: Some("none".into()),
            ..Default::default()
        },
        FillRecord {
            pattern: Some("gray125".into()),
            ..Default::default()
        },
    ];
    let mut borders = vec![BorderRecord::default()];
    let mut numfmts: BTreeMap<u32, String> = BTreeMap::new();

    let mut xfs = Vec::with_capacity(records.len());
    for record in &records {
        let font_id = record.font.as_ref().map_or(0, |f| intern(&mut fonts, f));
        let fill_id = match &record.fill {
            Some(fill) if fill.pattern.as_deref().unwrap_or("none") != "none" => {
                intern(&mut fills, fill)
            }
            _ => 0,
        };
        let border_id = record
            .border
            .as_ref()
            .map_or(0, |b| intern(&mut borders, b));

        let num_fmt_id = record.num_fmt_id;
        if let Some(code) = &record.num_fmt_code {
            let is_builtin = builtin_format_code(num_fmt_id) == Some(code.as_str());
            if num_fmt_id >= FIRST_CUSTOM_FORMAT_ID || !is_builtin {
                numfmts.entry(num_fmt_id).or_insert_with(|| code.clone());
            }
        }

        let mut xf = format!(
            "<xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"{}\" xfId=\"0\"",
            num_fmt_id, font_id, fill_id, border_id
        );
        if num_fmt_id != 0 {
            xf.push_str(" applyNumberFormat=\"1\"");
        }
        if font_id != 0 {
            xf.push_str(" applyFont=\"1\"");
        }
        if fill_id != 0 {
            xf.push_str(" applyFill=\"1\"");
        }
        if border_id != 0 {
            xf.push_str(" applyBorder=\"1\"");
        }
        match &record.alignment {
            Some(al) => {
                xf.push_str(" applyAlignment=\"1\"><alignment");
                if let Some(h) = &al.horizontal {
                    xf.push_str(&format!(" horizontal=\"{}\"", escape_xml_attr(h)));
                }
                if let Some(v) = &al.vertical {
                    xf.push_str(&format!(" vertical=\"{}\"", escape_xml_attr(v)));
                }
                if al.wrap_text {
                    xf.push_str(" wrapText=\"1\"");
                }
                xf.push_str("/></xf>");
            }
            None => xf.push_str("/>"),
        }
        xfs.push(xf);
    }

    let mut xml = String::new();
    xml.push_str(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );

    if !numfmts.is_empty() {
        xml.push_str(&format!("\n  <numFmts count=\"{}\">", numfmts.len()));
        for (id, code) in &numfmts {
            xml.push_str(&format!(
                "\n    <numFmt numFmtId=\"{}\" formatCode=\"{}\"/>",
                id,
                escape_xml_attr(code)
            ));
        }
        xml.push_str("\n  </numFmts>");
    }

    xml.push_str(&format!("\n  <fonts count=\"{}\">", fonts.len()));
    for font in &fonts {
        xml.push_str("\n    ");
        xml.push_str(&write_font(font));
    }
    xml.push_str("\n  </fonts>");

    xml.push_str(&format!("\n  <fills count=\"{}\">", fills.len()));
    for fill in &fills {
        xml.push_str("\n    ");
        xml.push_str(&write_fill(fill));
    }
    xml.push_str("\n  </fills>");

    xml.push_str(&format!("\n  <borders count=\"{}\">", borders.len()));
    for border in &borders {
        xml.push_str("\n    ");
        xml.push_str(&write_border(border));
    }
    xml.push_str("\n  </borders>");

    xml.push_str(
        r#"
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>"#,
    );

    xml.push_str(&format!("\n  <cellXfs count=\"{}\">", xfs.len()));
    for xf in &xfs {
        xml.push_str("\n    ");
        xml.push_str(xf);
    }
    xml.push_str("\n  </cellXfs>");

    xml.push_str(
        r#"
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
  <dxfs count="0"/>
  <tableStyles count="0" defaultTableStyle="TableStyleMedium9" defaultPivotStyle="PivotStyleLight16"/>
</styleSheet>"#,
    );
    xml
}
