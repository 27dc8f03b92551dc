//! BIFF8 style records.
//!
//! FONT, FORMAT, XF and PALETTE records from the workbook globals are
//! collected into a [`StyleContext`] and resolved into the workbook's
//! [`StyleTable`], one [`StyleRecord`] per XF so that a cell's XF index is
//! its style id. Palette indices are resolved to explicit RGB here, since
//! a PALETTE record may have redefined them.

use std::collections::HashMap;

use sheetwright_core::style::number_format::builtin_format_code;
use sheetwright_core::{
    AlignmentRecord, BorderRecord, ColorRef, EdgeRecord, FillRecord, FontRecord, StyleRecord,
    StyleTable,
};

use crate::biff::parser::ByteReader;
use crate::biff::strings::{read_short_string, read_unicode_string};
use crate::error::{XlsError, XlsResult};

/// The standard palette; workbook indices 8-63 map to entries 0-55.
pub(crate) const DEFAULT_PALETTE: [(u8, u8, u8); 56] = [
    (0, 0, 0),
    (255, 255, 255),
    (255, 0, 0),
    (0, 255, 0),
    (0, 0, 255),
    (255, 255, 0),
    (255, 0, 255),
    (0, 255, 255),
    (128, 0, 0),
    (0, 128, 0),
    (0, 0, 128),
    (128, 128, 0),
    (128, 0, 128),
    (0, 128, 128),
    (192, 192, 192),
    (128, 128, 128),
    (153, 153, 255),
    (153, 51, 102),
    (255, 255, 204),
    (204, 255, 255),
    (102, 0, 102),
    (255, 128, 128),
    (0, 102, 204),
    (204, 204, 255),
    (0, 0, 128),
    (255, 0, 255),
    (255, 255, 0),
    (0, 255, 255),
    (128, 0, 128),
    (128, 0, 0),
    (0, 128, 128),
    (0, 0, 255),
    (0, 204, 255),
    (204, 255, 255),
    (204, 255, 204),
    (255, 255, 153),
    (153, 204, 255),
    (255, 153, 204),
    (204, 153, 255),
    (255, 204, 153),
    (51, 102, 255),
    (51, 204, 204),
    (153, 204, 0),
    (255, 204, 0),
    (255, 153, 0),
    (255, 102, 0),
    (102, 102, 153),
    (150, 150, 150),
    (0, 51, 102),
    (51, 153, 102),
    (0, 51, 0),
    (51, 51, 0),
    (153, 51, 0),
    (153, 51, 51),
    (51, 51, 153),
    (51, 51, 51),
];

const EGA_COLORS: [(u8, u8, u8); 8] = [
    (0, 0, 0),
    (255, 255, 255),
    (255, 0, 0),
    (0, 255, 0),
    (0, 0, 255),
    (255, 255, 0),
    (255, 0, 255),
    (0, 255, 255),
];

/// Parsed FONT record.
#[derive(Debug, Clone, Default)]
pub(crate) struct BiffFont {
    /// Height in twips (1/20 pt)
    pub height_twips: u16,
    pub bold: bool,
    pub italic: bool,
    pub underline: u8,
    pub strikethrough: bool,
    pub color_index: u16,
    pub name: String,
}

/// Parsed XF record (20 bytes in BIFF8).
#[derive(Debug, Clone, Default)]
pub(crate) struct BiffXf {
    pub font_index: u16,
    pub format_index: u16,
    pub hor_align: u8,
    pub vert_align: u8,
    pub wrap_text: bool,
    pub border_left: u8,
    pub border_right: u8,
    pub border_top: u8,
    pub border_bottom: u8,
    pub icv_left: u16,
    pub icv_right: u16,
    pub icv_top: u16,
    pub icv_bottom: u16,
    pub fill_pattern: u8,
    pub icv_fore: u16,
    pub icv_back: u16,
}

/// Style data collected from the workbook globals.
pub(crate) struct StyleContext {
    pub fonts: Vec<BiffFont>,
    pub formats: HashMap<u16, String>,
    pub xfs: Vec<BiffXf>,
    pub palette: [(u8, u8, u8); 56],
}

impl StyleContext {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            formats: HashMap::new(),
            xfs: Vec::new(),
            palette: DEFAULT_PALETTE,
        }
    }

    /// Resolve every XF into the style table, index for index.
    pub fn build_style_table(&self) -> StyleTable {
        if self.xfs.is_empty() {
            return std::iter::once(StyleRecord::default()).collect();
        }
        self.xfs.iter().map(|xf| self.resolve_xf(xf)).collect()
    }

    fn resolve_xf(&self, xf: &BiffXf) -> StyleRecord {
        let num_fmt_id = u32::from(xf.format_index);
        StyleRecord {
            font: self.resolve_font(xf.font_index),
            fill: self.resolve_fill(xf),
            border: self.resolve_border(xf),
            alignment: resolve_alignment(xf),
            num_fmt_id,
            num_fmt_code: self
                .formats
                .get(&xf.format_index)
                .cloned()
                .or_else(|| builtin_format_code(num_fmt_id).map(str::to_string)),
        }
    }

    fn resolve_font(&self, font_index: u16) -> Option<FontRecord> {
        // Font index 4 is never written; 5 and up are shifted down by one.
        let actual = if font_index >= 5 {
            font_index as usize - 1
        } else {
            font_index as usize
        };
        let font = self.fonts.get(actual)?;

        Some(FontRecord {
            name: Some(font.name.clone()).filter(|n| !n.is_empty()),
            size: Some(f64::from(font.height_twips) / 20.0).filter(|s| *s > 0.0),
            bold: font.bold,
            italic: font.italic,
            underline: font.underline != 0,
            strike: font.strikethrough,
            color: self.resolve_color(font.color_index),
        })
    }

    fn resolve_fill(&self, xf: &BiffXf) -> Option<FillRecord> {
        let pattern = pattern_name(xf.fill_pattern)?;
        Some(FillRecord {
            pattern: Some(pattern.to_string()),
            fg: self.resolve_color(xf.icv_fore),
            bg: self.resolve_color(xf.icv_back),
        })
    }

    fn resolve_border(&self, xf: &BiffXf) -> Option<BorderRecord> {
        let edge = |code: u8, icv: u16| {
            border_line_name(code).map(|style| EdgeRecord {
                style: Some(style.to_string()),
                color: self.resolve_color(icv),
            })
        };
        let border = BorderRecord {
            left: edge(xf.border_left, xf.icv_left),
            right: edge(xf.border_right, xf.icv_right),
            top: edge(xf.border_top, xf.icv_top),
            bottom: edge(xf.border_bottom, xf.icv_bottom),
        };
        (!border.is_empty()).then_some(border)
    }

    /// Resolve a palette index to an explicit color.
    ///
    /// The system window colors (0x40, 0x41) and "automatic" (0x7FFF) carry
    /// no explicit color.
    pub(crate) fn resolve_color(&self, icv: u16) -> Option<ColorRef> {
        let (r, g, b) = match icv {
            0..=7 => EGA_COLORS[icv as usize],
            8..=63 => self.palette[(icv - 8) as usize],
            _ => return None,
        };
        Some(ColorRef::Rgb(format!("{r:02X}{g:02X}{b:02X}")))
    }
}

fn resolve_alignment(xf: &BiffXf) -> Option<AlignmentRecord> {
    let horizontal = match xf.hor_align {
        1 => Some("left"),
        2 => Some("center"),
        3 => Some("right"),
        4 => Some("fill"),
        5 => Some("justify"),
        6 => Some("centerContinuous"),
        7 => Some("distributed"),
        _ => None,
    };
    // Bottom is the default vertical alignment
    let vertical = match xf.vert_align {
        0 => Some("top"),
        1 => Some("center"),
        3 => Some("justify"),
        4 => Some("distributed"),
        _ => None,
    };

    if horizontal.is_none() && vertical.is_none() && !xf.wrap_text {
        return None;
    }
    Some(AlignmentRecord {
        horizontal: horizontal.map(str::to_string),
        vertical: vertical.map(str::to_string),
        wrap_text: xf.wrap_text,
    })
}

/// Parse a FONT record (0x0031).
///
/// Layout: height u16, grbit u16 (bit 1 italic, bit 3 strikeout), color
/// index u16, weight u16 (700 = bold), escapement u16, underline u8,
/// family u8, charset u8, reserved u8, name (short string).
pub(crate) fn parse_font(data: &[u8]) -> XlsResult<BiffFont> {
    if data.len() < 15 {
        return Err(XlsError::Parse("FONT record too short".into()));
    }
    let mut r = ByteReader::new(data);
    let height_twips = r.u16()?;
    let grbit = r.u16()?;
    let color_index = r.u16()?;
    let weight = r.u16()?;
    let _escapement = r.u16()?;
    let underline = r.u8()?;
    r.skip(3)?;
    let name = read_short_string(&mut r).unwrap_or_default();

    Ok(BiffFont {
        height_twips,
        bold: weight >= 700,
        italic: grbit & 0x0002 != 0,
        underline,
        strikethrough: grbit & 0x0008 != 0,
        color_index,
        name,
    })
}

/// Parse a FORMAT record (0x041E): format id u16, then the format code.
pub(crate) fn parse_format(data: &[u8]) -> XlsResult<(u16, String)> {
    let mut r = ByteReader::new(data);
    let id = r.u16()?;
    let code = read_unicode_string(&mut r)?;
    Ok((id, code))
}

/// Parse an XF record (0x00E0).
///
/// Layout ([MS-XLS] 2.4.353): font u16, format u16, type/protection u16,
/// alignment u8 (bits 0-2 horizontal, bit 3 wrap, bits 4-6 vertical),
/// rotation u8, indent u8, used-attributes u8, then two border/color words
/// and the fill color word.
pub(crate) fn parse_xf(data: &[u8]) -> XlsResult<BiffXf> {
    if data.len() < 20 {
        return Err(XlsError::Parse(format!(
            "XF record too short: {} bytes (expected 20)",
            data.len()
        )));
    }

    let mut r = ByteReader::new(data);
    let font_index = r.u16()?;
    let format_index = r.u16()?;
    let _type_protection = r.u16()?;
    let align = r.u8()?;
    r.skip(3)?;
    let border1 = r.u32()?;
    let border2 = r.u32()?;
    let fill_colors = r.u16()?;

    Ok(BiffXf {
        font_index,
        format_index,
        hor_align: align & 0x07,
        wrap_text: align & 0x08 != 0,
        vert_align: (align >> 4) & 0x07,
        border_left: (border1 & 0x0F) as u8,
        border_right: ((border1 >> 4) & 0x0F) as u8,
        border_top: ((border1 >> 8) & 0x0F) as u8,
        border_bottom: ((border1 >> 12) & 0x0F) as u8,
        icv_left: ((border1 >> 16) & 0x7F) as u16,
        icv_right: ((border1 >> 23) & 0x7F) as u16,
        icv_top: (border2 & 0x7F) as u16,
        icv_bottom: ((border2 >> 7) & 0x7F) as u16,
        fill_pattern: ((border2 >> 26) & 0x3F) as u8,
        icv_fore: fill_colors & 0x7F,
        icv_back: (fill_colors >> 7) & 0x7F,
    })
}

/// Apply a PALETTE record: a color count, then 4-byte RGB0 entries
/// overriding the palette from index 8 on.
pub(crate) fn apply_palette(data: &[u8], palette: &mut [(u8, u8, u8); 56]) -> XlsResult<()> {
    let mut r = ByteReader::new(data);
    let count = (r.u16()? as usize).min(palette.len());
    for entry in palette.iter_mut().take(count) {
        let rgb = r.bytes(4)?;
        *entry = (rgb[0], rgb[1], rgb[2]);
    }
    Ok(())
}

fn border_line_name(code: u8) -> Option<&'static str> {
    Some(match code {
        1 => "thin",
        2 => "medium",
        3 => "dashed",
        4 => "dotted",
        5 => "thick",
        6 => "double",
        7 => "hair",
        8 => "mediumDashed",
        9 => "dashDot",
        10 => "mediumDashDot",
        11 => "dashDotDot",
        12 => "mediumDashDotDot",
        13 => "slantDashDot",
        _ => return None,
    })
}

fn pattern_name(code: u8) -> Option<&'static str> {
    Some(match code {
        1 => "solid",
        2 => "mediumGray",
        3 => "darkGray",
        4 => "lightGray",
        5 => "darkHorizontal",
        6 => "darkVertical",
        7 => "darkDown",
        8 => "darkUp",
        9 => "darkGrid",
        10 => "darkTrellis",
        11 => "lightHorizontal",
        12 => "lightVertical",
        13 => "lightDown",
        14 => "lightUp",
        15 => "lightGrid",
        16 => "lightTrellis",
        17 => "gray125",
        18 => "gray0625",
        _ => return None,
    })
}
