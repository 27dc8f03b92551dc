//! Decoding raw style records into a normalized cell style

use super::{ColorRef, StyleRecord};

/// A border edge as rendered for preview
///
/// Any line style on an edge decodes to the same fixed declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorderDeclaration {
    pub width_px: u32,
    pub line: &'static str,
    pub color: &'static str,
}

impl BorderDeclaration {
    /// 1px solid black
    pub const SOLID_BLACK: BorderDeclaration = BorderDeclaration {
        width_px: 1,
        line: "solid",
        color: "#000000",
    };
}

impl std::fmt::Display for BorderDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}px {} {}", self.width_px, self.line, self.color)
    }
}

/// Normalized, read-only style of a cell
///
/// Every field is optional; a field is set only when the source record
/// provided something usable for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStyle {
    /// Background color as `#RRGGBB`
    pub background_color: Option<String>,
    /// Text color as `#RRGGBB`
    pub color: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    /// Font size, carried over from the record's point size
    pub font_size_px: Option<f64>,
    pub font_family: Option<String>,
    /// Horizontal alignment, verbatim
    pub horizontal_align: Option<String>,
    pub border_top: Option<BorderDeclaration>,
    pub border_right: Option<BorderDeclaration>,
    pub border_bottom: Option<BorderDeclaration>,
    pub border_left: Option<BorderDeclaration>,
}

impl CellStyle {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        *self == CellStyle::default()
    }

    /// Render as CSS declarations, in a fixed order
    pub fn css_declarations(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(bg) = &self.background_color {
            out.push(("background-color", bg.clone()));
        }
        if let Some(color) = &self.color {
            out.push(("color", color.clone()));
        }
        if self.bold == Some(true) {
            out.push(("font-weight", "bold".to_string()));
        }
        if self.italic == Some(true) {
            out.push(("font-style", "italic".to_string()));
        }
        if self.underline == Some(true) {
            out.push(("text-decoration", "underline".to_string()));
        }
        if let Some(size) = self.font_size_px {
            out.push(("font-size", format!("{}px", size)));
        }
        if let Some(family) = &self.font_family {
            out.push(("font-family", family.clone()));
        }
        if let Some(align) = &self.horizontal_align {
            out.push(("text-align", align.clone()));
        }
        let edges = [
            ("border-top", &self.border_top),
            ("border-right", &self.border_right),
            ("border-bottom", &self.border_bottom),
            ("border-left", &self.border_left),
        ];
        for (name, edge) in edges {
            if let Some(decl) = edge {
                out.push((name, decl.to_string()));
            }
        }
        out
    }
}

fn resolve(color: Option<&ColorRef>) -> Option<String> {
    color
        .and_then(ColorRef::to_rgb_hex)
        .map(|hex| format!("#{}", hex))
}

/// Decode a raw style record
///
/// Total: a missing record or malformed parts yield a style with fewer fields.
pub fn decode_style(record: Option<&StyleRecord>) -> CellStyle {
    let mut style = CellStyle::default();
    let Some(record) = record else {
        return style;
    };

    if let Some(fill) = &record.fill {
        style.background_color = resolve(fill.fg.as_ref()).or_else(|| resolve(fill.bg.as_ref()));
    }

    if let Some(font) = &record.font {
        style.color = resolve(font.color.as_ref());
        if font.bold {
            style.bold = Some(true);
        }
        if font.italic {
            style.italic = Some(true);
        }
        if font.underline {
            style.underline = Some(true);
        }
        style.font_size_px = font.size.filter(|s| s.is_finite() && *s > 0.0);
        style.font_family = font.name.clone().filter(|n| !n.is_empty());
    }

    if let Some(alignment) = &record.alignment {
        style.horizontal_align = alignment.horizontal.clone();
    }

    if let Some(border) = &record.border {
        let edge = |e: &Option<super::EdgeRecord>| {
            e.as_ref()
                .filter(|e| e.has_style())
                .map(|_| BorderDeclaration::SOLID_BLACK)
        };
        style.border_top = edge(&border.top);
        style.border_right = edge(&border.right);
        style.border_bottom = edge(&border.bottom);
        style.border_left = edge(&border.left);
    }

    style
}
