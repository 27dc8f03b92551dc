//! Style records and decoding
//!
//! This module contains two layers:
//! - [`StyleRecord`] and its parts are the raw, persisted style table entries
//!   a cell's style index points at. They are written back unchanged.
//! - [`CellStyle`] is a normalized, read-only description derived from a
//!   record by [`decode_style`], used for previewing.

mod color;
mod decode;
pub mod number_format;

pub use color::{ColorRef, INDEXED_PALETTE};
pub use decode::{decode_style, BorderDeclaration, CellStyle};

/// One entry of the workbook's style table (a cell format)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleRecord {
    /// Font, if the record references one
    pub font: Option<FontRecord>,
    /// Fill, if the record references one
    pub fill: Option<FillRecord>,
    /// Borders, if the record references them
    pub border: Option<BorderRecord>,
    /// Alignment, if present
    pub alignment: Option<AlignmentRecord>,
    /// Number format id
    pub num_fmt_id: u32,
    /// Number format code, for custom formats (and resolved built-ins)
    pub num_fmt_code: Option<String>,
}

impl StyleRecord {
    /// Effective number format code: the custom code, else the built-in one
    pub fn format_code(&self) -> Option<&str> {
        self.num_fmt_code
            .as_deref()
            .or_else(|| number_format::builtin_format_code(self.num_fmt_id))
    }

    /// Whether numbers formatted by this record are dates
    pub fn is_date_format(&self) -> bool {
        if number_format::is_date_format_id(self.num_fmt_id) {
            return true;
        }
        self.num_fmt_code
            .as_deref()
            .map(number_format::is_date_format_code)
            .unwrap_or(false)
    }
}

/// Raw font record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FontRecord {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub color: Option<ColorRef>,
}

/// Raw fill record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FillRecord {
    /// Pattern type name (`solid`, `gray125`, `none`, ...)
    pub pattern: Option<String>,
    /// Pattern foreground color
    pub fg: Option<ColorRef>,
    /// Pattern background color
    pub bg: Option<ColorRef>,
}

/// Raw border record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BorderRecord {
    pub left: Option<EdgeRecord>,
    pub right: Option<EdgeRecord>,
    pub top: Option<EdgeRecord>,
    pub bottom: Option<EdgeRecord>,
}

impl BorderRecord {
    /// Whether no edge carries a line style
    pub fn is_empty(&self) -> bool {
        [&self.left, &self.right, &self.top, &self.bottom]
            .iter()
            .all(|edge| edge.as_ref().map_or(true, |e| !e.has_style()))
    }
}

/// One edge of a border record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeRecord {
    /// Line style name (`thin`, `medium`, `dashed`, ...)
    pub style: Option<String>,
    pub color: Option<ColorRef>,
}

impl EdgeRecord {
    /// Create an edge with the given line style
    pub fn new<S: Into<String>>(style: S) -> Self {
        Self {
            style: Some(style.into()),
            color: None,
        }
    }

    /// Whether the edge carries a non-empty line style
    pub fn has_style(&self) -> bool {
        self.style.as_deref().map_or(false, |s| !s.is_empty())
    }
}

/// Raw alignment record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlignmentRecord {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

/// The workbook's style table
///
/// Cells refer to records by index. Index 0 is the default format; a table
/// read from a file always has it, a fresh table gets it on first push.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleTable {
    records: Vec<StyleRecord>,
}

impl StyleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record by index
    pub fn get(&self, id: u32) -> Option<&StyleRecord> {
        self.records.get(id as usize)
    }

    /// Append a record, returning its index
    pub fn push(&mut self, record: StyleRecord) -> u32 {
        if self.records.is_empty() && record != StyleRecord::default() {
            self.records.push(StyleRecord::default());
        }
        self.records.push(record);
        (self.records.len() - 1) as u32
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in index order
    pub fn iter(&self) -> impl Iterator<Item = &StyleRecord> {
        self.records.iter()
    }
}

impl FromIterator<StyleRecord> for StyleTable {
    fn from_iter<I: IntoIterator<Item = StyleRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
