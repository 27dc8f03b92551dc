//! Cell value types

use chrono::NaiveDateTime;
use std::fmt;

/// The value held by a cell
///
/// This is a closed set: every value read from a workbook or produced by an
/// edit is one of these variants. Error literals (`#DIV/0!`) travel as
/// [`CellValue::Text`] with [`CellKind::Error`] on the owning cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value
    #[default]
    Empty,

    /// Numeric value
    Number(f64),

    /// Text value
    Text(String),

    /// Boolean value (TRUE/FALSE)
    Bool(bool),

    /// Date/time value (stored as a serial number in the file)
    Date(NaiveDateTime),
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Check if the value is empty
    ///
    /// An empty string counts as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The kind this value would be stored as when no kind is recorded
    pub fn inferred_kind(&self) -> Option<CellKind> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(_) => Some(CellKind::Number),
            CellValue::Text(_) => Some(CellKind::Text),
            CellValue::Bool(_) => Some(CellKind::Bool),
            CellValue::Date(_) => Some(CellKind::Date),
        }
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(true) => write!(f, "TRUE"),
            CellValue::Bool(false) => write!(f, "FALSE"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(d: NaiveDateTime) -> Self {
        CellValue::Date(d)
    }
}

/// The recorded type of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Numeric
    Number,
    /// Text (shared or inline string)
    Text,
    /// Boolean
    Bool,
    /// Date/time
    Date,
    /// Error literal such as `#N/A`
    Error,
    /// Placeholder for a cell that exists in the file but has no value
    Stub,
}

impl CellKind {
    /// Lowercase name used in snapshots and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Number => "number",
            CellKind::Text => "string",
            CellKind::Bool => "boolean",
            CellKind::Date => "date",
            CellKind::Error => "error",
            CellKind::Stub => "stub",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
