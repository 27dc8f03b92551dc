//! The persisted entry for a single cell

use super::value::{CellKind, CellValue};

/// A cell as it exists in the persisted workbook structure
///
/// Besides the value this keeps everything needed to write the cell back
/// without disturbing its formatting: the style index into the workbook's
/// [`StyleTable`](crate::StyleTable) and the cached number format / display
/// text. Formulas are stored without the leading `=`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredCell {
    /// Recorded type, if any
    pub kind: Option<CellKind>,
    /// Value (for formula cells, the last computed result)
    pub value: CellValue,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    /// Cached display text
    pub display: Option<String>,
    /// Cached number format code
    pub number_format: Option<String>,
    /// Index into the workbook style table
    pub style_id: Option<u32>,
}

impl StoredCell {
    /// A stored cell holding `value`, with its kind inferred from the value
    pub fn with_value(value: CellValue) -> Self {
        Self {
            kind: value.inferred_kind(),
            value,
            ..Self::default()
        }
    }

    /// A value-less placeholder that only carries a style
    pub fn stub(style_id: Option<u32>) -> Self {
        Self {
            kind: Some(CellKind::Stub),
            style_id,
            ..Self::default()
        }
    }

    /// Builder-style setter for the style index
    pub fn styled(mut self, style_id: u32) -> Self {
        self.style_id = Some(style_id);
        self
    }

    /// Builder-style setter for the formula
    pub fn with_formula<S: Into<String>>(mut self, formula: S) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Whether the cell has a formula
    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }
}
