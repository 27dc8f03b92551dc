//! Workbook type

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::named_range::{NameScope, NamedRange};
use crate::sheet::Sheet;
use crate::style::StyleTable;
use crate::MAX_SHEET_NAME_LEN;

/// The persisted workbook structure
///
/// Holds everything needed to re-serialize the workbook: the ordered sheets,
/// the raw style table referenced by each cell's style index, and any
/// package parts carried over verbatim from the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    styles: StyleTable,
    settings: WorkbookSettings,
    names: Vec<NamedRange>,
    retained_parts: BTreeMap<String, Vec<u8>>,
    dropped_parts: Vec<String>,
}

impl Workbook {
    /// Create an empty workbook (no sheets)
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Check if the workbook has no sheets
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    /// Get a sheet by index
    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    /// Get a sheet by name
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    /// Get a mutable sheet by name
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    /// Iterate over sheets in order
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Append a sheet, returning its index
    pub fn push_sheet(&mut self, sheet: Sheet) -> Result<usize> {
        self.validate_sheet_name(sheet.name())?;
        let index = self.sheets.len();
        self.sheets.push(sheet);
        Ok(index)
    }

    /// The raw style table
    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Mutable access to the raw style table
    pub fn styles_mut(&mut self) -> &mut StyleTable {
        &mut self.styles
    }

    /// Workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    /// Defined names in source order
    pub fn named_ranges(&self) -> &[NamedRange] {
        &self.names
    }

    /// Look up a defined name, case-insensitively, within a scope
    pub fn named_range(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        self.names.iter().find(|n| n.matches(name, scope))
    }

    /// Add a defined name, replacing one with the same name and scope
    pub fn define_name(&mut self, named: NamedRange) -> Result<()> {
        if named.name.is_empty() {
            return Err(Error::Other("Defined name cannot be empty".into()));
        }
        if let Some(index) = named.local_sheet() {
            if index >= self.sheets.len() {
                return Err(Error::SheetNotFound(format!("index {}", index)));
            }
        }
        match self
            .names
            .iter_mut()
            .find(|n| n.matches(&named.name, named.scope))
        {
            Some(existing) => *existing = named,
            None => self.names.push(named),
        }
        Ok(())
    }

    /// A package part retained verbatim from the source file
    pub fn retained_part(&self, path: &str) -> Option<&[u8]> {
        self.retained_parts.get(path).map(Vec::as_slice)
    }

    /// Retain a package part to be written back verbatim
    pub fn retain_part<S: Into<String>>(&mut self, path: S, bytes: Vec<u8>) {
        self.retained_parts.insert(path.into(), bytes);
    }

    /// Iterate over retained parts whose path starts with `prefix`
    pub fn retained_parts_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a [u8])> + 'a {
        self.retained_parts
            .range(prefix.to_string()..)
            .take_while(move |(path, _)| path.starts_with(prefix))
            .map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
    }

    /// Source parts that were not understood and will not be written back
    pub fn dropped_parts(&self) -> &[String] {
        &self.dropped_parts
    }

    /// Record a source part that will not be written back
    pub fn note_dropped_part<S: Into<String>>(&mut self, path: S) {
        self.dropped_parts.push(path.into());
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        let name_lower = name.to_lowercase();
        if self
            .sheets
            .iter()
            .any(|s| s.name().to_lowercase() == name_lower)
        {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

/// Workbook-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookSettings {
    /// Date system: false = 1900 (Windows), true = 1904 (Mac)
    pub date_1904: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_lookup() {
        let mut wb = Workbook::new();
        assert!(wb.is_empty());

        assert_eq!(wb.push_sheet(Sheet::new("Data")).unwrap(), 0);
        assert_eq!(wb.push_sheet(Sheet::new("Summary")).unwrap(), 1);

        assert_eq!(wb.sheet_names(), vec!["Data", "Summary"]);
        assert!(wb.sheet("Summary").is_some());
        assert!(wb.sheet("Missing").is_none());
        assert_eq!(wb.sheet_at(1).unwrap().name(), "Summary");
    }

    #[test]
    fn test_duplicate_name() {
        let mut wb = Workbook::new();
        wb.push_sheet(Sheet::new("Sheet1")).unwrap();

        assert!(matches!(
            wb.push_sheet(Sheet::new("SHEET1")),
            Err(Error::DuplicateSheetName(_))
        ));
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut wb = Workbook::new();

        assert!(wb.push_sheet(Sheet::new("")).is_err());
        assert!(wb.push_sheet(Sheet::new("Sheet/1")).is_err());
        assert!(wb.push_sheet(Sheet::new("Sheet[1]")).is_err());
        assert!(wb
            .push_sheet(Sheet::new("A".repeat(MAX_SHEET_NAME_LEN + 1)))
            .is_err());
    }

    #[test]
    fn test_define_name() {
        let mut wb = Workbook::new();
        wb.push_sheet(Sheet::new("Prices")).unwrap();

        wb.define_name(NamedRange::new("Rate", "Prices!$B$2")).unwrap();
        wb.define_name(NamedRange::new("Rate", "Prices!$B$2").local_to(0))
            .unwrap();
        wb.define_name(NamedRange::new("RATE", "Prices!$C$2")).unwrap();
        assert_eq!(wb.named_ranges().len(), 2);
        assert_eq!(
            wb.named_range("rate", NameScope::Workbook).unwrap().refers_to,
            "Prices!$C$2"
        );

        assert!(matches!(
            wb.define_name(NamedRange::new("Tax", "1").local_to(3)),
            Err(Error::SheetNotFound(_))
        ));
        assert!(wb.define_name(NamedRange::new("", "1")).is_err());
    }

    #[test]
    fn test_retained_parts() {
        let mut wb = Workbook::new();
        wb.retain_part("xl/styles.xml", b"<styleSheet/>".to_vec());

        assert_eq!(wb.retained_part("xl/styles.xml"), Some(&b"<styleSheet/>"[..]));
        assert_eq!(wb.retained_part("xl/theme/theme1.xml"), None);

        wb.retain_part("xl/theme/theme1.xml", b"<theme/>".to_vec());
        wb.retain_part("xl/worksheets/sheet1.xml", Vec::new());
        let themes: Vec<&str> = wb
            .retained_parts_with_prefix("xl/theme/")
            .map(|(path, _)| path)
            .collect();
        assert_eq!(themes, vec!["xl/theme/theme1.xml"]);
    }
}
