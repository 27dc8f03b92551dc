//! Output file naming

use std::path::Path;

use chrono::NaiveDate;

use crate::config::DEFAULT_OUTPUT_SUFFIX;

/// Name for the edited copy of `original`: `<base>_edited_<YYYYMMDD>.xlsx`
pub fn output_file_name(original: &str, date: NaiveDate) -> String {
    output_file_name_with_suffix(original, DEFAULT_OUTPUT_SUFFIX, date)
}

/// Like [`output_file_name`] with a custom suffix
///
/// Directories and the original extension are dropped; the output is
/// always xlsx.
pub fn output_file_name_with_suffix(original: &str, suffix: &str, date: NaiveDate) -> String {
    let base = Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("workbook");
    format!("{}{}{}.xlsx", base, suffix, date.format("%Y%m%d"))
}
