//! Workbook file format detection and reading

use std::path::Path;

use sheetwright_core::Workbook;
use sheetwright_xls::XlsReader;
use sheetwright_xlsx::XlsxReader;

use crate::error::{Error, Result};

/// A supported input format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Office Open XML (`.xlsx`, `.xlsm`)
    Xlsx,
    /// Legacy BIFF8 (`.xls`)
    Xls,
}

impl FileFormat {
    /// Detect the format from a file extension (case-insensitive, no dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            _ => None,
        }
    }

    /// Detect the format from a file name or path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect the format from a file name, failing with
    /// [`Error::UnsupportedFormat`]
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_path(path)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))
    }

    /// Parse workbook bytes in this format
    pub fn read(self, bytes: &[u8]) -> Result<Workbook> {
        let workbook = match self {
            FileFormat::Xlsx => XlsxReader::read_bytes(bytes)?,
            FileFormat::Xls => XlsReader::read_bytes(bytes)?,
        };
        Ok(workbook)
    }
}
