//! BIFF8 Unicode strings.
//!
//! A string is a character count, a flags byte, optional rich-text and
//! phonetic headers, the characters, then the rich-text runs and phonetic
//! block. Flag bit 0 selects UTF-16LE over compressed Latin-1 (one byte per
//! character). Bit 3 announces a 2-byte run count, bit 2 a 4-byte phonetic
//! block size.
//!
//! Inside the SST, character data may continue into the next CONTINUE
//! record, which then starts with a fresh flags byte that can switch the
//! encoding mid-string.

use super::parser::ByteReader;
use super::BiffRecord;
use crate::error::{XlsError, XlsResult};

const FLAG_WIDE: u8 = 0x01;
const FLAG_PHONETIC: u8 = 0x04;
const FLAG_RICH: u8 = 0x08;

/// Read a string with a 1-byte character count (sheet names, formula literals).
pub fn read_short_string(r: &mut ByteReader<'_>) -> XlsResult<String> {
    let count = r.u8()? as usize;
    let flags = r.u8()?;
    read_chars(r, count, flags & FLAG_WIDE != 0)
}

/// Read a string with a 2-byte character count (LABEL, FORMAT, STRING).
pub fn read_unicode_string(r: &mut ByteReader<'_>) -> XlsResult<String> {
    let count = r.u16()? as usize;
    let flags = r.u8()?;
    let runs = if flags & FLAG_RICH != 0 { r.u16()? as usize } else { 0 };
    let phonetic = if flags & FLAG_PHONETIC != 0 { r.u32()? as usize } else { 0 };

    let text = read_chars(r, count, flags & FLAG_WIDE != 0)?;
    r.skip(runs * 4)?;
    r.skip(phonetic)?;
    Ok(text)
}

fn read_chars(r: &mut ByteReader<'_>, count: usize, wide: bool) -> XlsResult<String> {
    if wide {
        let raw = r.bytes(count * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16: {e}")))
    } else {
        Ok(r.bytes(count)?.iter().map(|&b| b as char).collect())
    }
}

fn read_sst_entry(r: &mut ByteReader<'_>, continues: &[usize]) -> XlsResult<String> {
    let count = r.u16()? as usize;
    let flags = r.u8()?;
    let runs = if flags & FLAG_RICH != 0 { r.u16()? as usize } else { 0 };
    let phonetic = if flags & FLAG_PHONETIC != 0 { r.u32()? as usize } else { 0 };

    let mut wide = flags & FLAG_WIDE != 0;
    let mut units: Vec<u16> = Vec::with_capacity(count);
    while units.len() < count {
        if continues.binary_search(&r.position()).is_ok() {
            wide = r.u8()? & FLAG_WIDE != 0;
        }
        let unit = if wide { r.u16()? } else { u16::from(r.u8()?) };
        units.push(unit);
    }

    r.skip(runs * 4)?;
    r.skip(phonetic)?;
    String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16: {e}")))
}

/// Decode the shared string table.
///
/// The body opens with the total reference count and the unique count,
/// followed by the unique strings. A damaged or truncated table keeps the
/// strings decoded before the damage.
pub fn parse_sst(record: &BiffRecord) -> XlsResult<Vec<String>> {
    let mut r = record.reader();
    let _total = r.u32()?;
    let unique = r.u32()? as usize;

    let mut strings = Vec::with_capacity(unique.min(record.data.len()));
    for i in 0..unique {
        match read_sst_entry(&mut r, &record.continues) {
            Ok(s) => strings.push(s),
            Err(e) => {
                log::warn!("shared string table truncated at entry {i}/{unique}: {e}");
                break;
            }
        }
    }

    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::records;

    fn sst(data: Vec<u8>, continues: Vec<usize>) -> BiffRecord {
        BiffRecord {
            record_type: records::SST,
            data,
            continues,
            stream_offset: 0,
        }
    }

    #[test]
    fn test_compressed_and_wide() {
        let data = [0x03, 0x00, 0x00, b'A', b'B', b'C'];
        let mut r = ByteReader::new(&data);
        assert_eq!(read_unicode_string(&mut r).unwrap(), "ABC");
        assert!(r.is_empty());

        let data = [0x02, 0x00, 0x01, b'H', 0x00, b'i', 0x00];
        let mut r = ByteReader::new(&data);
        assert_eq!(read_unicode_string(&mut r).unwrap(), "Hi");
    }

    #[test]
    fn test_rich_runs_are_skipped() {
        let mut data = vec![0x02, 0x00, FLAG_RICH, 0x01, 0x00, b'O', b'K'];
        data.extend_from_slice(&[0, 0, 1, 0]);
        data.push(0xAA);
        let mut r = ByteReader::new(&data);
        assert_eq!(read_unicode_string(&mut r).unwrap(), "OK");
        assert_eq!(r.u8().unwrap(), 0xAA);
    }

    #[test]
    fn test_short_string() {
        let data = [0x02, 0x00, b'O', b'K'];
        let mut r = ByteReader::new(&data);
        assert_eq!(read_short_string(&mut r).unwrap(), "OK");
    }

    #[test]
    fn test_parse_sst() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&[0x01, 0x00, 0x00, b'A']);
        buf.extend_from_slice(&[0x02, 0x00, 0x00, b'B', b'C']);

        assert_eq!(parse_sst(&sst(buf, vec![])).unwrap(), vec!["A", "BC"]);
    }

    #[test]
    fn test_sst_string_split_across_continue() {
        // "Hé!" starts compressed, continues as UTF-16 after the boundary
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&[0x03, 0x00, 0x00, b'H']);
        let boundary = buf.len();
        buf.push(FLAG_WIDE);
        buf.extend_from_slice(&[0xE9, 0x00, b'!', 0x00]);

        assert_eq!(
            parse_sst(&sst(buf, vec![boundary])).unwrap(),
            vec!["H\u{e9}!"]
        );
    }

    #[test]
    fn test_truncated_sst_keeps_prefix() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&[0x01, 0x00, 0x00, b'A']);
        buf.extend_from_slice(&[0x05, 0x00, 0x00, b'B']);

        assert_eq!(parse_sst(&sst(buf, vec![])).unwrap(), vec!["A"]);
    }
}
