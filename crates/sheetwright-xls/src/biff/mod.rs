//! BIFF8 record stream handling.
//!
//! A BIFF8 stream is a flat sequence of records, each a 4-byte header
//! (record type, body length) followed by the body. Bodies longer than
//! 8224 bytes spill into CONTINUE records, which are folded back into the
//! record they extend.

pub mod parser;
pub mod records;
pub mod strings;

use crate::error::{XlsError, XlsResult};
use parser::ByteReader;

/// A single BIFF8 record with any CONTINUE bodies appended.
#[derive(Debug, Clone)]
pub struct BiffRecord {
    /// Record type id (see [`records`])
    pub record_type: u16,
    /// Body bytes, CONTINUE bodies concatenated
    pub data: Vec<u8>,
    /// Offsets into `data` at which each CONTINUE body starts
    pub continues: Vec<usize>,
    /// Byte offset of the record header in the workbook stream
    pub stream_offset: usize,
}

impl BiffRecord {
    /// A reader positioned at the start of the body
    pub fn reader(&self) -> ByteReader<'_> {
        ByteReader::new(&self.data)
    }
}

/// Split a workbook stream into records.
///
/// A record whose declared body runs past the end of the stream ends the
/// scan; everything read before it is returned.
pub fn split_records(stream: &[u8]) -> Vec<BiffRecord> {
    let mut records: Vec<BiffRecord> = Vec::new();
    let mut pos = 0usize;

    while pos + 4 <= stream.len() {
        let record_type = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        let len = u16::from_le_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        let body_start = pos + 4;
        let Some(body) = stream.get(body_start..body_start + len) else {
            log::warn!(
                "BIFF record 0x{:04X} at offset {} is truncated; stopping",
                record_type,
                pos
            );
            break;
        };

        if record_type == records::CONTINUE {
            match records.last_mut() {
                Some(prev) => {
                    prev.continues.push(prev.data.len());
                    prev.data.extend_from_slice(body);
                }
                None => log::debug!("orphan CONTINUE record at offset {}", pos),
            }
        } else {
            records.push(BiffRecord {
                record_type,
                data: body.to_vec(),
                continues: Vec::new(),
                stream_offset: pos,
            });
        }

        pos = body_start + len;
    }

    records
}

/// Extract `(version, substream_type)` from a BOF record body.
pub fn parse_bof(data: &[u8]) -> XlsResult<(u16, u16)> {
    if data.len() < 4 {
        return Err(XlsError::InvalidFormat("BOF record too short".into()));
    }
    let mut r = ByteReader::new(data);
    Ok((r.u16()?, r.u16()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: u16, body: &[u8]) -> Vec<u8> {
        let mut out = kind.to_le_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_continue_is_folded_into_previous() {
        let mut stream = record(records::SST, &[1, 2, 3]);
        stream.extend(record(records::CONTINUE, &[4, 5]));
        stream.extend(record(records::EOF, &[]));

        let recs = split_records(&stream);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].data, vec![1, 2, 3, 4, 5]);
        assert_eq!(recs[0].continues, vec![3]);
        assert_eq!(recs[1].record_type, records::EOF);
        assert_eq!(recs[1].stream_offset, 13);
    }

    #[test]
    fn test_truncated_record_stops_scan() {
        let mut stream = record(records::DATEMODE, &[0, 0]);
        stream.extend_from_slice(&records::NUMBER.to_le_bytes());
        stream.extend_from_slice(&14u16.to_le_bytes());
        stream.extend_from_slice(&[0, 0]);

        let recs = split_records(&stream);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].record_type, records::DATEMODE);
    }

    #[test]
    fn test_parse_bof() {
        let (version, kind) = parse_bof(&[0x00, 0x06, 0x10, 0x00]).unwrap();
        assert_eq!(version, records::BIFF8_VERSION);
        assert_eq!(kind, records::BOF_WORKSHEET);
        assert!(parse_bof(&[0x00]).is_err());
    }
}
