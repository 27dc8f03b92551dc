//! Little-endian cursor over a record body.

use crate::error::{XlsError, XlsResult};

/// Forward-only reader over a BIFF record body.
///
/// Every read is bounds-checked; running off the end is a
/// [`XlsError::Parse`] naming the offset.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the body
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `n` bytes
    pub fn bytes(&mut self, n: usize) -> XlsResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                XlsError::Parse(format!(
                    "unexpected end of data at offset {}, need {} bytes",
                    self.pos, n
                ))
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> XlsResult<()> {
        self.bytes(n).map(|_| ())
    }

    pub fn u8(&mut self) -> XlsResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> XlsResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> XlsResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn f64(&mut self) -> XlsResult<f64> {
        let b = self.bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_le_bytes(raw))
    }

    /// Read and decode a 4-byte RK number
    pub fn rk(&mut self) -> XlsResult<f64> {
        self.u32().map(decode_rk)
    }
}

/// Decode an RK-encoded number.
///
/// Bit 0 divides the result by 100. Bit 1 selects a signed 30-bit integer
/// in bits 2..31; otherwise bits 2..31 are the high 30 bits of an IEEE 754
/// double whose low 34 bits are zero.
pub fn decode_rk(rk: u32) -> f64 {
    let value = if rk & 0x02 != 0 {
        ((rk as i32) >> 2) as f64
    } else {
        f64::from_bits(((rk & 0xFFFF_FFFC) as u64) << 32)
    };

    if rk & 0x01 != 0 {
        value / 100.0
    } else {
        value
    }
}
