//! Bounds-checked cursor over raw EDID bytes

use crate::{Error, Result};

/// A forward-only cursor over a byte slice.
///
/// Every read checks the remaining length first and fails with
/// [`Error::OutOfBounds`] instead of panicking. The cursor does not move on
/// a failed read.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn check(&self, len: usize) -> Result<()> {
        if self.remaining() < len {
            return Err(Error::OutOfBounds {
                offset: self.pos,
                len,
                size: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.check(1)?;
        Ok(self.data[self.pos])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.read_array::<2>()?;
        Ok(u16::from_le_bytes(b))
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        let b = self.read_array::<2>()?;
        Ok(u16::from_be_bytes(b))
    }

    /// Little-endian 24-bit integer, as used by DisplayID pixel clocks
    pub fn read_u24_le(&mut self) -> Result<u32> {
        let [a, b, c] = self.read_array::<3>()?;
        Ok(u32::from_le_bytes([a, b, c, 0]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.read_array::<4>()?;
        Ok(u32::from_le_bytes(b))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check(len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Split off the next `len` bytes as an independent reader
    pub fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>> {
        self.read_bytes(len).map(ByteReader::new)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Everything not yet consumed, without advancing
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_endianness() {
        let mut r = ByteReader::new(&[0x34, 0x12, 0x12, 0x34, 0x01, 0x02, 0x03]);
        assert_eq!(r.read_u16_le().unwrap(), 0x1234);
        assert_eq!(r.read_u16_be().unwrap(), 0x1234);
        assert_eq!(r.read_u24_le().unwrap(), 0x030201);
        assert!(r.is_empty());
    }

    #[test]
    fn test_out_of_bounds_does_not_advance() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        r.read_u8().unwrap();
        let err = r.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds { offset: 1, len: 4, size: 3 }
        ));
        assert!(err.is_block_local());
        assert_eq!(r.position(), 1);
        assert_eq!(r.read_array::<2>().unwrap(), [2, 3]);
    }

    #[test]
    fn test_sub_reader_is_bounded() {
        let mut r = ByteReader::new(&[0xAA, 0xBB, 0xCC, 0xDD]);
        let mut sub = r.sub_reader(2).unwrap();
        assert_eq!(sub.read_u8().unwrap(), 0xAA);
        assert_eq!(sub.rest(), &[0xBB]);
        assert!(sub.read_u16_le().is_err());
        assert_eq!(r.peek_u8().unwrap(), 0xCC);
    }
}
