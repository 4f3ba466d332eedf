/*!
Big-endian primitive access to byte buffers.

[`Reader`] is a positional cursor over a borrowed buffer, [`Writer`] an
append-only growable buffer. Neither knows anything about CBOR framing; the
decoder and encoder layer the grammar on top.
*/

use super::decode::Error;
use alloc::vec::Vec;

/// A read cursor over a borrowed byte buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let bytes = self.read_slice(N)?;
        bytes.try_into().map_err(|_| Error::UnexpectedEndOfInput)
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(Error::UnexpectedEndOfInput);
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.data[start..self.offset])
    }

    /// The next byte, without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let b = *self
            .data
            .get(self.offset)
            .ok_or(Error::UnexpectedEndOfInput)?;
        self.offset += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        self.read_array().map(u64::from_be_bytes)
    }

    /// IEEE-754 binary16, including subnormals, infinities and NaN.
    pub fn read_f16(&mut self) -> Result<half::f16, Error> {
        self.read_array().map(half::f16::from_be_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        self.read_array().map(f32::from_be_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        self.read_array().map(f64::from_be_bytes)
    }
}

/// An append-only output buffer.
///
/// Backed by a `Vec`, so appends are amortized O(1).
#[derive(Debug, Default, Clone)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v)
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes())
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes())
    }

    pub fn write_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_be_bytes())
    }

    pub fn write_f16(&mut self, v: half::f16) {
        self.data.extend_from_slice(&v.to_be_bytes())
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_be_bytes())
    }

    pub fn write_f64(&mut self, v: f64) {
        self.data.extend_from_slice(&v.to_be_bytes())
    }

    pub fn write_slice(&mut self, v: &[u8]) {
        self.data.extend_from_slice(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn reader_big_endian() {
        let data = hex!("01 0203 04050607 08090a0b0c0d0e0f");
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.read_u32().unwrap(), 0x04050607);
        assert_eq!(r.read_u64().unwrap(), 0x08090a0b0c0d0e0f);
        assert!(r.is_empty());
        assert_eq!(r.read_u8(), Err(Error::UnexpectedEndOfInput));
    }

    #[test]
    fn reader_short_read_does_not_advance() {
        let data = hex!("0102 03");
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u32(), Err(Error::UnexpectedEndOfInput));
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.remaining(), 1);
        assert_eq!(r.read_slice(2), Err(Error::UnexpectedEndOfInput));
        assert_eq!(r.read_slice(1).unwrap(), &[3]);
    }

    #[test]
    fn reader_half_precision() {
        let data = hex!("3c00 0001 7c00 fc00 7e00 8000");
        let mut r = Reader::new(&data);
        assert_eq!(r.read_f16().unwrap().to_f64(), 1.0);
        assert_eq!(r.read_f16().unwrap().to_f64(), 5.960464477539063e-8);
        assert_eq!(r.read_f16().unwrap().to_f64(), f64::INFINITY);
        assert_eq!(r.read_f16().unwrap().to_f64(), f64::NEG_INFINITY);
        assert!(r.read_f16().unwrap().is_nan());
        let neg_zero = r.read_f16().unwrap().to_f64();
        assert_eq!(neg_zero, 0.0);
        assert!(neg_zero.is_sign_negative());
    }

    #[test]
    fn writer_round_trip() {
        let mut w = Writer::with_capacity(4);
        w.write_u8(0xfa);
        w.write_f32(100000.0);
        w.write_u16(0x0102);
        w.write_u64(1);
        w.write_slice(&[0xff]);
        assert_eq!(w.len(), 16);
        assert_eq!(
            w.into_inner(),
            hex!("fa 47c35000 0102 0000000000000001 ff")
        );
    }
}
