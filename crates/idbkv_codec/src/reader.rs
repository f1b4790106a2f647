//! Cursor over encoded bytes.

use crate::coding::{decode_string, MAX_FIXED_INT_BYTES};
use crate::error::{CodecError, CodecResult};

/// A forward-only reader over an encoded key or value.
///
/// Every `read_*` method either consumes exactly one field and returns it,
/// or fails with the reader left at an unspecified position.
#[derive(Debug, Clone)]
pub struct KeyReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> KeyReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns true if every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the unconsumed bytes.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next byte without consuming it.
    #[must_use]
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Slice of the input between `start` and the current position.
    pub(crate) fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }

    /// Reads one byte.
    #[inline]
    pub fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = self.peek_byte().ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads `len` raw bytes.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof)?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Reads a varint.
    ///
    /// Fails with `UnexpectedEof` when the input ends while a continuation
    /// bit is set, and with `IntegerOverflow` past 63 bits.
    pub fn read_var_int(&mut self) -> CodecResult<i64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift > 56 {
                return Err(CodecError::IntegerOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        i64::try_from(value).map_err(|_| CodecError::IntegerOverflow)
    }

    /// Reads a little-endian fixed int of exactly `len` bytes.
    pub fn read_fixed_int(&mut self, len: usize) -> CodecResult<i64> {
        if len == 0 || len > MAX_FIXED_INT_BYTES {
            return Err(CodecError::IntegerOverflow);
        }
        let bytes = self.read_bytes(len)?;
        let mut raw = [0u8; MAX_FIXED_INT_BYTES];
        raw[..len].copy_from_slice(bytes);
        i64::try_from(u64::from_le_bytes(raw)).map_err(|_| CodecError::IntegerOverflow)
    }

    /// Reads the raw UTF-16BE bytes of a length-prefixed string.
    pub fn read_utf16_with_length(&mut self) -> CodecResult<&'a [u8]> {
        let units = self.read_var_int()?;
        let len = usize::try_from(units)
            .ok()
            .and_then(|units| units.checked_mul(2))
            .ok_or(CodecError::IntegerOverflow)?;
        self.read_bytes(len)
    }

    /// Reads a length-prefixed string.
    pub fn read_string_with_length(&mut self) -> CodecResult<String> {
        decode_string(self.read_utf16_with_length()?)
    }

    /// Reads a native-endian double.
    pub fn read_double(&mut self) -> CodecResult<f64> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_ne_bytes(raw))
    }
}
