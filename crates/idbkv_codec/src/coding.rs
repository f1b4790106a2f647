//! Primitive encoders shared by every key and value format.
//!
//! | primitive            | layout                                                  |
//! |----------------------|---------------------------------------------------------|
//! | byte / bool          | one byte, `0` or `1` for bools                          |
//! | fixed int            | minimal little-endian bytes, at least one               |
//! | varint               | 7 bits per byte, low group first, `0x80` = more follows |
//! | string               | UTF-16 big-endian code units                            |
//! | string with length   | varint code-unit count, then the string                 |
//! | double               | 8 bytes, native byte order                              |
//!
//! Fixed ints do not carry their own length; the surrounding format records
//! it (the key prefix header, or the length of a stored value).

use crate::error::{CodecError, CodecResult};
use crate::reader::KeyReader;
use std::cmp::Ordering;

/// Largest number of bytes a fixed int may use.
pub const MAX_FIXED_INT_BYTES: usize = 8;

fn check_non_negative(value: i64) -> CodecResult<u64> {
    u64::try_from(value).map_err(|_| CodecError::NegativeValue { value })
}

/// Encodes a bool as one byte.
#[must_use]
pub fn encode_bool(value: bool) -> Vec<u8> {
    vec![u8::from(value)]
}

/// Decodes a bool; any non-zero first byte is true.
///
/// # Errors
///
/// Returns `UnexpectedEof` for empty input.
pub fn decode_bool(bytes: &[u8]) -> CodecResult<bool> {
    bytes
        .first()
        .map(|byte| *byte != 0)
        .ok_or(CodecError::UnexpectedEof)
}

/// Number of bytes the fixed-int encoding of `value` uses.
#[must_use]
pub fn fixed_int_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// Appends the fixed-int encoding of `value`.
///
/// # Errors
///
/// Returns `NegativeValue` if `value < 0`.
pub fn put_int(buf: &mut Vec<u8>, value: i64) -> CodecResult<()> {
    let value = check_non_negative(value)?;
    let len = fixed_int_len(value);
    buf.extend_from_slice(&value.to_le_bytes()[..len]);
    Ok(())
}

/// Encodes `value` as a fixed int.
///
/// # Errors
///
/// Returns `NegativeValue` if `value < 0`.
pub fn encode_int(value: i64) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(MAX_FIXED_INT_BYTES);
    put_int(&mut buf, value)?;
    Ok(buf)
}

/// Decodes a fixed int spanning all of `bytes`.
///
/// # Errors
///
/// Returns `UnexpectedEof` for empty input and `IntegerOverflow` for more
/// than eight bytes or a value above `i64::MAX`.
pub fn decode_int(bytes: &[u8]) -> CodecResult<i64> {
    if bytes.is_empty() {
        return Err(CodecError::UnexpectedEof);
    }
    if bytes.len() > MAX_FIXED_INT_BYTES {
        return Err(CodecError::IntegerOverflow);
    }
    let mut raw = [0u8; MAX_FIXED_INT_BYTES];
    raw[..bytes.len()].copy_from_slice(bytes);
    i64::try_from(u64::from_le_bytes(raw)).map_err(|_| CodecError::IntegerOverflow)
}

pub(crate) fn put_var_u64(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Appends the varint encoding of `value`.
///
/// # Errors
///
/// Returns `NegativeValue` if `value < 0`.
pub fn put_var_int(buf: &mut Vec<u8>, value: i64) -> CodecResult<()> {
    put_var_u64(buf, check_non_negative(value)?);
    Ok(())
}

/// Encodes `value` as a varint.
///
/// # Errors
///
/// Returns `NegativeValue` if `value < 0`.
pub fn encode_var_int(value: i64) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(10);
    put_var_int(&mut buf, value)?;
    Ok(buf)
}

/// Decodes a leading varint, returning it with the number of bytes read.
///
/// # Errors
///
/// Returns `UnexpectedEof` if the input ends while a continuation bit is set.
pub fn decode_var_int(bytes: &[u8]) -> CodecResult<(i64, usize)> {
    let mut reader = KeyReader::new(bytes);
    let value = reader.read_var_int()?;
    Ok((value, reader.position()))
}

/// Appends the UTF-16BE code units of `value`.
pub fn put_string(buf: &mut Vec<u8>, value: &str) {
    for unit in value.encode_utf16() {
        buf.extend_from_slice(&unit.to_be_bytes());
    }
}

/// Encodes a string as UTF-16BE code units.
#[must_use]
pub fn encode_string(value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(value.len() * 2);
    put_string(&mut buf, value);
    buf
}

/// Decodes UTF-16BE code units spanning all of `bytes`.
///
/// # Errors
///
/// Returns `UnexpectedEof` for an odd length and `InvalidUtf16` for
/// unpaired surrogates.
pub fn decode_string(bytes: &[u8]) -> CodecResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::UnexpectedEof);
    }
    char::decode_utf16(utf16_units(bytes))
        .collect::<Result<String, _>>()
        .map_err(|_| CodecError::InvalidUtf16)
}

/// Appends a string prefixed by its varint code-unit count.
pub fn put_string_with_length(buf: &mut Vec<u8>, value: &str) {
    put_var_u64(buf, value.encode_utf16().count() as u64);
    put_string(buf, value);
}

/// Encodes a string prefixed by its varint code-unit count.
#[must_use]
pub fn encode_string_with_length(value: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(value.len() * 2 + 2);
    put_string_with_length(&mut buf, value);
    buf
}

/// Appends a double in native byte order.
pub fn put_double(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_ne_bytes());
}

/// Encodes a double in native byte order.
#[must_use]
pub fn encode_double(value: f64) -> Vec<u8> {
    value.to_ne_bytes().to_vec()
}

/// Iterates the big-endian code units of an even-length slice.
pub(crate) fn utf16_units(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
}

/// Compares two UTF-16BE strings by code point.
///
/// Surrogate pairs compare as the code point they encode, so strings order
/// the same way Rust `str`s do. Unpaired surrogates compare by their raw
/// code-unit value.
#[must_use]
pub fn compare_utf16(a: &[u8], b: &[u8]) -> Ordering {
    code_points(a).cmp(code_points(b))
}

fn code_points(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    char::decode_utf16(utf16_units(bytes)).map(|unit| match unit {
        Ok(ch) => u32::from(ch),
        Err(err) => u32::from(err.unpaired_surrogate()),
    })
}
