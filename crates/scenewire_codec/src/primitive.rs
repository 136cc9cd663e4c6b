//! # Primitive Codec
//!
//! Little-endian scalars, verbatim `Pod` Fixed parts and null-padded short
//! strings.
//!
//! ## Design
//!
//! - [`WireWriter`] appends to a growable buffer that is reused across messages
//! - [`WireReader`] borrows the input and only moves a cursor forward
//! - Fixed parts are `Pod` structs; their memory layout IS the wire layout
//! - No padding is ever inserted between fields

use bytemuck::{bytes_of, Pod};

use crate::error::{CodecError, CodecResult};

/// A Fixed part: a tightly packed, trivially copyable wire structure.
///
/// Implementors must be `#[repr(C)]` with no implicit padding (the `Pod`
/// derive enforces this), so the struct bytes are exactly the wire bytes.
pub trait Fixed: Pod {
    /// Encoded size in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();

    /// Checks field-level constraints after a verbatim copy.
    ///
    /// The default accepts everything. Structures holding short strings or
    /// closed enumerations override this.
    fn validate(&self) -> CodecResult<()> {
        Ok(())
    }
}

/// Message writer - appends wire bytes to an internal buffer.
///
/// Reuse one writer across messages with [`WireWriter::reset`] to avoid
/// reallocating.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with preallocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Clears the buffer, keeping its allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u64 in little-endian format.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i64 in little-endian format.
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f32 in little-endian format.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a f64 in little-endian format.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes with no length prefix.
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.buffer.extend_from_slice(bytes_of(value));
    }

    /// Writes a Fixed part.
    #[inline]
    pub fn write_fixed<T: Fixed>(&mut self, value: &T) {
        self.write_pod(value);
    }

    /// Writes a null-padded short string of capacity `N`.
    ///
    /// # Errors
    ///
    /// Returns `ShortStringTooLong` if `value` needs more than `N` bytes.
    pub fn write_short_string<const N: usize>(&mut self, value: &str) -> CodecResult<()> {
        let field = short_string::encode::<N>(value)?;
        self.write_raw(&field);
        Ok(())
    }

    /// Overwrites a previously written u32 at `offset`.
    ///
    /// Used to backpatch a `message_size` once the Dyn block is written.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the written length. Callers only pass
    /// offsets they obtained from this writer.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Message reader - walks a borrowed buffer front to back.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader positioned at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Returns the cursor position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns true if every byte has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Checks that `needed` more bytes are available.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` otherwise.
    #[inline]
    pub const fn ensure(&self, needed: usize) -> CodecResult<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(CodecError::TruncatedInput { needed, remaining });
        }
        Ok(())
    }

    /// Takes the next `len` bytes as a borrowed slice.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than `len` bytes remain.
    #[inline]
    pub fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.ensure(len)?;
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Reads a fixed-size byte array.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than `N` bytes remain.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_slice(N)?);
        Ok(out)
    }

    /// Advances the cursor by `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than `len` bytes remain.
    #[inline]
    pub fn skip(&mut self, len: usize) -> CodecResult<()> {
        self.read_slice(len).map(|_| ())
    }

    /// Splits off a reader over the next `len` bytes and advances past them.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than `len` bytes remain.
    pub fn sub_reader(&mut self, len: usize) -> CodecResult<WireReader<'a>> {
        Ok(WireReader::new(self.read_slice(len)?))
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` at end of input.
    #[inline]
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a u16 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than 2 bytes remain.
    #[inline]
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a u64 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than 8 bytes remain.
    #[inline]
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads an i64 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than 8 bytes remain.
    #[inline]
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Reads a f32 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than 4 bytes remain.
    #[inline]
    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads a f64 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if fewer than 8 bytes remain.
    #[inline]
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.read_u64().map(f64::from_bits)
    }

    /// Reads a Pod type directly.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if the buffer is shorter than `T`.
    #[inline]
    pub fn read_pod<T: Pod>(&mut self) -> CodecResult<T> {
        let slice = self.read_slice(std::mem::size_of::<T>())?;
        // Length already matches, so the only failure mode is unreachable.
        bytemuck::try_pod_read_unaligned(slice).map_err(|_| CodecError::TruncatedInput {
            needed: std::mem::size_of::<T>(),
            remaining: slice.len(),
        })
    }

    /// Reads and validates a Fixed part.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput`, or whatever [`Fixed::validate`] reports.
    #[inline]
    pub fn read_fixed<T: Fixed>(&mut self) -> CodecResult<T> {
        let value: T = self.read_pod()?;
        value.validate()?;
        Ok(value)
    }

    /// Reads a null-padded short string of capacity `N`.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput`, `InvalidShortString` or `InvalidUtf8`.
    pub fn read_short_string<const N: usize>(&mut self) -> CodecResult<String> {
        let field = self.read_array::<N>()?;
        short_string::decode(&field).map(str::to_owned)
    }
}

/// Fixed-capacity, null-padded string fields.
///
/// A string shorter than the field is followed by a NUL and zero padding.
/// A string that fills the field exactly carries no NUL.
pub mod short_string {
    use crate::error::{CodecError, CodecResult};

    /// Packs `value` into an `N`-byte field.
    ///
    /// # Errors
    ///
    /// Returns `ShortStringTooLong` if `value` is longer than `N` bytes, and
    /// `InvalidShortString` if it contains a NUL (which would truncate it).
    pub fn encode<const N: usize>(value: &str) -> CodecResult<[u8; N]> {
        let bytes = value.as_bytes();
        if bytes.len() > N {
            return Err(CodecError::ShortStringTooLong {
                len: bytes.len(),
                capacity: N,
            });
        }
        if let Some(offset) = bytes.iter().position(|&b| b == 0) {
            return Err(CodecError::InvalidShortString { offset });
        }
        let mut field = [0u8; N];
        field[..bytes.len()].copy_from_slice(bytes);
        Ok(field)
    }

    /// Unpacks a field, validating the zero padding after the terminator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShortString` if a non-zero byte follows the first NUL,
    /// and `InvalidUtf8` if the content is not UTF-8.
    pub fn decode(field: &[u8]) -> CodecResult<&str> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if let Some(stray) = field[end..].iter().position(|&b| b != 0) {
            return Err(CodecError::InvalidShortString { offset: end + stray });
        }
        std::str::from_utf8(&field[..end]).map_err(|_| CodecError::InvalidUtf8 {
            context: "short string",
        })
    }

    /// Checks a field without copying it out.
    ///
    /// # Errors
    ///
    /// Same as [`decode`].
    pub fn validate(field: &[u8]) -> CodecResult<()> {
        decode(field).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    struct Header {
        kind: u32,
        size: u32,
    }

    impl Fixed for Header {}

    #[test]
    fn test_scalars_are_little_endian() {
        let mut w = WireWriter::new();
        w.write_u16(0x0102);
        w.write_u32(0x0304_0506);
        w.write_f32(1.0);
        assert_eq!(
            w.as_slice(),
            &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0x00, 0x00, 0x80, 0x3f]
        );

        let mut r = WireReader::new(w.as_slice());
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_u32().unwrap(), 0x0304_0506);
        assert_eq!(r.read_f32().unwrap(), 1.0);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_truncated_input() {
        let mut r = WireReader::new(&[1, 2, 3]);
        assert_eq!(
            r.read_u32(),
            Err(CodecError::TruncatedInput {
                needed: 4,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_fixed_is_verbatim() {
        let header = Header { kind: 7, size: 9 };
        let mut w = WireWriter::new();
        w.write_fixed(&header);
        assert_eq!(w.len(), Header::SIZE);
        assert_eq!(w.as_slice(), &[7, 0, 0, 0, 9, 0, 0, 0]);

        let mut r = WireReader::new(w.as_slice());
        assert_eq!(r.read_fixed::<Header>().unwrap(), header);
    }

    #[test]
    fn test_patch_u32() {
        let mut w = WireWriter::new();
        w.write_u8(1);
        w.write_u32(0);
        w.write_u8(2);
        w.patch_u32(1, 0xAABB_CCDD);
        assert_eq!(w.as_slice(), &[1, 0xDD, 0xCC, 0xBB, 0xAA, 2]);
    }

    #[test]
    fn test_short_string_padding() {
        let field = short_string::encode::<8>("Cube").unwrap();
        assert_eq!(field, *b"Cube\0\0\0\0");
        assert_eq!(short_string::decode(&field).unwrap(), "Cube");

        let full = short_string::encode::<4>("abcd").unwrap();
        assert_eq!(short_string::decode(&full).unwrap(), "abcd");
    }

    #[test]
    fn test_short_string_rejects_garbage_after_nul() {
        let field = *b"ab\0x\0\0\0\0";
        assert_eq!(
            short_string::decode(&field),
            Err(CodecError::InvalidShortString { offset: 3 })
        );
    }

    #[test]
    fn test_short_string_too_long() {
        assert_eq!(
            short_string::encode::<3>("abcd"),
            Err(CodecError::ShortStringTooLong {
                len: 4,
                capacity: 3
            })
        );
    }

    #[test]
    fn test_sub_reader_advances_parent() {
        let data = [1, 2, 3, 4, 5];
        let mut r = WireReader::new(&data);
        let mut sub = r.sub_reader(3).unwrap();
        assert_eq!(r.position(), 3);
        assert_eq!(sub.read_u8().unwrap(), 1);
        assert_eq!(sub.remaining(), 2);
        assert!(r.sub_reader(3).is_err());
    }
}
