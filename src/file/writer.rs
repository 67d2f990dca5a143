//! Cursor-based byte writer, the encoding counterpart of [`crate::file::parser::Parser`].
//!
//! [`crate::file::writer::Writer`] borrows a pre-sized, zero-initialised buffer and encodes
//! values at an explicit position. The header serializer computes an offset table first and
//! then seeks the writer to each planned position, so every address it emits corresponds to a
//! position that was actually written.

use widestring::U16String;

use crate::{
    file::io::{write_le_at, ByteIO},
    Error::OutOfBounds,
    Result,
};

/// A bounds-checked cursor over a mutable byte slice.
///
/// Writes never grow the buffer; running past its end yields [`crate::Error::OutOfBounds`]
/// and leaves the position unchanged.
pub struct Writer<'a> {
    /// The buffer being written
    data: &'a mut [u8],
    /// Current position within the buffer
    position: usize,
}

impl<'a> Writer<'a> {
    /// Create a new writer at position 0.
    #[must_use]
    pub fn new(data: &'a mut [u8]) -> Self {
        Writer { data, position: 0 }
    }

    /// Returns the length of the underlying buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current position within the buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the position to `pos`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the buffer length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }
        self.position = pos;
        Ok(())
    }

    /// Advance to the next multiple of `alignment`, leaving the skipped bytes untouched.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the aligned position is beyond the buffer.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.seek(self.position + padding)
    }

    /// Write `value` little-endian and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value doesn't fit.
    pub fn write_le<T: ByteIO>(&mut self, value: T) -> Result<()> {
        write_le_at(self.data, &mut self.position, value)
    }

    /// Copy `bytes` verbatim and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the bytes don't fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self
            .position
            .checked_add(bytes.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(OutOfBounds)?;

        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Write each `u16` of `values` little-endian.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the values don't fit.
    pub fn write_u16_slice(&mut self, values: &[u16]) -> Result<()> {
        values.iter().try_for_each(|&value| self.write_le(value))
    }

    /// Write each `u32` of `values` little-endian.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the values don't fit.
    pub fn write_u32_slice(&mut self, values: &[u32]) -> Result<()> {
        values.iter().try_for_each(|&value| self.write_le(value))
    }

    /// Write `value` verbatim followed by a NUL terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string and terminator don't fit.
    pub fn write_cstring(&mut self, value: &[u8]) -> Result<()> {
        if self.position + value.len() + 1 > self.data.len() {
            return Err(OutOfBounds);
        }
        self.write_bytes(value)?;
        self.write_le(0_u8)
    }

    /// Write `value` as a NUL-terminated little-endian UTF-16 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string and terminator don't fit.
    pub fn write_string_utf16(&mut self, value: &str) -> Result<()> {
        let units = U16String::from_str(value);
        if self.position + (units.len() + 1) * 2 > self.data.len() {
            return Err(OutOfBounds);
        }
        self.write_u16_slice(units.as_slice())?;
        self.write_le(0_u16)
    }
}

/// Encoded byte length of `value` as a NUL-terminated narrow string.
#[must_use]
pub fn cstring_size(value: &[u8]) -> usize {
    value.len() + 1
}

/// Encoded byte length of `value` as a NUL-terminated UTF-16 string.
#[must_use]
pub fn utf16_string_size(value: &str) -> usize {
    (value.encode_utf16().count() + 1) * 2
}
