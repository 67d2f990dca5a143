//! Cursor-based byte parser for XBE header structures.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over
//! a byte slice. The XBE header region is a collection of records that point at each other
//! through virtual addresses; after translating an address into a header offset the parser is
//! positioned with [`crate::file::parser::Parser::seek`] and the record is decoded field by
//! field.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::align`] - Align to byte boundaries
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::peek_le`] - Peek at primitive types without advancing
//! - [`crate::file::parser::Parser::read_bytes`] - Raw byte runs
//! - [`crate::file::parser::Parser::read_array`] - Fixed-size byte arrays
//!
//! ## String Methods
//! - [`crate::file::parser::Parser::read_cstring`] - NUL-terminated narrow string, as bytes
//! - [`crate::file::parser::Parser::read_string_utf16`] - NUL-terminated wide string
//!
//! # Usage Examples
//!
//! ```rust
//! use xbexploder::Parser;
//!
//! let data = [0x58, 0x42, 0x45, 0x48, 0x00, 0x00, 0x01, 0x00];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u32>()?, 0x4845_4258);
//! parser.seek(6)?;
//! assert_eq!(parser.read_le::<u16>()?, 1);
//! # Ok::<(), xbexploder::Error>(())
//! ```

use widestring::U16Str;

use crate::{
    file::io::{read_le_at, ByteIO},
    Error::OutOfBounds,
    Result,
};

/// A bounds-checked cursor over a byte slice.
///
/// `Parser` keeps a position within the borrowed data and decodes little-endian values,
/// raw byte runs and NUL-terminated strings from it. Every read validates that enough data is
/// available and reports [`crate::Error::OutOfBounds`] otherwise, which makes it safe to use on
/// truncated or hostile input.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Create a new [`crate::file::parser::Parser`] positioned at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` is beyond the data length.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        let mut parser = Parser::new(data);
        parser.seek(offset)?;
        Ok(parser)
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the data is allowed; any following read fails.
    ///
    /// # Arguments
    /// * `pos` - The position to move the cursor to
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Arguments
    /// * `step` - Amount of bytes to advance
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(OutOfBounds),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Align the position to a specific boundary.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Peek at a value of type `T` in little-endian format without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data length.
    pub fn peek_le<T: ByteIO>(&self) -> Result<T> {
        let mut temp_position = self.position;
        read_le_at::<T>(self.data, &mut temp_position)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use xbexploder::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let mut parser = Parser::new(&data);
    ///
    /// let value: u16 = parser.read_le()?;
    /// assert_eq!(value, 0x0201);
    /// assert_eq!(parser.pos(), 2);
    /// # Ok::<(), xbexploder::Error>(())
    /// ```
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read `len` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a fixed-size byte array and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    /// Read `N` consecutive little-endian `u16` values.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `2 * N` bytes remain.
    pub fn read_u16_array<const N: usize>(&mut self) -> Result<[u16; N]> {
        let mut array = [0u16; N];
        for value in &mut array {
            *value = self.read_le()?;
        }
        Ok(array)
    }

    /// Read `N` consecutive little-endian `u32` values.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `4 * N` bytes remain.
    pub fn read_u32_array<const N: usize>(&mut self) -> Result<[u32; N]> {
        let mut array = [0u32; N];
        for value in &mut array {
            *value = self.read_le()?;
        }
        Ok(array)
    }

    /// Read a NUL-terminated narrow string as raw bytes, without the terminator.
    ///
    /// The terminator is required: the header region is always followed by section data, so a
    /// string running into the end of the buffer is treated as damaged. No encoding is
    /// assumed.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xbexploder::Parser;
    ///
    /// let data = b".text\0.data\0";
    /// let mut parser = Parser::new(data);
    ///
    /// assert_eq!(parser.read_cstring()?, b".text");
    /// assert_eq!(parser.read_cstring()?, b".data");
    /// # Ok::<(), xbexploder::Error>(())
    /// ```
    pub fn read_cstring(&mut self) -> Result<&'a [u8]> {
        let start = self.position;
        let Some(length) = self.data[start..].iter().position(|&byte| byte == 0) else {
            return Err(OutOfBounds);
        };

        self.position = start + length + 1;
        Ok(&self.data[start..start + length])
    }

    /// Read a NUL-terminated little-endian UTF-16 string.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no terminator is found, or
    /// [`crate::Error::Malformed`] for invalid UTF-16.
    pub fn read_string_utf16(&mut self) -> Result<String> {
        let start = self.position;
        let mut units = Vec::new();
        loop {
            let unit = self.read_le::<u16>().inspect_err(|_| self.position = start)?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }

        U16Str::from_slice(&units).to_string().map_err(|e| {
            malformed_error!("Invalid UTF-16 string at offset {}: {}", start, e)
        })
    }
}
