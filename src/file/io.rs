//! Low-level little-endian reading and writing of primitive values.
//!
//! Every multi-byte field of the XBE header region is stored little-endian. This module
//! provides the bounds-checked primitives that [`crate::file::parser::Parser`] and
//! [`crate::file::writer::Writer`] are built on, so that no structure is ever decoded by
//! casting a pointer over a byte buffer.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Trait describing a fixed-size little-endian primitive
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - Decode from a buffer
//! - [`crate::file::io::write_le`] / [`crate::file::io::write_le_at`] - Encode into a buffer
//!
//! All functions return [`crate::Error::OutOfBounds`] instead of panicking when the buffer
//! is too short, and offsets are only advanced on success.

use crate::{Error::OutOfBounds, Result};

/// A primitive value with a fixed-size little-endian encoding.
///
/// Implemented for the unsigned integer widths the XBE format uses. The associated
/// [`ByteIO::Bytes`] array is the exact on-disk representation of the value.
pub trait ByteIO: Sized + Copy {
    /// The fixed-size byte array holding the encoded value.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode `Self` from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode `Self` into little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io!(u8 => 1, u16 => 2, u32 => 4, u64 => 8);

/// Reads a little-endian value of type `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Reads a little-endian value of type `T` at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
///
/// # Examples
///
/// ```rust,ignore
/// use xbexploder::file::io::read_le_at;
///
/// let data = [0x01, 0x00, 0x02, 0x00];
/// let mut offset = 0;
/// assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 1);
/// assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 2);
/// assert_eq!(offset, 4);
/// # Ok::<(), xbexploder::Error>(())
/// ```
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(T::from_le_bytes(read))
}

/// Writes `value` little-endian at the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn write_le<T: ByteIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Writes `value` little-endian at `offset` and advances `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn write_le_at<T: ByteIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();

    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}
