//! Translation between virtual addresses and header-relative offsets.
//!
//! Every address stored in the XBE header is an absolute virtual address. The header region is
//! mapped at the image base address, so the byte offset of a structure within the header (and
//! within the file, since the header is the file's first region) is its address minus the base.

use crate::{Error, Result};

/// Byte alignment every packed header substructure starts on.
pub const STRUCTURE_ALIGNMENT: u32 = 4;

/// Page size of the target platform; raw section data is placed on page boundaries.
pub const PAGE_SIZE: u32 = 0x1000;

/// Converts a virtual address into an offset relative to the image base.
///
/// # Errors
/// Returns [`crate::Error::AddressBelowBase`] if `address` lies below `base`.
///
/// # Examples
///
/// ```rust
/// use xbexploder::file::address::offset_of;
///
/// assert_eq!(offset_of(0x0001_0178, 0x0001_0000)?, 0x178);
/// assert!(offset_of(0x0000_FFFF, 0x0001_0000).is_err());
/// # Ok::<(), xbexploder::Error>(())
/// ```
pub fn offset_of(address: u32, base: u32) -> Result<u32> {
    address
        .checked_sub(base)
        .ok_or(Error::AddressBelowBase { address, base })
}

/// Converts an offset relative to the image base back into a virtual address.
///
/// # Errors
/// Returns [`crate::Error::AddressOverflow`] if the result exceeds the 32-bit address space.
pub fn address_of(offset: usize, base: u32) -> Result<u32> {
    u32::try_from(offset)
        .ok()
        .and_then(|offset| offset.checked_add(base))
        .ok_or(Error::AddressOverflow)
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` does not have to be a power of two. Returns `None` on overflow or when
/// `alignment` is zero.
#[must_use]
pub fn align_up(value: u32, alignment: u32) -> Option<u32> {
    if alignment == 0 {
        return None;
    }
    match value % alignment {
        0 => Some(value),
        rest => value.checked_add(alignment - rest),
    }
}

/// Rounds a buffer position up to the next multiple of [`STRUCTURE_ALIGNMENT`].
#[must_use]
pub fn align4(position: usize) -> usize {
    (position + 3) & !3
}
