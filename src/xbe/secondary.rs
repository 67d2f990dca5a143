//! The embedded PE header some images keep at the end of the header region.
//!
//! Images converted from a PE file may carry the original PE headers, starting with `MZ`,
//! between the logo bitmap and the first section. The loader ignores them, so they are
//! preserved only as long as the header region has room to spare.

/// `MZ` read as a little-endian `u16`.
pub const PE_MAGIC: u16 = 0x5A4D;

/// Verbatim bytes of the embedded PE header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryHeader {
    /// Offset of the first byte relative to the image base
    pub offset: u32,
    /// Bytes from `offset` to the end of the header region
    pub bytes: Vec<u8>,
}

impl SecondaryHeader {
    /// Number of captured bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if no bytes were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset one past the last captured byte.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset as usize + self.bytes.len()
    }
}

/// What happens to the embedded PE header when a section is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryHeaderDecision {
    /// The image has no embedded PE header
    Absent,
    /// The PE header stays in place
    Retained,
    /// The PE header is dropped to make room for the new section metadata
    Evicted,
}
