//! Section headers and their flags.

use bitflags::bitflags;

use crate::{
    file::{parser::Parser, writer::Writer},
    xbe::NarrowString,
    Result,
};

bitflags! {
    /// Section load and protection flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u32 {
        /// Section is writable
        const WRITABLE = 0x0000_0001;
        /// Section is loaded when the image is loaded
        const PRELOAD = 0x0000_0002;
        /// Section contains executable code
        const EXECUTABLE = 0x0000_0004;
        /// Section was inserted after linking
        const INSERTED_FILE = 0x0000_0008;
        /// First page of the section is read-only
        const HEAD_PAGE_READ_ONLY = 0x0000_0010;
        /// Last page of the section is read-only
        const TAIL_PAGE_READ_ONLY = 0x0000_0020;
    }
}

/// One entry of the section header array.
///
/// The name and shared-page reference addresses point into the header region and are
/// recomputed whenever the header is serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Load and protection flags, unknown bits retained
    pub flags: SectionFlags,
    /// Address the section is mapped at
    pub virtual_address: u32,
    /// Size of the mapped section
    pub virtual_size: u32,
    /// File offset of the section data
    pub raw_address: u32,
    /// Size of the section data in the file
    pub raw_size: u32,
    /// Address of the NUL-terminated section name
    pub section_name_address: u32,
    /// Number of sections sharing this name
    pub section_name_reference_count: u32,
    /// Address of the reference counter for the section's first page
    pub head_shared_page_reference_address: u32,
    /// Address of the reference counter for the section's last page
    pub tail_shared_page_reference_address: u32,
    /// SHA-1 digest of the section data
    pub digest: [u8; 20],
}

impl SectionHeader {
    /// Size of one on-disk record.
    pub const SIZE: usize = 0x38;

    /// Read one record and advance the parser past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record is truncated.
    pub fn read(parser: &mut Parser) -> Result<SectionHeader> {
        Ok(SectionHeader {
            flags: SectionFlags::from_bits_retain(parser.read_le::<u32>()?),
            virtual_address: parser.read_le::<u32>()?,
            virtual_size: parser.read_le::<u32>()?,
            raw_address: parser.read_le::<u32>()?,
            raw_size: parser.read_le::<u32>()?,
            section_name_address: parser.read_le::<u32>()?,
            section_name_reference_count: parser.read_le::<u32>()?,
            head_shared_page_reference_address: parser.read_le::<u32>()?,
            tail_shared_page_reference_address: parser.read_le::<u32>()?,
            digest: parser.read_array::<20>()?,
        })
    }

    /// Write one record and advance the writer past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record does not fit.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_u32_slice(&[
            self.flags.bits(),
            self.virtual_address,
            self.virtual_size,
            self.raw_address,
            self.raw_size,
            self.section_name_address,
            self.section_name_reference_count,
            self.head_shared_page_reference_address,
            self.tail_shared_page_reference_address,
        ])?;
        writer.write_bytes(&self.digest)
    }

    /// First virtual address past the section.
    #[must_use]
    pub fn virtual_end(&self) -> Option<u32> {
        self.virtual_address.checked_add(self.virtual_size)
    }

    /// First file offset past the section data.
    #[must_use]
    pub fn raw_end(&self) -> Option<u32> {
        self.raw_address.checked_add(self.raw_size)
    }

    /// Returns `true` if `address` lies within the mapped section.
    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        address >= self.virtual_address
            && self
                .virtual_end()
                .is_some_and(|virtual_end| address < virtual_end)
    }
}

/// A section header together with its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The on-disk record
    pub header: SectionHeader,
    /// The section name, empty if the record had no name address
    pub name: NarrowString,
}
