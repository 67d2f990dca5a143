//! Library version records.
//!
//! The linker stamps one [`LibraryVersion`] per statically linked XDK library into the header.
//! The same record layout is used for the optional library feature array.

use crate::{
    file::{parser::Parser, writer::Writer},
    Result,
};

/// `flags` bits holding the quick-fix engineering build number.
pub const LIBRARY_FLAG_QFE_MASK: u16 = 0x1FFF;
/// `flags` bits holding the approval state.
pub const LIBRARY_FLAG_APPROVED_MASK: u16 = 0x6000;
/// `flags` bit marking a debug build of the library.
pub const LIBRARY_FLAG_DEBUG_BUILD: u16 = 0x8000;

/// A statically linked library and its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryVersion {
    /// NUL-padded ASCII library name
    pub name: [u8; 8],
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_version: u16,
    /// QFE number, approval state and debug bit
    pub flags: u16,
}

impl LibraryVersion {
    /// Size of one on-disk record.
    pub const SIZE: usize = 16;

    /// Read one record and advance the parser past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record is truncated.
    pub fn read(parser: &mut Parser) -> Result<LibraryVersion> {
        Ok(LibraryVersion {
            name: parser.read_array::<8>()?,
            major_version: parser.read_le::<u16>()?,
            minor_version: parser.read_le::<u16>()?,
            build_version: parser.read_le::<u16>()?,
            flags: parser.read_le::<u16>()?,
        })
    }

    /// Write one record and advance the writer past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record does not fit.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_bytes(&self.name)?;
        writer.write_u16_slice(&[
            self.major_version,
            self.minor_version,
            self.build_version,
            self.flags,
        ])
    }

    /// The library name without its NUL padding.
    #[must_use]
    pub fn name(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Quick-fix engineering build number.
    #[must_use]
    pub fn qfe(&self) -> u16 {
        self.flags & LIBRARY_FLAG_QFE_MASK
    }

    /// Returns `true` for a debug build of the library.
    #[must_use]
    pub fn is_debug_build(&self) -> bool {
        self.flags & LIBRARY_FLAG_DEBUG_BUILD != 0
    }
}

/// Positions of the kernel and XAPI records within the library version array.
///
/// The header stores both as absolute addresses into the array. They are kept as byte
/// offsets from the array start so that they stay valid wherever the array is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryVersionRefs {
    /// Byte offset of the kernel record, `None` if the header had no address
    pub kernel: Option<u32>,
    /// Byte offset of the XAPI record, `None` if the header had no address
    pub xapi: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let record = [
            b'X', b'B', b'O', b'X', b'K', b'R', b'N', b'L', // name = "XBOXKRNL"
            0x01, 0x00,                                     // major_version = 1
            0x00, 0x00,                                     // minor_version = 0
            0x48, 0x16,                                     // build_version = 5704
            0x01, 0x80,                                     // flags = debug | qfe 1
        ];

        let mut parser = Parser::new(&record);
        let library = LibraryVersion::read(&mut parser).unwrap();

        assert_eq!(library.name(), "XBOXKRNL");
        assert_eq!(library.major_version, 1);
        assert_eq!(library.build_version, 5704);
        assert_eq!(library.qfe(), 1);
        assert!(library.is_debug_build());

        let mut buffer = [0u8; LibraryVersion::SIZE];
        library.write(&mut Writer::new(&mut buffer)).unwrap();
        assert_eq!(buffer, record);
    }

    #[test]
    fn padded_name() {
        let library = LibraryVersion {
            name: *b"XAPILIB\0",
            major_version: 1,
            minor_version: 0,
            build_version: 5849,
            flags: 0x4001,
        };
        assert_eq!(library.name(), "XAPILIB");
        assert!(!library.is_debug_build());
    }
}
