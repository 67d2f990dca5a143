//! The fixed image header at the start of every XBE file.
//!
//! This module defines [`ImageHeader`], the record at offset zero of the header region. It
//! stores the image base address, the declared header and image sizes, and the virtual
//! addresses of every variable-length structure the loader needs.
//!
//! The record has grown over the lifetime of the platform. The declared
//! `size_of_image_header` tells how much of it a given image actually carries: fields past
//! that size are read as zero, and any bytes beyond the largest known layout are kept
//! verbatim in [`ImageHeader::extension`] so they survive a rewrite.

use crate::{
    file::{parser::Parser, writer::Writer},
    Error, Result,
};

/// Magic value at offset zero, `"XBEH"` read little-endian.
pub const XBE_MAGIC: u32 = 0x4845_4258;

/// `image_flags` bit requesting the utility drive to be mounted.
pub const IMAGE_FLAG_MOUNT_UTILITY_DRIVE: u32 = 0x0000_0001;
/// `image_flags` bit requesting the utility drive to be formatted.
pub const IMAGE_FLAG_FORMAT_UTILITY_DRIVE: u32 = 0x0000_0002;
/// `image_flags` bit limiting the title to 64 MiB of memory.
pub const IMAGE_FLAG_LIMIT_64MB: u32 = 0x0000_0004;
/// `image_flags` bit disabling the setup of the hard disk.
pub const IMAGE_FLAG_DONT_SETUP_HARDDISK: u32 = 0x0000_0008;

/// The XBE image header.
///
/// All `*_address` fields are absolute virtual addresses as stored on disk. The serializer
/// recomputes every one of them from the position it writes the referenced structure to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// Always [`XBE_MAGIC`]
    pub magic: u32,
    /// RSA signature over the header region
    pub signature: [u8; 256],
    /// Virtual address the header region is mapped at
    pub base_address: u32,
    /// Size of the header region in bytes
    pub size_of_headers: u32,
    /// Size of the whole mapped image in bytes
    pub size_of_image: u32,
    /// Size of this record as present in the file
    pub size_of_image_header: u32,
    /// Build timestamp
    pub creation_timestamp: u32,
    /// Address of the [`crate::xbe::Certificate`]
    pub certificate_address: u32,
    /// Number of entries in the section header array
    pub number_of_sections: u32,
    /// Address of the section header array
    pub section_headers_address: u32,
    /// `IMAGE_FLAG_*` bits
    pub image_flags: u32,
    /// XOR-encoded entry point
    pub entry_point: u32,
    /// Address of the TLS directory
    pub tls_address: u32,
    /// Stack commit size of the original PE image
    pub pe_stack_commit: u32,
    /// Heap reserve size of the original PE image
    pub pe_heap_reserve: u32,
    /// Heap commit size of the original PE image
    pub pe_heap_commit: u32,
    /// Address of the embedded PE header, zero if there is none
    pub pe_base_address: u32,
    /// Image size of the original PE image
    pub pe_size_of_image: u32,
    /// Checksum of the original PE image
    pub pe_checksum: u32,
    /// Timestamp of the original PE image
    pub pe_timestamp: u32,
    /// Address of the narrow debug path
    pub full_file_name_address: u32,
    /// Address of the short file name within the debug path
    pub file_name_address: u32,
    /// Address of the wide debug path
    pub unicode_file_name_address: u32,
    /// XOR-encoded address of the kernel import thunk table
    pub kernel_image_thunk_address: u32,
    /// Address of the non-kernel import descriptor array
    pub import_table_address: u32,
    /// Number of library version records
    pub number_of_library_versions: u32,
    /// Address of the library version array
    pub library_versions_address: u32,
    /// Address of the kernel's record within the library version array
    pub kernel_library_version_address: u32,
    /// Address of the XAPI record within the library version array
    pub xapi_library_version_address: u32,
    /// Address of the compressed title logo
    pub logo_bitmap_address: u32,
    /// Size of the compressed title logo in bytes
    pub logo_bitmap_size: u32,
    /// Address of the library feature array
    pub library_features_address: u32,
    /// Number of library feature records
    pub number_of_library_features: u32,
    /// Address of the CodeView debug information
    pub code_view_debug_info_address: u32,
    /// Bytes past the known record when `size_of_image_header` exceeds [`ImageHeader::SIZE`]
    pub extension: Vec<u8>,
}

impl ImageHeader {
    /// Size of the largest known record layout.
    pub const SIZE: usize = 0x184;

    /// Smallest `size_of_image_header` accepted.
    pub const MIN_SIZE: u32 = 0x170;

    /// Offset of `library_features_address` within the record.
    pub const LIBRARY_FEATURES_OFFSET: u32 = 0x178;

    /// Read the image header from the start of `data`.
    ///
    /// # Arguments
    /// * `data` - The file contents, starting at the header region
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMagic`] if the file isn't an XBE,
    /// [`crate::Error::HeaderTooSmall`] if the declared record size is below
    /// [`ImageHeader::MIN_SIZE`], or [`crate::Error::OutOfBounds`] if the data is truncated.
    pub fn read(data: &[u8]) -> Result<ImageHeader> {
        let mut parser = Parser::new(data);

        let magic = parser.read_le::<u32>()?;
        if magic != XBE_MAGIC {
            return Err(Error::InvalidMagic { found: magic });
        }

        parser.seek(0x110)?;
        let size_of_image_header = parser.read_le::<u32>()?;
        if size_of_image_header < Self::MIN_SIZE {
            return Err(Error::HeaderTooSmall {
                size: size_of_image_header,
            });
        }

        // Fields past the declared size belong to a newer layout and must read as zero
        let present = (size_of_image_header as usize).min(Self::SIZE);
        let mut record = [0u8; Self::SIZE];
        parser.seek(0)?;
        record[..present].copy_from_slice(parser.read_bytes(present)?);

        let extension = match (size_of_image_header as usize).checked_sub(Self::SIZE) {
            Some(extra) if extra > 0 => parser.read_bytes(extra)?.to_vec(),
            _ => Vec::new(),
        };

        let mut parser = Parser::new(&record);
        Ok(ImageHeader {
            magic: parser.read_le::<u32>()?,
            signature: parser.read_array::<256>()?,
            base_address: parser.read_le::<u32>()?,
            size_of_headers: parser.read_le::<u32>()?,
            size_of_image: parser.read_le::<u32>()?,
            size_of_image_header: parser.read_le::<u32>()?,
            creation_timestamp: parser.read_le::<u32>()?,
            certificate_address: parser.read_le::<u32>()?,
            number_of_sections: parser.read_le::<u32>()?,
            section_headers_address: parser.read_le::<u32>()?,
            image_flags: parser.read_le::<u32>()?,
            entry_point: parser.read_le::<u32>()?,
            tls_address: parser.read_le::<u32>()?,
            pe_stack_commit: parser.read_le::<u32>()?,
            pe_heap_reserve: parser.read_le::<u32>()?,
            pe_heap_commit: parser.read_le::<u32>()?,
            pe_base_address: parser.read_le::<u32>()?,
            pe_size_of_image: parser.read_le::<u32>()?,
            pe_checksum: parser.read_le::<u32>()?,
            pe_timestamp: parser.read_le::<u32>()?,
            full_file_name_address: parser.read_le::<u32>()?,
            file_name_address: parser.read_le::<u32>()?,
            unicode_file_name_address: parser.read_le::<u32>()?,
            kernel_image_thunk_address: parser.read_le::<u32>()?,
            import_table_address: parser.read_le::<u32>()?,
            number_of_library_versions: parser.read_le::<u32>()?,
            library_versions_address: parser.read_le::<u32>()?,
            kernel_library_version_address: parser.read_le::<u32>()?,
            xapi_library_version_address: parser.read_le::<u32>()?,
            logo_bitmap_address: parser.read_le::<u32>()?,
            logo_bitmap_size: parser.read_le::<u32>()?,
            library_features_address: parser.read_le::<u32>()?,
            number_of_library_features: parser.read_le::<u32>()?,
            code_view_debug_info_address: parser.read_le::<u32>()?,
            extension,
        })
    }

    /// Write the record at the writer's position.
    ///
    /// Exactly `size_of_image_header` bytes are emitted: the known layout truncated to the
    /// declared size, followed by [`ImageHeader::extension`].
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record does not fit the writer.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        let mut record = [0u8; Self::SIZE];
        let mut cursor = Writer::new(&mut record);

        cursor.write_le(self.magic)?;
        cursor.write_bytes(&self.signature)?;
        cursor.write_u32_slice(&[
            self.base_address,
            self.size_of_headers,
            self.size_of_image,
            self.size_of_image_header,
            self.creation_timestamp,
            self.certificate_address,
            self.number_of_sections,
            self.section_headers_address,
            self.image_flags,
            self.entry_point,
            self.tls_address,
            self.pe_stack_commit,
            self.pe_heap_reserve,
            self.pe_heap_commit,
            self.pe_base_address,
            self.pe_size_of_image,
            self.pe_checksum,
            self.pe_timestamp,
            self.full_file_name_address,
            self.file_name_address,
            self.unicode_file_name_address,
            self.kernel_image_thunk_address,
            self.import_table_address,
            self.number_of_library_versions,
            self.library_versions_address,
            self.kernel_library_version_address,
            self.xapi_library_version_address,
            self.logo_bitmap_address,
            self.logo_bitmap_size,
            self.library_features_address,
            self.number_of_library_features,
            self.code_view_debug_info_address,
        ])?;

        let present = (self.size_of_image_header as usize).min(Self::SIZE);
        writer.write_bytes(&record[..present])?;
        writer.write_bytes(&self.extension)
    }

    /// Returns `true` if the declared record size covers the library feature fields.
    #[must_use]
    pub fn has_library_features(&self) -> bool {
        self.size_of_image_header > Self::LIBRARY_FEATURES_OFFSET
    }
}
