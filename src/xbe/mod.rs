//! The XBE header region and its in-memory model.
//!
//! An XBE file starts with a header region that the loader maps at the image base address.
//! It holds the fixed [`ImageHeader`] followed by a set of variable-length structures the
//! header points at through absolute virtual addresses. [`XbeImage`] decodes all of them into
//! owned values, so that the region can be rebuilt from scratch by
//! [`crate::write::HeaderSerializer`] after the model has been changed.
//!
//! # Key Components
//!
//! - [`XbeImage`] - The complete header region model
//! - [`ImageHeader`] / [`Certificate`] - Fixed, self-sized records
//! - [`Section`] / [`SectionHeader`] / [`SectionFlags`] - Loadable sections
//! - [`ImportDirectory`] - Non-kernel imports ordered by thunk address
//! - [`LibraryVersion`] / [`LibraryVersionRefs`] - Linked library stamps
//! - [`DebugNames`] - Build path of the image
//! - [`NarrowString`] - Byte-preserving section names and debug path
//! - [`SecondaryHeader`] - Optional embedded PE header
//!
//! # Examples
//!
//! ```rust,no_run
//! use xbexploder::XbeImage;
//! use std::path::Path;
//!
//! let image = XbeImage::from_file(Path::new("default.xbe"))?;
//! println!("Title: {}", image.certificate.title());
//! for section in &image.sections {
//!     println!(
//!         "{:<8} 0x{:08X} 0x{:08X}",
//!         section.name, section.header.virtual_address, section.header.virtual_size
//!     );
//! }
//! # Ok::<(), xbexploder::Error>(())
//! ```

mod certificate;
mod debug;
mod header;
mod imports;
mod library;
mod narrow;
mod secondary;
mod section;

pub use certificate::Certificate;
pub use debug::DebugNames;
pub use header::{
    ImageHeader, IMAGE_FLAG_DONT_SETUP_HARDDISK, IMAGE_FLAG_FORMAT_UTILITY_DRIVE,
    IMAGE_FLAG_LIMIT_64MB, IMAGE_FLAG_MOUNT_UTILITY_DRIVE, XBE_MAGIC,
};
pub use imports::{ImportDescriptor, ImportDirectory};
pub use library::{
    LibraryVersion, LibraryVersionRefs, LIBRARY_FLAG_APPROVED_MASK, LIBRARY_FLAG_DEBUG_BUILD,
    LIBRARY_FLAG_QFE_MASK,
};
pub use narrow::NarrowString;
pub use secondary::{SecondaryHeader, SecondaryHeaderDecision, PE_MAGIC};
pub use section::{Section, SectionFlags, SectionHeader};

use std::path::Path;

use log::{debug, warn};

use crate::{
    file::{address::offset_of, parser::Parser, File},
    Result,
};

/// Entry point XOR key of retail images.
pub const ENTRY_POINT_KEY_RETAIL: u32 = 0xA8FC_57AB;
/// Entry point XOR key of debug images.
pub const ENTRY_POINT_KEY_DEBUG: u32 = 0x9485_9D4B;
/// Kernel thunk address XOR key of retail images.
pub const KERNEL_THUNK_KEY_RETAIL: u32 = 0x5B6D_40B6;
/// Kernel thunk address XOR key of debug images.
pub const KERNEL_THUNK_KEY_DEBUG: u32 = 0xEFB1_F152;

/// Whether an image was built for retail or development kits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Retail console image
    Retail,
    /// Development kit image
    Debug,
}

impl ImageKind {
    /// XOR key of the entry point.
    #[must_use]
    pub fn entry_point_key(self) -> u32 {
        match self {
            ImageKind::Retail => ENTRY_POINT_KEY_RETAIL,
            ImageKind::Debug => ENTRY_POINT_KEY_DEBUG,
        }
    }

    /// XOR key of the kernel thunk address.
    #[must_use]
    pub fn kernel_thunk_key(self) -> u32 {
        match self {
            ImageKind::Retail => KERNEL_THUNK_KEY_RETAIL,
            ImageKind::Debug => KERNEL_THUNK_KEY_DEBUG,
        }
    }
}

/// The decoded header region of an XBE file.
///
/// Every variable-length structure is held as an owned value. The address fields of
/// [`XbeImage::header`] and of each [`SectionHeader`] are kept as they were read; structures
/// whose position depends on another structure are represented relative to it
/// ([`LibraryVersionRefs`], [`DebugNames::file_name_offset`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XbeImage {
    /// The fixed image header
    pub header: ImageHeader,
    /// The title certificate
    pub certificate: Certificate,
    /// Sections in header order
    pub sections: Vec<Section>,
    /// Non-kernel imports
    pub imports: ImportDirectory,
    /// Linked library stamps
    pub library_versions: Vec<LibraryVersion>,
    /// Kernel and XAPI positions within [`XbeImage::library_versions`]
    pub library_version_refs: LibraryVersionRefs,
    /// Library feature stamps, empty when the header predates them
    pub library_features: Vec<LibraryVersion>,
    /// Build path of the image
    pub debug_names: DebugNames,
    /// Compressed title logo
    pub logo_bitmap: Vec<u8>,
    /// Embedded PE header, if present
    pub secondary_header: Option<SecondaryHeader>,
}

impl XbeImage {
    /// Load and parse the XBE file at `path`.
    ///
    /// The file is memory-mapped for the duration of the call only.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can't be read, or any error of
    /// [`XbeImage::parse`].
    pub fn from_file(path: &Path) -> Result<XbeImage> {
        let file = File::from_file(path)?;
        XbeImage::parse(file.data())
    }

    /// Parse an XBE file held in memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer, or any error of
    /// [`XbeImage::parse`].
    pub fn from_mem(data: Vec<u8>) -> Result<XbeImage> {
        let file = File::from_mem(data)?;
        XbeImage::parse(file.data())
    }

    /// Decode the header region at the start of `data`.
    ///
    /// Only the header region is read; `data` may be the complete file or any prefix that
    /// contains every structure the header points at.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidMagic`], [`crate::Error::HeaderTooSmall`] or
    ///   [`crate::Error::CertificateTooSmall`] for records that aren't a supported XBE
    /// - [`crate::Error::AddressBelowBase`] for an address outside the header region
    /// - [`crate::Error::OutOfBounds`] for structures past the end of `data`
    /// - [`crate::Error::Malformed`] for undecodable strings or inconsistent offsets
    pub fn parse(data: &[u8]) -> Result<XbeImage> {
        let mut header = ImageHeader::read(data)?;
        let base = header.base_address;

        let certificate =
            Certificate::read(data, offset_of(header.certificate_address, base)? as usize)?;

        let sections = Self::read_sections(data, &header)?;
        let imports = Self::read_imports(data, &header)?;

        let library_versions = Self::read_libraries(
            data,
            base,
            header.library_versions_address,
            header.number_of_library_versions,
        )?;

        let library_features = if header.has_library_features() {
            Self::read_libraries(
                data,
                base,
                header.library_features_address,
                header.number_of_library_features,
            )?
        } else {
            Vec::new()
        };

        if header.code_view_debug_info_address != 0 {
            warn!(
                "Dropping CodeView debug information at 0x{:08X}",
                header.code_view_debug_info_address
            );
            header.code_view_debug_info_address = 0;
        }

        let library_version_refs = Self::read_library_refs(&header, library_versions.len())?;
        let debug_names = Self::read_debug_names(data, &header)?;

        let logo_bitmap = if header.logo_bitmap_address != 0 && header.logo_bitmap_size != 0 {
            let mut parser =
                Parser::at(data, offset_of(header.logo_bitmap_address, base)? as usize)?;
            parser.read_bytes(header.logo_bitmap_size as usize)?.to_vec()
        } else {
            Vec::new()
        };

        let secondary_header = Self::read_secondary_header(data, &header, &sections)?;

        debug!(
            "Parsed image at 0x{:08X}: {} sections, {} imports, {} libraries, {} features",
            base,
            sections.len(),
            imports.len(),
            library_versions.len(),
            library_features.len()
        );

        Ok(XbeImage {
            header,
            certificate,
            sections,
            imports,
            library_versions,
            library_version_refs,
            library_features,
            debug_names,
            logo_bitmap,
            secondary_header,
        })
    }

    fn read_sections(data: &[u8], header: &ImageHeader) -> Result<Vec<Section>> {
        let base = header.base_address;
        if header.number_of_sections == 0 {
            return Ok(Vec::new());
        }

        let section_headers = offset_of(header.section_headers_address, base)?;
        let mut parser = Parser::at(data, section_headers as usize)?;
        let mut sections = Vec::new();
        for index in 0..header.number_of_sections {
            let section_header = SectionHeader::read(&mut parser)?;

            let name = if section_header.section_name_address != 0 {
                let offset = offset_of(section_header.section_name_address, base)?;
                NarrowString::from(Parser::at(data, offset as usize)?.read_cstring()?)
            } else {
                warn!("Section {} has no name", index);
                NarrowString::default()
            };

            sections.push(Section {
                header: section_header,
                name,
            });
        }

        Ok(sections)
    }

    fn read_imports(data: &[u8], header: &ImageHeader) -> Result<ImportDirectory> {
        let base = header.base_address;
        let mut imports = ImportDirectory::new();
        if header.import_table_address == 0 {
            return Ok(imports);
        }

        let mut parser = Parser::at(data, offset_of(header.import_table_address, base)? as usize)?;
        loop {
            let descriptor = ImportDescriptor::read(&mut parser)?;
            if descriptor.is_terminator() {
                break;
            }

            let module = Parser::at(
                data,
                offset_of(descriptor.module_name_address, base)? as usize,
            )?
            .read_string_utf16()?;

            if !imports.insert(descriptor.thunk_address, module.as_str()) {
                warn!(
                    "Ignoring duplicate import of {} through thunk 0x{:08X}",
                    module, descriptor.thunk_address
                );
            }
        }

        Ok(imports)
    }

    fn read_libraries(
        data: &[u8],
        base: u32,
        address: u32,
        count: u32,
    ) -> Result<Vec<LibraryVersion>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut parser = Parser::at(data, offset_of(address, base)? as usize)?;
        (0..count)
            .map(|_| LibraryVersion::read(&mut parser))
            .collect()
    }

    fn read_library_refs(header: &ImageHeader, count: usize) -> Result<LibraryVersionRefs> {
        let array_address = header.library_versions_address;
        let array_size = count * LibraryVersion::SIZE;

        let relative = |address: u32, library: &str| -> Result<Option<u32>> {
            if address == 0 {
                return Ok(None);
            }

            let offset = offset_of(address, array_address)?;
            if offset as usize >= array_size || offset as usize % LibraryVersion::SIZE != 0 {
                return Err(malformed_error!(
                    "{} library version 0x{:08X} is not a record of the array at 0x{:08X}",
                    library,
                    address,
                    array_address
                ));
            }
            Ok(Some(offset))
        };

        Ok(LibraryVersionRefs {
            kernel: relative(header.kernel_library_version_address, "Kernel")?,
            xapi: relative(header.xapi_library_version_address, "XAPI")?,
        })
    }

    fn read_debug_names(data: &[u8], header: &ImageHeader) -> Result<DebugNames> {
        let base = header.base_address;

        let full_path = match header.full_file_name_address {
            0 => None,
            address => {
                let mut parser = Parser::at(data, offset_of(address, base)? as usize)?;
                Some(NarrowString::from(parser.read_cstring()?))
            }
        };

        let file_name_offset = match (&full_path, header.file_name_address) {
            (Some(full_path), address) if address != 0 => {
                let offset = offset_of(address, header.full_file_name_address)?;
                if offset as usize > full_path.len() {
                    return Err(malformed_error!(
                        "Debug file name at 0x{:08X} lies outside the debug path",
                        address
                    ));
                }
                Some(offset)
            }
            _ => None,
        };

        let unicode_path = match header.unicode_file_name_address {
            0 => None,
            address => {
                Some(Parser::at(data, offset_of(address, base)? as usize)?.read_string_utf16()?)
            }
        };

        Ok(DebugNames {
            full_path,
            file_name_offset,
            unicode_path,
        })
    }

    fn read_secondary_header(
        data: &[u8],
        header: &ImageHeader,
        sections: &[Section],
    ) -> Result<Option<SecondaryHeader>> {
        if header.pe_base_address == 0 {
            return Ok(None);
        }

        let offset = offset_of(header.pe_base_address, header.base_address)?;
        let parser = Parser::at(data, offset as usize)?;
        if parser.peek_le::<u16>().ok() != Some(PE_MAGIC) {
            debug!(
                "No PE header at 0x{:08X}, treating as absent",
                header.pe_base_address
            );
            return Ok(None);
        }

        // The region ends where the first section would be mapped, but never past the
        // first section's data in the file
        let mut end = header.size_of_headers as usize;
        if let Some(first) = sections.first() {
            end = end.max(offset_of(first.header.virtual_address, header.base_address)? as usize);
        }
        if let Some(data_start) = sections.iter().map(|s| s.header.raw_address as usize).min() {
            end = end.min(data_start);
        }
        end = end.min(data.len());

        if end <= offset as usize {
            warn!(
                "PE header at 0x{:08X} lies outside the header region",
                header.pe_base_address
            );
            return Ok(None);
        }

        Ok(Some(SecondaryHeader {
            offset,
            bytes: data[offset as usize..end].to_vec(),
        }))
    }

    /// The sequence of section names, index-aligned with [`XbeImage::sections`].
    pub fn section_names(&self) -> impl Iterator<Item = &NarrowString> {
        self.sections.iter().map(|section| &section.name)
    }

    /// Lowest file offset holding section data, `None` for an image without sections.
    #[must_use]
    pub fn image_data_start(&self) -> Option<u32> {
        self.sections
            .iter()
            .map(|section| section.header.raw_address)
            .min()
    }

    /// Guess whether this is a retail or a debug image.
    ///
    /// The entry point is decoded with both keys; the key that yields an address inside a
    /// section wins. Returns `None` if neither does.
    #[must_use]
    pub fn image_kind(&self) -> Option<ImageKind> {
        [ImageKind::Retail, ImageKind::Debug]
            .into_iter()
            .find(|kind| {
                let entry_point = self.header.entry_point ^ kind.entry_point_key();
                self.sections
                    .iter()
                    .any(|section| section.header.contains(entry_point))
            })
    }

    /// The decoded entry point, `None` if the image kind can't be determined.
    #[must_use]
    pub fn entry_point(&self) -> Option<u32> {
        self.image_kind()
            .map(|kind| self.header.entry_point ^ kind.entry_point_key())
    }

    /// The decoded kernel thunk table address, `None` if the image kind can't be determined.
    #[must_use]
    pub fn kernel_thunk_address(&self) -> Option<u32> {
        self.image_kind()
            .map(|kind| self.header.kernel_image_thunk_address ^ kind.kernel_thunk_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::XbeBuilder, Error};

    #[test]
    fn minimal() {
        let data = XbeBuilder::new().build();
        let image = XbeImage::parse(&data).unwrap();

        assert_eq!(image.header.base_address, 0x0001_0000);
        assert_eq!(image.header.number_of_sections, 1);
        assert_eq!(image.sections.len(), 1);
        assert_eq!(image.sections[0].name, ".text");
        assert_eq!(image.sections[0].header.virtual_address, 0x0001_1000);
        assert_eq!(image.certificate.title(), "Test Title");
        assert!(image.imports.is_empty());
        assert!(image.secondary_header.is_none());
        assert_eq!(image.image_data_start(), Some(0x1000));
        assert_eq!(image.section_names().collect::<Vec<_>>(), vec![".text"]);
    }

    #[test]
    fn full() {
        let data = XbeBuilder::new()
            .section(".data", 0x0001_3000, 0x800, 0x3000, 0x800)
            .import(0x0001_2000, "xnet.dll")
            .import(0x0001_1800, "d3d8.dll")
            .library("XBOXKRNL", 5849)
            .library("XAPILIB", 5849)
            .feature("XGRAPHC", 5849)
            .debug_path(r"D:\build\default.exe", 9)
            .unicode_path(r"D:\build\default.exe")
            .logo(&[0xAA; 37])
            .code_view(0x0001_0FF0)
            .build();
        let image = XbeImage::parse(&data).unwrap();

        assert_eq!(image.section_names().collect::<Vec<_>>(), vec![".text", ".data"]);
        assert_eq!(
            image.imports.iter().collect::<Vec<_>>(),
            vec![(0x0001_1800, "d3d8.dll"), (0x0001_2000, "xnet.dll")]
        );
        assert_eq!(image.library_versions.len(), 2);
        assert_eq!(image.library_versions[1].name(), "XAPILIB");
        assert_eq!(
            image.library_version_refs,
            LibraryVersionRefs {
                kernel: Some(0),
                xapi: Some(16)
            }
        );
        assert_eq!(image.library_features.len(), 1);
        assert_eq!(image.library_features[0].name(), "XGRAPHC");
        assert_eq!(image.debug_names.file_name(), Some(&b"default.exe"[..]));
        assert_eq!(
            image.debug_names.unicode_path.as_deref(),
            Some(r"D:\build\default.exe")
        );
        assert_eq!(image.logo_bitmap, vec![0xAA; 37]);
        assert_eq!(image.header.code_view_debug_info_address, 0);
    }

    #[test]
    fn scattered_layout() {
        let builder = || {
            XbeBuilder::new()
                .section(".data", 0x0001_3000, 0x800, 0x3000, 0x800)
                .import(0x0001_1800, "d3d8.dll")
                .library("XBOXKRNL", 5849)
                .library("XAPILIB", 5849)
                .feature("XGRAPHC", 5849)
                .debug_path(r"D:\build\default.exe", 9)
                .unicode_path(r"D:\build\default.exe")
                .logo(&[0xAA; 37])
        };
        let packed = XbeImage::parse(&builder().build()).unwrap();
        let scattered = XbeImage::parse(&builder().scattered().build()).unwrap();

        let header = &scattered.header;
        assert!(header.full_file_name_address < header.unicode_file_name_address);
        assert!(header.library_versions_address < header.import_table_address);
        assert!(scattered.header.logo_bitmap_address > packed.header.logo_bitmap_address);
        assert_eq!(scattered.section_names().collect::<Vec<_>>(), vec![".text", ".data"]);
        assert!(
            scattered.sections[1].header.section_name_address
                < scattered.sections[0].header.section_name_address
        );
        assert_eq!(scattered.certificate, packed.certificate);
        assert_eq!(scattered.imports, packed.imports);
        assert_eq!(scattered.library_versions, packed.library_versions);
        assert_eq!(scattered.library_version_refs, packed.library_version_refs);
        assert_eq!(scattered.library_features, packed.library_features);
        assert_eq!(scattered.debug_names, packed.debug_names);
        assert_eq!(scattered.logo_bitmap, packed.logo_bitmap);
    }

    #[test]
    fn debug_path_in_local_code_page() {
        let path = b"D:\\\x83\x65\x83\x58\x83\x67\\default.exe";
        let data = XbeBuilder::new().debug_path(path, 10).build();
        let image = XbeImage::parse(&data).unwrap();

        let full_path = image.debug_names.full_path.as_ref().unwrap();
        assert_eq!(full_path.as_bytes(), path);
        assert!(full_path.to_str().is_none());
        assert_eq!(image.debug_names.file_name(), Some(&b"default.exe"[..]));
    }

    #[test]
    fn features_need_header_field() {
        let data = XbeBuilder::new()
            .size_of_image_header(0x178)
            .feature("XGRAPHC", 5849)
            .build();
        let image = XbeImage::parse(&data).unwrap();

        assert!(!image.header.has_library_features());
        assert!(image.library_features.is_empty());
    }

    #[test]
    fn secondary_header() {
        let data = XbeBuilder::new().pe_header(0x40).build();
        let image = XbeImage::parse(&data).unwrap();

        let secondary = image.secondary_header.unwrap();
        assert_eq!(secondary.offset, 0x1000 - 0x40);
        assert_eq!(secondary.len(), 0x40);
        assert_eq!(&secondary.bytes[..2], b"MZ");
    }

    #[test]
    fn secondary_header_without_magic() {
        let mut data = XbeBuilder::new().pe_header(0x40).build();
        data[0x1000 - 0x40] = 0;
        let image = XbeImage::parse(&data).unwrap();
        assert!(image.secondary_header.is_none());
    }

    #[test]
    fn nameless_section() {
        let mut data = XbeBuilder::new().build();
        let image = XbeImage::parse(&data).unwrap();

        let name_field = (image.header.section_headers_address - 0x0001_0000) as usize + 0x14;
        data[name_field..name_field + 4].copy_from_slice(&[0; 4]);

        let image = XbeImage::parse(&data).unwrap();
        assert_eq!(image.sections[0].name, "");
    }

    #[test]
    fn duplicate_import_keeps_first() {
        let data = XbeBuilder::new()
            .import(0x0001_1800, "first.dll")
            .import(0x0001_1800, "second.dll")
            .build();
        let image = XbeImage::parse(&data).unwrap();

        assert_eq!(image.imports.len(), 1);
        assert_eq!(image.imports.get(0x0001_1800), Some("first.dll"));
    }

    #[test]
    fn image_kind() {
        let data = XbeBuilder::new()
            .entry_point(0x0001_1234 ^ ENTRY_POINT_KEY_RETAIL)
            .kernel_thunk(0x0001_1100 ^ KERNEL_THUNK_KEY_RETAIL)
            .build();
        let image = XbeImage::parse(&data).unwrap();
        assert_eq!(image.image_kind(), Some(ImageKind::Retail));
        assert_eq!(image.entry_point(), Some(0x0001_1234));
        assert_eq!(image.kernel_thunk_address(), Some(0x0001_1100));

        let data = XbeBuilder::new()
            .entry_point(0x0001_1234 ^ ENTRY_POINT_KEY_DEBUG)
            .build();
        let image = XbeImage::parse(&data).unwrap();
        assert_eq!(image.image_kind(), Some(ImageKind::Debug));

        let data = XbeBuilder::new().entry_point(0).build();
        let image = XbeImage::parse(&data).unwrap();
        assert_eq!(image.image_kind(), None);
    }

    #[test]
    fn invalid_magic() {
        let mut data = XbeBuilder::new().build();
        data[..4].copy_from_slice(b"XBEX");
        assert!(matches!(
            XbeImage::parse(&data),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn certificate_below_base() {
        let mut data = XbeBuilder::new().build();
        data[0x118..0x11C].copy_from_slice(&0x0000_0100_u32.to_le_bytes());
        assert!(matches!(
            XbeImage::parse(&data),
            Err(Error::AddressBelowBase { .. })
        ));
    }

    #[test]
    fn truncated_section_table() {
        let data = XbeBuilder::new().build();
        let image = XbeImage::parse(&data).unwrap();
        let cut = (image.header.section_headers_address - 0x0001_0000) as usize + 0x10;
        assert!(matches!(
            XbeImage::parse(&data[..cut]),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn from_mem() {
        let image = XbeImage::from_mem(XbeBuilder::new().build()).unwrap();
        assert_eq!(image.sections.len(), 1);
        assert!(matches!(XbeImage::from_mem(Vec::new()), Err(Error::Empty)));
    }
}
