//! Packing of the header region.
//!
//! The serializer rebuilds the complete header region from an [`XbeImage`]. It works in two
//! phases:
//!
//! 1. [`HeaderLayout::compute`] assigns every substructure its offset in the new region,
//!    in the order the loader expects and with each structure starting on a 4 byte boundary.
//! 2. [`HeaderSerializer::serialize`] allocates a zeroed buffer of `size_of_headers` bytes,
//!    derives every address field from the offset table and encodes the records.
//!
//! No address is copied from the source model. Each one is computed from the position the
//! referenced structure is written to, so the output is consistent even after sections were
//! added or the embedded PE header was dropped.
//!
//! # Region Order
//!
//! | Region                  | Alignment | Present when                               |
//! |-------------------------|-----------|--------------------------------------------|
//! | Image header            | 0         | always                                     |
//! | Certificate             | 4         | always                                     |
//! | Section headers         | 4         | always                                     |
//! | Shared page references  | 4         | always (one `u16` per section plus one)    |
//! | Section names           | 4         | always                                     |
//! | Import descriptors      | 4         | the image has an import table              |
//! | Import module names     | 2         | the image has an import table              |
//! | Library versions        | 4         | always                                     |
//! | Library features        | 4         | the header has the field and features exist|
//! | Unicode debug path      | 4         | the path exists                            |
//! | Debug path              | 4         | the path exists                            |
//! | Logo bitmap             | 4         | always                                     |
//! | Embedded PE header      | verbatim  | retained, at its original offset           |

use log::{debug, warn};

use crate::{
    file::{
        address::{address_of, align4},
        writer::{cstring_size, utf16_string_size, Writer},
    },
    xbe::{Certificate, ImageHeader, ImportDescriptor, LibraryVersion, SectionHeader, XbeImage},
    Error, Result,
};

/// A contiguous byte range within the header region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    /// Offset from the start of the header region
    pub offset: usize,
    /// Length in bytes
    pub len: usize,
}

impl Region {
    /// Offset one past the last byte.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns `true` for a zero-length region.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

struct Packer {
    position: usize,
}

impl Packer {
    fn aligned(&mut self, len: usize) -> Region {
        let offset = align4(self.position);
        self.position = offset + len;
        Region { offset, len }
    }

    fn packed(&mut self, len: usize) -> Region {
        let offset = self.position;
        self.position = offset + len;
        Region { offset, len }
    }
}

/// The offset table of a serialized header region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLayout {
    /// The image header record
    pub image_header: Region,
    /// The certificate record
    pub certificate: Region,
    /// The section header array
    pub section_headers: Region,
    /// The shared page reference counters
    pub shared_page_references: Region,
    /// The concatenated section names
    pub section_names: Region,
    /// Offset of each section name, index-aligned with the sections
    pub section_name_offsets: Vec<usize>,
    /// The import descriptor array including its terminator, `None` without an import table
    pub import_descriptors: Option<Region>,
    /// The concatenated wide module names
    pub import_names: Region,
    /// Offset of each module name in ascending thunk order
    pub import_name_offsets: Vec<usize>,
    /// The library version array
    pub library_versions: Region,
    /// The library feature array
    pub library_features: Region,
    /// The wide debug path
    pub unicode_path: Region,
    /// The narrow debug path
    pub debug_path: Region,
    /// The logo bitmap
    pub logo_bitmap: Region,
}

impl HeaderLayout {
    /// Compute the position of every substructure of `image`.
    #[must_use]
    pub fn compute(image: &XbeImage) -> HeaderLayout {
        let mut packer = Packer { position: 0 };

        let image_header = packer.packed(image.header.size_of_image_header as usize);
        let certificate = packer.aligned(image.certificate.size as usize);
        let section_headers = packer.aligned(image.sections.len() * SectionHeader::SIZE);
        let shared_page_references = packer.aligned((image.sections.len() + 1) * 2);

        let names_len = image
            .sections
            .iter()
            .map(|section| cstring_size(section.name.as_bytes()))
            .sum();
        let section_names = packer.aligned(names_len);
        let section_name_offsets = image
            .sections
            .iter()
            .scan(section_names.offset, |offset, section| {
                let current = *offset;
                *offset += cstring_size(section.name.as_bytes());
                Some(current)
            })
            .collect();

        let has_import_table = image.header.import_table_address != 0 || !image.imports.is_empty();
        let (import_descriptors, import_names, import_name_offsets) = if has_import_table {
            let descriptors = packer.aligned((image.imports.len() + 1) * ImportDescriptor::SIZE);
            let names_len = image
                .imports
                .iter()
                .map(|(_, module)| utf16_string_size(module))
                .sum();
            let names = packer.packed(names_len);
            let offsets = image
                .imports
                .iter()
                .scan(names.offset, |offset, (_, module)| {
                    let current = *offset;
                    *offset += utf16_string_size(module);
                    Some(current)
                })
                .collect();
            (Some(descriptors), names, offsets)
        } else {
            (None, Region::default(), Vec::new())
        };

        let library_versions =
            packer.aligned(image.library_versions.len() * LibraryVersion::SIZE);

        let library_features = if image.header.has_library_features() {
            packer.aligned(image.library_features.len() * LibraryVersion::SIZE)
        } else {
            packer.aligned(0)
        };

        let unicode_path = packer.aligned(
            image
                .debug_names
                .unicode_path
                .as_deref()
                .map_or(0, utf16_string_size),
        );
        let debug_path = packer.aligned(
            image
                .debug_names
                .full_path
                .as_ref()
                .map_or(0, |path| cstring_size(path.as_bytes())),
        );
        let logo_bitmap = packer.aligned(image.logo_bitmap.len());

        HeaderLayout {
            image_header,
            certificate,
            section_headers,
            shared_page_references,
            section_names,
            section_name_offsets,
            import_descriptors,
            import_names,
            import_name_offsets,
            library_versions,
            library_features,
            unicode_path,
            debug_path,
            logo_bitmap,
        }
    }

    /// Offset one past the packed content, which ends with the logo bitmap.
    #[must_use]
    pub fn end(&self) -> usize {
        self.logo_bitmap.end()
    }
}

/// The serialized header region.
#[derive(Debug, Clone)]
pub struct SerializedHeader {
    bytes: Vec<u8>,
    header: ImageHeader,
    layout: HeaderLayout,
}

impl SerializedHeader {
    /// The encoded header region, `size_of_headers` bytes long.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the encoded header region.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Length of the encoded header region.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the encoded region is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The image header as written, with every address recomputed.
    #[must_use]
    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// The offset table the region was written with.
    #[must_use]
    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }
}

/// Rebuilds the header region of an [`XbeImage`].
///
/// # Examples
///
/// ```rust,no_run
/// use xbexploder::{write::HeaderSerializer, XbeImage};
/// use std::path::Path;
///
/// let image = XbeImage::from_file(Path::new("default.xbe"))?;
/// let header = HeaderSerializer::new(&image).serialize()?;
/// assert_eq!(header.len(), image.header.size_of_headers as usize);
/// # Ok::<(), xbexploder::Error>(())
/// ```
pub struct HeaderSerializer<'a> {
    image: &'a XbeImage,
    layout: HeaderLayout,
}

impl<'a> HeaderSerializer<'a> {
    /// Create a serializer and compute the layout for `image`.
    #[must_use]
    pub fn new(image: &'a XbeImage) -> Self {
        HeaderSerializer {
            image,
            layout: HeaderLayout::compute(image),
        }
    }

    /// The offset table the region will be written with.
    #[must_use]
    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }

    /// Encode the header region.
    ///
    /// # Errors
    /// - [`crate::Error::InsufficientHeaderSpace`] if the packed structures run into the
    ///   retained PE header or past `size_of_headers`
    /// - [`crate::Error::AllocationFailed`] if the buffer can't be allocated
    /// - [`crate::Error::AddressOverflow`] if an address exceeds the 32-bit address space
    pub fn serialize(&self) -> Result<SerializedHeader> {
        let image = self.image;
        let layout = &self.layout;
        let size = image.header.size_of_headers as usize;

        let limit = image
            .secondary_header
            .as_ref()
            .map_or(size, |secondary| (secondary.offset as usize).min(size));
        if layout.end() > limit {
            return Err(Error::InsufficientHeaderSpace {
                required: u32::try_from(layout.end()).unwrap_or(u32::MAX),
                remaining: limit as u32,
            });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| Error::AllocationFailed { size })?;
        bytes.resize(size, 0);

        let header = self.relocated_header()?;
        let base = header.base_address;

        let mut writer = Writer::new(&mut bytes);
        header.write(&mut writer)?;

        writer.seek(layout.certificate.offset)?;
        Certificate::write(&image.certificate, &mut writer)?;

        writer.seek(layout.section_headers.offset)?;
        for (index, section) in image.sections.iter().enumerate() {
            let shared_page = layout.shared_page_references.offset + index * 2;
            let record = SectionHeader {
                section_name_address: address_of(layout.section_name_offsets[index], base)?,
                head_shared_page_reference_address: address_of(shared_page, base)?,
                tail_shared_page_reference_address: address_of(shared_page + 2, base)?,
                ..section.header.clone()
            };
            record.write(&mut writer)?;
        }

        writer.seek(layout.section_names.offset)?;
        for section in &image.sections {
            writer.write_cstring(section.name.as_bytes())?;
        }

        if let Some(descriptors) = layout.import_descriptors {
            writer.seek(descriptors.offset)?;
            for ((thunk_address, _), &name_offset) in
                image.imports.iter().zip(&layout.import_name_offsets)
            {
                ImportDescriptor {
                    thunk_address,
                    module_name_address: address_of(name_offset, base)?,
                }
                .write(&mut writer)?;
            }
            ImportDescriptor {
                thunk_address: 0,
                module_name_address: 0,
            }
            .write(&mut writer)?;

            for (_, module) in image.imports.iter() {
                writer.write_string_utf16(module)?;
            }
        }

        writer.seek(layout.library_versions.offset)?;
        for library in &image.library_versions {
            library.write(&mut writer)?;
        }

        if !layout.library_features.is_empty() {
            writer.seek(layout.library_features.offset)?;
            for feature in &image.library_features {
                feature.write(&mut writer)?;
            }
        }

        if let Some(unicode_path) = &image.debug_names.unicode_path {
            writer.seek(layout.unicode_path.offset)?;
            writer.write_string_utf16(unicode_path)?;
        }

        if let Some(full_path) = &image.debug_names.full_path {
            writer.seek(layout.debug_path.offset)?;
            writer.write_cstring(full_path.as_bytes())?;
        }

        writer.seek(layout.logo_bitmap.offset)?;
        writer.write_bytes(&image.logo_bitmap)?;

        if let Some(secondary) = &image.secondary_header {
            let offset = secondary.offset as usize;
            let fit = secondary.len().min(size.saturating_sub(offset));
            if fit < secondary.len() {
                warn!(
                    "Truncating PE header at 0x{:X} from {} to {} bytes",
                    offset,
                    secondary.len(),
                    fit
                );
            }
            if fit > 0 {
                writer.seek(offset)?;
                writer.write_bytes(&secondary.bytes[..fit])?;
            }
        }

        debug!(
            "Serialized header region: {} of {} bytes used, logo at 0x{:X}",
            layout.end(),
            size,
            layout.logo_bitmap.offset
        );

        Ok(SerializedHeader {
            bytes,
            header,
            layout: layout.clone(),
        })
    }

    fn relocated_header(&self) -> Result<ImageHeader> {
        let image = self.image;
        let layout = &self.layout;
        let base = image.header.base_address;
        let address = |region: &Region| address_of(region.offset, base);

        let mut header = image.header.clone();

        header.certificate_address = address(&layout.certificate)?;
        header.number_of_sections = image.sections.len() as u32;
        header.section_headers_address = address(&layout.section_headers)?;

        header.import_table_address = match &layout.import_descriptors {
            Some(descriptors) => address(descriptors)?,
            None => 0,
        };

        header.number_of_library_versions = image.library_versions.len() as u32;
        header.library_versions_address = if image.library_versions.is_empty() {
            0
        } else {
            address(&layout.library_versions)?
        };
        let library_address = |offset: Option<u32>| -> Result<u32> {
            match offset {
                Some(offset) => address_of(layout.library_versions.offset + offset as usize, base),
                None => Ok(0),
            }
        };
        header.kernel_library_version_address =
            library_address(image.library_version_refs.kernel)?;
        header.xapi_library_version_address = library_address(image.library_version_refs.xapi)?;

        if layout.library_features.is_empty() {
            header.library_features_address = 0;
            header.number_of_library_features = 0;
        } else {
            header.library_features_address = address(&layout.library_features)?;
            header.number_of_library_features = image.library_features.len() as u32;
        }

        header.unicode_file_name_address = match image.debug_names.unicode_path {
            Some(_) => address(&layout.unicode_path)?,
            None => 0,
        };
        (header.full_file_name_address, header.file_name_address) =
            match &image.debug_names.full_path {
                Some(_) => {
                    let full = address(&layout.debug_path)?;
                    let short = match image.debug_names.file_name_offset {
                        Some(offset) => full.checked_add(offset).ok_or(Error::AddressOverflow)?,
                        None => 0,
                    };
                    (full, short)
                }
                None => (0, 0),
            };

        if image.logo_bitmap.is_empty() {
            header.logo_bitmap_address = 0;
            header.logo_bitmap_size = 0;
        } else {
            header.logo_bitmap_address = address(&layout.logo_bitmap)?;
            header.logo_bitmap_size = image.logo_bitmap.len() as u32;
        }

        header.pe_base_address = match &image.secondary_header {
            Some(secondary) => address_of(secondary.offset as usize, base)?,
            None => 0,
        };
        header.code_view_debug_info_address = 0;

        Ok(header)
    }
}
