//! Geometry and header-space planning for a new section.
//!
//! [`LayoutPlanner`] decides where a new section goes in memory and in the file, and whether
//! the header region has room for its metadata. It never touches the image; the result is
//! an [`InsertionPlan`] that is applied in one step, so a failed plan leaves the model exactly
//! as it was parsed.
//!
//! # Header Space
//!
//! The metadata of a new section (one section header record plus its name) has to fit
//! between the end of the logo bitmap as the input file stores it and either the embedded PE
//! header, if the image has one, or the end of the header region. When it doesn't, the PE
//! header is dropped as long as that frees enough room:
//!
//! ```text
//! |- header structures -|---- remaining ----|- PE header -|
//! |- header structures -|-------- after eviction --------|
//! 0                  logo end                    size_of_headers
//! ```
//!
//! An image without a logo has no stored end marker, so the packed length of the model is
//! used instead.

use log::{debug, info};

use crate::{
    file::address::{align_up, offset_of, STRUCTURE_ALIGNMENT},
    write::{config::SectionConfig, serializer::HeaderLayout},
    xbe::{Section, SecondaryHeaderDecision, SectionHeader, XbeImage},
    Error, Result,
};

/// Header space needed by and available to the new section metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSpace {
    /// Bytes needed for the section header record, its name and alignment slack
    pub required: u32,
    /// Bytes free before the PE header or the end of the header region
    pub remaining: u32,
}

/// Everything that changes in an image when the new section is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPlan {
    /// The new section; name and shared page addresses are assigned by the serializer
    pub section: Section,
    /// Section count after insertion
    pub number_of_sections: u32,
    /// Header region size after insertion
    pub size_of_headers: u32,
    /// Image size after insertion
    pub size_of_image: u32,
    /// What happens to the embedded PE header
    pub secondary_header: SecondaryHeaderDecision,
    /// The header space check the decision was based on
    pub header_space: HeaderSpace,
}

impl InsertionPlan {
    /// Apply the plan to the image it was computed for.
    pub fn apply(self, image: &mut XbeImage) {
        image.sections.push(self.section);
        image.header.number_of_sections = self.number_of_sections;
        image.header.size_of_headers = self.size_of_headers;
        image.header.size_of_image = self.size_of_image;

        if self.secondary_header == SecondaryHeaderDecision::Evicted {
            image.secondary_header = None;
            image.header.pe_base_address = 0;
        }
    }
}

/// Offset one past the logo bitmap as recorded in the image header.
fn logo_end(image: &XbeImage) -> Result<u32> {
    let header = &image.header;
    if header.logo_bitmap_address == 0 {
        let packed = HeaderLayout::compute(image).end();
        return u32::try_from(packed).map_err(|_| Error::AddressOverflow);
    }

    offset_of(header.logo_bitmap_address, header.base_address)?
        .checked_add(header.logo_bitmap_size)
        .ok_or(Error::AddressOverflow)
}

/// Plans the insertion of a section after the last section of an image.
pub struct LayoutPlanner<'a> {
    image: &'a XbeImage,
    config: SectionConfig,
}

impl<'a> LayoutPlanner<'a> {
    /// Create a planner for `image`.
    #[must_use]
    pub fn new(image: &'a XbeImage, config: &SectionConfig) -> Self {
        LayoutPlanner {
            image,
            config: *config,
        }
    }

    /// Plan a section called `name` holding `size` bytes.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidSectionName`] if `name` is empty or contains a NUL byte
    /// - [`crate::Error::NoSections`] if the image has no section to follow
    /// - [`crate::Error::InsufficientHeaderSpace`] if the metadata doesn't fit, even after
    ///   dropping the PE header where allowed
    /// - [`crate::Error::AddressOverflow`] if the new section leaves the 32-bit address space
    pub fn plan(&self, name: &str, size: u32) -> Result<InsertionPlan> {
        if name.is_empty() || name.contains('\0') {
            return Err(Error::InvalidSectionName(name.to_string()));
        }

        let image = self.image;
        let (Some(first), Some(last)) = (image.sections.first(), image.sections.last()) else {
            return Err(Error::NoSections);
        };

        let virtual_address = last
            .header
            .virtual_end()
            .and_then(|end| align_up(end, self.config.section_alignment))
            .ok_or(Error::AddressOverflow)?;
        let raw_address = last
            .header
            .raw_end()
            .and_then(|end| align_up(end, self.config.file_alignment))
            .ok_or(Error::AddressOverflow)?;
        let virtual_size = align_up(size, STRUCTURE_ALIGNMENT).ok_or(Error::AddressOverflow)?;

        let size_of_headers =
            offset_of(first.header.virtual_address, image.header.base_address)?;

        let content_end = logo_end(image)?;
        let limit = image
            .secondary_header
            .as_ref()
            .map_or(size_of_headers, |secondary| secondary.offset);

        let header_space = HeaderSpace {
            required: u32::try_from(name.len())
                .ok()
                .and_then(|len| len.checked_add(SectionHeader::SIZE as u32))
                .and_then(|len| len.checked_add(self.config.header_slack))
                .and_then(|len| align_up(len, STRUCTURE_ALIGNMENT))
                .ok_or(Error::AddressOverflow)?,
            remaining: limit.saturating_sub(content_end),
        };

        let mut secondary_header = match image.secondary_header {
            Some(_) => SecondaryHeaderDecision::Retained,
            None => SecondaryHeaderDecision::Absent,
        };

        if header_space.required > header_space.remaining {
            let evictable = secondary_header == SecondaryHeaderDecision::Retained
                && self.config.allow_secondary_eviction
                && size_of_headers.saturating_sub(content_end) >= header_space.required;
            if !evictable {
                return Err(Error::InsufficientHeaderSpace {
                    required: header_space.required,
                    remaining: header_space.remaining,
                });
            }

            info!(
                "Not enough header space for section {} ({} of {} bytes), dropping the PE header",
                name, header_space.remaining, header_space.required
            );
            secondary_header = SecondaryHeaderDecision::Evicted;
        }

        let size_of_image = image
            .header
            .size_of_image
            .checked_add(virtual_size)
            .ok_or(Error::AddressOverflow)?;
        let number_of_sections =
            u32::try_from(image.sections.len() + 1).map_err(|_| Error::AddressOverflow)?;

        debug!(
            "Planned section {}: va 0x{:08X} size 0x{:X}, raw 0x{:X}, header space {}/{}",
            name,
            virtual_address,
            virtual_size,
            raw_address,
            header_space.required,
            header_space.remaining
        );

        Ok(InsertionPlan {
            section: Section {
                header: SectionHeader {
                    flags: self.config.flags,
                    virtual_address,
                    virtual_size,
                    raw_address,
                    raw_size: virtual_size,
                    section_name_address: 0,
                    section_name_reference_count: 0,
                    head_shared_page_reference_address: 0,
                    tail_shared_page_reference_address: 0,
                    digest: [0; 20],
                },
                name: name.into(),
            },
            number_of_sections,
            size_of_headers,
            size_of_image,
            secondary_header,
            header_space,
        })
    }
}
