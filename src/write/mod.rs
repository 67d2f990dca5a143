//! Section insertion pipeline for persisting a new section into an XBE file.
//!
//! This module ties the header model to the file on disk. Adding a section consists of
//! several phases:
//!
//! ## Phase 1: Parsing
//! The file is loaded through [`crate::File`] and decoded into an [`crate::xbe::XbeImage`].
//! The mapping is released before anything is written.
//!
//! ## Phase 2: Layout Planning
//! [`crate::write::LayoutPlanner`] computes the new section's addresses and checks that its
//! metadata fits into the header region, dropping the embedded PE header where allowed.
//!
//! ## Phase 3: Header Serialization
//! The plan is applied to the image and [`crate::write::HeaderSerializer`] packs the complete
//! header region with every address recomputed.
//!
//! ## Phase 4: Output
//! The file is zero-extended up to the new section's raw address, the section data is
//! appended by [`crate::write::SectionAppender`] and the header region is overwritten last.
//! With [`crate::write::WriteStrategy::AtomicReplace`] all of this happens on a temporary copy
//! that replaces the target once it is complete.
//!
//! Every format and layout error is raised before the first write, so a failed call leaves
//! the target file as it was.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use xbexploder::write::{add_section, SectionConfig};
//! use std::path::Path;
//!
//! let report = add_section(Path::new("default.xbe"), "hack", 0x1000, &SectionConfig::default())?;
//! println!("{} at 0x{:08X}", report.name, report.virtual_address);
//! # Ok::<(), xbexploder::Error>(())
//! ```

use std::{
    io::{Cursor, Seek, SeekFrom, Write},
    path::Path,
};

use log::{debug, info};

use crate::{
    file::File,
    xbe::XbeImage,
    Error, Result,
};

mod appender;
mod config;
mod output;
mod planner;
mod serializer;

pub use crate::xbe::SecondaryHeaderDecision;
pub use appender::{AppendedRegion, SectionAppender};
pub use config::{SectionConfig, WriteStrategy};
pub use output::Output;
pub use planner::{HeaderSpace, InsertionPlan, LayoutPlanner};
pub use serializer::{HeaderLayout, HeaderSerializer, Region, SerializedHeader};

/// Summary of a section added by [`add_section`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionReport {
    /// Name of the new section
    pub name: String,
    /// Virtual address of the new section
    pub virtual_address: u32,
    /// Virtual size recorded in the section header
    pub virtual_size: u32,
    /// File offset of the section data
    pub raw_address: u32,
    /// Raw size recorded in the section header
    pub raw_size: u32,
    /// Bytes appended to the file for the section data
    pub appended_size: u64,
    /// Number of sections after insertion
    pub number_of_sections: u32,
    /// What happened to the embedded PE header
    pub secondary_header: SecondaryHeaderDecision,
}

/// A fully planned and serialized insertion that hasn't touched any file yet.
struct PreparedInsertion {
    header: SerializedHeader,
    report: SectionReport,
    size: u32,
}

/// Adds a zero-filled section called `name` with `size` bytes to the XBE file at `path`.
///
/// # Arguments
///
/// * `path` - The XBE file to patch
/// * `name` - Name of the new section, non-empty and without NUL bytes
/// * `size` - Size of the section data in bytes
/// * `config` - Alignment, flags and write strategy of the insertion
///
/// # Errors
///
/// Returns any parse error of [`XbeImage::parse`], any planning error of
/// [`LayoutPlanner::plan`], [`crate::Error::InsufficientHeaderSpace`] if the packed header
/// doesn't fit, [`crate::Error::WriteLayoutFailed`] if the new header or section data would
/// overlap existing data, and [`crate::Error::FileError`] or
/// [`crate::Error::WriteFinalizationFailed`] for I/O failures.
pub fn add_section(
    path: &Path,
    name: &str,
    size: u32,
    config: &SectionConfig,
) -> Result<SectionReport> {
    let prepared = {
        let file = File::from_file(path)?;
        prepare(file.data(), name, size, config)?
    };

    let mut output = match config.write_strategy {
        WriteStrategy::AtomicReplace => Output::atomic(path)?,
        WriteStrategy::InPlace => Output::in_place(path)?,
    };

    let appended = commit(output.file_mut(), &prepared, config)?;
    output.finalize()?;

    Ok(finish(prepared, appended))
}

/// Adds a zero-filled section to an XBE image held in memory.
///
/// Returns the patched image together with the insertion report; the write strategy of
/// `config` is ignored.
///
/// # Errors
///
/// Returns the same errors as [`add_section`], except for file I/O errors.
pub fn add_section_to_bytes(
    data: Vec<u8>,
    name: &str,
    size: u32,
    config: &SectionConfig,
) -> Result<(Vec<u8>, SectionReport)> {
    if data.is_empty() {
        return Err(Error::Empty);
    }

    let prepared = prepare(&data, name, size, config)?;

    let mut cursor = Cursor::new(data);
    let appended = commit(&mut cursor, &prepared, config)?;

    Ok((cursor.into_inner(), finish(prepared, appended)))
}

fn prepare(
    data: &[u8],
    name: &str,
    size: u32,
    config: &SectionConfig,
) -> Result<PreparedInsertion> {
    let mut image = XbeImage::parse(data)?;
    let file_len = data.len() as u64;
    let image_data_start = image.image_data_start();

    let plan = LayoutPlanner::new(&image, config).plan(name, size)?;

    let section = &plan.section.header;
    if u64::from(section.raw_address) < file_len {
        return Err(Error::WriteLayoutFailed {
            message: format!(
                "Section data at 0x{:X} would overwrite the file ending at 0x{:X}",
                section.raw_address, file_len
            ),
        });
    }

    let report = SectionReport {
        name: name.to_string(),
        virtual_address: section.virtual_address,
        virtual_size: section.virtual_size,
        raw_address: section.raw_address,
        raw_size: section.raw_size,
        appended_size: 0,
        number_of_sections: plan.number_of_sections,
        secondary_header: plan.secondary_header,
    };

    plan.apply(&mut image);
    let header = HeaderSerializer::new(&image).serialize()?;

    if let Some(start) = image_data_start {
        if header.len() > start as usize {
            return Err(Error::WriteLayoutFailed {
                message: format!(
                    "Header region of 0x{:X} bytes overlaps section data at 0x{:X}",
                    header.len(),
                    start
                ),
            });
        }
    }

    debug!(
        "Prepared header of 0x{:X} bytes for {} sections",
        header.len(),
        report.number_of_sections
    );

    Ok(PreparedInsertion {
        header,
        report,
        size,
    })
}

/// Writes section data first and the header last.
fn commit<F: Write + Seek>(
    file: &mut F,
    prepared: &PreparedInsertion,
    config: &SectionConfig,
) -> Result<AppendedRegion> {
    let appender = SectionAppender::new(config.file_alignment);
    appender.pad_to(file, u64::from(prepared.report.raw_address))?;
    let appended = appender.append(file, prepared.size)?;

    if appended.raw_offset != u64::from(prepared.report.raw_address) {
        return Err(Error::WriteLayoutFailed {
            message: format!(
                "Section data landed at 0x{:X} instead of 0x{:X}",
                appended.raw_offset, prepared.report.raw_address
            ),
        });
    }

    file.seek(SeekFrom::Start(0))?;
    file.write_all(prepared.header.as_bytes())?;
    file.flush()?;

    Ok(appended)
}

fn finish(prepared: PreparedInsertion, appended: AppendedRegion) -> SectionReport {
    let mut report = prepared.report;
    report.appended_size = appended.raw_size;

    info!(
        "Added section {} at 0x{:08X} (0x{:X} bytes), raw 0x{:X}, PE header {:?}",
        report.name,
        report.virtual_address,
        report.virtual_size,
        report.raw_address,
        report.secondary_header
    );

    report
}
