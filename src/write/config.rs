//! Configuration for section insertion
//!
//! This module provides the knobs the planner and the patch pipeline use when a new section
//! is added to an image.

use crate::{
    file::address::PAGE_SIZE,
    xbe::SectionFlags,
};

/// How the patched image is written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// Patch a temporary copy next to the target and move it over the target when complete.
    /// An interrupted run leaves the original file untouched.
    #[default]
    AtomicReplace,
    /// Append the section data to the target, then overwrite its header region.
    InPlace,
}

/// Configuration for adding a section to an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionConfig {
    /// Alignment of the new section's virtual address (default: 4096)
    pub section_alignment: u32,

    /// Alignment of the new section's file offset (default: 4096)
    pub file_alignment: u32,

    /// Extra header bytes reserved to absorb alignment padding (default: 16)
    pub header_slack: u32,

    /// Flags of the new section (default: writable, preload, executable)
    pub flags: SectionFlags,

    /// Drop an embedded PE header when the header region is too small otherwise
    pub allow_secondary_eviction: bool,

    /// How the patched image is written
    pub write_strategy: WriteStrategy,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            section_alignment: PAGE_SIZE,
            file_alignment: PAGE_SIZE,
            header_slack: 16,
            flags: SectionFlags::WRITABLE | SectionFlags::PRELOAD | SectionFlags::EXECUTABLE,
            allow_secondary_eviction: true,
            write_strategy: WriteStrategy::AtomicReplace,
        }
    }
}

impl SectionConfig {
    /// Creates a configuration that packs the new section's virtual address on a 16 byte
    /// boundary instead of a page boundary.
    ///
    /// Some images place sections back to back in memory; this keeps the address space of
    /// such images compact.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            section_alignment: 16,
            ..Self::default()
        }
    }

    /// Creates a configuration that never drops an embedded PE header.
    ///
    /// Insertion fails with [`crate::Error::InsufficientHeaderSpace`] instead.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            allow_secondary_eviction: false,
            ..Self::default()
        }
    }

    /// Returns this configuration with the given write strategy.
    #[must_use]
    pub fn with_write_strategy(mut self, write_strategy: WriteStrategy) -> Self {
        self.write_strategy = write_strategy;
        self
    }
}
