//! # xbexploder Prelude
//!
//! This module provides a convenient prelude for the most commonly used types of the
//! xbexploder library. Import this module to get quick access to the essential types for
//! inspecting and patching XBE files.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all xbexploder operations
pub use crate::Error;

/// The result type used throughout xbexploder
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The parsed header region of an XBE file
pub use crate::XbeImage;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Header Model
// ================================================================================================

/// Header records
pub use crate::xbe::{
    Certificate, DebugNames, ImageHeader, ImageKind, ImportDirectory, LibraryVersion,
    LibraryVersionRefs, NarrowString, SecondaryHeader, Section, SectionFlags, SectionHeader,
};

// ================================================================================================
// Section Insertion
// ================================================================================================

/// Planning, serialization and output
pub use crate::write::{
    add_section, add_section_to_bytes, HeaderSerializer, InsertionPlan, LayoutPlanner,
    SecondaryHeaderDecision, SectionConfig, SectionReport, WriteStrategy,
};
