// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # xbexploder
//!
//! A library for parsing, modifying and rebuilding the header region of original Xbox
//! executables (XBE). Its main use is adding a new, zero-filled loadable section to an
//! existing title, for example to make room for patch code.
//!
//! ## Features
//!
//! - **📦 Typed header model** - Image header, certificate, sections, imports, library
//!   stamps, debug paths, logo and the embedded PE header as owned Rust values
//! - **📐 Address recomputation** - The serializer repacks every variable-length structure
//!   and derives all address fields from the new layout
//! - **✂️ Header space management** - Drops the embedded PE header only when the new
//!   section metadata wouldn't fit otherwise
//! - **🛡️ Safe writes** - Patches a temporary copy and atomically replaces the target
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xbexploder::prelude::*;
//! use std::path::Path;
//!
//! let report = add_section(Path::new("default.xbe"), "hack", 0x2000, &SectionConfig::default())?;
//! println!(
//!     "Section {} at 0x{:08X}, file offset 0x{:X}",
//!     report.name, report.virtual_address, report.raw_address
//! );
//! # Ok::<(), xbexploder::Error>(())
//! ```
//!
//! ### Inspecting an Image
//!
//! ```rust,no_run
//! use xbexploder::XbeImage;
//! use std::path::Path;
//!
//! let image = XbeImage::from_file(Path::new("default.xbe"))?;
//! println!("Title: {}", image.certificate.title());
//! for section in &image.sections {
//!     println!(
//!         "{:<12} 0x{:08X} 0x{:X}",
//!         section.name, section.header.virtual_address, section.header.virtual_size
//!     );
//! }
//! for (thunk, module) in image.imports.iter() {
//!     println!("import {} @ 0x{:08X}", module, thunk);
//! }
//! # Ok::<(), xbexploder::Error>(())
//! ```
//!
//! ### Step by Step
//!
//! The pipeline behind [`add_section`] is available piece by piece:
//!
//! ```rust,no_run
//! use xbexploder::{
//!     write::{HeaderSerializer, LayoutPlanner, SectionConfig},
//!     XbeImage,
//! };
//!
//! let data = std::fs::read("default.xbe")?;
//! let mut image = XbeImage::parse(&data)?;
//!
//! let plan = LayoutPlanner::new(&image, &SectionConfig::default()).plan("hack", 0x100)?;
//! println!("Header space: {:?}", plan.header_space);
//! plan.apply(&mut image);
//!
//! let header = HeaderSerializer::new(&image).serialize()?;
//! println!("Header region is 0x{:X} bytes", header.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - File backends, byte cursors and address translation
//! - [`xbe`] - The header model and its parser
//! - [`write`] - Layout planning, serialization and the section insertion pipeline
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use xbexploder::{Error, XbeImage};
//!
//! match XbeImage::from_file(std::path::Path::new("default.xbe")) {
//!     Ok(image) => println!("{} sections", image.sections.len()),
//!     Err(Error::InvalidMagic { found }) => println!("Not an XBE: 0x{:08X}", found),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed file: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run xbe --release
//! ```
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use xbexploder::prelude::*;
///
/// let image = XbeImage::from_file("default.xbe".as_ref())?;
/// println!("{} sections", image.sections.len());
/// # Ok::<(), xbexploder::Error>(())
/// ```
pub mod prelude;

/// File access, byte cursors and address translation
///
/// - [`file::File`] - Memory-mapped or in-memory view of an input file
/// - [`file::parser::Parser`] / [`file::writer::Writer`] - Bounds-checked little-endian cursors
/// - [`file::address`] - Conversion between virtual addresses and header offsets
pub mod file;

/// The XBE header model
///
/// [`xbe::XbeImage`] holds every structure of the header region as an owned value. It is
/// produced by [`xbe::XbeImage::parse`] and turned back into bytes by
/// [`write::HeaderSerializer`].
pub mod xbe;

/// Section insertion: planning, serialization and output
///
/// # Key Types
///
/// - [`write::LayoutPlanner`] - Places a new section and checks the header space
/// - [`write::HeaderSerializer`] - Packs the header region and recomputes addresses
/// - [`write::SectionAppender`] - Extends the file with the new section's data
/// - [`write::add_section`] - The complete pipeline on a file
pub mod write;

/// `xbexploder` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `xbexploder` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Main entry point for working with XBE files.
///
/// # Example
///
/// ```rust,no_run
/// use xbexploder::XbeImage;
/// let image = XbeImage::from_file(std::path::Path::new("default.xbe"))?;
/// println!("Base address: 0x{:08X}", image.header.base_address);
/// # Ok::<(), xbexploder::Error>(())
/// ```
pub use xbe::XbeImage;

/// Adds a section to an XBE file, see [`write::add_section`].
pub use write::{add_section, SectionConfig, SectionReport};

/// Low-level file parsing utilities.
///
/// # Example
///
/// ```rust
/// use xbexploder::Parser;
/// let data = [0x58, 0x42, 0x45, 0x48];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_le::<u32>()?, 0x4845_4258);
/// # Ok::<(), xbexploder::Error>(())
/// ```
pub use file::{parser::Parser, File};
