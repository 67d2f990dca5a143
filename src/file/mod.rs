//! File access, byte cursors and address translation.
//!
//! This module is the bottom layer of the crate. It abstracts over where the executable's
//! bytes come from, and provides the bounds-checked primitives every other component uses to
//! decode and encode the XBE header region.
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::File`] - A loaded executable image (memory-mapped or in memory)
//! - [`crate::file::Backend`] - Trait for different data sources
//!
//! ## Encoding Infrastructure
//! - [`crate::file::parser::Parser`] - Read cursor used by the header parser
//! - [`crate::file::writer::Writer`] - Write cursor used by the header serializer
//! - [`crate::file::io`] - Little-endian primitives both cursors are built on
//! - [`crate::file::address`] - Virtual address / header offset translation and alignment
//!
//! # Examples
//!
//! ```rust,no_run
//! use xbexploder::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("default.xbe"))?;
//! println!("Loaded {} bytes", file.len());
//! assert_eq!(file.data_slice(0, 4)?, b"XBEH");
//! # Ok::<(), xbexploder::Error>(())
//! ```

pub mod address;
pub mod io;
pub mod parser;
pub mod writer;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// Abstracts over the source of the executable's bytes so that parsing works the same for a
/// file on disk and a buffer already held in memory.
pub trait Backend {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A loaded executable image.
///
/// `File` owns the backend holding the raw bytes. It performs no interpretation of its own;
/// see [`crate::XbeImage::parse`] for that.
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
}

impl File {
    /// Memory-maps the executable at `file`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file can't be opened,
    /// [`crate::Error::Error`] if it can't be mapped, or [`crate::Error::Empty`] if it holds no
    /// data.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;
        Self::load(input)
    }

    /// Wraps an executable image that is already in memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);
        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
        })
    }

    /// Returns the total size of the loaded image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the loaded image holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the complete image data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}
