//! Physical file backend for memory-mapped I/O.
//!
//! This module provides the [`crate::file::physical::Physical`] backend that implements the
//! [`crate::file::Backend`] trait for accessing an executable on disk through a read-only
//! memory mapping. Only the header region and a few magic bytes are ever touched while
//! parsing, so mapping avoids reading multi-megabyte section data that is never used.
//!
//! The mapping must be dropped before the file is replaced on disk; the patch pipeline in
//! [`crate::write`] scopes the [`crate::file::File`] accordingly.

use super::Backend;
use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A file backend that uses memory-mapped I/O for efficient access to files on disk.
///
/// All access operations include bounds checking to ensure memory safety.
///
/// # Examples
///
/// ```rust,ignore
/// use xbexploder::file::{Physical, Backend};
/// use std::path::Path;
///
/// let physical = Physical::new(Path::new("default.xbe"))?;
/// assert_eq!(physical.data_slice(0, 4)?, b"XBEH");
/// # Ok::<(), xbexploder::Error>(())
/// ```
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Create a new physical file backend by memory-mapping the specified file.
    ///
    /// # Arguments
    /// * `path` - Path to the executable on disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(crate::Error::OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(crate::Error::OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        let mut data = vec![0xCC_u8; 0x2000];
        data[..4].copy_from_slice(b"XBEH");
        temp.write_all(&data).unwrap();
        temp.flush().unwrap();

        let physical = Physical::new(temp.path()).unwrap();

        assert_eq!(physical.len(), 0x2000);
        assert_eq!(physical.data_slice(0, 4).unwrap(), b"XBEH");
        assert_eq!(physical.data()[0x1FFF], 0xCC);
        assert!(physical.data_slice(0x1FFF, 2).is_err());
        assert!(physical.data_slice(usize::MAX, 1).is_err());
    }

    #[test]
    fn test_physical_invalid_file_path() {
        let result = Physical::new("/nonexistent/path/to/default.xbe");
        assert!(result.is_err());
        match result.unwrap_err() {
            FileError(io_error) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected FileError"),
        }
    }
}
