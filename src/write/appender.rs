//! Zero-filled extension of the file tail for new section data.

use std::io::{Seek, SeekFrom, Write};

use log::debug;

use crate::{file::address::align_up, Error, Result};

const ZERO_CHUNK: [u8; 0x1000] = [0; 0x1000];

/// File range written by [`SectionAppender::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedRegion {
    /// File offset of the first appended byte
    pub raw_offset: u64,
    /// Number of bytes appended
    pub raw_size: u64,
}

/// Extends a file with zeroed, aligned blocks.
#[derive(Debug, Clone, Copy)]
pub struct SectionAppender {
    alignment: u32,
}

impl SectionAppender {
    /// Create an appender that rounds every block up to `alignment` bytes.
    #[must_use]
    pub fn new(alignment: u32) -> Self {
        SectionAppender { alignment }
    }

    /// Append `size` bytes, rounded up to the alignment, of zeros at the end of `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::AddressOverflow`] if the rounded size overflows, or
    /// [`crate::Error::FileError`] if the file can't be extended.
    pub fn append<F: Write + Seek>(&self, file: &mut F, size: u32) -> Result<AppendedRegion> {
        let raw_size = align_up(size, self.alignment).ok_or(Error::AddressOverflow)?;
        let raw_offset = file.seek(SeekFrom::End(0))?;

        write_zeros(file, u64::from(raw_size))?;
        file.flush()?;

        debug!("Appended 0x{:X} bytes at 0x{:X}", raw_size, raw_offset);

        Ok(AppendedRegion {
            raw_offset,
            raw_size: u64::from(raw_size),
        })
    }

    /// Zero-extend `file` until it is `offset` bytes long.
    ///
    /// Returns the number of bytes written; a file already at least `offset` bytes long is
    /// left alone.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can't be extended.
    pub fn pad_to<F: Write + Seek>(&self, file: &mut F, offset: u64) -> Result<u64> {
        let end = file.seek(SeekFrom::End(0))?;
        let Some(padding) = offset.checked_sub(end).filter(|&padding| padding > 0) else {
            return Ok(0);
        };

        write_zeros(file, padding)?;
        debug!("Padded file from 0x{:X} to 0x{:X}", end, offset);
        Ok(padding)
    }
}

fn write_zeros<F: Write>(file: &mut F, mut len: u64) -> Result<()> {
    while len > 0 {
        let chunk = len.min(ZERO_CHUNK.len() as u64) as usize;
        file.write_all(&ZERO_CHUNK[..chunk])?;
        len -= chunk as u64;
    }
    Ok(())
}
