//! Output file handling for patched images.
//!
//! This module provides the [`crate::write::output::Output`] type the patch pipeline writes
//! through. It implements the two [`crate::write::WriteStrategy`] variants:
//!
//! ## Atomic Replace
//! The target is copied into a temporary file in the same directory, the copy is patched,
//! and only a fully written and synced copy is renamed over the target. An interrupted run
//! leaves the original untouched; the temporary file is removed when the [`Output`] is
//! dropped without being finalized.
//!
//! ## In Place
//! The target itself is opened for writing. The pipeline appends section data before it
//! overwrites the header, so a crash never leaves a header pointing at missing data.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use std::io::Write;
//! use crate::write::output::Output;
//!
//! let mut output = Output::atomic("default.xbe")?;
//! output.file_mut().write_all(b"XBEH")?;
//! output.finalize()?;
//! # Ok::<(), crate::Error>(())
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::{Error, Result};

enum Target {
    Temporary(NamedTempFile),
    Direct(fs::File),
}

/// A writable view of the image being patched.
pub struct Output {
    /// Where writes go
    target: Target,

    /// The file being patched
    target_path: PathBuf,
}

impl Output {
    /// Create a temporary copy of `target_path` to patch.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the target can't be read or the copy can't be
    /// created.
    pub fn atomic<P: AsRef<Path>>(target_path: P) -> Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();
        let directory = match target_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temporary = tempfile::Builder::new()
            .prefix(".xbexploder-")
            .suffix(".tmp")
            .tempfile_in(directory)?;

        let mut source = fs::File::open(&target_path)?;
        io::copy(&mut source, temporary.as_file_mut())?;

        Ok(Self {
            target: Target::Temporary(temporary),
            target_path,
        })
    }

    /// Open `target_path` for patching in place.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the target can't be opened for writing.
    pub fn in_place<P: AsRef<Path>>(target_path: P) -> Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&target_path)?;

        Ok(Self {
            target: Target::Direct(file),
            target_path,
        })
    }

    /// The file writes go to.
    pub fn file_mut(&mut self) -> &mut fs::File {
        match &mut self.target {
            Target::Temporary(temporary) => temporary.as_file_mut(),
            Target::Direct(file) => file,
        }
    }

    /// Flushes all writes to disk and, for an atomic output, moves the patched copy over the
    /// target while keeping the target's permissions.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteFinalizationFailed`] if syncing or renaming fails.
    pub fn finalize(self) -> Result<()> {
        match self.target {
            Target::Temporary(temporary) => {
                let permissions = fs::metadata(&self.target_path)
                    .map_err(|e| Error::WriteFinalizationFailed {
                        message: format!("Failed to read target permissions: {e}"),
                    })?
                    .permissions();

                let file = temporary.as_file();
                file.sync_all()
                    .and_then(|()| file.set_permissions(permissions))
                    .map_err(|e| Error::WriteFinalizationFailed {
                        message: format!("Failed to sync temporary file: {e}"),
                    })?;

                temporary
                    .persist(&self.target_path)
                    .map_err(|e| Error::WriteFinalizationFailed {
                        message: format!(
                            "Failed to replace {}: {}",
                            self.target_path.display(),
                            e.error
                        ),
                    })?;
            }
            Target::Direct(file) => {
                file.sync_all().map_err(|e| Error::WriteFinalizationFailed {
                    message: format!("Failed to sync {}: {e}", self.target_path.display()),
                })?;
            }
        }

        Ok(())
    }
}
