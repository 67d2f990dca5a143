//! The non-kernel import directory.
//!
//! Titles that import from modules other than the kernel carry an array of
//! [`ImportDescriptor`] records terminated by a descriptor with a zero thunk address. The
//! loader expects the array sorted by thunk address, so the in-memory form is an ordered map.

use std::collections::{btree_map, BTreeMap};

use crate::{
    file::{parser::Parser, writer::Writer},
    Result,
};

/// One on-disk entry of the import descriptor array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportDescriptor {
    /// Address of the thunk table patched by the loader, zero for the terminator
    pub thunk_address: u32,
    /// Address of the NUL-terminated UTF-16 module name
    pub module_name_address: u32,
}

impl ImportDescriptor {
    /// Size of one on-disk record.
    pub const SIZE: usize = 8;

    /// Read one record and advance the parser past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record is truncated.
    pub fn read(parser: &mut Parser) -> Result<ImportDescriptor> {
        Ok(ImportDescriptor {
            thunk_address: parser.read_le::<u32>()?,
            module_name_address: parser.read_le::<u32>()?,
        })
    }

    /// Write one record and advance the writer past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the record does not fit.
    pub fn write(&self, writer: &mut Writer) -> Result<()> {
        writer.write_le(self.thunk_address)?;
        writer.write_le(self.module_name_address)
    }

    /// Returns `true` for the zero descriptor terminating the array.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.thunk_address == 0
    }
}

/// Imported module names keyed by thunk address, iterated in ascending address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDirectory {
    entries: BTreeMap<u32, String>,
}

impl ImportDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `module` for `thunk_address`.
    ///
    /// Returns `false` and keeps the existing entry if the thunk address is already present.
    pub fn insert(&mut self, thunk_address: u32, module: impl Into<String>) -> bool {
        match self.entries.entry(thunk_address) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(module.into());
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// The module imported through `thunk_address`.
    #[must_use]
    pub fn get(&self, thunk_address: u32) -> Option<&str> {
        self.entries.get(&thunk_address).map(String::as_str)
    }

    /// Number of imported modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no module is imported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending thunk address order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries
            .iter()
            .map(|(&thunk_address, module)| (thunk_address, module.as_str()))
    }
}
