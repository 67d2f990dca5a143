//! Debug file names recorded by the image builder.

use crate::xbe::NarrowString;

/// The build path of the image in its narrow and wide forms.
///
/// The header points the short file name into the middle of the narrow path. That position
/// is kept as an offset so it can be re-derived after the path moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugNames {
    /// Narrow full path, `None` if the header had no address
    pub full_path: Option<NarrowString>,
    /// Byte offset of the short file name within [`DebugNames::full_path`]
    pub file_name_offset: Option<u32>,
    /// Wide full path, `None` if the header had no address
    pub unicode_path: Option<String>,
}

impl DebugNames {
    /// The short file name, taken from the tail of the full path.
    #[must_use]
    pub fn file_name(&self) -> Option<&[u8]> {
        self.full_path.as_ref()?.tail(self.file_name_offset? as usize)
    }
}
