//! Byte-preserving narrow strings.

use std::{borrow::Cow, fmt};

/// A narrow header string: section names and the debug path.
///
/// The bytes are whatever code page the build machine used, so they are stored verbatim and
/// only decoded (lossily, as UTF-8) for display. Writing the image back reproduces them byte
/// for byte.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NarrowString(Vec<u8>);

impl NarrowString {
    /// Wrap raw string bytes, without the terminator.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        NarrowString(bytes)
    }

    /// The stored bytes, without the terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes, without the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The string as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// The string as UTF-8 with invalid sequences replaced.
    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// The bytes from `offset` to the end, if `offset` is within the string.
    #[must_use]
    pub fn tail(&self, offset: usize) -> Option<&[u8]> {
        self.0.get(offset..)
    }
}

impl fmt::Display for NarrowString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_string_lossy())
    }
}

impl fmt::Debug for NarrowString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

impl From<&str> for NarrowString {
    fn from(value: &str) -> Self {
        NarrowString(value.as_bytes().to_vec())
    }
}

impl From<String> for NarrowString {
    fn from(value: String) -> Self {
        NarrowString(value.into_bytes())
    }
}

impl From<&[u8]> for NarrowString {
    fn from(value: &[u8]) -> Self {
        NarrowString(value.to_vec())
    }
}

impl PartialEq<str> for NarrowString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for NarrowString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}
