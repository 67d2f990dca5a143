use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Format errors are raised while parsing the header region and therefore always occur before
/// anything is written. Layout errors are raised while planning or packing a new header and,
/// as well, occur before the target file is touched. Only I/O errors can surface after the
/// first write, and with [`crate::write::WriteStrategy::AtomicReplace`] even those leave the
/// original file intact.
///
/// # Error Categories
///
/// ## Format Errors
/// - [`Error::InvalidMagic`] - The image does not start with `XBEH`
/// - [`Error::HeaderTooSmall`] - Declared image header size below the minimum
/// - [`Error::CertificateTooSmall`] - Declared certificate size below the minimum
/// - [`Error::OutOfBounds`] - A structure points outside the available data
/// - [`Error::Malformed`] - Any other structural damage
/// - [`Error::AddressBelowBase`] - An address that lies before the image base
///
/// ## Layout Errors
/// - [`Error::InsufficientHeaderSpace`] - The new header does not fit the header region
/// - [`Error::NoSections`] - There is no section to append after
/// - [`Error::InvalidSectionName`] - The requested section name can't be stored
/// - [`Error::WriteLayoutFailed`] - The planned layout conflicts with the file on disk
///
/// ## Resource Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::AllocationFailed`] - A buffer could not be reserved
/// - [`Error::WriteFinalizationFailed`] - The output file could not be committed
///
/// # Examples
///
/// ```rust,no_run
/// use xbexploder::{Error, XbeImage};
/// use std::path::Path;
///
/// match XbeImage::from_file(Path::new("default.xbe")) {
///     Ok(image) => println!("{} sections", image.sections.len()),
///     Err(Error::InvalidMagic { found }) => eprintln!("not an XBE (magic 0x{found:08X})"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed file: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Format errors
    /// The image header does not start with the `XBEH` magic.
    #[error("Invalid image magic - 0x{found:08X}")]
    InvalidMagic {
        /// The value found in place of the magic
        found: u32,
    },

    /// The declared size of the image header is smaller than the smallest known layout.
    #[error("Image header size 0x{size:X} is below the minimum")]
    HeaderTooSmall {
        /// The declared `SizeOfImageHeader`
        size: u32,
    },

    /// The declared size of the certificate is smaller than the smallest known layout.
    #[error("Certificate size 0x{size:X} is below the minimum")]
    CertificateTooSmall {
        /// The declared certificate size
        size: u32,
    },

    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing or writing a buffer.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A virtual address lies below the image base address and has no header offset.
    #[error("Address 0x{address:08X} lies below the base address 0x{base:08X}")]
    AddressBelowBase {
        /// The offending virtual address
        address: u32,
        /// The image base address
        base: u32,
    },

    /// An address or size computation exceeded the 32-bit address space.
    #[error("Address computation overflowed the 32-bit address space")]
    AddressOverflow,

    // Layout errors
    /// The header region has no room for the new section metadata, even after evicting the
    /// embedded PE header where that was allowed.
    #[error("Not enough header space - required {required} bytes, {remaining} available")]
    InsufficientHeaderSpace {
        /// Bytes needed
        required: u32,
        /// Bytes available
        remaining: u32,
    },

    /// The image has no sections, so there is nothing to place a new section after.
    #[error("The image contains no sections")]
    NoSections,

    /// The requested section name is empty or contains a NUL byte.
    #[error("Invalid section name - {0:?}")]
    InvalidSectionName(String),

    /// The computed layout can't be applied to the file on disk.
    #[error("Layout failed - {message}")]
    WriteLayoutFailed {
        /// Description of the conflict
        message: String,
    },

    // Resource errors
    /// The provided input holds no data.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A buffer of the requested size could not be allocated.
    #[error("Failed to allocate {size} bytes")]
    AllocationFailed {
        /// The requested allocation size
        size: usize,
    },

    /// The output file could not be flushed or moved into place.
    #[error("Finalization failed - {message}")]
    WriteFinalizationFailed {
        /// Description of the failure
        message: String,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
