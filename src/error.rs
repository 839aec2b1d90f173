use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Format(crate::FormatError::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        })
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Format(crate::FormatError::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        })
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::Range(crate::RangeError::OutOfBounds)
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors are grouped into the categories a caller has to tell apart when driving a
/// parse, patch and serialize cycle:
///
/// - [`Error::Format`] - the input is not a PE image this crate understands
/// - [`Error::Range`] - an address or offset points outside the image
/// - [`Error::Precondition`] - the caller passed arguments that can never succeed
/// - [`Error::FileError`] - reading or writing the image on disk failed
///
/// Every category is fatal for the current image. A patch that simply finds nothing to
/// replace is *not* an error; those operations report `Ok(false)` instead.
///
/// # Examples
///
/// ```rust
/// use pepatch::{Error, FormatError, PeImage};
///
/// match PeImage::parse(b"XX not an executable") {
///     Err(Error::Format(FormatError::InvalidSignature { found, .. })) => {
///         assert_eq!(found, 0x5858);
///     }
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer does not contain a supported PE image.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// An RVA or file offset could not be resolved inside the image.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// The arguments of a patch operation violate its contract.
    ///
    /// These are checked before any byte is modified, so the target buffer is
    /// guaranteed to be untouched when this error is returned.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while loading an image from disk or
    /// writing the patched image back.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}

/// Structural problems with the input that prevent it from being parsed.
#[derive(Error, Debug)]
pub enum FormatError {
    /// A magic signature (`MZ` or `PE\0\0`) did not match.
    #[error("Invalid signature at offset 0x{offset:x} - expected 0x{expected:x}, found 0x{found:x}")]
    InvalidSignature {
        /// The signature value that was required
        expected: u32,
        /// The value actually present in the input
        found: u32,
        /// File offset of the signature field
        offset: usize,
    },

    /// The optional header magic is neither PE32 (0x10B) nor PE32+ (0x20B).
    #[error("Unsupported optional header magic - 0x{0:x}")]
    UnsupportedOptionalHeader(u16),

    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}

/// Addresses or offsets that fall outside the image.
#[derive(Error, Debug)]
pub enum RangeError {
    /// No section contains the requested RVA.
    #[error("RVA 0x{0:x} is not contained in any section")]
    AddressOutOfRange(u32),

    /// An out of bound access was attempted while reading or writing a buffer.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,
}

/// Caller supplied arguments that can never be applied.
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// Replacement and original have different lengths.
    ///
    /// Patches never move bytes, so the replacement must be exactly as long as the
    /// sequence it replaces.
    #[error("Replacement length {new} does not match original length {old}")]
    LengthMismatch {
        /// Length of the sequence to be replaced
        old: usize,
        /// Length of the replacement sequence
        new: usize,
    },

    /// An empty search sequence was provided.
    #[error("Search sequence must not be empty")]
    EmptyPattern,

    /// An import file name contains characters outside of 7-bit ASCII.
    #[error("File name is not ASCII - {0}")]
    NonAsciiName(String),
}
