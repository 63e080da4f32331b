//! Error types for JPEG decoding.

use core::fmt;

/// The closed set of decode failures.
///
/// [`NoJpeg`](Self::NoJpeg) and [`Syntax`](Self::Syntax) are per-frame
/// conditions: a camera occasionally delivers a truncated or corrupted
/// buffer, and the caller should drop the frame and retry with the next
/// one. The remaining variants are hard failures that an identical retry
/// cannot fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer does not start with a JPEG start-of-image marker.
    NoJpeg,
    /// The stream uses a feature outside the baseline subset (progressive
    /// or arithmetic coding, sample precision other than 8 bits,
    /// non-power-of-two subsampling, component counts other than 1 or 3).
    Unsupported,
    /// A frame or component plane would exceed the decoder's size limits,
    /// or its allocation failed.
    OutOfMemory,
    /// The stream violates JPEG syntax: a malformed segment, an invalid
    /// Huffman table, an unexpected marker inside entropy-coded data, or a
    /// restart-marker desynchronization.
    Syntax,
    /// A post-decode invariant was violated, e.g. upsampling failed to
    /// reach the frame dimensions.
    Internal,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoJpeg => write!(f, "not a JPEG stream"),
            Self::Unsupported => write!(f, "unsupported JPEG feature"),
            Self::OutOfMemory => write!(f, "frame exceeds decoder size limits"),
            Self::Syntax => write!(f, "syntax error in JPEG stream"),
            Self::Internal => write!(f, "internal decoder error"),
        }
    }
}

impl core::error::Error for Error {}

/// Result type for JPEG decoding operations.
pub type Result<T> = core::result::Result<T, Error>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err)
    };
}

pub(crate) use bail;
