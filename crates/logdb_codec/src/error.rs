//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding.
///
/// Encoding is infallible: every supported type has a canonical byte
/// representation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the value was complete.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remained after the value was fully decoded.
    #[error("trailing bytes after value: {remaining} left")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A tag byte was out of range for its type (bool, option).
    #[error("invalid tag byte: {tag}")]
    InvalidTag {
        /// The offending byte.
        tag: u8,
    },

    /// A compact size was not minimally encoded.
    #[error("non-canonical compact size encoding")]
    NonCanonicalSize,

    /// A declared length does not fit in memory on this platform.
    #[error("declared length {len} exceeds addressable size")]
    LengthOverflow {
        /// The declared length.
        len: u64,
    },
}
