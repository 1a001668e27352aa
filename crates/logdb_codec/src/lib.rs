//! # LogDB Codec
//!
//! Deterministic binary encoding for LogDB typed keys and values.
//!
//! The typed access layer stores every key and value as an opaque byte
//! sequence; this crate defines that encoding. It guarantees:
//!
//! - Identical inputs produce identical bytes (required for key lookup)
//! - Decoding exactly inverts encoding for the same format version
//! - Cross-platform stability (little-endian fixed-width integers,
//!   compact-size length prefixes for variable-length data)
//!
//! ## Format
//!
//! - Fixed-width integers: little-endian
//! - `bool`: one byte, 0 or 1
//! - Variable-length data (`String`, `Vec<T>`): compact-size count followed
//!   by the elements
//! - `Option<T>`: one tag byte (0 = none, 1 = some) followed by the value
//! - Tuples: fields in order, no framing
//!
//! Compact sizes must be minimally encoded; decoders reject non-canonical
//! forms so that every value has exactly one byte representation.
//!
//! ## Usage
//!
//! ```
//! use logdb_codec::{to_bytes, from_bytes};
//!
//! let bytes = to_bytes(&("account", 42u64));
//! let decoded: (String, u64) = from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, ("account".to_string(), 42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod types;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, CodecResult};

/// Version of the encoding format produced by this crate.
///
/// Bumped only on incompatible wire changes; decoders for later versions
/// must keep reading all earlier ones. Callers that persist encoded bytes
/// may embed this alongside them.
pub const CODEC_VERSION: u16 = 1;

/// Trait for types that encode to canonical LogDB bytes.
pub trait Encode {
    /// Appends this value's canonical encoding to the encoder.
    fn encode(&self, enc: &mut Encoder);
}

/// Trait for types that decode from canonical LogDB bytes.
pub trait Decode: Sized {
    /// Reads one value from the decoder.
    fn decode(dec: &mut Decoder<'_>) -> CodecResult<Self>;
}

/// Encodes a value to its canonical byte sequence.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut enc = Encoder::new();
    value.encode(&mut enc);
    enc.into_bytes()
}

/// Decodes a value from a byte sequence, requiring full consumption.
///
/// # Errors
///
/// Fails on malformed input or when bytes remain after the value — a partial
/// read would mean the bytes were produced by a different type or version.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> CodecResult<T> {
    let mut dec = Decoder::new(bytes);
    let value = T::decode(&mut dec)?;
    dec.finish()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_input_same_bytes() {
        let a = to_bytes(&("key".to_string(), 7u32));
        let b = to_bytes(&("key".to_string(), 7u32));
        assert_eq!(a, b);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_bytes(&5u32);
        bytes.push(0);
        let result: CodecResult<u32> = from_bytes(&bytes);
        assert!(matches!(result, Err(CodecError::TrailingBytes { .. })));
    }

    #[test]
    fn truncated_input_rejected() {
        let bytes = to_bytes(&5u64);
        let result: CodecResult<u64> = from_bytes(&bytes[..4]);
        assert!(matches!(result, Err(CodecError::UnexpectedEof)));
    }
}
