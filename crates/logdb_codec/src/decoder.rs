//! Byte-level decoder.

use crate::error::{CodecError, CodecResult};

/// Reads canonically encoded primitives from a byte slice.
///
/// The decoder is strict: compact sizes must be minimally encoded, strings
/// must be UTF-8, and [`finish`](Self::finish) rejects unconsumed bytes.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the given bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of unconsumed bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Verifies that every byte has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TrailingBytes`] if bytes remain.
    pub fn finish(&self) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CodecError::TrailingBytes { remaining }),
        }
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads a little-endian `i64`.
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Reads a 0/1 boolean byte.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(CodecError::InvalidTag { tag }),
        }
    }

    /// Reads a compact size prefix, rejecting non-minimal encodings.
    pub fn read_compact_size(&mut self) -> CodecResult<u64> {
        let marker = self.read_u8()?;
        let value = match marker {
            0..=252 => u64::from(marker),
            253 => {
                let v = u64::from(self.read_u16()?);
                if v < 253 {
                    return Err(CodecError::NonCanonicalSize);
                }
                v
            }
            254 => {
                let v = u64::from(self.read_u32()?);
                if v <= 0xFFFF {
                    return Err(CodecError::NonCanonicalSize);
                }
                v
            }
            255 => {
                let v = self.read_u64()?;
                if v <= 0xFFFF_FFFF {
                    return Err(CodecError::NonCanonicalSize);
                }
                v
            }
        };
        Ok(value)
    }

    /// Reads a compact-size-prefixed byte sequence.
    pub fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let len = self.read_compact_size()?;
        let len = usize::try_from(len).map_err(|_| CodecError::LengthOverflow { len })?;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a compact-size-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> CodecResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }
}
