//! Byte-level encoder.

/// Appends canonically encoded primitives to a growing buffer.
///
/// All multi-byte integers are little-endian. Variable-length data is
/// prefixed with a [compact size](Self::write_compact_size).
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the encoder, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Writes a `u16` little-endian.
    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a `u32` little-endian.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a `u64` little-endian.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes an `i32` little-endian (two's complement).
    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes an `i64` little-endian (two's complement).
    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a boolean as a single 0/1 byte.
    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    /// Writes a compact size prefix.
    ///
    /// Minimal encoding: values below 253 are one byte; larger values use a
    /// marker byte (253/254/255) followed by a little-endian `u16`/`u32`/`u64`.
    pub fn write_compact_size(&mut self, v: u64) {
        match v {
            0..=252 => self.buf.push(v as u8),
            253..=0xFFFF => {
                self.buf.push(253);
                self.buf.extend_from_slice(&(v as u16).to_le_bytes());
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.buf.push(254);
                self.buf.extend_from_slice(&(v as u32).to_le_bytes());
            }
            _ => {
                self.buf.push(255);
                self.buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Writes raw bytes with a compact size prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_compact_size(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a UTF-8 string with a compact size prefix.
    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }
}
