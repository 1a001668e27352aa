//! Log record format and framing.
//!
//! Each record is a self-contained frame:
//!
//! ```text
//! magic (4) | version (u16 LE) | op (u8) | payload len (u32 LE) | payload | CRC32 (u32 LE)
//! ```
//!
//! The payload holds a compact-size-prefixed key and, for Put records, a
//! compact-size-prefixed value. Tombstones carry no value bytes. The CRC
//! covers the header and payload, so a torn or bit-flipped frame is detected
//! before any of it is applied.

use crate::error::{DbError, DbResult};
use logdb_codec::{Decoder, Encoder};

/// Magic bytes identifying a log record frame.
pub const LOG_MAGIC: [u8; 4] = *b"LDBR";

/// Current log format version.
pub const FORMAT_VERSION: u16 = 1;

/// Frame header size: magic (4) + version (2) + op (1) + length (4).
pub const HEADER_SIZE: usize = 11;

/// CRC trailer size.
pub const CRC_SIZE: usize = 4;

/// Operation tag of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordOp {
    /// Insert or overwrite a key.
    Put = 1,
    /// Tombstone: remove a key.
    Delete = 2,
}

impl RecordOp {
    /// Converts a byte to an operation tag.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Delete),
            _ => None,
        }
    }

    /// Converts the operation tag to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single log record.
///
/// Immutable once written; a later record with the same key supersedes it
/// logically during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Insert or overwrite a key with a value.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Tombstone marking a key as removed.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl LogRecord {
    /// Returns the operation tag.
    #[must_use]
    pub fn op(&self) -> RecordOp {
        match self {
            Self::Put { .. } => RecordOp::Put,
            Self::Delete { .. } => RecordOp::Delete,
        }
    }

    /// Returns the record's key.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }

    /// Encodes the record as a complete frame.
    #[must_use]
    pub fn encode_frame(&self) -> Vec<u8> {
        match self {
            Self::Put { key, value } => encode_put_frame(key, value),
            Self::Delete { key } => encode_delete_frame(key),
        }
    }

    /// Decodes a record payload for the given operation tag.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corruption`] when the payload is malformed or
    /// carries trailing bytes.
    pub fn decode_payload(op: RecordOp, payload: &[u8]) -> DbResult<Self> {
        let mut dec = Decoder::new(payload);

        let record = match op {
            RecordOp::Put => {
                let key = dec.read_bytes().map_err(bad_payload)?;
                let value = dec.read_bytes().map_err(bad_payload)?;
                Self::Put { key, value }
            }
            RecordOp::Delete => {
                let key = dec.read_bytes().map_err(bad_payload)?;
                Self::Delete { key }
            }
        };

        dec.finish().map_err(bad_payload)?;
        Ok(record)
    }
}

fn bad_payload(e: logdb_codec::CodecError) -> DbError {
    DbError::corruption(format!("invalid record payload: {e}"))
}

fn encode_frame_parts(op: RecordOp, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&LOG_MAGIC);
    frame.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    frame.push(op.as_byte());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);

    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Encodes a Put frame without constructing an owned [`LogRecord`].
///
/// Used by the append path and by compaction, which rewrites one Put per
/// live entry straight out of the committed dictionary.
#[must_use]
pub fn encode_put_frame(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.write_bytes(key);
    enc.write_bytes(value);
    encode_frame_parts(RecordOp::Put, &enc.into_bytes())
}

/// Encodes a tombstone frame.
#[must_use]
pub fn encode_delete_frame(key: &[u8]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.write_bytes(key);
    encode_frame_parts(RecordOp::Delete, &enc.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_frame(frame: &[u8]) -> DbResult<LogRecord> {
        // Mirror of the replay parser, for frame-level tests
        assert!(frame.len() >= HEADER_SIZE + CRC_SIZE);
        assert_eq!(&frame[0..4], &LOG_MAGIC);
        let op = RecordOp::from_byte(frame[6]).expect("valid op");
        let payload_len =
            u32::from_le_bytes([frame[7], frame[8], frame[9], frame[10]]) as usize;
        let payload = &frame[HEADER_SIZE..HEADER_SIZE + payload_len];
        LogRecord::decode_payload(op, payload)
    }

    #[test]
    fn put_frame_roundtrip() {
        let record = LogRecord::Put {
            key: b"k1".to_vec(),
            value: b"v1".to_vec(),
        };
        let frame = record.encode_frame();
        assert_eq!(decode_frame(&frame).unwrap(), record);
    }

    #[test]
    fn delete_frame_roundtrip() {
        let record = LogRecord::Delete {
            key: b"gone".to_vec(),
        };
        let frame = record.encode_frame();
        assert_eq!(decode_frame(&frame).unwrap(), record);
    }

    #[test]
    fn tombstone_carries_no_value() {
        let put = encode_put_frame(b"k", b"");
        let del = encode_delete_frame(b"k");
        assert!(del.len() < put.len());
    }

    #[test]
    fn crc_covers_header_and_payload() {
        let mut frame = encode_put_frame(b"key", b"value");
        let crc_offset = frame.len() - CRC_SIZE;
        let crc = u32::from_le_bytes(frame[crc_offset..].try_into().unwrap());
        assert_eq!(crc, crc32fast::hash(&frame[..crc_offset]));

        // Flipping any pre-CRC bit must change the checksum
        frame[5] ^= 0x01;
        assert_ne!(crc, crc32fast::hash(&frame[..crc_offset]));
    }

    #[test]
    fn payload_with_trailing_bytes_is_corrupt() {
        let mut enc = Encoder::new();
        enc.write_bytes(b"key");
        let mut payload = enc.into_bytes();
        payload.push(0xAA);

        let result = LogRecord::decode_payload(RecordOp::Delete, &payload);
        assert!(matches!(result, Err(DbError::Corruption { .. })));
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let record = LogRecord::Put {
            key: b"key".to_vec(),
            value: b"value".to_vec(),
        };
        let frame = record.encode_frame();
        let payload = &frame[HEADER_SIZE..frame.len() - CRC_SIZE];

        let result = LogRecord::decode_payload(RecordOp::Put, &payload[..payload.len() - 1]);
        assert!(matches!(result, Err(DbError::Corruption { .. })));
    }

    #[test]
    fn op_tag_roundtrip() {
        for op in [RecordOp::Put, RecordOp::Delete] {
            assert_eq!(RecordOp::from_byte(op.as_byte()), Some(op));
        }
        assert_eq!(RecordOp::from_byte(0), None);
        assert_eq!(RecordOp::from_byte(3), None);
    }
}
