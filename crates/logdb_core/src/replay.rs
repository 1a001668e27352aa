//! Streaming replay over a log's byte stream.
//!
//! Recovery reads the log from the beginning, decoding one frame at a time.
//! The iterator trusts every well-formed, checksum-valid record and treats
//! the first malformed, truncated, or checksum-failing frame as the end of
//! the durable log — a torn trailing write is an expected crash artifact,
//! not an error. [`RecordIterator::accepted_len`] reports how many bytes
//! were trusted so the caller can discard the tail.

use crate::error::DbResult;
use crate::record::{LogRecord, RecordOp, CRC_SIZE, FORMAT_VERSION, HEADER_SIZE, LOG_MAGIC};
use logdb_storage::StorageBackend;

/// Read chunk size for streaming replay.
const READ_CHUNK: usize = 64 * 1024;

/// A streaming iterator over the records of a log byte stream.
///
/// Yields `(offset, record)` pairs in file order. Iteration ends cleanly at
/// the first invalid frame; genuine backend I/O failures are surfaced as
/// errors.
pub struct RecordIterator<'a> {
    backend: &'a dyn StorageBackend,
    /// Total stream size at iteration start.
    total: u64,
    /// Offset of the next frame to parse; equals the accepted length.
    pos: u64,
    /// Read buffer covering `[buf_start, buf_start + buf.len())`.
    buf: Vec<u8>,
    buf_start: u64,
    finished: bool,
}

impl<'a> RecordIterator<'a> {
    /// Creates an iterator over the full stream.
    ///
    /// # Errors
    ///
    /// Fails if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> DbResult<Self> {
        let total = backend.size()?;
        Ok(Self {
            backend,
            total,
            pos: 0,
            buf: Vec::new(),
            buf_start: 0,
            finished: false,
        })
    }

    /// Byte offset up to which the stream is well formed.
    ///
    /// After iteration completes this is the boundary between trusted
    /// records and the discardable tail.
    #[must_use]
    pub fn accepted_len(&self) -> u64 {
        self.pos
    }

    /// Returns `len` bytes at `offset`, refilling the buffer if needed.
    ///
    /// `Ok(None)` means the stream ends before the range does.
    fn slice(&mut self, offset: u64, len: usize) -> DbResult<Option<&[u8]>> {
        if offset.saturating_add(len as u64) > self.total {
            return Ok(None);
        }

        let buf_end = self.buf_start + self.buf.len() as u64;
        if offset < self.buf_start || offset + len as u64 > buf_end {
            let read_len = (self.total - offset).min(READ_CHUNK.max(len) as u64) as usize;
            self.buf = self.backend.read_at(offset, read_len)?;
            self.buf_start = offset;
        }

        let start = (offset - self.buf_start) as usize;
        Ok(Some(&self.buf[start..start + len]))
    }

    /// Parses the frame at the current position.
    ///
    /// `Ok(None)` marks the end of the trusted log.
    fn read_next(&mut self) -> DbResult<Option<(u64, LogRecord)>> {
        let frame_start = self.pos;

        let Some(header) = self.slice(frame_start, HEADER_SIZE)? else {
            return Ok(None);
        };

        if header[0..4] != LOG_MAGIC {
            tracing::warn!(offset = frame_start, "bad magic, ending replay");
            return Ok(None);
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > FORMAT_VERSION {
            tracing::warn!(offset = frame_start, version, "unknown version, ending replay");
            return Ok(None);
        }
        let Some(op) = RecordOp::from_byte(header[6]) else {
            tracing::warn!(offset = frame_start, tag = header[6], "unknown op, ending replay");
            return Ok(None);
        };
        let payload_len =
            u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let frame_len = HEADER_SIZE + payload_len + CRC_SIZE;
        let Some(frame) = self.slice(frame_start, frame_len)? else {
            return Ok(None);
        };

        let crc_offset = HEADER_SIZE + payload_len;
        let stored_crc = u32::from_le_bytes([
            frame[crc_offset],
            frame[crc_offset + 1],
            frame[crc_offset + 2],
            frame[crc_offset + 3],
        ]);
        if stored_crc != crc32fast::hash(&frame[..crc_offset]) {
            tracing::warn!(offset = frame_start, "checksum mismatch, ending replay");
            return Ok(None);
        }

        let record = match LogRecord::decode_payload(op, &frame[HEADER_SIZE..crc_offset]) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(offset = frame_start, error = %e, "malformed payload, ending replay");
                return Ok(None);
            }
        };

        self.pos += frame_len as u64;
        Ok(Some((frame_start, record)))
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = DbResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
