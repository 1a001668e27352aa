//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store backing a LogDB log file.
///
/// Backends are **opaque byte stores**: they provide reads at arbitrary
/// offsets, appends at the end, truncation, and durability control. The log
/// engine owns all record-format interpretation — backends never see record
/// boundaries.
///
/// # Invariants
///
/// - `append` returns the offset where the data begins
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` ensures all appended data survives process termination
/// - Backends must be `Send + Sync`; the engine serializes access itself
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range extends beyond the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the store, returning its offset.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage.
    ///
    /// A stronger guarantee than [`flush`](Self::flush): after this returns,
    /// appended bytes survive power loss.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes (the next append offset).
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the store to `new_size` bytes.
    ///
    /// Used to discard a torn tail at recovery and to rewrite the log during
    /// compaction.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` exceeds the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
