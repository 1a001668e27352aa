//! Error types for the storage crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended past the end of the store.
    #[error("read past end: offset {offset} + len {len} exceeds size {size}")]
    ReadPastEnd {
        /// Requested read offset.
        offset: u64,
        /// Requested read length.
        len: usize,
        /// Current store size.
        size: u64,
    },

    /// Truncation target is larger than the current store.
    #[error("cannot truncate to {requested} bytes: store holds {size} bytes")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Current store size.
        size: u64,
    },

    /// The file does not exist and creation was not requested.
    #[error("file not found: {path}")]
    NotFound {
        /// Path that was opened.
        path: PathBuf,
    },

    /// Another backend holds the advisory lock on this file.
    #[error("file is locked by another handle: {path}")]
    Locked {
        /// Path that was opened.
        path: PathBuf,
    },
}
