//! Error types for the log engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in log file and handle operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] logdb_storage::StorageError),

    /// Codec error from the typed access layer.
    #[error("codec error: {0}")]
    Codec(#[from] logdb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A log record is malformed.
    ///
    /// Surfaces from explicit record decoding; during recovery a corrupt
    /// record marks the end of the trusted log instead of failing the open.
    #[error("corrupt record: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// A write with `overwrite = false` hit an existing key.
    #[error("key collision: key already exists ({key_len} bytes)")]
    KeyCollision {
        /// Length of the colliding key.
        key_len: usize,
    },

    /// A write operation was attempted through a read-only handle.
    #[error("handle is read-only")]
    ReadOnly,

    /// A transaction is already active on this handle.
    #[error("transaction already active")]
    TransactionActive,

    /// No transaction is active on this handle.
    #[error("no active transaction")]
    NoTransaction,

    /// The log file has been closed.
    #[error("log file is closed")]
    Closed,
}

impl DbError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates a key collision error.
    #[must_use]
    pub fn key_collision(key: &[u8]) -> Self {
        Self::KeyCollision { key_len: key.len() }
    }
}
