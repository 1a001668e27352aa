//! # LogDB Storage
//!
//! Storage backend trait and implementations for LogDB.
//!
//! This crate provides the lowest-level storage abstraction for the log
//! engine. Backends are **opaque byte stores** — they read, append,
//! truncate and sync bytes without interpreting them. LogDB owns all
//! record-format interpretation.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Durable storage over a single OS file, held under an
//!   advisory exclusive lock for the lifetime of the backend
//! - [`InMemoryBackend`] - For tests and ephemeral stores
//!
//! ## Example
//!
//! ```rust
//! use logdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
