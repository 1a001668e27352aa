//! Append-only log-structured key-value store.
//!
//! LogDB persists a byte-keyed dictionary as a single append-only log of
//! Put and Delete records. Every mutation is an append; the full
//! dictionary is materialized in memory at open by replaying the log, and
//! a torn or corrupt tail left by a crash is detected by checksums and
//! discarded, recovering every record before it.
//!
//! The crate is organized around two types:
//!
//! - [`LogFile`] owns the physical log: replay at open, appends, flush,
//!   threshold-triggered compaction, and the committed dictionary shared
//!   by all clients.
//! - [`Handle`] is one client's transactional view: writes buffered in a
//!   private overlay until commit, with read-your-writes inside the
//!   transaction and full isolation from other handles.
//!
//! Values and keys are raw bytes at the engine level; the typed methods on
//! [`Handle`] layer [`Encode`]/[`Decode`] serialization on top.
//!
//! # Example
//!
//! ```no_run
//! use logdb_core::{Config, Handle, LogFile};
//! use std::sync::Arc;
//!
//! # fn main() -> logdb_core::DbResult<()> {
//! let file = Arc::new(LogFile::open("app.logdb".as_ref(), Config::default())?);
//! let mut db = Handle::new(Arc::clone(&file));
//!
//! db.txn_begin()?;
//! db.put("user:1", "alice")?;
//! db.put("user:2", "bob")?;
//! db.txn_commit()?;
//!
//! let name: Option<String> = db.get("user:1")?;
//! assert_eq!(name.as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod file;
mod handle;
mod record;
mod replay;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use file::{LogFile, LogStats};
pub use handle::Handle;
pub use record::{LogRecord, RecordOp};
pub use replay::RecordIterator;

pub use logdb_codec::{Decode, Encode};
