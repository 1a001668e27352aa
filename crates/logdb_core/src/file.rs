//! The shared log file: durable storage plus the materialized dictionary.
//!
//! A [`LogFile`] is the single point of truth for one append-only log. It
//! owns the physical byte store, the fully materialized committed
//! dictionary, the dirty-key set, the physical record counter, and a
//! cumulative SHA-256 digest of the accepted byte stream. All mutation goes
//! through its exclusive lock; reads take the shared lock. A separate mutex
//! guards the count of attached handles so attach/detach bookkeeping never
//! contends with readers.

use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::record::{encode_delete_frame, encode_put_frame, LogRecord};
use crate::replay::RecordIterator;
use logdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Snapshot of a log file's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Number of live keys in the committed dictionary.
    pub live: usize,
    /// Number of physical records appended since the last compaction.
    ///
    /// Always at least `live`; the gap is the write amplification that
    /// triggers compaction.
    pub written: u64,
    /// Number of keys changed since the last flush.
    pub dirty_keys: usize,
}

/// State guarded by the shared/exclusive lock.
struct LogState {
    /// Physical byte store; `None` once closed.
    backend: Option<Box<dyn StorageBackend>>,
    /// The committed dictionary, rebuilt at open by replay.
    map: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Keys changed since the last flush.
    dirty: HashSet<Vec<u8>>,
    /// Physical records appended since the last compaction.
    written: u64,
    /// Running digest over the accepted byte stream.
    digest: Sha256,
}

/// An open append-only log file.
///
/// Multiple [`Handle`](crate::Handle)s may attach to one `LogFile`
/// (typically behind an `Arc`); the last handle to detach flushes it.
///
/// # Example
///
/// ```no_run
/// use logdb_core::{Config, Handle, LogFile};
/// use std::sync::Arc;
///
/// # fn main() -> logdb_core::DbResult<()> {
/// let file = Arc::new(LogFile::open("app.logdb".as_ref(), Config::default())?);
/// let mut db = Handle::new(Arc::clone(&file));
/// db.put_bytes(b"key", b"value", true)?;
/// # Ok(())
/// # }
/// ```
pub struct LogFile {
    config: Config,
    state: RwLock<LogState>,
    /// Attached handle count, under its own lock so attach/detach never
    /// blocks readers.
    refs: Mutex<usize>,
}

impl LogFile {
    /// Opens a log file at the given path and replays it.
    ///
    /// Creates the file when `config.create_if_missing` is set; otherwise a
    /// missing file is an error. The file is held under an exclusive
    /// advisory lock until the `LogFile` is dropped.
    ///
    /// # Errors
    ///
    /// Fails on open/lock errors or on I/O errors during replay. A torn or
    /// corrupt tail is not an error: everything before it is trusted and
    /// the tail is discarded.
    pub fn open(path: &Path, config: Config) -> DbResult<Self> {
        let backend = FileBackend::open(path, config.create_if_missing)?;
        tracing::debug!(path = %path.display(), "opening log file");
        Self::from_backend(Box::new(backend), config)
    }

    /// Opens an ephemeral in-memory log file.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_backend(Box::new(InMemoryBackend::new()), Config::default())
    }

    /// Builds a log file over an arbitrary backend, running recovery.
    ///
    /// This is the open path for every backend; tests use it to replay
    /// crafted or truncated log images.
    pub fn from_backend(mut backend: Box<dyn StorageBackend>, config: Config) -> DbResult<Self> {
        let mut map = BTreeMap::new();
        let mut written = 0u64;

        let mut iter = RecordIterator::new(backend.as_ref())?;
        for result in iter.by_ref() {
            let (_, record) = result?;
            match record {
                LogRecord::Put { key, value } => {
                    map.insert(key, value);
                }
                LogRecord::Delete { key } => {
                    map.remove(&key);
                }
            }
            written += 1;
        }
        let accepted = iter.accepted_len();
        drop(iter);

        let total = backend.size()?;
        if accepted < total {
            tracing::warn!(accepted, total, "discarding torn log tail");
            backend.truncate(accepted)?;
        }

        // Reinitialize the digest over exactly the accepted bytes.
        let mut digest = Sha256::new();
        let mut offset = 0u64;
        while offset < accepted {
            let len = ((accepted - offset) as usize).min(64 * 1024);
            let chunk = backend.read_at(offset, len)?;
            digest.update(&chunk);
            offset += len as u64;
        }

        tracing::debug!(records = written, live = map.len(), "log recovered");

        Ok(Self {
            config,
            state: RwLock::new(LogState {
                backend: Some(backend),
                map,
                dirty: HashSet::new(),
                written,
                digest,
            }),
            refs: Mutex::new(0),
        })
    }

    /// Appends a Put record and upserts the committed dictionary.
    ///
    /// With `overwrite` false an existing key is a
    /// [`DbError::KeyCollision`] and nothing is mutated.
    pub fn write(&self, key: &[u8], value: &[u8], overwrite: bool) -> DbResult<()> {
        let mut state = self.state.write();
        Self::write_locked(&mut state, key, value, overwrite)
    }

    /// Appends a tombstone and removes the key.
    ///
    /// Returns `Ok(false)` without appending anything when the key is
    /// absent.
    pub fn erase(&self, key: &[u8]) -> DbResult<bool> {
        let mut state = self.state.write();
        Self::erase_locked(&mut state, key)
    }

    /// Looks up a key in the committed dictionary.
    ///
    /// Never sees any handle's uncommitted overlay.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.state.read().map.get(key).cloned()
    }

    /// Returns whether a key exists in the committed dictionary.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.state.read().map.contains_key(key)
    }

    /// Returns a snapshot of all committed entries in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.state
            .read()
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().map.len()
    }

    /// Returns whether the committed dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().map.is_empty()
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> LogStats {
        let state = self.state.read();
        LogStats {
            live: state.map.len(),
            written: state.written,
            dirty_keys: state.dirty.len(),
        }
    }

    /// SHA-256 digest of the accepted byte stream.
    ///
    /// Covers exactly the bytes that replay would trust; reinitialized at
    /// open and at compaction.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        self.state.read().digest.clone().finalize().into()
    }

    /// Forces durability of appended bytes, compacting when warranted.
    ///
    /// No-op while the dirty set is empty. Compaction rewrites the file to
    /// exactly one Put per live entry once `written` exceeds
    /// `live * compaction_ratio`. On failure the in-memory dictionary
    /// remains authoritative; only durability of the latest writes is in
    /// doubt until a later successful flush.
    pub fn flush(&self) -> DbResult<()> {
        let mut state = self.state.write();
        self.flush_locked(&mut state)
    }

    /// Releases the physical file handle. Idempotent; does not flush.
    ///
    /// The committed dictionary stays readable; subsequent writes and
    /// flushes of dirty state report [`DbError::Closed`].
    pub fn close(&self) {
        self.state.write().backend = None;
    }

    /// Applies a committed transaction's records in order, under a single
    /// exclusive-lock acquisition.
    ///
    /// Stops at the first failure; records applied before it remain
    /// durable.
    pub(crate) fn apply(&self, records: Vec<LogRecord>) -> DbResult<()> {
        let mut state = self.state.write();
        for record in records {
            match record {
                LogRecord::Put { key, value } => {
                    Self::write_locked(&mut state, &key, &value, true)?;
                }
                LogRecord::Delete { key } => {
                    Self::erase_locked(&mut state, &key)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn attach(&self) {
        *self.refs.lock() += 1;
    }

    pub(crate) fn detach(&self) {
        let mut refs = self.refs.lock();
        debug_assert!(*refs > 0);
        *refs -= 1;
        if *refs == 0 {
            let mut state = self.state.write();
            if let Err(e) = self.flush_locked(&mut state) {
                tracing::warn!(error = %e, "flush on last detach failed");
            }
        }
    }

    /// Current number of attached handles.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        *self.refs.lock()
    }

    fn write_locked(
        state: &mut LogState,
        key: &[u8],
        value: &[u8],
        overwrite: bool,
    ) -> DbResult<()> {
        if state.backend.is_none() {
            return Err(DbError::Closed);
        }
        if !overwrite && state.map.contains_key(key) {
            return Err(DbError::key_collision(key));
        }
        let backend = state.backend.as_mut().ok_or(DbError::Closed)?;

        let frame = encode_put_frame(key, value);
        backend.append(&frame)?;
        state.digest.update(&frame);
        state.written += 1;
        state.map.insert(key.to_vec(), value.to_vec());
        state.dirty.insert(key.to_vec());
        Ok(())
    }

    fn erase_locked(state: &mut LogState, key: &[u8]) -> DbResult<bool> {
        if state.backend.is_none() {
            return Err(DbError::Closed);
        }
        if !state.map.contains_key(key) {
            return Ok(false);
        }
        let backend = state.backend.as_mut().ok_or(DbError::Closed)?;

        let frame = encode_delete_frame(key);
        backend.append(&frame)?;
        state.digest.update(&frame);
        state.written += 1;
        state.map.remove(key);
        state.dirty.insert(key.to_vec());
        Ok(true)
    }

    fn flush_locked(&self, state: &mut LogState) -> DbResult<()> {
        if state.dirty.is_empty() {
            return Ok(());
        }

        {
            let backend = state.backend.as_mut().ok_or(DbError::Closed)?;
            if self.config.sync_on_flush {
                backend.sync()?;
            } else {
                backend.flush()?;
            }
        }

        let threshold = (state.map.len() as u64).saturating_mul(self.config.compaction_ratio);
        if state.written > threshold {
            self.compact_locked(state)?;
        }

        state.dirty.clear();
        Ok(())
    }

    /// Rewrites the log to exactly one Put per live entry.
    fn compact_locked(&self, state: &mut LogState) -> DbResult<()> {
        let mut image = Vec::new();
        for (key, value) in &state.map {
            image.extend_from_slice(&encode_put_frame(key, value));
        }

        let backend = state.backend.as_mut().ok_or(DbError::Closed)?;
        backend.truncate(0)?;
        backend.append(&image)?;
        if self.config.sync_on_flush {
            backend.sync()?;
        }

        state.digest = Sha256::new();
        state.digest.update(&image);
        state.written = state.map.len() as u64;
        tracing::debug!(live = state.map.len(), bytes = image.len(), "log compacted");
        Ok(())
    }
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("LogFile")
            .field("live", &stats.live)
            .field("written", &stats.written)
            .field("dirty_keys", &stats.dirty_keys)
            .finish_non_exhaustive()
    }
}
