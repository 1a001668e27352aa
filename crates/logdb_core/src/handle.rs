//! Transactional handles over a shared log file.
//!
//! A [`Handle`] is one client's view of a [`LogFile`]. Outside a
//! transaction it reads and writes the committed dictionary directly.
//! Inside a transaction every mutation is buffered in a private overlay:
//! the handle reads its own writes, other handles see nothing, and commit
//! applies the buffered operations to the log in first-touch order under a
//! single lock acquisition.

use crate::error::{DbError, DbResult};
use crate::file::LogFile;
use crate::record::LogRecord;
use logdb_codec::{from_bytes, to_bytes, Decode, Encode};
use std::collections::HashMap;
use std::sync::Arc;

/// Buffered outcome for one key inside a transaction.
#[derive(Debug, Clone)]
enum Pending {
    Put(Vec<u8>),
    Delete,
}

/// Private write buffer of an open transaction.
///
/// `order` records each key once, at first touch; commit replays keys in
/// that order with their final buffered outcome.
#[derive(Debug, Default)]
struct Overlay {
    entries: HashMap<Vec<u8>, Pending>,
    order: Vec<Vec<u8>>,
}

impl Overlay {
    fn set(&mut self, key: &[u8], pending: Pending) {
        if self.entries.insert(key.to_vec(), pending).is_none() {
            self.order.push(key.to_vec());
        }
    }

    fn into_records(mut self) -> Vec<LogRecord> {
        let mut records = Vec::with_capacity(self.order.len());
        for key in self.order {
            // Every ordered key has an entry; set() keeps them in lockstep
            if let Some(pending) = self.entries.remove(&key) {
                records.push(match pending {
                    Pending::Put(value) => LogRecord::Put { key, value },
                    Pending::Delete => LogRecord::Delete { key },
                });
            }
        }
        records
    }
}

/// A client handle onto a shared [`LogFile`].
///
/// Cheap to create; any number may attach to the same file. Dropping the
/// last handle flushes the file. A handle is not `Sync`-shared across
/// threads — give each thread its own.
pub struct Handle {
    file: Arc<LogFile>,
    read_only: bool,
    txn: Option<Overlay>,
}

impl Handle {
    /// Attaches a read-write handle to a log file.
    #[must_use]
    pub fn new(file: Arc<LogFile>) -> Self {
        file.attach();
        Self {
            file,
            read_only: false,
            txn: None,
        }
    }

    /// Attaches a read-only handle; all mutation reports [`DbError::ReadOnly`].
    #[must_use]
    pub fn new_read_only(file: Arc<LogFile>) -> Self {
        file.attach();
        Self {
            file,
            read_only: true,
            txn: None,
        }
    }

    /// Returns whether this handle rejects writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The underlying log file.
    #[must_use]
    pub fn file(&self) -> &Arc<LogFile> {
        &self.file
    }

    /// Returns whether a transaction is open on this handle.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// One transaction per handle: a second begin without an intervening
    /// commit or abort is [`DbError::TransactionActive`]. Read-only
    /// handles cannot open transactions.
    pub fn txn_begin(&mut self) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::ReadOnly);
        }
        if self.txn.is_some() {
            return Err(DbError::TransactionActive);
        }
        self.txn = Some(Overlay::default());
        Ok(())
    }

    /// Commits the open transaction.
    ///
    /// Buffered operations are applied to the log in first-touch order
    /// under one exclusive lock acquisition, so other handles observe
    /// either none or all of the transaction's effects in memory. If an
    /// append fails partway the already-appended prefix stays durable; the
    /// overlay is consumed either way and the error is surfaced.
    pub fn txn_commit(&mut self) -> DbResult<()> {
        let overlay = self.txn.take().ok_or(DbError::NoTransaction)?;
        self.file.apply(overlay.into_records())
    }

    /// Discards any open transaction without touching the log.
    ///
    /// Idempotent: aborting with no transaction open is a no-op.
    pub fn txn_abort(&mut self) {
        self.txn = None;
    }

    /// Inserts or overwrites a key.
    ///
    /// Inside a transaction the write is buffered and visible only to this
    /// handle until commit. With `overwrite` false an existing visible key
    /// is a [`DbError::KeyCollision`].
    pub fn put_bytes(&mut self, key: &[u8], value: &[u8], overwrite: bool) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::ReadOnly);
        }
        if self.txn.is_some() {
            if !overwrite && self.visible_contains(key) {
                return Err(DbError::key_collision(key));
            }
            if let Some(overlay) = self.txn.as_mut() {
                overlay.set(key, Pending::Put(value.to_vec()));
            }
            Ok(())
        } else {
            self.file.write(key, value, overwrite)
        }
    }

    /// Removes a key, returning whether it was visible to this handle.
    ///
    /// Inside a transaction a tombstone is always buffered, even for a key
    /// not currently visible: the key may exist by the time the commit
    /// lands, and applying a tombstone for a still-absent key is a no-op.
    /// Outside a transaction an absent key is a no-op.
    pub fn erase_bytes(&mut self, key: &[u8]) -> DbResult<bool> {
        if self.read_only {
            return Err(DbError::ReadOnly);
        }
        if self.txn.is_some() {
            let visible = self.visible_contains(key);
            if let Some(overlay) = self.txn.as_mut() {
                overlay.set(key, Pending::Delete);
            }
            Ok(visible)
        } else {
            self.file.erase(key)
        }
    }

    /// Looks up a key, reading this handle's own buffered writes first.
    #[must_use]
    pub fn get_bytes(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(overlay) = &self.txn {
            match overlay.entries.get(key) {
                Some(Pending::Put(value)) => return Some(value.clone()),
                Some(Pending::Delete) => return None,
                None => {}
            }
        }
        self.file.get(key)
    }

    /// Returns whether a key is visible to this handle.
    #[must_use]
    pub fn contains_bytes(&self, key: &[u8]) -> bool {
        self.visible_contains(key)
    }

    /// Returns a snapshot of all committed entries in key order.
    ///
    /// Buffered transaction writes are not included.
    #[must_use]
    pub fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.file.entries()
    }

    /// Typed insert-or-overwrite.
    pub fn put<K, V>(&mut self, key: &K, value: &V) -> DbResult<()>
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        self.put_bytes(&to_bytes(key), &to_bytes(value), true)
    }

    /// Typed insert that fails on an existing key.
    pub fn put_new<K, V>(&mut self, key: &K, value: &V) -> DbResult<()>
    where
        K: Encode + ?Sized,
        V: Encode + ?Sized,
    {
        self.put_bytes(&to_bytes(key), &to_bytes(value), false)
    }

    /// Typed lookup.
    ///
    /// # Errors
    ///
    /// Fails if the stored bytes do not decode as `V`.
    pub fn get<K, V>(&self, key: &K) -> DbResult<Option<V>>
    where
        K: Encode + ?Sized,
        V: Decode,
    {
        match self.get_bytes(&to_bytes(key)) {
            Some(bytes) => Ok(Some(from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Typed existence check.
    #[must_use]
    pub fn contains<K>(&self, key: &K) -> bool
    where
        K: Encode + ?Sized,
    {
        self.contains_bytes(&to_bytes(key))
    }

    /// Typed removal, returning whether the key was visible.
    pub fn remove<K>(&mut self, key: &K) -> DbResult<bool>
    where
        K: Encode + ?Sized,
    {
        self.erase_bytes(&to_bytes(key))
    }

    fn visible_contains(&self, key: &[u8]) -> bool {
        if let Some(overlay) = &self.txn {
            match overlay.entries.get(key) {
                Some(Pending::Put(_)) => return true,
                Some(Pending::Delete) => return false,
                None => {}
            }
        }
        self.file.contains(key)
    }
}

impl Drop for Handle {
    /// Aborts any open transaction and detaches; the last handle to
    /// detach flushes the file.
    fn drop(&mut self) {
        self.txn = None;
        self.file.detach();
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("read_only", &self.read_only)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use logdb_storage::{InMemoryBackend, StorageBackend, StorageResult};
    use tempfile::tempdir;

    fn open_shared() -> Arc<LogFile> {
        Arc::new(LogFile::open_in_memory().unwrap())
    }

    #[test]
    fn direct_writes_bypass_overlay() {
        let file = open_shared();
        let mut db = Handle::new(Arc::clone(&file));

        db.put_bytes(b"k", b"v", true).unwrap();
        assert_eq!(file.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn read_your_writes_inside_transaction() {
        let file = open_shared();
        let mut db = Handle::new(file);

        db.txn_begin().unwrap();
        db.put_bytes(b"k", b"v", true).unwrap();
        assert_eq!(db.get_bytes(b"k"), Some(b"v".to_vec()));
        assert!(db.contains_bytes(b"k"));

        db.erase_bytes(b"k").unwrap();
        assert_eq!(db.get_bytes(b"k"), None);
        assert!(!db.contains_bytes(b"k"));
    }

    #[test]
    fn buffered_writes_invisible_to_other_handles() {
        let file = open_shared();
        let mut writer = Handle::new(Arc::clone(&file));
        let reader = Handle::new_read_only(Arc::clone(&file));

        writer.txn_begin().unwrap();
        writer.put_bytes(b"k", b"v", true).unwrap();

        assert_eq!(reader.get_bytes(b"k"), None);
        assert_eq!(file.get(b"k"), None);

        writer.txn_commit().unwrap();
        assert_eq!(reader.get_bytes(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn abort_discards_everything() {
        let file = open_shared();
        let mut db = Handle::new(Arc::clone(&file));
        db.put_bytes(b"keep", b"1", true).unwrap();

        db.txn_begin().unwrap();
        db.put_bytes(b"new", b"2", true).unwrap();
        db.erase_bytes(b"keep").unwrap();
        db.txn_abort();

        assert_eq!(db.get_bytes(b"keep"), Some(b"1".to_vec()));
        assert_eq!(db.get_bytes(b"new"), None);
        assert_eq!(file.stats().written, 1);
    }

    #[test]
    fn commit_applies_final_state_per_key() {
        let file = open_shared();
        let mut db = Handle::new(Arc::clone(&file));

        db.txn_begin().unwrap();
        db.put_bytes(b"k", b"v1", true).unwrap();
        db.put_bytes(b"k", b"v2", true).unwrap();
        db.put_bytes(b"other", b"x", true).unwrap();
        db.txn_commit().unwrap();

        assert_eq!(file.get(b"k"), Some(b"v2".to_vec()));
        // One record per touched key, not per buffered operation
        assert_eq!(file.stats().written, 2);
    }

    #[test]
    fn transaction_scenario_write_erase_commit() {
        let file = open_shared();
        let mut db = Handle::new(Arc::clone(&file));
        db.put_bytes(b"a", b"1", true).unwrap();

        db.txn_begin().unwrap();
        db.put_bytes(b"b", b"2", true).unwrap();
        db.erase_bytes(b"a").unwrap();
        assert!(!db.contains_bytes(b"a"));
        assert!(db.contains_bytes(b"b"));
        // Committed state untouched until commit
        assert!(file.contains(b"a"));
        assert!(!file.contains(b"b"));
        db.txn_commit().unwrap();

        assert_eq!(
            file.entries(),
            vec![(b"b".to_vec(), b"2".to_vec())]
        );
    }

    #[test]
    fn erase_of_buffered_put_of_absent_key() {
        let file = open_shared();
        let mut db = Handle::new(Arc::clone(&file));

        db.txn_begin().unwrap();
        db.put_bytes(b"k", b"v", true).unwrap();
        assert!(db.erase_bytes(b"k").unwrap());
        db.txn_commit().unwrap();

        // Final state is a delete of a key that never existed: harmless
        assert!(!file.contains(b"k"));
    }

    #[test]
    fn buffered_erase_of_absent_key_applies_at_commit() {
        let file = open_shared();
        let mut eraser = Handle::new(Arc::clone(&file));
        let mut writer = Handle::new(Arc::clone(&file));

        eraser.txn_begin().unwrap();
        // Not visible yet, but the tombstone must still be buffered
        assert!(!eraser.erase_bytes(b"k").unwrap());
        assert!(!eraser.contains_bytes(b"k"));

        // Another handle introduces the key before the commit lands
        writer.put_bytes(b"k", b"v", true).unwrap();
        assert!(file.contains(b"k"));

        eraser.txn_commit().unwrap();
        assert!(!file.contains(b"k"));
    }

    #[test]
    fn nested_begin_rejected() {
        let file = open_shared();
        let mut db = Handle::new(file);

        db.txn_begin().unwrap();
        assert!(matches!(db.txn_begin(), Err(DbError::TransactionActive)));
        // The original transaction is still intact
        db.put_bytes(b"k", b"v", true).unwrap();
        db.txn_commit().unwrap();
    }

    #[test]
    fn commit_without_transaction_rejected_abort_is_noop() {
        let file = open_shared();
        let mut db = Handle::new(file);

        assert!(matches!(db.txn_commit(), Err(DbError::NoTransaction)));
        // Abort with nothing open is a harmless no-op
        db.txn_abort();
        assert!(!db.in_transaction());
    }

    #[test]
    fn collision_checked_against_visible_state() {
        let file = open_shared();
        let mut db = Handle::new(Arc::clone(&file));
        db.put_bytes(b"committed", b"1", true).unwrap();

        db.txn_begin().unwrap();
        assert!(matches!(
            db.put_bytes(b"committed", b"2", false),
            Err(DbError::KeyCollision { .. })
        ));

        // Buffered delete frees the key for a no-overwrite put
        db.erase_bytes(b"committed").unwrap();
        db.put_bytes(b"committed", b"3", false).unwrap();

        // Buffered put blocks one
        db.put_bytes(b"fresh", b"x", true).unwrap();
        assert!(matches!(
            db.put_bytes(b"fresh", b"y", false),
            Err(DbError::KeyCollision { .. })
        ));
        db.txn_commit().unwrap();

        assert_eq!(file.get(b"committed"), Some(b"3".to_vec()));
    }

    #[test]
    fn read_only_handle_rejects_mutation() {
        let file = open_shared();
        let mut writer = Handle::new(Arc::clone(&file));
        writer.put_bytes(b"k", b"v", true).unwrap();

        let mut reader = Handle::new_read_only(file);
        assert!(matches!(
            reader.put_bytes(b"x", b"y", true),
            Err(DbError::ReadOnly)
        ));
        assert!(matches!(reader.erase_bytes(b"k"), Err(DbError::ReadOnly)));
        assert!(matches!(reader.txn_begin(), Err(DbError::ReadOnly)));
        assert_eq!(reader.get_bytes(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn drop_aborts_open_transaction() {
        let file = open_shared();
        {
            let mut db = Handle::new(Arc::clone(&file));
            db.txn_begin().unwrap();
            db.put_bytes(b"k", b"v", true).unwrap();
            // Dropped without commit
        }
        let db = Handle::new(Arc::clone(&file));
        assert_eq!(db.get_bytes(b"k"), None);
    }

    #[test]
    fn last_detach_flushes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.logdb");
        let file = Arc::new(LogFile::open(&path, Config::default()).unwrap());

        let mut first = Handle::new(Arc::clone(&file));
        let second = Handle::new(Arc::clone(&file));
        first.put_bytes(b"k", b"v", true).unwrap();

        drop(first);
        assert_eq!(file.stats().dirty_keys, 1);

        drop(second);
        assert_eq!(file.stats().dirty_keys, 0);
    }

    #[test]
    fn typed_roundtrip() {
        let file = open_shared();
        let mut db = Handle::new(file);

        db.put("answer", &42u64).unwrap();
        db.put("greeting", "hello").unwrap();

        assert_eq!(db.get::<str, u64>("answer").unwrap(), Some(42));
        assert_eq!(
            db.get::<str, String>("greeting").unwrap(),
            Some("hello".to_string())
        );
        assert!(db.contains("answer"));
        assert!(!db.contains("missing"));

        assert!(db.remove("answer").unwrap());
        assert_eq!(db.get::<str, u64>("answer").unwrap(), None);
    }

    #[test]
    fn typed_put_new_collides() {
        let file = open_shared();
        let mut db = Handle::new(file);

        db.put_new("k", &1u32).unwrap();
        assert!(matches!(
            db.put_new("k", &2u32),
            Err(DbError::KeyCollision { .. })
        ));
        assert_eq!(db.get::<str, u32>("k").unwrap(), Some(1));
    }

    #[test]
    fn typed_decode_mismatch_is_error() {
        let file = open_shared();
        let mut db = Handle::new(file);

        db.put("k", "a string value").unwrap();
        assert!(db.get::<str, u64>("k").is_err());
    }

    /// Backend whose appends start failing after a set number of writes.
    struct FailingBackend {
        inner: InMemoryBackend,
        appends_left: usize,
    }

    impl StorageBackend for FailingBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.appends_left == 0 {
                return Err(std::io::Error::other("append failed").into());
            }
            self.appends_left -= 1;
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.inner.truncate(new_size)
        }
    }

    #[test]
    fn partial_commit_keeps_applied_prefix() {
        let backend = FailingBackend {
            inner: InMemoryBackend::new(),
            appends_left: 1,
        };
        let file =
            Arc::new(LogFile::from_backend(Box::new(backend), Config::default()).unwrap());
        let mut db = Handle::new(Arc::clone(&file));

        db.txn_begin().unwrap();
        db.put_bytes(b"first", b"1", true).unwrap();
        db.put_bytes(b"second", b"2", true).unwrap();

        // Second append fails; the first record is already applied
        assert!(db.txn_commit().is_err());
        assert_eq!(file.get(b"first"), Some(b"1".to_vec()));
        assert_eq!(file.get(b"second"), None);

        // The overlay is gone either way
        assert!(!db.in_transaction());
        assert!(matches!(db.txn_commit(), Err(DbError::NoTransaction)));
    }
}
