//! Redb-backed persistent store.
//!
//! Each bucket is a redb table keyed and valued by raw bytes. Redb creates
//! tables on first open, so the transaction tracks bucket names itself to
//! report missing buckets the way the [`Store`] contract requires.
//!
//! No table handle outlives a single lookup. Redb refuses to open a table
//! twice within one transaction, so iteration and cursors re-open the table
//! for every step and callers may read the same bucket while visiting it.

use crate::error::{StorageError, StorageResult};
use crate::store::{Cursor, KeyValue, Store, StoreTxn, TxnStats};
use redb::{Database, ReadableTable, Table, TableDefinition, TableHandle};
use std::collections::HashSet;
use std::ops::{Bound, ControlFlow};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

type Bytes = &'static [u8];

fn definition(name: &str) -> TableDefinition<'_, Bytes, Bytes> {
    TableDefinition::new(name)
}

/// Configuration for [`RedbStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RedbStoreConfig {
    /// Cache size in bytes. Uses redb's default when unset.
    pub cache_size: Option<usize>,
}

impl RedbStoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }
}

/// A persistent store backed by a single redb file.
///
/// Commits use redb's default immediate durability: when
/// [`StoreTxn::commit`] returns, the data has been fsynced.
///
/// # Example
///
/// ```no_run
/// use kvbatch_storage::{RedbStore, Store, StoreTxn};
///
/// let store = RedbStore::open("data.redb").unwrap();
/// let mut txn = store.begin().unwrap();
/// txn.create_bucket("key").unwrap();
/// txn.put("key", b"foo", b"bar", None).unwrap();
/// txn.commit().unwrap();
/// ```
pub struct RedbStore {
    db: Database,
    path: Option<PathBuf>,
    /// Largest size ever reported, in bytes.
    high_water: Arc<AtomicU64>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").field("path", &self.path).finish()
    }
}

impl RedbStore {
    /// Opens or creates a store at `path` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the file cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(path, RedbStoreConfig::default())
    }

    /// Opens or creates a store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file
    /// cannot be opened.
    pub fn open_with_config(path: impl AsRef<Path>, config: RedbStoreConfig) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }
        let db = builder.create(path)?;
        debug!(path = %path.display(), "opened redb store");

        Ok(Self {
            db,
            path: Some(path.to_path_buf()),
            high_water: Arc::default(),
        })
    }

    /// Creates a store that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be created.
    pub fn in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Ok(Self {
            db,
            path: None,
            high_water: Arc::default(),
        })
    }

    /// Returns the file path, or `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Store for RedbStore {
    type Txn = RedbTxn;

    fn begin(&self) -> StorageResult<RedbTxn> {
        let txn = self.db.begin_write()?;
        let buckets = txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect();
        Ok(RedbTxn {
            txn,
            buckets,
            path: self.path.clone(),
            high_water: Arc::clone(&self.high_water),
        })
    }
}

/// A write transaction over a [`RedbStore`].
pub struct RedbTxn {
    txn: redb::WriteTransaction,
    buckets: HashSet<String>,
    path: Option<PathBuf>,
    high_water: Arc<AtomicU64>,
}

impl RedbTxn {
    fn ensure_bucket(&self, name: &str) -> StorageResult<()> {
        if self.buckets.contains(name) {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(name.to_string()))
        }
    }

    fn table(&self, name: &str) -> StorageResult<Table<'_, Bytes, Bytes>> {
        self.ensure_bucket(name)?;
        Ok(self.txn.open_table(definition(name))?)
    }

    /// Returns the first pair of `bucket` at or after `lower`.
    ///
    /// The table is closed again before returning.
    fn first_after(&self, bucket: &str, lower: Bound<&[u8]>) -> StorageResult<Option<KeyValue>> {
        let table = self.table(bucket)?;
        let mut range = table.range::<&[u8]>((lower, Bound::Unbounded))?;
        let entry = match range.next() {
            Some(entry) => {
                let (k, v) = entry?;
                Some((k.value().to_vec(), v.value().to_vec()))
            }
            None => None,
        };
        Ok(entry)
    }

    /// Length of the backing file, or zero for in-memory stores.
    fn file_len(&self) -> StorageResult<u64> {
        match &self.path {
            Some(path) => Ok(std::fs::metadata(path)?.len()),
            None => Ok(0),
        }
    }
}

impl StoreTxn for RedbTxn {
    type Cursor<'a> = RedbCursor<'a>;

    fn create_bucket(&mut self, name: &str) -> StorageResult<()> {
        if self.buckets.contains(name) {
            return Err(StorageError::BucketExists(name.to_string()));
        }
        self.txn.open_table(definition(name))?;
        self.buckets.insert(name.to_string());
        Ok(())
    }

    fn has_bucket(&self, name: &str) -> bool {
        self.buckets.contains(name)
    }

    fn put(
        &mut self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
        _fill_percent: Option<f64>,
    ) -> StorageResult<()> {
        let mut table = self.table(bucket)?;
        table.insert(key, value)?;
        Ok(())
    }

    fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let table = self.table(bucket)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn cursor(&self, bucket: &str) -> StorageResult<RedbCursor<'_>> {
        self.ensure_bucket(bucket)?;
        Ok(RedbCursor {
            txn: self,
            bucket: bucket.to_string(),
            position: None,
        })
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> StorageResult<()> {
        let mut table = self.table(bucket)?;
        table.remove(key)?;
        Ok(())
    }

    fn for_each<F>(&self, bucket: &str, mut visitor: F) -> StorageResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    {
        let mut entry = self.first_after(bucket, Bound::Unbounded)?;
        while let Some((k, v)) = entry {
            if visitor(&k, &v).is_break() {
                break;
            }
            entry = self.first_after(bucket, Bound::Excluded(k.as_slice()))?;
        }
        Ok(())
    }

    fn stats(&self) -> StorageResult<TxnStats> {
        let stats = self.txn.stats()?;
        let page_size = (stats.page_size() as u64).max(1);
        let in_use = stats.allocated_pages() * page_size;

        // Redb may trim the file tail; the reported size never shrinks.
        let current = self.file_len()?.max(in_use);
        let size = self.high_water.fetch_max(current, Ordering::SeqCst).max(current);
        Ok(TxnStats {
            size,
            free_page_count: (size - in_use) / page_size,
            page_size,
        })
    }

    fn commit(self) -> StorageResult<()> {
        self.txn.commit()?;
        Ok(())
    }
}

/// A cursor over one redb table.
///
/// Each step is a fresh range lookup starting after the last returned key,
/// so the cursor never keeps the table open between steps.
pub struct RedbCursor<'a> {
    txn: &'a RedbTxn,
    bucket: String,
    position: Option<Vec<u8>>,
}

impl RedbCursor<'_> {
    fn first_after(&mut self, lower: Bound<&[u8]>) -> StorageResult<Option<KeyValue>> {
        let entry = self.txn.first_after(&self.bucket, lower)?;
        self.position = entry.as_ref().map(|(k, _)| k.clone());
        Ok(entry)
    }
}

impl Cursor for RedbCursor<'_> {
    fn seek(&mut self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        self.first_after(Bound::Included(key))
    }

    fn next(&mut self) -> StorageResult<Option<KeyValue>> {
        let Some(position) = self.position.take() else {
            return Ok(None);
        };
        self.first_after(Bound::Excluded(position.as_slice()))
    }
}
