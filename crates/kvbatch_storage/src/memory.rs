//! In-memory transactional store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::{Cursor, KeyValue, Store, StoreTxn, TxnStats};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::ops::{Bound, ControlFlow};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Page size reported by [`InMemoryStore`] statistics.
pub const MEMORY_PAGE_SIZE: u64 = 4096;

/// Pages reserved for store metadata, mirroring a two-meta-page layout.
const META_PAGES: u64 = 2;

type Bucket = BTreeMap<Vec<u8>, Vec<u8>>;
type Buckets = BTreeMap<String, Bucket>;

/// A store operation that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// [`Store::begin`].
    Begin,
    /// [`StoreTxn::commit`].
    Commit,
    /// [`StoreTxn::create_bucket`], for buckets that do not exist yet.
    CreateBucket,
    /// [`StoreTxn::put`].
    Put,
    /// [`StoreTxn::delete`].
    Delete,
}

#[derive(Debug, Default)]
struct Committed {
    buckets: Buckets,
    /// Largest page count ever committed. Space is never returned.
    high_water_pages: u64,
}

#[derive(Debug, Default)]
struct Shared {
    committed: Mutex<Committed>,
    faults: Mutex<HashSet<FailPoint>>,
    fill_hints: Mutex<BTreeMap<String, f64>>,
    begins: AtomicU64,
    commits: AtomicU64,
}

impl Shared {
    fn check(&self, point: FailPoint) -> StorageResult<()> {
        if self.faults.lock().remove(&point) {
            return Err(StorageError::Injected(point));
        }
        Ok(())
    }
}

/// An in-memory transactional store.
///
/// Each transaction works on a private copy of the committed buckets and
/// publishes it atomically on commit, so uncommitted writes are never
/// visible through [`InMemoryStore::committed_value`].
///
/// This store is suitable for:
/// - Unit tests
/// - Integration tests that need to observe commits or inject failures
///
/// Clones share the same underlying data.
///
/// # Example
///
/// ```rust
/// use kvbatch_storage::{InMemoryStore, Store, StoreTxn};
///
/// let store = InMemoryStore::new();
/// let mut txn = store.begin().unwrap();
/// txn.create_bucket("key").unwrap();
/// txn.put("key", b"foo", b"bar", None).unwrap();
/// txn.commit().unwrap();
///
/// assert_eq!(store.committed_value("key", b"foo"), Some(b"bar".to_vec()));
/// assert_eq!(store.commit_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `point` so that its next invocation fails with
    /// [`StorageError::Injected`].
    pub fn fail_next(&self, point: FailPoint) {
        self.shared.faults.lock().insert(point);
    }

    /// Returns the number of transactions begun.
    #[must_use]
    pub fn begin_count(&self) -> u64 {
        self.shared.begins.load(Ordering::SeqCst)
    }

    /// Returns the number of successful commits.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Returns the names of all committed buckets.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        self.shared.committed.lock().buckets.keys().cloned().collect()
    }

    /// Returns the committed value of `key`, ignoring any open transaction.
    #[must_use]
    pub fn committed_value(&self, bucket: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.shared
            .committed
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
    }

    /// Returns the last fill-percent hint passed for `bucket`.
    #[must_use]
    pub fn fill_percent(&self, bucket: &str) -> Option<f64> {
        self.shared.fill_hints.lock().get(bucket).copied()
    }
}

impl Store for InMemoryStore {
    type Txn = InMemoryTxn;

    fn begin(&self) -> StorageResult<InMemoryTxn> {
        self.shared.check(FailPoint::Begin)?;
        self.shared.begins.fetch_add(1, Ordering::SeqCst);
        let buckets = self.shared.committed.lock().buckets.clone();
        Ok(InMemoryTxn {
            shared: Arc::clone(&self.shared),
            buckets,
        })
    }
}

/// A transaction over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTxn {
    shared: Arc<Shared>,
    buckets: Buckets,
}

impl InMemoryTxn {
    fn bucket(&self, name: &str) -> StorageResult<&Bucket> {
        self.buckets
            .get(name)
            .ok_or_else(|| StorageError::BucketNotFound(name.to_string()))
    }

    fn bucket_mut(&mut self, name: &str) -> StorageResult<&mut Bucket> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| StorageError::BucketNotFound(name.to_string()))
    }

    fn page_count(&self) -> u64 {
        let bytes: u64 = self
            .buckets
            .values()
            .flat_map(|bucket| bucket.iter())
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        META_PAGES + self.buckets.len() as u64 + bytes.div_ceil(MEMORY_PAGE_SIZE)
    }
}

impl StoreTxn for InMemoryTxn {
    type Cursor<'a> = InMemoryCursor<'a>;

    fn create_bucket(&mut self, name: &str) -> StorageResult<()> {
        if self.buckets.contains_key(name) {
            return Err(StorageError::BucketExists(name.to_string()));
        }
        self.shared.check(FailPoint::CreateBucket)?;
        self.buckets.insert(name.to_string(), Bucket::new());
        Ok(())
    }

    fn has_bucket(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    fn put(
        &mut self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
        fill_percent: Option<f64>,
    ) -> StorageResult<()> {
        let shared = Arc::clone(&self.shared);
        let entries = self.bucket_mut(bucket)?;
        shared.check(FailPoint::Put)?;
        if let Some(percent) = fill_percent {
            shared.fill_hints.lock().insert(bucket.to_string(), percent);
        }
        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.bucket(bucket)?.get(key).cloned())
    }

    fn cursor(&self, bucket: &str) -> StorageResult<InMemoryCursor<'_>> {
        Ok(InMemoryCursor {
            bucket: self.bucket(bucket)?,
            position: None,
        })
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> StorageResult<()> {
        let shared = Arc::clone(&self.shared);
        let entries = self.bucket_mut(bucket)?;
        shared.check(FailPoint::Delete)?;
        entries.remove(key);
        Ok(())
    }

    fn for_each<F>(&self, bucket: &str, mut visitor: F) -> StorageResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    {
        for (k, v) in self.bucket(bucket)? {
            if visitor(k, v).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn stats(&self) -> StorageResult<TxnStats> {
        let pages = self.page_count();
        let allocated = self.shared.committed.lock().high_water_pages.max(pages);
        Ok(TxnStats {
            size: allocated * MEMORY_PAGE_SIZE,
            free_page_count: allocated - pages,
            page_size: MEMORY_PAGE_SIZE,
        })
    }

    fn commit(self) -> StorageResult<()> {
        self.shared.check(FailPoint::Commit)?;
        let pages = self.page_count();
        let mut committed = self.shared.committed.lock();
        committed.high_water_pages = committed.high_water_pages.max(pages);
        committed.buckets = self.buckets;
        drop(committed);
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A cursor over one bucket of an [`InMemoryTxn`].
#[derive(Debug)]
pub struct InMemoryCursor<'a> {
    bucket: &'a Bucket,
    position: Option<Vec<u8>>,
}

impl InMemoryCursor<'_> {
    fn first_after(&mut self, lower: Bound<&[u8]>) -> Option<KeyValue> {
        let entry = self
            .bucket
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        self.position = entry.as_ref().map(|(k, _)| k.clone());
        entry
    }
}

impl Cursor for InMemoryCursor<'_> {
    fn seek(&mut self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        Ok(self.first_after(Bound::Included(key)))
    }

    fn next(&mut self) -> StorageResult<Option<KeyValue>> {
        let Some(position) = self.position.take() else {
            return Ok(None);
        };
        Ok(self.first_after(Bound::Excluded(position.as_slice())))
    }
}
