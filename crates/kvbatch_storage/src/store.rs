//! Transactional store contract.

use crate::error::StorageResult;
use std::ops::ControlFlow;

/// An owned key/value pair returned by cursors.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// An embedded, ordered, transactional key-value store.
///
/// Stores hold named buckets of ordered keys. All mutation goes through a
/// single writable transaction obtained from [`Store::begin`]; changes made
/// through it become durable only when [`StoreTxn::commit`] returns.
///
/// # Invariants
///
/// - At most one writable transaction is expected to be live at a time
/// - A committed transaction survives process termination
/// - Implementations must be `Send + Sync` for shared ownership
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing, with fault injection
/// - [`super::RedbStore`] - For persistent storage
pub trait Store: Send + Sync {
    /// The writable transaction handle produced by this store.
    type Txn: StoreTxn;

    /// Begins a new writable transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot start a transaction, for
    /// example because it is closed or its file cannot be grown.
    fn begin(&self) -> StorageResult<Self::Txn>;
}

/// A writable transaction over the buckets of a [`Store`].
///
/// Every bucket-addressed operation except [`StoreTxn::create_bucket`]
/// reports a missing bucket as [`crate::StorageError::BucketNotFound`].
pub trait StoreTxn: Send + 'static {
    /// The cursor type used for ordered scans.
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    /// Creates a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::BucketExists`] if the bucket already
    /// exists, or another error if it cannot be created.
    fn create_bucket(&mut self, name: &str) -> StorageResult<()>;

    /// Checks if `name` exists in this transaction's view.
    fn has_bucket(&self, name: &str) -> bool;

    /// Inserts or overwrites `key` in `bucket`.
    ///
    /// `fill_percent` tunes how full the store packs pages before
    /// splitting them. Stores without page-level control ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket does not exist or the write fails.
    fn put(
        &mut self,
        bucket: &str,
        key: &[u8],
        value: &[u8],
        fill_percent: Option<f64>,
    ) -> StorageResult<()>;

    /// Looks up a single key.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket does not exist or the read fails.
    fn get(&self, bucket: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Opens an ordered cursor over `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket does not exist.
    fn cursor(&self, bucket: &str) -> StorageResult<Self::Cursor<'_>>;

    /// Removes `key` from `bucket`. A missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket does not exist or the write fails.
    fn delete(&mut self, bucket: &str, key: &[u8]) -> StorageResult<()>;

    /// Visits every pair of `bucket` in ascending key order.
    ///
    /// Iteration stops as soon as `visitor` returns [`ControlFlow::Break`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket does not exist or the scan fails.
    fn for_each<F>(&self, bucket: &str, visitor: F) -> StorageResult<()>
    where
        F: FnMut(&[u8], &[u8]) -> ControlFlow<()>;

    /// Reports size and free-space statistics as seen by this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the statistics cannot be computed.
    fn stats(&self) -> StorageResult<TxnStats>;

    /// Durably commits every change made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush to stable storage fails. The
    /// transaction is consumed either way.
    fn commit(self) -> StorageResult<()>;
}

/// An ordered cursor over one bucket.
pub trait Cursor {
    /// Positions the cursor at the first key `>= key` and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn seek(&mut self, key: &[u8]) -> StorageResult<Option<KeyValue>>;

    /// Advances to the next key in ascending order.
    ///
    /// Returns `None` once the bucket is exhausted, or if the cursor was
    /// never positioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn next(&mut self) -> StorageResult<Option<KeyValue>>;
}

/// Size statistics reported by a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnStats {
    /// Total size of the store in bytes as seen by the transaction.
    pub size: u64,
    /// Number of allocated pages that currently hold no data.
    pub free_page_count: u64,
    /// Page size in bytes.
    pub page_size: u64,
}

impl TxnStats {
    /// Returns the bytes actually holding data: `size` minus free pages.
    #[must_use]
    pub fn size_in_use(&self) -> u64 {
        self.size
            .saturating_sub(self.free_page_count.saturating_mul(self.page_size))
    }
}
