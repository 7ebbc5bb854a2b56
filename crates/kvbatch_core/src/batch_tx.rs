//! The batching write transaction.
//!
//! A [`BatchTx`] keeps one writable store transaction open and funnels every
//! caller's mutations into it. Mutations are counted; when a caller releases
//! the lock and the count has reached the backend's `batch_limit`, the
//! transaction is committed and a fresh one is opened before the lock is
//! handed to the next caller. Many logical writes therefore share a single
//! durable flush.
//!
//! Holding the lock is a type-level obligation: every read and write is a
//! method of the [`BatchTxGuard`] returned by [`BatchTx::lock`].
//!
//! Store failures on this path are fatal. The batch is all-or-nothing, so a
//! half-applied batch cannot be salvaged here.

use crate::backend::BackendShared;
use crate::error::fatal;
use kvbatch_storage::{Cursor, StorageError, Store, StoreTxn};
use parking_lot::{Mutex, MutexGuard};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Fill ratio requested from the store for append-only key patterns.
pub const SEQUENTIAL_FILL_PERCENT: f64 = 0.9;

/// Parallel key and value lists returned by [`BatchTxGuard::range`].
pub type RangeResult = (Vec<Vec<u8>>, Vec<Vec<u8>>);

struct TxState<T> {
    /// `None` only after `commit_and_stop`.
    tx: Option<T>,
    pending: usize,
}

/// A write transaction that batches many mutations per durable commit.
///
/// Created by [`crate::Backend`]; shared by every writer of that backend.
pub struct BatchTx<S: Store> {
    state: Mutex<TxState<S::Txn>>,
    backend: Arc<BackendShared<S>>,
}

impl<S: Store> BatchTx<S> {
    /// Creates the batch transaction and opens its first store transaction.
    pub(crate) fn new(backend: Arc<BackendShared<S>>) -> Self {
        let batch = Self {
            state: Mutex::new(TxState {
                tx: None,
                pending: 0,
            }),
            backend,
        };
        batch.commit();
        batch
    }

    /// Blocks until exclusive access is granted.
    ///
    /// Releasing the returned guard may commit; see [`BatchTxGuard`].
    pub fn lock(&self) -> BatchTxGuard<'_, S> {
        BatchTxGuard {
            batch: self,
            state: self.state.lock(),
        }
    }

    /// Commits pending mutations and opens a new transaction.
    ///
    /// Does nothing if no mutation is pending.
    pub fn commit(&self) {
        self.lock().commit_locked(false);
    }

    /// Commits the current transaction without opening a new one.
    ///
    /// Flushes even when nothing is pending. Afterwards every read or write
    /// through [`BatchTx::lock`] is fatal until [`BatchTx::commit`] opens a
    /// new transaction.
    pub fn commit_and_stop(&self) {
        self.lock().commit_locked(true);
    }
}

/// Exclusive access to a [`BatchTx`].
///
/// Dropping the guard releases the lock. If the pending mutation count has
/// reached the backend's `batch_limit` at that moment, the transaction is
/// committed and replaced first. The limit is checked only here, so one
/// long critical section can run past it.
pub struct BatchTxGuard<'a, S: Store> {
    batch: &'a BatchTx<S>,
    state: MutexGuard<'a, TxState<S::Txn>>,
}

impl<S: Store> BatchTxGuard<'_, S> {
    /// Releases the lock, committing first if the batch is full.
    pub fn unlock(self) {
        drop(self);
    }

    /// Returns the number of mutations applied since the last commit.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.pending
    }

    /// Creates `name`. Creating an existing bucket is a no-op.
    pub fn create_bucket(&mut self, name: &str) {
        match self.tx_mut().create_bucket(name) {
            Ok(()) => {}
            Err(err) if err.is_bucket_exists() => {}
            Err(err) => fatal!("cannot create bucket {} ({})", name, err),
        }
        self.state.pending += 1;
    }

    /// Checks if `name` exists, including buckets created in this batch.
    #[must_use]
    pub fn has_bucket(&self, name: &str) -> bool {
        self.tx().has_bucket(name)
    }

    /// Inserts or overwrites `key` in `bucket`.
    pub fn put(&mut self, bucket: &str, key: &[u8], value: &[u8]) {
        self.put_inner(bucket, key, value, false);
    }

    /// Like [`BatchTxGuard::put`], hinting that keys arrive in increasing
    /// order so the store can pack pages more densely.
    pub fn seq_put(&mut self, bucket: &str, key: &[u8], value: &[u8]) {
        self.put_inner(bucket, key, value, true);
    }

    fn put_inner(&mut self, bucket: &str, key: &[u8], value: &[u8], seq: bool) {
        let fill_percent = seq.then_some(SEQUENTIAL_FILL_PERCENT);
        if let Err(err) = self.tx_mut().put(bucket, key, value, fill_percent) {
            store_failure("put key into", bucket, err);
        }
        self.state.pending += 1;
    }

    /// Reads from `bucket`.
    ///
    /// With an empty `end_key` this is a point lookup of `key` returning at
    /// most one pair. Otherwise it scans `key <= k < end_key` in ascending
    /// order, stopping after `limit` pairs when `limit > 0`.
    #[must_use]
    pub fn range(&self, bucket: &str, key: &[u8], end_key: &[u8], limit: i64) -> RangeResult {
        let tx = self.tx();
        let mut keys = Vec::new();
        let mut values = Vec::new();

        if end_key.is_empty() {
            match tx.get(bucket, key) {
                Ok(Some(value)) => {
                    keys.push(key.to_vec());
                    values.push(value);
                }
                Ok(None) => {}
                Err(err) => store_failure("read", bucket, err),
            }
            return (keys, values);
        }

        let max = usize::try_from(limit).ok().filter(|&n| n > 0);
        let mut cursor = tx
            .cursor(bucket)
            .unwrap_or_else(|err| store_failure("read", bucket, err));
        let mut entry = cursor.seek(key);
        loop {
            let (k, v) = match entry {
                Ok(Some(kv)) => kv,
                Ok(None) => break,
                Err(err) => store_failure("read", bucket, err),
            };
            if k.as_slice() >= end_key {
                break;
            }
            keys.push(k);
            values.push(v);
            if max == Some(keys.len()) {
                break;
            }
            entry = cursor.next();
        }

        (keys, values)
    }

    /// Removes `key` from `bucket`. A missing key is not an error.
    pub fn delete(&mut self, bucket: &str, key: &[u8]) {
        if let Err(err) = self.tx_mut().delete(bucket, key) {
            store_failure("delete key from", bucket, err);
        }
        self.state.pending += 1;
    }

    /// Visits every pair of `bucket` in ascending key order.
    ///
    /// A missing bucket visits nothing and succeeds.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `visitor`; iteration stops at the
    /// pair that produced it.
    pub fn for_each<E, F>(&self, bucket: &str, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        let mut failure = None;
        let scan = self.tx().for_each(bucket, |k, v| match visitor(k, v) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => {
                failure = Some(err);
                ControlFlow::Break(())
            }
        });

        match scan {
            Ok(()) => {}
            Err(err) if err.is_bucket_not_found() => return Ok(()),
            Err(err) => fatal!("cannot iterate bucket {} ({})", bucket, err),
        }
        failure.map_or(Ok(()), Err)
    }

    fn tx(&self) -> &S::Txn {
        self.state
            .tx
            .as_ref()
            .unwrap_or_else(|| fatal!("batch transaction is stopped"))
    }

    fn tx_mut(&mut self) -> &mut S::Txn {
        self.state
            .tx
            .as_mut()
            .unwrap_or_else(|| fatal!("batch transaction is stopped"))
    }

    fn commit_locked(&mut self, stop: bool) {
        let batch = self.batch;
        let backend = &batch.backend;

        match self.state.tx.take() {
            Some(tx) if self.state.pending == 0 && !stop => {
                self.state.tx = Some(tx);
                return;
            }
            Some(tx) => {
                let start = Instant::now();
                let result = tx.commit();
                let elapsed = start.elapsed();

                backend.metrics.record_commit(elapsed);
                let pending = std::mem::take(&mut self.state.pending);
                if let Err(err) = result {
                    fatal!("cannot commit tx ({})", err);
                }
                debug!(pending, ?elapsed, "committed batch");
            }
            None => {}
        }

        if stop {
            debug!("batch transaction stopped");
            return;
        }

        let _shared = backend.mu.read();
        let tx = backend
            .store
            .begin()
            .unwrap_or_else(|err| fatal!("cannot begin tx ({})", err));
        match tx.stats() {
            Ok(stats) => backend.metrics.set_sizes(stats.size, stats.size_in_use()),
            Err(err) => warn!(%err, "cannot read store statistics"),
        }
        self.state.tx = Some(tx);
    }
}

impl<S: Store> Drop for BatchTxGuard<'_, S> {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        if self.state.pending >= self.batch.backend.batch_limit {
            self.commit_locked(false);
        }
    }
}

fn store_failure(action: &str, bucket: &str, err: StorageError) -> ! {
    if err.is_bucket_not_found() {
        fatal!("bucket {} does not exist", bucket);
    }
    fatal!("cannot {} bucket {} ({})", action, bucket, err)
}
