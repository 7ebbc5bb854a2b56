//! Backend coordination surface.
//!
//! A [`Backend`] owns the store, the batching transaction writing into it,
//! the metrics that transaction publishes, and an optional background
//! committer that flushes pending mutations on a fixed interval.

use crate::batch_tx::BatchTx;
use crate::config::BackendConfig;
use crate::error::{CoreError, CoreResult};
use crate::metrics::BackendMetrics;
use kvbatch_storage::{InMemoryStore, RedbStore, RedbStoreConfig, Store};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// State shared between a backend and its batch transaction.
pub(crate) struct BackendShared<S> {
    pub(crate) store: S,
    /// Held shared while a new transaction is begun, exclusive for
    /// whole-store operations.
    pub(crate) mu: RwLock<()>,
    pub(crate) metrics: BackendMetrics,
    pub(crate) batch_limit: usize,
}

impl<S: Store> BackendShared<S> {
    pub(crate) fn new(store: S, batch_limit: usize) -> Self {
        Self {
            store,
            mu: RwLock::new(()),
            metrics: BackendMetrics::new(),
            batch_limit,
        }
    }
}

struct Committer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Committer {
    fn spawn<S: Store + 'static>(batch_tx: Arc<BatchTx<S>>, interval: Duration) -> CoreResult<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("kvbatch-committer".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => batch_tx.commit(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self { stop, handle })
    }

    fn shutdown(self) -> CoreResult<()> {
        // The thread may already be gone, in which case join reports it.
        let _ = self.stop.send(());
        self.handle
            .join()
            .map_err(|_| CoreError::CommitterPanicked)
    }
}

/// A store plus the batching transaction that writes into it.
///
/// ## Example
///
/// ```rust
/// use kvbatch_core::{Backend, BackendConfig};
///
/// let backend = Backend::open_in_memory(BackendConfig::new().batch_limit(2)).unwrap();
///
/// let mut tx = backend.batch_tx().lock();
/// tx.create_bucket("key");
/// tx.put("key", b"foo", b"bar");
/// tx.unlock(); // two pending mutations: commits here
///
/// assert_eq!(backend.commits(), 1);
/// backend.close().unwrap();
/// ```
pub struct Backend<S: Store + 'static> {
    shared: Arc<BackendShared<S>>,
    batch_tx: Arc<BatchTx<S>>,
    committer: Mutex<Option<Committer>>,
    is_open: RwLock<bool>,
}

impl Backend<RedbStore> {
    /// Opens or creates a redb-backed backend at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store
    /// cannot be opened.
    pub fn open(path: impl AsRef<Path>, config: BackendConfig) -> CoreResult<Self> {
        config.validate()?;
        let mut store_config = RedbStoreConfig::new();
        store_config.cache_size = config.cache_size;
        let store = RedbStore::open_with_config(path.as_ref(), store_config)?;
        info!(path = %path.as_ref().display(), "opened backend");
        Self::with_store(store, config)
    }
}

impl Backend<InMemoryStore> {
    /// Opens a backend over a fresh [`InMemoryStore`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn open_in_memory(config: BackendConfig) -> CoreResult<Self> {
        Self::with_store(InMemoryStore::new(), config)
    }
}

impl<S: Store + 'static> Backend<S> {
    /// Wraps an already opened store.
    ///
    /// Opens the first batch transaction immediately and, if
    /// `config.batch_interval` is non-zero, starts the background committer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the committer
    /// thread cannot be spawned.
    pub fn with_store(store: S, config: BackendConfig) -> CoreResult<Self> {
        config.validate()?;

        let shared = Arc::new(BackendShared::new(store, config.batch_limit));
        let batch_tx = Arc::new(BatchTx::new(Arc::clone(&shared)));

        let committer = if config.batch_interval.is_zero() {
            None
        } else {
            Some(Committer::spawn(
                Arc::clone(&batch_tx),
                config.batch_interval,
            )?)
        };

        debug!(
            batch_limit = config.batch_limit,
            batch_interval = ?config.batch_interval,
            "backend ready"
        );

        Ok(Self {
            shared,
            batch_tx,
            committer: Mutex::new(committer),
            is_open: RwLock::new(true),
        })
    }

    /// Returns the batching transaction.
    #[must_use]
    pub fn batch_tx(&self) -> &BatchTx<S> {
        &self.batch_tx
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Commits pending mutations now, regardless of the batch limit.
    ///
    /// Locks the batch transaction; see [`Backend::close`].
    pub fn force_commit(&self) {
        self.batch_tx.commit();
    }

    /// Runs `f` while holding the backend lock exclusively.
    ///
    /// No batch transaction can be begun meanwhile, so commits that need to
    /// reopen wait until `f` returns.
    ///
    /// # Deadlocks
    ///
    /// `f` must not lock this backend's batch transaction:
    /// - If another thread is committing, it holds the batch lock while it
    ///   waits for this one to reopen, so neither side progresses.
    /// - If the calling thread already holds a [`crate::BatchTxGuard`], the
    ///   batch lock is not reentrant and the thread waits on itself.
    ///
    /// Calling this method while holding a guard is allowed, but that guard
    /// must not be released inside `f`. Releasing a full guard commits and
    /// reopens, which needs the lock held here. [`Backend::close`] and
    /// [`Backend::force_commit`] lock the batch transaction themselves and
    /// never return when called by a thread that holds a guard.
    pub fn with_exclusive<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let _exclusive = self.shared.mu.write();
        f(&self.shared.store)
    }

    /// Returns the metrics published by the batch transaction.
    #[must_use]
    pub fn metrics(&self) -> &BackendMetrics {
        &self.shared.metrics
    }

    /// Returns the total size of the store in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.shared.metrics.size()
    }

    /// Returns the bytes of the store holding data.
    #[must_use]
    pub fn size_in_use(&self) -> u64 {
        self.shared.metrics.size_in_use()
    }

    /// Returns the number of commits performed.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.shared.metrics.commits()
    }

    /// Closes the backend.
    ///
    /// Stops the background committer, then commits and stops the batch
    /// transaction. Closing twice is a no-op.
    ///
    /// Locks the batch transaction, so calling it while the same thread
    /// holds a [`crate::BatchTxGuard`] of this backend never returns.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CommitterPanicked`] if the committer thread
    /// panicked. The batch transaction is stopped either way.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        let stopped = match self.committer.lock().take() {
            Some(committer) => committer.shutdown(),
            None => Ok(()),
        };
        self.batch_tx.commit_and_stop();
        info!(commits = self.commits(), "backend closed");
        stopped
    }

    /// Checks if the backend is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }
}

impl<S: Store + 'static> Drop for Backend<S> {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        let _ = self.close();
    }
}
