//! # kvbatch Core
//!
//! Commit batching for an embedded transactional key-value store.
//!
//! Durable commits are expensive: each one flushes to stable storage.
//! This crate keeps a single writable store transaction open and lets
//! many callers write into it under a lock. The transaction is committed
//! once enough mutations have accumulated, when the background committer
//! fires, or when the backend closes.
//!
//! This crate provides:
//! - [`BatchTx`] and its lock guard [`BatchTxGuard`], the batching write path
//! - [`Backend`], which owns the store, the batch transaction and the committer
//! - [`BackendMetrics`] with size, size-in-use, commit count and commit latency
//! - [`BackendConfig`] for the batch limit and interval
//!
//! ## Example
//!
//! ```rust
//! use kvbatch_core::{Backend, BackendConfig};
//! use std::time::Duration;
//!
//! let config = BackendConfig::new()
//!     .batch_limit(3)
//!     .batch_interval(Duration::ZERO);
//! let backend = Backend::open_in_memory(config).unwrap();
//!
//! let mut tx = backend.batch_tx().lock();
//! tx.create_bucket("key");
//! tx.put("key", b"foo", b"bar");
//! let (keys, values) = tx.range("key", b"foo", b"", 0);
//! assert_eq!(keys, vec![b"foo".to_vec()]);
//! assert_eq!(values, vec![b"bar".to_vec()]);
//! tx.unlock();
//!
//! // Two mutations are below the limit of three: nothing is committed yet.
//! assert_eq!(backend.commits(), 0);
//! backend.force_commit();
//! assert_eq!(backend.commits(), 1);
//! ```
//!
//! ## Failure model
//!
//! Opening, configuring and closing return [`CoreError`]. A store failure
//! while mutating, committing or reopening the batch transaction leaves
//! the batch in an unknown state; it is logged and the process panics.
//! Release builds abort on panic.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod batch_tx;
mod config;
mod error;
mod metrics;

pub use backend::Backend;
pub use batch_tx::{BatchTx, BatchTxGuard, RangeResult, SEQUENTIAL_FILL_PERCENT};
pub use config::{BackendConfig, DEFAULT_BATCH_INTERVAL, DEFAULT_BATCH_LIMIT};
pub use error::{CoreError, CoreResult};
pub use metrics::{BackendMetrics, DurationHistogram, MetricsSnapshot, COMMIT_DURATION_BUCKETS};

/// Storage types re-exported for convenience.
pub use kvbatch_storage::{InMemoryStore, RedbStore, StorageError, Store, StoreTxn};

/// kvbatch version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
