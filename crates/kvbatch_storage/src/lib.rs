//! # kvbatch Storage
//!
//! The transactional bucket store underneath kvbatch.
//!
//! This crate defines the narrow contract the batching layer consumes:
//! a [`Store`] hands out one writable [`StoreTxn`] at a time, and the
//! transaction offers bucket creation, get/put/delete, ordered [`Cursor`]
//! scans, full-bucket iteration, size statistics and a durable commit.
//! Page management, isolation and the on-disk format stay inside the
//! implementation.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing, with commit counters and fault injection
//! - [`RedbStore`] - For persistent storage using redb
//!
//! ## Example
//!
//! ```rust
//! use kvbatch_storage::{Cursor, InMemoryStore, Store, StoreTxn};
//!
//! let store = InMemoryStore::new();
//! let mut txn = store.begin().unwrap();
//! txn.create_bucket("key").unwrap();
//! txn.put("key", b"a", b"1", None).unwrap();
//! txn.put("key", b"b", b"2", None).unwrap();
//!
//! let mut cursor = txn.cursor("key").unwrap();
//! assert_eq!(cursor.seek(b"a").unwrap(), Some((b"a".to_vec(), b"1".to_vec())));
//! assert_eq!(cursor.next().unwrap(), Some((b"b".to_vec(), b"2".to_vec())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod redb_store;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::{FailPoint, InMemoryCursor, InMemoryStore, InMemoryTxn, MEMORY_PAGE_SIZE};
pub use redb_store::{RedbCursor, RedbStore, RedbStoreConfig, RedbTxn};
pub use store::{Cursor, KeyValue, Store, StoreTxn, TxnStats};
