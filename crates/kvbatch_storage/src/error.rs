//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bucket being created already exists.
    #[error("bucket already exists: {0}")]
    BucketExists(String),

    /// The addressed bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// The store could not be opened.
    #[error("failed to open store: {0}")]
    Open(String),

    /// A transaction could not be started.
    #[error("failed to begin transaction: {0}")]
    Begin(String),

    /// A transaction could not be committed.
    #[error("failed to commit transaction: {0}")]
    Commit(String),

    /// A read or write inside a transaction failed.
    #[error("storage engine error: {0}")]
    Engine(String),

    /// A failure injected through [`crate::FailPoint`].
    #[error("injected failure at {0:?}")]
    Injected(crate::FailPoint),
}

impl StorageError {
    /// Returns `true` if this error reports an already existing bucket.
    #[must_use]
    pub fn is_bucket_exists(&self) -> bool {
        matches!(self, Self::BucketExists(_))
    }

    /// Returns `true` if this error reports a missing bucket.
    #[must_use]
    pub fn is_bucket_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound(_))
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Open(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Begin(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        Self::Commit(err.to_string())
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        match err {
            redb::TableError::TableDoesNotExist(name) => Self::BucketNotFound(name),
            other => Self::Engine(other.to_string()),
        }
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        Self::Engine(err.to_string())
    }
}
