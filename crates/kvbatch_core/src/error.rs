//! Error types for kvbatch core.
//!
//! Only the edges of the backend return errors: opening, configuration and
//! shutdown. Failures on the mutation path are fatal and go through
//! the `fatal!` macro instead.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in kvbatch core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] kvbatch_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration is not usable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The background committer thread panicked.
    #[error("background committer panicked")]
    CommitterPanicked,
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Logs an unrecoverable storage failure and panics.
///
/// Release builds abort on panic, so this terminates the process.
macro_rules! fatal {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        tracing::error!(target: "kvbatch::fatal", "{}", message);
        panic!("{}", message)
    }};
}

pub(crate) use fatal;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = kvbatch_storage::StorageError::Open("locked".into()).into();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: failed to open store: locked");
    }

    #[test]
    #[should_panic(expected = "cannot commit tx (disk full)")]
    fn fatal_panics_with_message() {
        let reason = "disk full";
        fatal!("cannot commit tx ({})", reason);
    }
}
