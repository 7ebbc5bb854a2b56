//! CLI command implementations.

pub mod inspect;
pub mod load;
pub mod read;
pub mod write;

use clap::ValueEnum;
use kvbatch_core::{Backend, BackendConfig, BatchTxGuard, CoreResult, RedbStore};
use std::path::PathBuf;

/// Result type shared by all commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Output format for commands that print structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Options needed to open a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Path to the store file.
    pub path: PathBuf,
    /// Commit threshold for the batching layer.
    pub batch_limit: usize,
}

impl StoreOptions {
    /// Opens the backend described by these options.
    pub fn open(&self) -> CoreResult<Backend<RedbStore>> {
        let config = BackendConfig::new().batch_limit(self.batch_limit);
        Backend::open(&self.path, config)
    }
}

/// Fails unless `bucket` exists.
///
/// The batch layer treats a missing bucket as fatal, so commands that take
/// a bucket name from the user check it first.
pub fn require_bucket(tx: &BatchTxGuard<'_, RedbStore>, bucket: &str) -> CommandResult {
    if tx.has_bucket(bucket) {
        Ok(())
    } else {
        Err(format!("Bucket {bucket} not found").into())
    }
}

/// Renders stored bytes for display.
pub fn render(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
