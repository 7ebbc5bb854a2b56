//! Read-only commands.

use super::{render, require_bucket, CommandResult, OutputFormat, StoreOptions};
use serde::Serialize;

/// A key-value pair as printed in JSON output.
#[derive(Debug, Serialize)]
pub struct Entry {
    /// Key, lossily decoded as UTF-8.
    pub key: String,
    /// Value, lossily decoded as UTF-8.
    pub value: String,
}

/// Prints the value of `key` in `bucket`. The bucket must exist.
pub fn get(options: &StoreOptions, bucket: &str, key: &str) -> CommandResult {
    let backend = options.open()?;
    let tx = backend.batch_tx().lock();
    require_bucket(&tx, bucket)?;
    let (_, values) = tx.range(bucket, key.as_bytes(), b"", 0);
    drop(tx);
    backend.close()?;

    match values.first() {
        Some(value) => println!("{}", render(value)),
        None => return Err(format!("Key {key:?} not found in bucket {bucket}").into()),
    }
    Ok(())
}

/// Prints the pairs of `bucket` with `start <= key < end`.
pub fn range(
    options: &StoreOptions,
    bucket: &str,
    start: &str,
    end: &str,
    limit: i64,
    format: OutputFormat,
) -> CommandResult {
    if end.is_empty() {
        return Err("End key must not be empty; use get for point lookups".into());
    }

    let backend = options.open()?;
    let tx = backend.batch_tx().lock();
    require_bucket(&tx, bucket)?;
    let (keys, values) = tx.range(bucket, start.as_bytes(), end.as_bytes(), limit);
    drop(tx);
    backend.close()?;

    let entries: Vec<Entry> = keys
        .iter()
        .zip(&values)
        .map(|(key, value)| Entry {
            key: render(key),
            value: render(value),
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{} = {}", entry.key, entry.value);
            }
            println!("({} entries)", entries.len());
        }
    }
    Ok(())
}
