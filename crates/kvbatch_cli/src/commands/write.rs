//! Mutating commands.

use super::{require_bucket, CommandResult, StoreOptions};

/// Creates `bucket`.
pub fn create_bucket(options: &StoreOptions, bucket: &str) -> CommandResult {
    let backend = options.open()?;
    backend.batch_tx().lock().create_bucket(bucket);
    backend.close()?;
    println!("Bucket {bucket} ready");
    Ok(())
}

/// Writes `key = value` into `bucket`, creating the bucket if needed.
pub fn put(options: &StoreOptions, bucket: &str, key: &str, value: &str) -> CommandResult {
    let backend = options.open()?;
    let mut tx = backend.batch_tx().lock();
    tx.create_bucket(bucket);
    tx.put(bucket, key.as_bytes(), value.as_bytes());
    tx.unlock();
    backend.close()?;
    println!("OK");
    Ok(())
}

/// Deletes `key` from `bucket`. The bucket must exist.
pub fn delete(options: &StoreOptions, bucket: &str, key: &str) -> CommandResult {
    let backend = options.open()?;
    let mut tx = backend.batch_tx().lock();
    require_bucket(&tx, bucket)?;
    let existed = !tx.range(bucket, key.as_bytes(), b"", 0).0.is_empty();
    tx.delete(bucket, key.as_bytes());
    tx.unlock();
    backend.close()?;
    if existed {
        println!("Deleted");
    } else {
        println!("Not found");
    }
    Ok(())
}
