//! Bulk load command.
//!
//! Writes generated, increasing keys with `seq_put` so the run exercises
//! the batching layer the way an append-heavy writer would.

use super::{CommandResult, StoreOptions};
use std::time::Instant;
use tracing::info;

/// What to load.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    /// Number of keys to write.
    pub count: u64,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Mutations applied per lock acquisition.
    pub per_lock: usize,
    /// Key prefix.
    pub prefix: String,
}

impl LoadPlan {
    /// Returns the key written at position `index`.
    ///
    /// Zero padding keeps byte order equal to numeric order.
    pub fn key(&self, index: u64) -> String {
        format!("{}{:012}", self.prefix, index)
    }
}

/// Runs the load.
pub fn run(options: &StoreOptions, bucket: &str, plan: &LoadPlan) -> CommandResult {
    if plan.per_lock == 0 {
        return Err("--per-lock must be at least 1".into());
    }

    let backend = options.open()?;
    backend.batch_tx().lock().create_bucket(bucket);

    let value = vec![b'x'; plan.value_size];
    let per_lock = plan.per_lock as u64;
    let start = Instant::now();

    let mut next = 0u64;
    while next < plan.count {
        let end = (next + per_lock).min(plan.count);
        let mut tx = backend.batch_tx().lock();
        for index in next..end {
            tx.seq_put(bucket, plan.key(index).as_bytes(), &value);
        }
        tx.unlock();
        next = end;
    }

    backend.close()?;
    let elapsed = start.elapsed();
    let snapshot = backend.metrics().snapshot();
    info!(count = plan.count, ?elapsed, commits = snapshot.commits, "load finished");

    let rate = if elapsed.as_secs_f64() > 0.0 {
        plan.count as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    println!("Loaded {} keys into {}", plan.count, bucket);
    println!("  Duration:   {:?}", elapsed);
    println!("  Commits:    {}", snapshot.commits);
    println!("  Throughput: {:.2} puts/sec", rate);
    println!("  Size:       {}", super::inspect::format_size(snapshot.size));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_numerically() {
        let plan = LoadPlan {
            count: 0,
            value_size: 0,
            per_lock: 1,
            prefix: "k".into(),
        };
        assert_eq!(plan.key(7), "k000000000007");
        assert!(plan.key(9).as_bytes() < plan.key(10).as_bytes());
    }
}
