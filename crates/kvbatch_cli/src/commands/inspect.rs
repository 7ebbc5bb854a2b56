//! Inspect command implementation.

use super::{CommandResult, OutputFormat, StoreOptions};
use serde::Serialize;
use std::convert::Infallible;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Allocated size in bytes.
    pub size: u64,
    /// Bytes holding data.
    pub size_in_use: u64,
    /// Statistics for the requested buckets.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<BucketStats>,
}

/// Statistics for a single bucket.
#[derive(Debug, Serialize)]
pub struct BucketStats {
    /// Bucket name.
    pub name: String,
    /// Number of keys.
    pub key_count: u64,
    /// Sum of key and value lengths in bytes.
    pub data_size: u64,
}

/// Runs the inspect command.
pub fn run(options: &StoreOptions, buckets: &[String], format: OutputFormat) -> CommandResult {
    if !options.path.exists() {
        return Err(format!("No store found at {:?}", options.path).into());
    }

    let backend = options.open()?;
    let tx = backend.batch_tx().lock();
    let mut stats = Vec::with_capacity(buckets.len());
    for name in buckets {
        let mut bucket = BucketStats {
            name: name.clone(),
            key_count: 0,
            data_size: 0,
        };
        // Missing buckets visit nothing.
        tx.for_each(name, |key, value| {
            bucket.key_count += 1;
            bucket.data_size += (key.len() + value.len()) as u64;
            Ok::<(), Infallible>(())
        })?;
        stats.push(bucket);
    }
    drop(tx);

    let result = InspectResult {
        path: options.path.display().to_string(),
        size: backend.size(),
        size_in_use: backend.size_in_use(),
        buckets: stats,
    };
    backend.close()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("kvbatch Store Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Storage:");
    println!("  Size:        {}", format_size(result.size));
    println!("  In use:      {}", format_size(result.size_in_use));
    println!(
        "  Free:        {}",
        format_size(result.size.saturating_sub(result.size_in_use))
    );

    if !result.buckets.is_empty() {
        println!();
        println!("Buckets:");
        for bucket in &result.buckets {
            println!(
                "  {}: {} keys, {}",
                bucket.name,
                bucket.key_count,
                format_size(bucket.data_size)
            );
        }
    }
}

/// Formats a byte count with a binary unit.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
