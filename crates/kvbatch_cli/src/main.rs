//! kvbatch CLI
//!
//! Command-line tools for kvbatch stores.
//!
//! # Commands
//!
//! - `create-bucket` - Create a bucket
//! - `put` / `get` / `delete` - Single-key operations
//! - `range` - Scan a key range
//! - `load` - Bulk-load generated keys through the batching layer
//! - `inspect` - Display store size and bucket statistics

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kvbatch command-line store tools.
#[derive(Parser)]
#[command(name = "kvbatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Pending mutations that trigger a commit
    #[arg(global = true, long, default_value_t = kvbatch_core::DEFAULT_BATCH_LIMIT)]
    batch_limit: usize,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a bucket (no-op if it exists)
    CreateBucket {
        /// Bucket name
        bucket: String,
    },

    /// Write a key, creating the bucket if needed
    Put {
        /// Bucket name
        bucket: String,
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Read a key from an existing bucket
    Get {
        /// Bucket name
        bucket: String,
        /// Key
        key: String,
    },

    /// Delete a key from an existing bucket
    Delete {
        /// Bucket name
        bucket: String,
        /// Key
        key: String,
    },

    /// Scan `start <= key < end` in an existing bucket
    Range {
        /// Bucket name
        bucket: String,
        /// First key (inclusive)
        start: String,
        /// End key (exclusive)
        end: String,

        /// Maximum number of pairs (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        limit: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Bulk-load generated keys
    Load {
        /// Bucket name
        bucket: String,

        /// Number of keys to write
        #[arg(short = 'n', long, default_value = "100000")]
        count: u64,

        /// Size of each value in bytes
        #[arg(long, default_value = "64")]
        value_size: usize,

        /// Mutations applied per lock acquisition
        #[arg(long, default_value = "1")]
        per_lock: usize,

        /// Key prefix
        #[arg(long, default_value = "key")]
        prefix: String,
    },

    /// Display store statistics
    Inspect {
        /// Buckets to count entries in
        #[arg(short, long)]
        bucket: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = |name: &str| -> Result<commands::StoreOptions, String> {
        let path = cli
            .path
            .clone()
            .ok_or_else(|| format!("Store path required for {name}"))?;
        Ok(commands::StoreOptions {
            path,
            batch_limit: cli.batch_limit,
        })
    };

    match &cli.command {
        Commands::CreateBucket { bucket } => {
            commands::write::create_bucket(&options("create-bucket")?, bucket)?;
        }
        Commands::Put { bucket, key, value } => {
            commands::write::put(&options("put")?, bucket, key, value)?;
        }
        Commands::Delete { bucket, key } => {
            commands::write::delete(&options("delete")?, bucket, key)?;
        }
        Commands::Get { bucket, key } => {
            commands::read::get(&options("get")?, bucket, key)?;
        }
        Commands::Range {
            bucket,
            start,
            end,
            limit,
            format,
        } => {
            commands::read::range(&options("range")?, bucket, start, end, *limit, *format)?;
        }
        Commands::Load {
            bucket,
            count,
            value_size,
            per_lock,
            prefix,
        } => {
            let plan = commands::load::LoadPlan {
                count: *count,
                value_size: *value_size,
                per_lock: *per_lock,
                prefix: prefix.clone(),
            };
            commands::load::run(&options("load")?, bucket, &plan)?;
        }
        Commands::Inspect { bucket, format } => {
            commands::inspect::run(&options("inspect")?, bucket, *format)?;
        }
        Commands::Version => {
            println!("kvbatch CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("kvbatch Core v{}", kvbatch_core::VERSION);
        }
    }

    Ok(())
}
