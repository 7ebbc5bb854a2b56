//! Benchmark utilities.

use rand::seq::SliceRandom;
use rand::Rng;

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` big-endian keys in increasing order.
pub fn sequential_keys(count: u64) -> Vec<[u8; 8]> {
    (0..count).map(u64::to_be_bytes).collect()
}

/// Generate the same keys as [`sequential_keys`], shuffled.
pub fn random_keys(count: u64) -> Vec<[u8; 8]> {
    let mut keys = sequential_keys(count);
    keys.shuffle(&mut rand::thread_rng());
    keys
}
