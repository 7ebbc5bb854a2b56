//! Integration tests for the backend over both stores.

use kvbatch_core::{Backend, BackendConfig, InMemoryStore};
use kvbatch_storage::FailPoint;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn manual(limit: usize) -> BackendConfig {
    BackendConfig::new()
        .batch_limit(limit)
        .batch_interval(Duration::ZERO)
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}

#[test]
fn three_puts_with_limit_three_commit_once() {
    let backend = Backend::open_in_memory(manual(3)).unwrap();
    let mut tx = backend.batch_tx().lock();
    tx.create_bucket("key");
    tx.unlock();
    backend.force_commit();
    let base = backend.commits();

    for (k, v) in [(b"A", b"1"), (b"B", b"2")] {
        let mut tx = backend.batch_tx().lock();
        tx.put("key", k, v);
    }
    assert_eq!(backend.commits(), base);

    let mut tx = backend.batch_tx().lock();
    tx.put("key", b"C", b"3");
    tx.unlock();
    assert_eq!(backend.commits(), base + 1);

    for key in [b"A", b"B", b"C"] {
        assert!(backend.store().committed_value("key", key).is_some());
    }
}

#[test]
fn writes_are_visible_before_commit_and_durable_after() {
    let backend = Backend::open_in_memory(manual(100)).unwrap();
    let mut tx = backend.batch_tx().lock();
    tx.create_bucket("key");
    tx.put("key", b"foo", b"bar");
    tx.unlock();

    // Readers through the batch see buffered writes.
    let tx = backend.batch_tx().lock();
    assert_eq!(tx.range("key", b"foo", b"", 0).1, vec![b"bar".to_vec()]);
    drop(tx);
    assert_eq!(backend.store().committed_value("key", b"foo"), None);

    backend.close().unwrap();
    assert_eq!(
        backend.store().committed_value("key", b"foo"),
        Some(b"bar".to_vec())
    );
}

#[test]
fn concurrent_writers_share_commits() {
    let backend = Arc::new(Backend::open_in_memory(manual(100)).unwrap());
    backend.batch_tx().lock().create_bucket("key");
    backend.force_commit();
    let base = backend.commits();

    let handles: Vec<_> = (0u32..4)
        .map(|t| {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                for i in 0u32..250 {
                    let key = (t * 1_000 + i).to_be_bytes();
                    let mut tx = backend.batch_tx().lock();
                    tx.put("key", &key, b"v");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 1000 single-mutation brackets with a limit of 100.
    assert_eq!(backend.commits(), base + 10);
    assert_eq!(backend.batch_tx().lock().pending(), 0);

    let mut count = 0usize;
    backend
        .batch_tx()
        .lock()
        .for_each("key", |_, _| {
            count += 1;
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(count, 1_000);
}

#[test]
fn periodic_committer_bounds_staleness() {
    let config = BackendConfig::new()
        .batch_limit(1_000_000)
        .batch_interval(Duration::from_millis(10));
    let backend = Backend::open_in_memory(config).unwrap();

    let mut tx = backend.batch_tx().lock();
    tx.create_bucket("key");
    tx.put("key", b"a", b"1");
    tx.unlock();

    assert!(wait_for(|| backend.store().committed_value("key", b"a").is_some()));

    let mut tx = backend.batch_tx().lock();
    tx.put("key", b"b", b"2");
    tx.unlock();
    assert!(wait_for(|| backend.store().committed_value("key", b"b").is_some()));

    backend.close().unwrap();
    assert!(!backend.is_open());
}

#[test]
fn close_stops_the_committer() {
    let config = BackendConfig::new().batch_interval(Duration::from_millis(5));
    let backend = Backend::open_in_memory(config).unwrap();
    backend.close().unwrap();

    let commits = backend.store().commit_count();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(backend.store().commit_count(), commits);
}

#[test]
fn sizes_track_the_store() {
    let backend = Backend::open_in_memory(manual(1)).unwrap();
    backend.batch_tx().lock().create_bucket("key");
    let initial = backend.size();

    for i in 0u16..64 {
        let mut tx = backend.batch_tx().lock();
        tx.seq_put("key", &i.to_be_bytes(), &[0u8; 1024]);
    }
    assert!(backend.size() > initial);
    assert_eq!(backend.size(), backend.size_in_use());

    for i in 0u16..64 {
        let mut tx = backend.batch_tx().lock();
        tx.delete("key", &i.to_be_bytes());
    }
    assert!(backend.size_in_use() < backend.size());

    let snapshot = backend.metrics().snapshot();
    assert_eq!(snapshot.commits, backend.commits());
    assert_eq!(snapshot.size, backend.size());
    assert_eq!(
        backend.metrics().commit_durations().count(),
        backend.commits()
    );
}

#[test]
#[should_panic(expected = "cannot commit tx")]
fn failed_flush_on_close_is_fatal() {
    let store = InMemoryStore::new();
    let backend = Backend::with_store(store.clone(), manual(100)).unwrap();
    backend.batch_tx().lock().create_bucket("key");
    store.fail_next(FailPoint::Commit);
    let _ = backend.close();
}

#[test]
fn redb_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kv.redb");

    {
        let backend = Backend::open(&path, manual(10)).unwrap();
        let mut tx = backend.batch_tx().lock();
        tx.create_bucket("key");
        for i in 0u32..25 {
            tx.seq_put("key", &i.to_be_bytes(), format!("v{i}").as_bytes());
        }
        tx.delete("key", &3u32.to_be_bytes());
        tx.unlock();
        assert_eq!(backend.commits(), 1);
        assert!(backend.size() > 0);
    }

    let backend = Backend::open(&path, manual(10)).unwrap();
    let tx = backend.batch_tx().lock();
    let (keys, values) = tx.range("key", &0u32.to_be_bytes(), &10u32.to_be_bytes(), 5);
    assert_eq!(keys.len(), 5);
    assert_eq!(keys[3], 4u32.to_be_bytes().to_vec());
    assert_eq!(values[0], b"v0".to_vec());

    let (keys, _) = tx.range("key", &3u32.to_be_bytes(), b"", 0);
    assert!(keys.is_empty());
}

#[test]
fn redb_for_each_visitor_can_read_the_bucket() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Backend::open(temp_dir.path().join("kv.redb"), manual(100)).unwrap();
    let mut tx = backend.batch_tx().lock();
    tx.create_bucket("key");
    for k in [b"a", b"b", b"c"] {
        tx.put("key", k, k);
    }

    let mut lookups = Vec::new();
    tx.for_each("key", |k, _| {
        let (_, values) = tx.range("key", k, b"", 0);
        let (after, _) = tx.range("key", k, b"z", 0);
        lookups.push((values, after.len()));
        Ok::<(), ()>(())
    })
    .unwrap();

    assert_eq!(
        lookups,
        vec![
            (vec![b"a".to_vec()], 3),
            (vec![b"b".to_vec()], 2),
            (vec![b"c".to_vec()], 1),
        ]
    );
}

#[test]
fn redb_sizes_do_not_shrink_after_deletes() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Backend::open(temp_dir.path().join("kv.redb"), manual(1)).unwrap();
    backend.batch_tx().lock().create_bucket("key");

    let value = [1u8; 512];
    for i in 0u32..400 {
        backend.batch_tx().lock().put("key", &i.to_be_bytes(), &value);
    }
    let live = 400 * (4 + value.len() as u64);
    let filled_size = backend.size();
    assert!(backend.size_in_use() >= live);
    assert!(filled_size >= backend.size_in_use());

    for i in 0u32..400 {
        backend.batch_tx().lock().delete("key", &i.to_be_bytes());
    }
    assert!(backend.size() >= filled_size);
    assert!(backend.size_in_use() < live);
}
