//! Property tests for the batching write path.

use kvbatch_core::{Backend, BackendConfig, InMemoryStore};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    Commit,
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..8, 1..4)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (key_strategy(), prop::collection::vec(any::<u8>(), 0..16))
            .prop_map(|(k, v)| Op::Put(k, v)),
        2 => key_strategy().prop_map(Op::Delete),
        1 => Just(Op::Commit),
    ]
}

fn backend(limit: usize) -> Backend<InMemoryStore> {
    let config = BackendConfig::new()
        .batch_limit(limit)
        .batch_interval(Duration::ZERO);
    let backend = Backend::open_in_memory(config).unwrap();
    backend.batch_tx().lock().create_bucket("key");
    backend.force_commit();
    backend
}

proptest! {
    #[test]
    fn batch_matches_last_write_wins_model(
        ops in prop::collection::vec(op_strategy(), 0..64),
        limit in 1usize..8,
    ) {
        let backend = backend(limit);
        let mut model = BTreeMap::new();

        for op in &ops {
            match op {
                Op::Put(k, v) => {
                    backend.batch_tx().lock().put("key", k, v);
                    model.insert(k.clone(), v.clone());
                }
                Op::Delete(k) => {
                    backend.batch_tx().lock().delete("key", k);
                    model.remove(k);
                }
                Op::Commit => backend.force_commit(),
            }
            prop_assert!(backend.batch_tx().lock().pending() < limit);
        }

        let tx = backend.batch_tx().lock();
        let (keys, values) = tx.range("key", b"", &[0xff], 0);
        let seen: Vec<_> = keys.into_iter().zip(values).collect();
        let expected: Vec<_> = model.clone().into_iter().collect();
        prop_assert_eq!(seen, expected);
        drop(tx);

        backend.close().unwrap();
        for (k, v) in &model {
            prop_assert_eq!(backend.store().committed_value("key", k), Some(v.clone()));
        }
    }

    #[test]
    fn range_honors_bounds_and_limit(
        keys in prop::collection::btree_set(key_strategy(), 0..32),
        start in key_strategy(),
        end in key_strategy(),
        limit in -2i64..6,
    ) {
        let backend = backend(1_000);
        let mut tx = backend.batch_tx().lock();
        for k in &keys {
            tx.put("key", k, k);
        }

        let (found, values) = tx.range("key", &start, &end, limit);
        let mut expected: Vec<_> = keys
            .iter()
            .filter(|k| k.as_slice() >= start.as_slice() && k.as_slice() < end.as_slice())
            .cloned()
            .collect();
        if limit > 0 {
            expected.truncate(limit as usize);
        }

        prop_assert_eq!(&found, &expected);
        prop_assert_eq!(&values, &expected);
    }

    #[test]
    fn commits_follow_the_threshold(brackets in prop::collection::vec(1usize..5, 0..40), limit in 1usize..10) {
        let backend = backend(limit);
        let base = backend.commits();

        let mut pending = 0;
        let mut expected = 0u64;
        for (i, size) in brackets.iter().enumerate() {
            let mut tx = backend.batch_tx().lock();
            for j in 0..*size {
                tx.put("key", format!("{i}-{j}").as_bytes(), b"v");
            }
            drop(tx);
            pending += size;
            if pending >= limit {
                expected += 1;
                pending = 0;
            }
        }

        prop_assert_eq!(backend.commits() - base, expected);
        prop_assert_eq!(backend.batch_tx().lock().pending(), pending);
    }
}
