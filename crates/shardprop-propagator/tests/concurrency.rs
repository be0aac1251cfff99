//! Concurrent propagation after single-threaded setup.
//!
//! Rules are registered through `&mut` before the propagator is shared,
//! then many threads propagate through `&self` at once.

use std::thread;

use crossbeam_channel::unbounded;
use shardprop_core::OutputSharding;
use shardprop_propagator::{CacheConfig, CachingPropagator, Propagate, ShardingPropagator};
use shardprop_test_utils::{binary, replicated, sharded, ElementwiseRule, FailingRule, ADD, MUL};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

#[test]
fn concurrent_hits_agree_with_sequential_results() {
    let rule = ElementwiseRule::new();
    let calls = rule.calls.clone();
    let mut prop = CachingPropagator::default();
    prop.register(ADD, rule);
    // Setup is over; from here on the propagator is only shared.
    let prop = &prop;

    let schemas: Vec<_> = (0..4)
        .map(|dim| binary(ADD, sharded(dim), replicated()))
        .chain([binary(ADD, replicated(), replicated())])
        .collect();
    let mut reference = ShardingPropagator::new();
    reference.register(ADD, ElementwiseRule::new());
    let expected: Vec<OutputSharding> = schemas
        .iter()
        .map(|s| reference.propagate_op_sharding(ADD, s).unwrap())
        .collect();

    let (tx, rx) = unbounded();
    thread::scope(|scope| {
        for t in 0..THREADS {
            let tx = tx.clone();
            let schemas = &schemas;
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let idx = (t + round) % schemas.len();
                    let out = prop.propagate_op_sharding(ADD, &schemas[idx]).unwrap();
                    tx.send((idx, out)).unwrap();
                }
            });
        }
    });
    drop(tx);

    let mut received = 0;
    for (idx, out) in rx {
        assert_eq!(out, expected[idx]);
        received += 1;
    }
    assert_eq!(received, THREADS * ROUNDS);

    // Racing misses on one schema may each run the rule, but never more
    // than once per thread per schema.
    assert!(calls.get() >= schemas.len());
    assert!(calls.get() <= schemas.len() * THREADS);
    assert_eq!(prop.cache_len(), schemas.len());

    let stats = prop.stats();
    assert_eq!(stats.hits + stats.misses, (THREADS * ROUNDS) as u64);
}

#[test]
fn concurrent_failures_are_never_cached() {
    let failing = FailingRule::new("unsupported layout");
    let calls = failing.calls.clone();
    let mut prop = CachingPropagator::new(CacheConfig::with_capacity(16).unwrap());
    prop.register(MUL, failing);
    let prop = &prop;

    let schema = binary(MUL, sharded(0), sharded(1));
    thread::scope(|scope| {
        for _ in 0..THREADS {
            let schema = &schema;
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    assert!(prop.propagate_op_sharding(MUL, schema).is_err());
                }
            });
        }
    });

    assert_eq!(calls.get(), THREADS * ROUNDS);
    assert_eq!(prop.cache_len(), 0);
}

#[test]
fn small_cache_survives_contention() {
    let mut prop = CachingPropagator::new(CacheConfig::with_capacity(2).unwrap());
    prop.register(ADD, ElementwiseRule::new());
    let prop = &prop;

    thread::scope(|scope| {
        for t in 0..THREADS {
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let dim = ((t + round) % 5) as u32;
                    let s = binary(ADD, sharded(dim), sharded(dim));
                    let out = prop.propagate_op_sharding(ADD, &s).unwrap();
                    assert_eq!(out, OutputSharding::resolved(sharded(dim)));
                }
            });
        }
    });

    assert!(prop.cache_len() <= 2);
}
