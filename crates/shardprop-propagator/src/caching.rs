//! [`CachingPropagator`]: memoized propagation keyed by input schema.
//!
//! Wraps a [`ShardingPropagator`] and remembers every successful result
//! under `(op, schema)`. A repeated schema is answered from the table
//! without running the rule again. Errors are never cached; a failing
//! schema re-runs its rule on every call.
//!
//! Correctness depends on rules being pure functions of their schema
//! (see [`ShardingRule`]) and on `OpSchema` equality being structural.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::Equivalent;
use shardprop_core::{OpId, OpSchema, OutputSharding, PropagationError};
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::lru::LruTable;
use crate::propagator::{Propagate, ShardingPropagator};
use crate::rule::{RuleTable, ShardingRule, SharedRule};

/// Owned memo key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    op: OpId,
    schema: OpSchema,
}

/// Borrowed form of [`CacheKey`] for lookups without cloning the schema.
///
/// Field order and types must match `CacheKey` so both hash identically.
#[derive(Hash)]
struct CacheKeyRef<'a> {
    op: OpId,
    schema: &'a OpSchema,
}

impl Equivalent<CacheKey> for CacheKeyRef<'_> {
    fn equivalent(&self, key: &CacheKey) -> bool {
        self.op == key.op && *self.schema == key.schema
    }
}

/// Point-in-time cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls answered from the table.
    pub hits: u64,
    /// Calls that ran the underlying propagator.
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries currently cached.
    pub len: usize,
    /// Configured capacity, `None` when unbounded.
    pub capacity: Option<usize>,
}

impl CacheStats {
    /// Fraction of calls answered from the table; 0 before any call.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A [`ShardingPropagator`] with a memo table in front of it.
///
/// Holds the same propagation contract ([`Propagate`]) and can stand in
/// wherever a plain propagator is used.
///
/// # Concurrency
///
/// `propagate_op_sharding` takes `&self` and is safe to call from many
/// threads. The table sits behind a mutex that is released while the
/// rule runs, so two threads missing on the same schema may both run the
/// rule; the later insert overwrites the earlier one with an equal value.
///
/// # Invalidation
///
/// Registering a rule through this wrapper drops every cached result for
/// that operator. [`clear_cache`](Self::clear_cache) drops everything.
#[derive(Debug)]
pub struct CachingPropagator {
    inner: ShardingPropagator,
    cache: Mutex<LruTable<CacheKey, Arc<OutputSharding>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for CachingPropagator {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CachingPropagator {
    /// An empty registry with the given cache sizing.
    pub fn new(config: CacheConfig) -> Self {
        Self::from_propagator(ShardingPropagator::new(), config)
    }

    /// A registry that adopts an existing rule table.
    pub fn with_rules(rules: RuleTable, config: CacheConfig) -> Self {
        Self::from_propagator(ShardingPropagator::with_rules(rules), config)
    }

    /// Put a memo table in front of an existing propagator.
    pub fn from_propagator(inner: ShardingPropagator, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruTable::new(config.capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Store `rule` under `op`, returning the rule it replaced.
    ///
    /// Cached results for `op` are dropped.
    pub fn register<R: ShardingRule>(&mut self, op: OpId, rule: R) -> Option<SharedRule> {
        self.register_shared(op, Arc::new(rule))
    }

    /// The wrapped propagator.
    pub fn inner(&self) -> &ShardingPropagator {
        &self.inner
    }

    /// Whether `op` has a rule.
    pub fn contains(&self, op: OpId) -> bool {
        self.inner.contains(op)
    }

    /// Registered operators in registration order.
    pub fn registered_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.inner.registered_ops()
    }

    /// Number of cached results.
    pub fn cache_len(&self) -> usize {
        self.lock().len()
    }

    /// Whether a result for `(op, schema)` is cached. Does not affect recency.
    pub fn is_cached(&self, op: OpId, schema: &OpSchema) -> bool {
        self.lock().peek(&CacheKeyRef { op, schema }).is_some()
    }

    /// Drop every cached result. Counters are kept.
    pub fn clear_cache(&self) {
        self.lock().clear();
        debug!("sharding propagation cache cleared");
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let cache = self.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: cache.len(),
            capacity: cache.capacity().map(|c| c.get()),
        }
    }

    /// Like [`Propagate::propagate_op_sharding`], but hands out the cached
    /// result itself.
    ///
    /// A hit costs a reference-count bump instead of a deep copy of the
    /// output and its suggestion schemas.
    pub fn propagate_shared(
        &self,
        op: OpId,
        schema: &OpSchema,
    ) -> Result<Arc<OutputSharding>, PropagationError> {
        if let Some(hit) = self.lock().get(&CacheKeyRef { op, schema }) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(%op, "sharding cache hit");
            return Ok(Arc::clone(hit));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(%op, "sharding cache miss");
        let output = Arc::new(self.inner.propagate_op_sharding(op, schema)?);

        let key = CacheKey {
            op,
            schema: schema.clone(),
        };
        if let Some((evicted, _)) = self.lock().insert(key, Arc::clone(&output)) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(op = %evicted.op, "evicted cached sharding result");
        }
        Ok(output)
    }

    // Entries are plain values, so a panic while the lock was held cannot
    // leave one half-written.
    fn lock(&self) -> MutexGuard<'_, LruTable<CacheKey, Arc<OutputSharding>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Propagate for CachingPropagator {
    fn register_shared(&mut self, op: OpId, rule: SharedRule) -> Option<SharedRule> {
        let replaced = self.inner.register_shared(op, rule);
        let dropped = self
            .cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key| key.op != op);
        if dropped > 0 {
            debug!(%op, dropped, "invalidated cached sharding results");
        }
        replaced
    }

    fn propagate_op_sharding(
        &self,
        op: OpId,
        schema: &OpSchema,
    ) -> Result<OutputSharding, PropagationError> {
        self.propagate_shared(op, schema).map(|output| OutputSharding::clone(&output))
    }
}
