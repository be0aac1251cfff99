//! Sharding rule registry and caching propagator.
//!
//! [`ShardingPropagator`] maps each operator to a [`ShardingRule`] and
//! interprets what the rule returns. [`CachingPropagator`] wraps it with a
//! bounded memo table keyed by `(op, schema)`. Both implement
//! [`Propagate`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod caching;
pub mod config;
mod lru;
pub mod propagator;
pub mod rule;

pub use caching::{CacheStats, CachingPropagator};
pub use config::{CacheConfig, DEFAULT_CACHE_CAPACITY};
pub use propagator::{Propagate, ShardingPropagator};
pub use rule::{RuleTable, ShardingRule, SharedRule};
