//! Cache configuration for [`CachingPropagator`](crate::CachingPropagator).

use std::num::NonZeroUsize;

use shardprop_core::ConfigError;

/// Default number of cached propagation results.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Sizing of the propagation memo table.
///
/// With a capacity, the least-recently-used entry is evicted when a new
/// result would exceed it. `capacity: None` never evicts; use it only when
/// the set of distinct schemas is known to be small.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum cached entries. `None` = unbounded. Default: 4096.
    pub capacity: Option<NonZeroUsize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY),
        }
    }
}

impl CacheConfig {
    /// Bounded cache holding at most `capacity` entries.
    ///
    /// Returns [`ConfigError::ZeroCapacity`] for `0`.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self {
            capacity: Some(capacity),
        })
    }

    /// Cache that never evicts.
    pub fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Whether entries can be evicted.
    pub fn is_bounded(&self) -> bool {
        self.capacity.is_some()
    }
}
