//! shardprop: sharding propagation for distributed tensor runtimes.
//!
//! Given an operator invocation and how its inputs are placed across a
//! device mesh, shardprop looks up the operator's sharding rule and
//! reports the output placement, a suggested redistribution of the
//! inputs, or an error. It never moves data itself.
//!
//! This is the facade crate that re-exports the public API of the
//! sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use shardprop::prelude::*;
//!
//! const ADD: OpId = OpId::new("aten.add", "Tensor");
//! const MUL: OpId = OpId::new("aten.mul", "Tensor");
//!
//! // Pointwise add: inputs must share a placement.
//! fn add_rule(schema: &OpSchema) -> Result<OutputSharding, RuleError> {
//!     let mut specs = schema.arg_specs();
//!     let first = specs.next().ok_or("add needs tensor inputs")?;
//!     if specs.all(|s| s == first) {
//!         return Ok(OutputSharding::resolved(first.clone()));
//!     }
//!     // Redistribute every tensor input; scalars and kwargs are kept.
//!     Ok(OutputSharding::suggest([schema.map_specs(|_| first.clone())]))
//! }
//!
//! let mut prop = CachingPropagator::new(CacheConfig::default());
//! prop.register(ADD, add_rule);
//!
//! let mesh = MeshDescriptor::new(0, [4]);
//! let r = DTensorSpec::replicated(mesh.clone());
//! let s0 = DTensorSpec::sharded(mesh, 0);
//!
//! // Matching inputs resolve.
//! let rr = OpSchema::new(ADD, [r.clone().into(), r.clone().into()]);
//! assert!(prop.propagate_op_sharding(ADD, &rr).unwrap().is_resolved());
//!
//! // Mismatched inputs come back with a suggestion, not an error.
//! let sr = OpSchema::new(ADD, [s0.clone().into(), r.into()]);
//! let out = prop.propagate_op_sharding(ADD, &sr).unwrap();
//! assert_eq!(out.outcome(), ShardingOutcome::SuggestsRedistribution);
//!
//! // Following the suggestion resolves.
//! let retry = &out.suggestions()[0];
//! assert!(prop.propagate_op_sharding(ADD, retry).unwrap().is_resolved());
//!
//! // Unregistered operators have no fallback.
//! let err = prop.propagate_op_sharding(MUL, &sr).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NoRuleRegistered);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `shardprop-core` | Op ids, placements, schemas, results, errors |
//! | [`propagator`] | `shardprop-propagator` | Rule trait, registries, cache configuration |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Op ids, placements, schemas, results, and errors (`shardprop-core`).
pub use shardprop_core as types;

/// Rule trait, plain and caching registries (`shardprop-propagator`).
pub use shardprop_propagator as propagator;

/// Common imports for registering rules and propagating.
pub mod prelude {
    pub use shardprop_core::{
        DTensorSpec, ErrorKind, MeshDescriptor, OpArg, OpId, OpSchema, OutputSharding,
        OutputSpec, Placement, PropagationError, RuleError, ShardingOutcome,
    };
    pub use shardprop_propagator::{
        CacheConfig, CachingPropagator, Propagate, ShardingPropagator, ShardingRule,
    };
}
