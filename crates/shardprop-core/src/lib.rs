//! Core types for the shardprop sharding propagator.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! values that flow through a propagation call: operator ids, placement
//! descriptors, the [`OpSchema`] memo key, the [`OutputSharding`] result,
//! and the error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod output;
pub mod placement;
pub mod schema;

pub use error::{ConfigError, ErrorKind, PropagationError, RuleError};
pub use id::OpId;
pub use output::{OutputSharding, OutputSpec, ShardingOutcome};
pub use placement::{DTensorSpec, DType, MeshDescriptor, Placement, ReduceOp, TensorMeta};
pub use schema::{OpArg, OpSchema};
