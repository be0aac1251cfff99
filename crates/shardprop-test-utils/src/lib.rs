//! Test utilities and mock sharding rules for shardprop development.
//!
//! Provides schema fixtures for a small 1-D mesh and the mock rules in
//! [`fixtures`]. Each mock rule counts its invocations through a shared
//! counter so tests can observe whether a call reached the rule.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    CallCounter, ConstRule, CountingRule, ElementwiseRule, FailingRule, PanickingRule,
    UnsatisfiableRule,
};

use shardprop_core::{DTensorSpec, MeshDescriptor, OpArg, OpId, OpSchema};

/// `aten.add.Tensor`.
pub const ADD: OpId = OpId::new("aten.add", "Tensor");
/// `aten.mul.Tensor`.
pub const MUL: OpId = OpId::new("aten.mul", "Tensor");
/// `aten.mm`.
pub const MM: OpId = OpId::new("aten.mm", "");

/// A 1-D mesh of 4 ranks with id 0.
pub fn mesh_1d() -> MeshDescriptor {
    MeshDescriptor::new(0, [4])
}

/// Fully replicated on [`mesh_1d`].
pub fn replicated() -> DTensorSpec {
    DTensorSpec::replicated(mesh_1d())
}

/// Sharded on tensor dim `dim` over [`mesh_1d`].
pub fn sharded(dim: u32) -> DTensorSpec {
    DTensorSpec::sharded(mesh_1d(), dim)
}

/// Schema for `op` with the given tensor inputs, in order.
pub fn schema(op: OpId, inputs: impl IntoIterator<Item = DTensorSpec>) -> OpSchema {
    OpSchema::new(op, inputs.into_iter().map(OpArg::Spec))
}

/// Binary schema for `op`.
pub fn binary(op: OpId, lhs: DTensorSpec, rhs: DTensorSpec) -> OpSchema {
    schema(op, [lhs, rhs])
}
