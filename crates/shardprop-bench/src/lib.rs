//! Benchmark workloads for the shardprop propagators.
//!
//! - [`reference_rules`]: pointwise rules for a handful of binary ops
//! - [`reference_workload`]: a deterministic stream of schemas with a
//!   configurable number of distinct entries

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use shardprop_core::{
    DTensorSpec, MeshDescriptor, OpArg, OpId, OpSchema, OutputSharding, Placement, RuleError,
};
use shardprop_propagator::RuleTable;

/// Binary pointwise ops covered by [`reference_rules`].
pub const POINTWISE_OPS: [OpId; 4] = [
    OpId::new("aten.add", "Tensor"),
    OpId::new("aten.sub", "Tensor"),
    OpId::new("aten.mul", "Tensor"),
    OpId::new("aten.div", "Tensor"),
];

/// Pointwise rule: resolve when all tensor inputs match, otherwise
/// suggest redistributing everything to the first input's placement.
pub fn pointwise(schema: &OpSchema) -> Result<OutputSharding, RuleError> {
    let mut specs = schema.arg_specs();
    let first = specs.next().ok_or("pointwise op without tensor inputs")?;
    if specs.all(|s| s == first) {
        return Ok(OutputSharding::resolved(first.clone()));
    }
    Ok(OutputSharding::suggest([schema.map_specs(|_| first.clone())]))
}

/// A rule table with [`pointwise`] registered for every op in [`POINTWISE_OPS`].
pub fn reference_rules() -> RuleTable {
    POINTWISE_OPS
        .iter()
        .map(|&op| (op, pointwise as fn(&OpSchema) -> Result<OutputSharding, RuleError>))
        .collect()
}

/// `len` schemas cycling through `distinct` unique values.
///
/// Schemas run on a 2-D `[4, 2]` mesh with 3-dimensional tensors, so the
/// distinct values differ in op, placements, and the scalar `alpha`.
pub fn reference_workload(len: usize, distinct: usize) -> Vec<(OpId, OpSchema)> {
    let mesh = MeshDescriptor::new(0, [4, 2]);
    let distinct = distinct.max(1);
    (0..len)
        .map(|i| {
            let k = i % distinct;
            let op = POINTWISE_OPS[k % POINTWISE_OPS.len()];
            let lhs = DTensorSpec::new(
                mesh.clone(),
                [Placement::shard((k % 3) as u32), Placement::Replicate],
            );
            let rhs = if k % 2 == 0 {
                lhs.clone()
            } else {
                DTensorSpec::replicated(mesh.clone())
            };
            let schema = OpSchema::new(op, [lhs.into(), rhs.into()])
                .with_kwarg("alpha", OpArg::Int(k as i64));
            (op, schema)
        })
        .collect()
}
