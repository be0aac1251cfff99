//! [`ShardingPropagator`]: rule registry and result interpretation.
//!
//! Propagation has two observable outcomes at this boundary: usable
//! sharding information (a resolved output or a redistribution
//! suggestion), or an error. Telling a resolved result apart from a
//! suggestion is left to [`OutputSharding::outcome`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use shardprop_core::{OpId, OpSchema, OutputSharding, PropagationError, ShardingOutcome};
use tracing::debug;

use crate::rule::{RuleTable, ShardingRule, SharedRule};

/// The propagation contract shared by [`ShardingPropagator`] and
/// [`CachingPropagator`](crate::CachingPropagator).
///
/// Registration takes `&mut self` and propagation takes `&self`, so all
/// registration finishes before a propagator can be shared across threads.
pub trait Propagate: Send + Sync {
    /// Store `rule` under `op`, returning the rule it replaced.
    fn register_shared(&mut self, op: OpId, rule: SharedRule) -> Option<SharedRule>;

    /// Compute the output sharding of `op` applied to `schema`.
    ///
    /// Returns the rule's result when it resolved or suggested a
    /// redistribution. Errors:
    ///
    /// - [`PropagationError::NoRuleRegistered`] if `op` has no rule.
    /// - [`PropagationError::RuleFailed`] if the rule errored or panicked.
    /// - [`PropagationError::Unsatisfiable`] if the rule returned neither
    ///   an output nor a suggestion.
    fn propagate_op_sharding(
        &self,
        op: OpId,
        schema: &OpSchema,
    ) -> Result<OutputSharding, PropagationError>;
}

/// Maps operators to sharding rules and runs them.
///
/// There is no fallback for unregistered operators: propagation fails
/// with [`PropagationError::NoRuleRegistered`].
///
/// # Examples
///
/// ```
/// use shardprop_core::{DTensorSpec, MeshDescriptor, OpId, OpSchema, OutputSharding, RuleError};
/// use shardprop_propagator::{Propagate, ShardingPropagator};
///
/// const ADD: OpId = OpId::new("aten.add", "Tensor");
///
/// let mut prop = ShardingPropagator::new();
/// prop.register(ADD, |schema: &OpSchema| -> Result<OutputSharding, RuleError> {
///     let first = schema.arg_specs().next().ok_or("add needs tensor inputs")?;
///     Ok(OutputSharding::resolved(first.clone()))
/// });
///
/// let mesh = MeshDescriptor::new(0, [4]);
/// let schema = OpSchema::new(
///     ADD,
///     [DTensorSpec::replicated(mesh.clone()).into(), DTensorSpec::replicated(mesh).into()],
/// );
/// let out = prop.propagate_op_sharding(ADD, &schema).unwrap();
/// assert!(out.is_resolved());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ShardingPropagator {
    rules: RuleTable,
}

impl ShardingPropagator {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that adopts an existing rule table.
    pub fn with_rules(rules: RuleTable) -> Self {
        Self { rules }
    }

    /// Store `rule` under `op`, returning the rule it replaced.
    ///
    /// Re-registration silently overrides the previous rule.
    pub fn register<R: ShardingRule>(&mut self, op: OpId, rule: R) -> Option<SharedRule> {
        self.register_shared(op, Arc::new(rule))
    }

    /// The rule registered for `op`.
    pub fn rule(&self, op: OpId) -> Option<&SharedRule> {
        self.rules.get(&op)
    }

    /// Whether `op` has a rule.
    pub fn contains(&self, op: OpId) -> bool {
        self.rules.contains(&op)
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no operators are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered operators in registration order.
    pub fn registered_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.rules.ops()
    }

    /// The underlying rule table.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Give up the registry, keeping its rule table.
    pub fn into_rules(self) -> RuleTable {
        self.rules
    }
}

impl Propagate for ShardingPropagator {
    fn register_shared(&mut self, op: OpId, rule: SharedRule) -> Option<SharedRule> {
        let replaced = self.rules.insert(op, rule);
        debug!(%op, replaced = replaced.is_some(), "registered sharding rule");
        replaced
    }

    fn propagate_op_sharding(
        &self,
        op: OpId,
        schema: &OpSchema,
    ) -> Result<OutputSharding, PropagationError> {
        let Some(rule) = self.rules.get(&op) else {
            debug!(%op, "no sharding rule registered");
            return Err(PropagationError::NoRuleRegistered { op });
        };

        let output = match panic::catch_unwind(AssertUnwindSafe(|| rule.propagate(schema))) {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(rule_failed(op, schema, err.message)),
            Err(payload) => return Err(rule_failed(op, schema, panic_message(payload.as_ref()))),
        };

        match output.outcome() {
            ShardingOutcome::Resolved | ShardingOutcome::SuggestsRedistribution => Ok(output),
            ShardingOutcome::Failed => {
                debug!(%op, %schema, reason = ?output.failed_reason, "sharding unsatisfiable");
                Err(PropagationError::Unsatisfiable {
                    op,
                    schema: Box::new(schema.clone()),
                    reason: output.failed_reason,
                })
            }
        }
    }
}

fn rule_failed(op: OpId, schema: &OpSchema, message: String) -> PropagationError {
    debug!(%op, %schema, %message, "sharding rule failed");
    PropagationError::RuleFailed {
        op,
        schema: Box::new(schema.clone()),
        message,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("rule panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("rule panicked: {s}")
    } else {
        "rule panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardprop_core::{DTensorSpec, ErrorKind, MeshDescriptor, OpArg, RuleError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADD: OpId = OpId::new("aten.add", "Tensor");
    const MUL: OpId = OpId::new("aten.mul", "Tensor");

    fn mesh() -> MeshDescriptor {
        MeshDescriptor::new(0, [4])
    }

    fn add_schema(a: DTensorSpec, b: DTensorSpec) -> OpSchema {
        OpSchema::new(ADD, [a.into(), b.into()])
    }

    fn resolve_first(schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        let first = schema.arg_specs().next().ok_or("no tensor args")?;
        Ok(OutputSharding::resolved(first.clone()))
    }

    #[test]
    fn unregistered_op_fails_without_fallback() {
        let prop = ShardingPropagator::new();
        let err = prop
            .propagate_op_sharding(MUL, &OpSchema::new(MUL, []))
            .unwrap_err();
        assert_eq!(err, PropagationError::NoRuleRegistered { op: MUL });
    }

    #[test]
    fn resolved_result_passes_through() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, resolve_first);
        let schema = add_schema(DTensorSpec::replicated(mesh()), DTensorSpec::replicated(mesh()));
        let out = prop.propagate_op_sharding(ADD, &schema).unwrap();
        assert_eq!(out, OutputSharding::resolved(DTensorSpec::replicated(mesh())));
    }

    #[test]
    fn rule_invoked_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, move |s: &OpSchema| -> Result<OutputSharding, RuleError> {
            counter.fetch_add(1, Ordering::SeqCst);
            resolve_first(s)
        });
        let schema = add_schema(DTensorSpec::replicated(mesh()), DTensorSpec::replicated(mesh()));
        prop.propagate_op_sharding(ADD, &schema).unwrap();
        prop.propagate_op_sharding(ADD, &schema).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn suggestion_is_not_an_error() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, |s: &OpSchema| -> Result<OutputSharding, RuleError> {
            let sharded = DTensorSpec::sharded(mesh(), 0);
            Ok(OutputSharding::suggest([
                s.with_args([sharded.clone().into(), sharded.into()])
            ]))
        });
        let schema = add_schema(DTensorSpec::sharded(mesh(), 0), DTensorSpec::replicated(mesh()));
        let out = prop.propagate_op_sharding(ADD, &schema).unwrap();
        assert!(out.suggests_redistribution());
        assert_eq!(out.suggestions().len(), 1);
    }

    #[test]
    fn rule_error_is_wrapped() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, |_: &OpSchema| -> Result<OutputSharding, RuleError> {
            Err(RuleError::new("dim out of range"))
        });
        let schema = OpSchema::new(ADD, [OpArg::Int(7)]);
        let err = prop.propagate_op_sharding(ADD, &schema).unwrap_err();
        assert_eq!(
            err,
            PropagationError::RuleFailed {
                op: ADD,
                schema: Box::new(schema),
                message: "dim out of range".into(),
            }
        );
    }

    #[test]
    fn rule_panic_is_wrapped() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, |_: &OpSchema| -> Result<OutputSharding, RuleError> {
            panic!("index 3 out of bounds")
        });
        let err = prop
            .propagate_op_sharding(ADD, &OpSchema::new(ADD, []))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropagationRuleFailed);
        match err {
            PropagationError::RuleFailed { message, .. } => {
                assert_eq!(message, "rule panicked: index 3 out of bounds");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_unsatisfiable() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, |_: &OpSchema| -> Result<OutputSharding, RuleError> {
            Ok(OutputSharding::failed("meshes differ"))
        });
        let schema = OpSchema::new(ADD, [OpArg::Int(1)]);
        let err = prop.propagate_op_sharding(ADD, &schema).unwrap_err();
        assert_eq!(
            err,
            PropagationError::Unsatisfiable {
                op: ADD,
                schema: Box::new(schema),
                reason: Some("meshes differ".into()),
            }
        );
    }

    #[test]
    fn empty_suggestion_list_is_unsatisfiable() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, |_: &OpSchema| -> Result<OutputSharding, RuleError> {
            Ok(OutputSharding::suggest(Vec::new()))
        });
        let err = prop
            .propagate_op_sharding(ADD, &OpSchema::new(ADD, []))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropagationUnsatisfiable);
    }

    #[test]
    fn reregistration_overrides() {
        let mut prop = ShardingPropagator::new();
        prop.register(ADD, |_: &OpSchema| -> Result<OutputSharding, RuleError> {
            Ok(OutputSharding::failed("old"))
        });
        let replaced = prop.register(ADD, resolve_first);
        assert!(replaced.is_some());
        assert_eq!(prop.len(), 1);

        let schema = add_schema(DTensorSpec::replicated(mesh()), DTensorSpec::replicated(mesh()));
        assert!(prop.propagate_op_sharding(ADD, &schema).unwrap().is_resolved());
    }

    #[test]
    fn with_rules_adopts_table() {
        let mut first = ShardingPropagator::new();
        first.register(ADD, resolve_first);
        let second = ShardingPropagator::with_rules(first.rules().clone());
        assert!(second.contains(ADD));
        assert!(!second.contains(MUL));
        assert_eq!(second.registered_ops().collect::<Vec<_>>(), vec![ADD]);
        assert!(Arc::ptr_eq(
            first.rule(ADD).unwrap(),
            second.rule(ADD).unwrap()
        ));
    }
}
