//! The [`ShardingRule`] trait and the [`RuleTable`] that maps operators to rules.

use std::sync::Arc;

use indexmap::IndexMap;
use shardprop_core::{OpId, OpSchema, OutputSharding, RuleError};

/// Computes output placement for one operator.
///
/// # Contract
///
/// - `propagate()` MUST be referentially transparent: the same schema
///   always yields the same result. [`CachingPropagator`](crate::CachingPropagator)
///   serves repeated schemas from memory and never re-checks.
/// - Failure is reported through `Err(RuleError)`. A panic is tolerated
///   (the registry reports it as a rule failure) but is not the intended
///   channel.
/// - An `Ok` result with neither an output spec nor suggestions means the
///   schema is unsatisfiable; the registry turns it into an error.
///
/// Any `Fn(&OpSchema) -> Result<OutputSharding, RuleError>` closure that
/// is `Send + Sync + 'static` implements this trait.
///
/// # Examples
///
/// ```
/// use shardprop_core::{OpSchema, OutputSharding, RuleError};
/// use shardprop_propagator::ShardingRule;
///
/// struct ReplicateOnly;
///
/// impl ShardingRule for ReplicateOnly {
///     fn propagate(&self, schema: &OpSchema) -> Result<OutputSharding, RuleError> {
///         match schema.arg_specs().next() {
///             Some(spec) if spec.is_replicated() => Ok(OutputSharding::resolved(spec.clone())),
///             _ => Ok(OutputSharding::failed("expected a replicated input")),
///         }
///     }
/// }
/// ```
pub trait ShardingRule: Send + Sync + 'static {
    /// Run the rule against one invocation.
    fn propagate(&self, schema: &OpSchema) -> Result<OutputSharding, RuleError>;
}

impl<F> ShardingRule for F
where
    F: Fn(&OpSchema) -> Result<OutputSharding, RuleError> + Send + Sync + 'static,
{
    fn propagate(&self, schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self(schema)
    }
}

/// A rule shared between tables.
pub type SharedRule = Arc<dyn ShardingRule>;

/// Operator-to-rule mapping, in registration order.
///
/// Re-registering an operator replaces its rule in place; the original
/// registration position is kept.
#[derive(Clone, Default)]
pub struct RuleTable {
    rules: IndexMap<OpId, SharedRule>,
}

impl RuleTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `rule` under `op`, returning the rule it replaced.
    pub fn insert(&mut self, op: OpId, rule: SharedRule) -> Option<SharedRule> {
        self.rules.insert(op, rule)
    }

    /// Rule registered for `op`.
    pub fn get(&self, op: &OpId) -> Option<&SharedRule> {
        self.rules.get(op)
    }

    /// Whether a rule is registered for `op`.
    pub fn contains(&self, op: &OpId) -> bool {
        self.rules.contains_key(op)
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
    pub fn ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.rules.keys().copied()
    }
}

impl std::fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.rules.keys()).finish()
    }
}

impl<R: ShardingRule> FromIterator<(OpId, R)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (OpId, R)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (op, rule) in iter {
            table.insert(op, Arc::new(rule));
        }
        table
    }
}
