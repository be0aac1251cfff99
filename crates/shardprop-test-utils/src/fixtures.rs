//! Reusable sharding rule fixtures.
//!
//! - [`ElementwiseRule`]: resolves when every tensor input has the same
//!   placement, otherwise suggests redistributing to the first input's.
//! - [`ConstRule`]: always returns the same result.
//! - [`FailingRule`]: always returns `Err`.
//! - [`PanickingRule`]: always panics.
//! - [`UnsatisfiableRule`]: returns neither output nor suggestions.
//! - [`CountingRule`]: wraps any rule and counts calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shardprop_core::{OpSchema, OutputSharding, RuleError};
use shardprop_propagator::ShardingRule;

/// Shared invocation counter, readable after the rule has been moved
/// into a registry.
#[derive(Clone, Debug, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pointwise propagation: all tensor inputs must share one placement.
///
/// When they do, the output takes that placement. When they don't, the
/// rule suggests a single alternative in which every tensor input is
/// redistributed to the first input's placement.
#[derive(Clone, Debug, Default)]
pub struct ElementwiseRule {
    pub calls: CallCounter,
}

impl ElementwiseRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShardingRule for ElementwiseRule {
    fn propagate(&self, schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self.calls.bump();
        let mut specs = schema.arg_specs();
        let Some(first) = specs.next() else {
            return Ok(OutputSharding::failed("no tensor inputs"));
        };
        if specs.all(|s| s == first) {
            return Ok(OutputSharding::resolved(first.clone()));
        }
        Ok(OutputSharding::suggest([schema.map_specs(|_| first.clone())]))
    }
}

/// Returns a fixed result for every schema.
#[derive(Clone, Debug)]
pub struct ConstRule {
    pub output: OutputSharding,
    pub calls: CallCounter,
}

impl ConstRule {
    pub fn new(output: OutputSharding) -> Self {
        Self {
            output,
            calls: CallCounter::new(),
        }
    }
}

impl ShardingRule for ConstRule {
    fn propagate(&self, _schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self.calls.bump();
        Ok(self.output.clone())
    }
}

/// Fails every call with `message`.
#[derive(Clone, Debug)]
pub struct FailingRule {
    pub message: String,
    pub calls: CallCounter,
}

impl FailingRule {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: CallCounter::new(),
        }
    }
}

impl ShardingRule for FailingRule {
    fn propagate(&self, _schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self.calls.bump();
        Err(RuleError::new(self.message.clone()))
    }
}

/// Panics on every call with `message`.
#[derive(Clone, Debug)]
pub struct PanickingRule {
    pub message: &'static str,
    pub calls: CallCounter,
}

impl PanickingRule {
    pub fn new(message: &'static str) -> Self {
        Self {
            message,
            calls: CallCounter::new(),
        }
    }
}

impl ShardingRule for PanickingRule {
    fn propagate(&self, _schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self.calls.bump();
        panic!("{}", self.message);
    }
}

/// Returns a result with no output and no suggestions.
#[derive(Clone, Debug)]
pub struct UnsatisfiableRule {
    pub reason: Option<String>,
    pub calls: CallCounter,
}

impl UnsatisfiableRule {
    pub fn new(reason: Option<&str>) -> Self {
        Self {
            reason: reason.map(str::to_string),
            calls: CallCounter::new(),
        }
    }
}

impl ShardingRule for UnsatisfiableRule {
    fn propagate(&self, _schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self.calls.bump();
        Ok(OutputSharding {
            output_spec: None,
            schema_suggestions: None,
            failed_reason: self.reason.clone(),
        })
    }
}

/// Wraps a rule and counts calls that reach it.
#[derive(Clone, Debug)]
pub struct CountingRule<R> {
    pub inner: R,
    pub calls: CallCounter,
}

impl<R: ShardingRule> CountingRule<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: CallCounter::new(),
        }
    }
}

impl<R: ShardingRule> ShardingRule for CountingRule<R> {
    fn propagate(&self, schema: &OpSchema) -> Result<OutputSharding, RuleError> {
        self.calls.bump();
        self.inner.propagate(schema)
    }
}
