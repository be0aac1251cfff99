//! [`OutputSharding`]: the result a sharding rule hands back.

use crate::placement::DTensorSpec;
use crate::schema::OpSchema;

/// Placement of an operator's output(s).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputSpec {
    /// A single tensor output.
    Single(DTensorSpec),
    /// One slot per output; `None` marks a non-tensor output.
    Multiple(Vec<Option<DTensorSpec>>),
}

impl From<DTensorSpec> for OutputSpec {
    fn from(spec: DTensorSpec) -> Self {
        Self::Single(spec)
    }
}

/// Which of the three result shapes an [`OutputSharding`] holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardingOutcome {
    /// An output placement is present.
    Resolved,
    /// No output placement, but at least one alternative input schema.
    SuggestsRedistribution,
    /// Neither an output placement nor a suggestion.
    Failed,
}

/// Result of running a sharding rule against an [`OpSchema`].
///
/// A rule fills in `output_spec` when the inputs can be consumed as-is,
/// or `schema_suggestions` when they first need to be redistributed.
/// When it can do neither it leaves both empty and explains why in
/// `failed_reason`.
///
/// An empty suggestion list is treated as no suggestion: a result whose
/// only content is `schema_suggestions: Some(vec![])` classifies as
/// [`ShardingOutcome::Failed`], and the registry reports it as
/// unsatisfiable rather than handing the caller nothing to act on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutputSharding {
    /// Output placement, when propagation resolved.
    pub output_spec: Option<OutputSpec>,
    /// Input schemas under which propagation would succeed.
    pub schema_suggestions: Option<Vec<OpSchema>>,
    /// Why propagation failed, when it did.
    pub failed_reason: Option<String>,
}

impl OutputSharding {
    /// Propagation resolved to `spec`.
    pub fn resolved(spec: impl Into<OutputSpec>) -> Self {
        Self {
            output_spec: Some(spec.into()),
            schema_suggestions: None,
            failed_reason: None,
        }
    }

    /// Propagation needs the inputs redistributed to one of `suggestions`.
    pub fn suggest(suggestions: impl IntoIterator<Item = OpSchema>) -> Self {
        Self {
            output_spec: None,
            schema_suggestions: Some(suggestions.into_iter().collect()),
            failed_reason: None,
        }
    }

    /// Propagation is impossible for these inputs.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            output_spec: None,
            schema_suggestions: None,
            failed_reason: Some(reason.into()),
        }
    }

    /// Attach a failure reason without changing the other fields.
    pub fn with_failed_reason(mut self, reason: impl Into<String>) -> Self {
        self.failed_reason = Some(reason.into());
        self
    }

    /// Suggestions, or an empty slice.
    pub fn suggestions(&self) -> &[OpSchema] {
        self.schema_suggestions.as_deref().unwrap_or(&[])
    }

    /// Classify this result.
    ///
    /// `output_spec` takes precedence: a result carrying both an output
    /// and suggestions is [`ShardingOutcome::Resolved`].
    pub fn outcome(&self) -> ShardingOutcome {
        if self.output_spec.is_some() {
            ShardingOutcome::Resolved
        } else if !self.suggestions().is_empty() {
            ShardingOutcome::SuggestsRedistribution
        } else {
            ShardingOutcome::Failed
        }
    }

    /// Whether an output placement is present.
    pub fn is_resolved(&self) -> bool {
        self.outcome() == ShardingOutcome::Resolved
    }

    /// Whether the caller has to redistribute before retrying.
    pub fn suggests_redistribution(&self) -> bool {
        self.outcome() == ShardingOutcome::SuggestsRedistribution
    }
}
