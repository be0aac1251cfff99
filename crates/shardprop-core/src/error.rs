//! Error types for sharding propagation.
//!
//! [`PropagationError`] is the only error that crosses the registry
//! boundary. Whatever a rule fails with, it reaches the caller as
//! [`PropagationError::RuleFailed`] with the message preserved; the
//! rule's own error type never escapes.

use thiserror::Error;

use crate::id::OpId;
use crate::schema::OpSchema;

/// Tag of a [`PropagationError`], for callers that branch on the kind
/// without destructuring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`PropagationError::NoRuleRegistered`].
    NoRuleRegistered,
    /// See [`PropagationError::RuleFailed`].
    PropagationRuleFailed,
    /// See [`PropagationError::Unsatisfiable`].
    PropagationUnsatisfiable,
}

/// Errors from `propagate_op_sharding`.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum PropagationError {
    /// No rule is registered for the operator. There is no fallback.
    #[error("operator {op} does not have a sharding propagation rule registered")]
    NoRuleRegistered {
        /// The operator that was looked up.
        op: OpId,
    },

    /// The rule returned an error or panicked.
    #[error("sharding propagation failed on op {op}; input schema: {schema}; error: {message}")]
    RuleFailed {
        /// The operator whose rule failed.
        op: OpId,
        /// The schema the rule was run against.
        schema: Box<OpSchema>,
        /// Message of the underlying failure.
        message: String,
    },

    /// The rule produced neither an output placement nor a suggestion.
    #[error(
        "sharding propagation is unsatisfiable on op {op}; input schema: {schema}; \
         failed reason: {}",
        .reason.as_deref().unwrap_or("<none given>")
    )]
    Unsatisfiable {
        /// The operator being propagated.
        op: OpId,
        /// The schema that could not be satisfied.
        schema: Box<OpSchema>,
        /// The rule's explanation, if it gave one.
        reason: Option<String>,
    },
}

impl PropagationError {
    /// The error's tag.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoRuleRegistered { .. } => ErrorKind::NoRuleRegistered,
            Self::RuleFailed { .. } => ErrorKind::PropagationRuleFailed,
            Self::Unsatisfiable { .. } => ErrorKind::PropagationUnsatisfiable,
        }
    }

    /// The operator the error refers to.
    pub fn op(&self) -> OpId {
        match self {
            Self::NoRuleRegistered { op }
            | Self::RuleFailed { op, .. }
            | Self::Unsatisfiable { op, .. } => *op,
        }
    }

    /// The input schema, for errors raised after a rule ran.
    pub fn schema(&self) -> Option<&OpSchema> {
        match self {
            Self::NoRuleRegistered { .. } => None,
            Self::RuleFailed { schema, .. } | Self::Unsatisfiable { schema, .. } => {
                Some(schema.as_ref())
            }
        }
    }
}

/// Failure reported by a sharding rule.
///
/// Rules return this instead of panicking. The registry converts it into
/// [`PropagationError::RuleFailed`].
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct RuleError {
    /// Human-readable description.
    pub message: String,
}

impl RuleError {
    /// Create a rule error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for RuleError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for RuleError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors from validating propagator configuration.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A bounded cache was requested with room for zero entries.
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,
}
