//! Operator identity tokens.

use std::fmt;

/// Identifies one overload of a distributed operator.
///
/// An `OpId` pairs the operator name (e.g. `aten.add`) with its overload
/// name (e.g. `Tensor`). Two ids are equal only when both parts match, so
/// `aten.add.Tensor` and `aten.add.Scalar` are distinct registry keys.
///
/// Ids are produced by the runtime's operator-dispatch layer and are
/// treated as opaque by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId {
    name: &'static str,
    overload: &'static str,
}

impl OpId {
    /// Create an id for `name` with the given `overload`.
    pub const fn new(name: &'static str, overload: &'static str) -> Self {
        Self { name, overload }
    }

    /// Operator name without the overload suffix.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Overload name. Empty for the default overload.
    pub const fn overload(&self) -> &'static str {
        self.overload
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overload.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.name, self.overload)
        }
    }
}
