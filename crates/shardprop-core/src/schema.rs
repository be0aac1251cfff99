//! [`OpSchema`]: the structural descriptor of one operator invocation.
//!
//! An `OpSchema` is the memo key of the caching propagator, so its
//! `Eq`/`Hash` must agree field-for-field: two schemas compare equal
//! exactly when every argument (placements, mesh, tensor metadata, and
//! non-tensor values) is equal. Floats are stored as raw bits for this
//! reason, and keyword arguments live in a `BTreeMap` so insertion order
//! never affects the hash.

use std::collections::BTreeMap;
use std::fmt;

use crate::id::OpId;
use crate::placement::DTensorSpec;

/// One argument of an operator invocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpArg {
    /// A distributed tensor.
    Spec(DTensorSpec),
    /// A list of distributed tensors (e.g. the input of `cat`).
    SpecList(Vec<DTensorSpec>),
    /// An integer scalar (dims, sizes, flags encoded as ints).
    Int(i64),
    /// A list of integers (shapes, permutations).
    IntList(Vec<i64>),
    /// A float scalar as `f64::to_bits`. Build with [`OpArg::float`].
    Float(u64),
    /// A boolean scalar.
    Bool(bool),
    /// A string argument (e.g. a reduction mode).
    Str(String),
    /// An absent optional argument.
    None,
}

impl OpArg {
    /// Wrap a float, keyed by its bit pattern.
    ///
    /// `0.0` and `-0.0` are distinct keys, and every NaN payload is its
    /// own key.
    pub fn float(v: f64) -> Self {
        Self::Float(v.to_bits())
    }

    /// The float value, if this is a [`OpArg::Float`].
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// The tensor spec, if this is a [`OpArg::Spec`].
    pub fn as_spec(&self) -> Option<&DTensorSpec> {
        match self {
            Self::Spec(spec) => Some(spec),
            _ => None,
        }
    }
}

impl From<DTensorSpec> for OpArg {
    fn from(spec: DTensorSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<i64> for OpArg {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for OpArg {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for OpArg {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl fmt::Display for OpArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spec(spec) => write!(f, "{spec}"),
            Self::SpecList(specs) => {
                write!(f, "[")?;
                for (i, s) in specs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, "]")
            }
            Self::Int(v) => write!(f, "{v}"),
            Self::IntList(v) => write!(f, "{v:?}"),
            Self::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Descriptor of one concrete operator invocation.
///
/// Holds the operator identity, the positional arguments in call order,
/// and the keyword arguments. Immutable once built; rules that suggest
/// a redistribution return new schemas built with [`with_args`](Self::with_args).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpSchema {
    /// Operator being invoked.
    pub op: OpId,
    /// Positional arguments.
    pub args: Vec<OpArg>,
    /// Keyword arguments, ordered by name.
    pub kwargs: BTreeMap<String, OpArg>,
}

impl OpSchema {
    /// Create a schema with positional arguments only.
    pub fn new(op: OpId, args: impl IntoIterator<Item = OpArg>) -> Self {
        Self {
            op,
            args: args.into_iter().collect(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Add a keyword argument, replacing any previous value for `name`.
    pub fn with_kwarg(mut self, name: impl Into<String>, value: OpArg) -> Self {
        self.kwargs.insert(name.into(), value);
        self
    }

    /// Same operator and keyword arguments, new positional arguments.
    pub fn with_args(&self, args: impl IntoIterator<Item = OpArg>) -> Self {
        Self {
            op: self.op,
            args: args.into_iter().collect(),
            kwargs: self.kwargs.clone(),
        }
    }

    /// Same schema with every positional tensor argument passed through `f`.
    ///
    /// Reaches into [`OpArg::SpecList`] entries, matching the traversal of
    /// [`arg_specs`](Self::arg_specs). Scalars and keyword arguments are kept.
    pub fn map_specs(&self, mut f: impl FnMut(&DTensorSpec) -> DTensorSpec) -> Self {
        self.with_args(self.args.iter().map(|arg| match arg {
            OpArg::Spec(spec) => OpArg::Spec(f(spec)),
            OpArg::SpecList(specs) => OpArg::SpecList(specs.iter().map(&mut f).collect()),
            other => other.clone(),
        }))
    }

    /// Positional tensor arguments in call order.
    ///
    /// [`OpArg::SpecList`] entries are flattened.
    pub fn arg_specs(&self) -> impl Iterator<Item = &DTensorSpec> + '_ {
        self.args.iter().flat_map(|arg| match arg {
            OpArg::Spec(spec) => std::slice::from_ref(spec).iter(),
            OpArg::SpecList(specs) => specs.iter(),
            _ => Default::default(),
        })
    }
}

impl fmt::Display for OpSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{arg}")?;
        }
        for (name, value) in &self.kwargs {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{MeshDescriptor, Placement};
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    const ADD: OpId = OpId::new("aten.add", "Tensor");

    fn hash_of<T: Hash>(v: &T) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    fn mesh() -> MeshDescriptor {
        MeshDescriptor::new(0, [4])
    }

    #[test]
    fn separately_built_schemas_are_equal() {
        let a = OpSchema::new(
            ADD,
            [
                DTensorSpec::sharded(mesh(), 0).into(),
                DTensorSpec::replicated(mesh()).into(),
            ],
        );
        let b = OpSchema::new(
            ADD,
            [
                DTensorSpec::sharded(mesh(), 0).into(),
                DTensorSpec::replicated(mesh()).into(),
            ],
        );
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn kwarg_order_does_not_affect_identity() {
        let base = OpSchema::new(ADD, [DTensorSpec::replicated(mesh()).into()]);
        let a = base
            .clone()
            .with_kwarg("alpha", OpArg::float(2.0))
            .with_kwarg("out", OpArg::None);
        let b = base
            .with_kwarg("out", OpArg::None)
            .with_kwarg("alpha", OpArg::float(2.0));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn float_args_compare_by_bits() {
        assert_ne!(OpArg::float(0.0), OpArg::float(-0.0));
        assert_eq!(OpArg::float(f64::NAN), OpArg::float(f64::NAN));
        assert_eq!(OpArg::float(1.5).as_float(), Some(1.5));
    }

    #[test]
    fn arg_specs_flattens_lists_and_skips_scalars() {
        let schema = OpSchema::new(
            OpId::new("aten.cat", ""),
            [
                OpArg::SpecList(vec![
                    DTensorSpec::sharded(mesh(), 0),
                    DTensorSpec::replicated(mesh()),
                ]),
                OpArg::Int(1),
            ],
        );
        let specs: Vec<_> = schema.arg_specs().collect();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].placements[0], Placement::shard(0));
    }

    #[test]
    fn with_args_keeps_op_and_kwargs() {
        let schema = OpSchema::new(ADD, [DTensorSpec::replicated(mesh()).into()])
            .with_kwarg("alpha", OpArg::Int(1));
        let suggested = schema.with_args([DTensorSpec::sharded(mesh(), 0).into()]);
        assert_eq!(suggested.op, ADD);
        assert_eq!(suggested.kwargs, schema.kwargs);
        assert_ne!(suggested, schema);
    }

    #[test]
    fn map_specs_rewrites_lists_and_keeps_scalars() {
        let schema = OpSchema::new(
            OpId::new("aten.cat", ""),
            [
                OpArg::SpecList(vec![
                    DTensorSpec::sharded(mesh(), 0),
                    DTensorSpec::replicated(mesh()),
                ]),
                OpArg::Int(1),
            ],
        )
        .with_kwarg("out", OpArg::None);
        let target = DTensorSpec::sharded(mesh(), 0);
        let mapped = schema.map_specs(|_| target.clone());

        assert!(mapped.arg_specs().all(|s| *s == target));
        assert_eq!(mapped.arg_specs().count(), 2);
        assert_eq!(mapped.args[1], OpArg::Int(1));
        assert_eq!(mapped.kwargs, schema.kwargs);
        assert_ne!(mapped, schema);
    }

    #[test]
    fn display_lists_args_then_kwargs() {
        let schema = OpSchema::new(ADD, [OpArg::Int(3), OpArg::Bool(true)])
            .with_kwarg("alpha", OpArg::float(0.5));
        assert_eq!(schema.to_string(), "aten.add.Tensor(3, true, alpha=0.5)");
    }

    fn arb_placement() -> impl Strategy<Value = Placement> {
        prop_oneof![
            (0u32..4).prop_map(Placement::shard),
            Just(Placement::Replicate),
            Just(Placement::partial_sum()),
        ]
    }

    fn arb_spec() -> impl Strategy<Value = DTensorSpec> {
        (0u32..3, prop::collection::vec(arb_placement(), 1..3)).prop_map(|(id, placements)| {
            let mesh = MeshDescriptor::new(id, placements.iter().map(|_| 2));
            DTensorSpec::new(mesh, placements)
        })
    }

    fn arb_schema() -> impl Strategy<Value = OpSchema> {
        (
            prop::collection::vec(arb_spec(), 0..3),
            prop::option::of(-4i64..4),
        )
            .prop_map(|(specs, scalar)| {
                let mut args: Vec<OpArg> = specs.into_iter().map(OpArg::Spec).collect();
                if let Some(v) = scalar {
                    args.push(OpArg::Int(v));
                }
                OpSchema::new(ADD, args)
            })
    }

    proptest! {
        #[test]
        fn clone_is_equal_with_same_hash(s in arb_schema()) {
            let c = s.clone();
            prop_assert_eq!(&s, &c);
            prop_assert_eq!(hash_of(&s), hash_of(&c));
        }

        #[test]
        fn equal_schemas_hash_equal(a in arb_schema(), b in arb_schema()) {
            if a == b {
                prop_assert_eq!(hash_of(&a), hash_of(&b));
            }
        }

        #[test]
        fn changing_an_arg_breaks_equality(s in arb_schema()) {
            let mut changed = s.clone();
            changed.args.push(OpArg::Bool(true));
            prop_assert_ne!(s, changed);
        }
    }
}
