//! Placement descriptors: how a tensor is laid out across a device mesh.

use smallvec::SmallVec;
use std::fmt;

/// Reduction applied when materializing a [`Placement::Partial`] tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise mean across ranks.
    Avg,
    /// Element-wise product across ranks.
    Product,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Product => "product",
            Self::Min => "min",
            Self::Max => "max",
        };
        f.write_str(s)
    }
}

/// Layout of a tensor along one mesh dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placement {
    /// The tensor is split along tensor dimension `dim`; each rank in
    /// this mesh dimension holds one slice.
    Shard {
        /// Tensor dimension being split.
        dim: u32,
    },
    /// Every rank in this mesh dimension holds a full copy.
    Replicate,
    /// Every rank holds a partial value; the full value is obtained by
    /// reducing across ranks with `reduce`.
    Partial {
        /// Pending reduction.
        reduce: ReduceOp,
    },
}

impl Placement {
    /// Shorthand for [`Placement::Shard`].
    pub const fn shard(dim: u32) -> Self {
        Self::Shard { dim }
    }

    /// Shorthand for a pending sum reduction.
    pub const fn partial_sum() -> Self {
        Self::Partial {
            reduce: ReduceOp::Sum,
        }
    }

    /// Whether this is a [`Placement::Shard`].
    pub fn is_shard(&self) -> bool {
        matches!(self, Self::Shard { .. })
    }

    /// Whether this is a [`Placement::Replicate`].
    pub fn is_replicate(&self) -> bool {
        matches!(self, Self::Replicate)
    }

    /// Whether this is a [`Placement::Partial`].
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shard { dim } => write!(f, "S({dim})"),
            Self::Replicate => write!(f, "R"),
            Self::Partial { reduce } => write!(f, "P({reduce})"),
        }
    }
}

/// Identity of a device mesh.
///
/// Only used for equality: two specs on different meshes never compare
/// equal even if their placements do. `shape` holds one extent per mesh
/// dimension; 4 inline slots cover every mesh used in practice.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MeshDescriptor {
    /// Runtime-assigned mesh id.
    pub id: u32,
    /// Extent of each mesh dimension.
    pub shape: SmallVec<[u32; 4]>,
}

impl MeshDescriptor {
    /// Create a mesh descriptor.
    pub fn new(id: u32, shape: impl IntoIterator<Item = u32>) -> Self {
        Self {
            id,
            shape: shape.into_iter().collect(),
        }
    }

    /// Number of mesh dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of ranks in the mesh.
    pub fn size(&self) -> u64 {
        self.shape.iter().map(|&d| d as u64).product()
    }
}

impl fmt::Display for MeshDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh{}{:?}", self.id, self.shape.as_slice())
    }
}

/// Element type of a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    I32,
    I64,
    Bool,
}

/// Global (unsharded) shape and dtype of a tensor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorMeta {
    /// Global shape.
    pub shape: SmallVec<[u64; 4]>,
    /// Element type.
    pub dtype: DType,
}

impl TensorMeta {
    /// Create tensor metadata.
    pub fn new(shape: impl IntoIterator<Item = u64>, dtype: DType) -> Self {
        Self {
            shape: shape.into_iter().collect(),
            dtype,
        }
    }
}

/// How one distributed tensor is placed on a mesh.
///
/// `placements[i]` describes the layout along mesh dimension `i`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DTensorSpec {
    /// Mesh the tensor lives on.
    pub mesh: MeshDescriptor,
    /// One placement per mesh dimension.
    pub placements: SmallVec<[Placement; 4]>,
    /// Global shape and dtype, when known.
    pub tensor_meta: Option<TensorMeta>,
}

impl DTensorSpec {
    /// Create a spec with explicit placements and no tensor metadata.
    pub fn new(mesh: MeshDescriptor, placements: impl IntoIterator<Item = Placement>) -> Self {
        Self {
            mesh,
            placements: placements.into_iter().collect(),
            tensor_meta: None,
        }
    }

    /// Fully replicated on every mesh dimension.
    pub fn replicated(mesh: MeshDescriptor) -> Self {
        let n = mesh.ndim();
        Self::new(mesh, std::iter::repeat_n(Placement::Replicate, n))
    }

    /// Shard tensor dim `dim` on mesh dim 0, replicate on the others.
    pub fn sharded(mesh: MeshDescriptor, dim: u32) -> Self {
        let n = mesh.ndim();
        let placements = (0..n).map(|i| {
            if i == 0 {
                Placement::shard(dim)
            } else {
                Placement::Replicate
            }
        });
        Self::new(mesh, placements)
    }

    /// Attach tensor metadata.
    pub fn with_meta(mut self, meta: TensorMeta) -> Self {
        self.tensor_meta = Some(meta);
        self
    }

    /// Replicated on every mesh dimension.
    pub fn is_replicated(&self) -> bool {
        self.placements.iter().all(Placement::is_replicate)
    }

    /// Sharded on at least one mesh dimension.
    pub fn is_sharded(&self) -> bool {
        self.placements.iter().any(Placement::is_shard)
    }

    /// Partial on at least one mesh dimension.
    pub fn is_partial(&self) -> bool {
        self.placements.iter().any(Placement::is_partial)
    }

    /// Tensor dims that are sharded, in mesh-dimension order.
    pub fn sharded_dims(&self) -> SmallVec<[u32; 4]> {
        self.placements
            .iter()
            .filter_map(|p| match p {
                Placement::Shard { dim } => Some(*dim),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for DTensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spec(")?;
        for (i, p) in self.placements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, " on {})", self.mesh)
    }
}
