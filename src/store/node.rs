//! Graph nodes and the `Array` handle.
//!
//! Every node is immutable once built and reference counted, so a sub-expression
//! can be shared by any number of parents without copying. Shape, dtype and mask
//! status are inferred when the node is created and never change.

use super::masked::MaskedArray;
use super::source::{ArraySource, Element};
use super::types::{ArrayMeta, BinaryOp, DType, Reducer, Scalar, Shape};
use crate::type_system::{checker, ConstructionError};
use ndarray::{ArrayBase, Data, Dimension};
use std::fmt;
use std::sync::Arc;

/// The variant a node is, with its operands.
pub(crate) enum NodeKind {
    /// Wraps externally supplied data (the array adapter).
    Source(Arc<dyn ArraySource>),
    /// A value broadcast over the node's shape, with no backing storage.
    Constant(f64),
    Elementwise { op: BinaryOp, lhs: Array, rhs: Array },
    Aggregate { reducer: Reducer, operand: Array, axis: usize },
    Cast { operand: Array },
    /// Output axis `i` is operand axis `axes[i]`.
    Transpose { operand: Array, axes: Shape },
}

pub(crate) struct Node {
    pub(crate) meta: ArrayMeta,
    pub(crate) kind: NodeKind,
}

/// A lazily evaluated array: a leaf or a deferred operation over other arrays.
///
/// Cloning an `Array` is cheap and shares the underlying node.
#[derive(Clone)]
pub struct Array {
    pub(crate) node: Arc<Node>,
}

impl Array {
    pub(crate) fn from_node(meta: ArrayMeta, kind: NodeKind) -> Self {
        Self { node: Arc::new(Node { meta, kind }) }
    }

    /// Wraps an existing source without copying its data.
    pub fn wrap<S: ArraySource + 'static>(source: S) -> Result<Self, ConstructionError> {
        Self::wrap_shared(Arc::new(source))
    }

    /// Wraps a source that is already shared elsewhere.
    pub fn wrap_shared(source: Arc<dyn ArraySource>) -> Result<Self, ConstructionError> {
        let shape = checker::validate_shape(source.shape())?;
        let meta = ArrayMeta::new(shape, source.dtype(), source.is_masked());
        Ok(Self::from_node(meta, NodeKind::Source(source)))
    }

    /// An array of `shape` where every element is `value`.
    ///
    /// The dtype defaults to the scalar's own type (`float64` for floats,
    /// `int64` for integers, `bool` for booleans). The stored value is coerced
    /// to the dtype.
    pub fn constant(
        shape: &[usize],
        value: impl Into<Scalar>,
        dtype: Option<DType>,
    ) -> Result<Self, ConstructionError> {
        let value = value.into();
        let dtype = dtype.unwrap_or_else(|| value.default_dtype());
        let shape = checker::validate_shape(shape)?;
        let meta = ArrayMeta::new(shape, dtype, false);
        Ok(Self::from_node(meta, NodeKind::Constant(dtype.cast(value.as_f64()))))
    }

    pub fn zeros(shape: &[usize], dtype: Option<DType>) -> Result<Self, ConstructionError> {
        Self::constant(shape, 0.0, Some(dtype.unwrap_or_default()))
    }

    pub fn ones(shape: &[usize], dtype: Option<DType>) -> Result<Self, ConstructionError> {
        Self::constant(shape, 1.0, Some(dtype.unwrap_or_default()))
    }

    /// Builds a deferred elementwise operation. At least one operand must be lazy.
    pub fn elementwise(
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<Self, ConstructionError> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        if !lhs.is_lazy() && !rhs.is_lazy() {
            return Err(ConstructionError::NoLazyOperand { op: op.name() });
        }
        let meta = checker::infer_elementwise(op, &lhs, &rhs)?;
        let lhs = lhs.into_array(meta.dtype)?;
        let rhs = rhs.into_array(meta.dtype)?;
        Ok(Self::from_node(meta, NodeKind::Elementwise { op, lhs, rhs }))
    }

    /// Builds a deferred reduction over `axis` (negative counts from the end).
    pub fn aggregate(&self, reducer: Reducer, axis: isize) -> Result<Self, ConstructionError> {
        let (meta, axis) = checker::infer_aggregate(reducer, &self.node.meta, axis)?;
        Ok(Self::from_node(meta, NodeKind::Aggregate { reducer, operand: self.clone(), axis }))
    }

    /// A deferred conversion of the element type.
    pub fn astype(&self, dtype: DType) -> Self {
        let meta = ArrayMeta { dtype, ..self.node.meta.clone() };
        Self::from_node(meta, NodeKind::Cast { operand: self.clone() })
    }

    /// A deferred permutation of the axes. `None` reverses them; otherwise
    /// `axes` names every operand axis once, negative values counting from
    /// the end.
    pub fn transpose(&self, axes: Option<&[isize]>) -> Result<Self, ConstructionError> {
        let (meta, axes) = checker::infer_transpose(&self.node.meta, axes)?;
        Ok(Self::from_node(meta, NodeKind::Transpose { operand: self.clone(), axes }))
    }

    pub fn meta(&self) -> &ArrayMeta {
        &self.node.meta
    }

    pub fn shape(&self) -> &[usize] {
        &self.node.meta.shape
    }

    pub fn dtype(&self) -> DType {
        self.node.meta.dtype
    }

    pub fn ndim(&self) -> usize {
        self.node.meta.ndim()
    }

    pub fn size(&self) -> usize {
        self.node.meta.size()
    }

    /// Bytes the materialized array would occupy at its dtype.
    pub fn nbytes(&self) -> usize {
        self.size() * self.dtype().itemsize()
    }

    /// Whether materializing in masked mode can produce masked elements
    /// from a contributing leaf.
    pub fn is_masked(&self) -> bool {
        self.node.meta.masked
    }

    /// The fill value of a constant leaf.
    pub fn value(&self) -> Option<f64> {
        match self.node.kind {
            NodeKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Identity of the underlying node, stable while any handle is alive.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.node) as usize
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.node.kind
    }

    /// Direct operands, in order.
    pub(crate) fn operands(&self) -> Vec<&Array> {
        match &self.node.kind {
            NodeKind::Source(_) | NodeKind::Constant(_) => Vec::new(),
            NodeKind::Elementwise { lhs, rhs, .. } => vec![lhs, rhs],
            NodeKind::Aggregate { operand, .. } | NodeKind::Cast { operand } | NodeKind::Transpose { operand, .. } => {
                vec![operand]
            }
        }
    }

    /// Short label for the node's operation.
    pub(crate) fn label(&self) -> String {
        match &self.node.kind {
            NodeKind::Source(_) => "source".to_string(),
            NodeKind::Constant(v) => format!("constant({})", v),
            NodeKind::Elementwise { op, .. } => op.name().to_string(),
            NodeKind::Aggregate { reducer, axis, .. } => format!("{}(axis={})", reducer.name(), axis),
            NodeKind::Cast { .. } => format!("astype({})", self.dtype()),
            NodeKind::Transpose { axes, .. } => format!("transpose(axes={:?})", axes.as_slice()),
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("op", &self.label())
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("masked", &self.is_masked())
            .finish()
    }
}

/// Anything that may stand on either side of an elementwise operation.
#[derive(Debug, Clone)]
pub enum Operand {
    Lazy(Array),
    /// Eager data, wrapped into a leaf when the operation is built.
    Eager(Arc<dyn ArraySource>),
    Scalar(Scalar),
}

impl Operand {
    pub fn is_lazy(&self) -> bool {
        matches!(self, Operand::Lazy(_))
    }

    pub(crate) fn shape(&self) -> &[usize] {
        match self {
            Operand::Lazy(a) => a.shape(),
            Operand::Eager(s) => s.shape(),
            Operand::Scalar(_) => &[],
        }
    }

    pub(crate) fn is_masked(&self) -> bool {
        match self {
            Operand::Lazy(a) => a.is_masked(),
            Operand::Eager(s) => s.is_masked(),
            Operand::Scalar(_) => false,
        }
    }

    /// Turns the operand into a graph node. Scalars become 0-d constants of
    /// the dtype they were promoted to.
    fn into_array(self, result_dtype: DType) -> Result<Array, ConstructionError> {
        match self {
            Operand::Lazy(a) => Ok(a),
            Operand::Eager(s) => Array::wrap_shared(s),
            Operand::Scalar(s) => Array::constant(&[], s, Some(result_dtype)),
        }
    }
}

impl From<Array> for Operand {
    fn from(a: Array) -> Self {
        Operand::Lazy(a)
    }
}

impl From<&Array> for Operand {
    fn from(a: &Array) -> Self {
        Operand::Lazy(a.clone())
    }
}

impl From<MaskedArray> for Operand {
    fn from(m: MaskedArray) -> Self {
        Operand::Eager(Arc::new(m))
    }
}

impl From<Arc<dyn ArraySource>> for Operand {
    fn from(s: Arc<dyn ArraySource>) -> Self {
        Operand::Eager(s)
    }
}

impl<S, D> From<ArrayBase<S, D>> for Operand
where
    S: Data + Send + Sync + 'static,
    S::Elem: Element,
    D: Dimension + 'static,
{
    fn from(a: ArrayBase<S, D>) -> Self {
        Operand::Eager(Arc::new(a))
    }
}

impl From<Scalar> for Operand {
    fn from(s: Scalar) -> Self {
        Operand::Scalar(s)
    }
}

macro_rules! operand_from_scalar {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self { Operand::Scalar(Scalar::from(v)) }
        })*
    };
}

operand_from_scalar!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64);
