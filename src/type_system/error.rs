//! Defines the error types for the type system module.
use crate::store::DType;
use thiserror::Error;

/// Raised while building a node; never deferred to materialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// Operand shapes disagree in a dimension where neither is 1.
    #[error("operands could not be broadcast together with shapes {lhs:?} {rhs:?}")]
    Broadcast { lhs: Vec<usize>, rhs: Vec<usize> },
    #[error("axis {axis} is out of bounds for array of dimension {ndim}")]
    AxisOutOfRange { axis: isize, ndim: usize },
    /// Neither operand is a lazy array, so the operation belongs to the eager side.
    #[error("unsupported operand types for '{op}': at least one operand must be a lazy array")]
    NoLazyOperand { op: &'static str },
    #[error("'{op}' is not supported for dtype {dtype}")]
    UnsupportedOperation { op: &'static str, dtype: DType },
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    /// An integer scalar outside the range of the array dtype it would adapt to.
    #[error("integer scalar {value} is out of bounds for {dtype}")]
    ScalarOverflow { value: i64, dtype: DType },
    #[error("invalid axes for transpose: {0}")]
    InvalidAxes(String),
    #[error("zero-size axis {axis} passed to '{reducer}', which has no identity")]
    EmptyReduction { reducer: &'static str, axis: usize },
}
