//! Runs the inference rules for a node about to be created.
//!
//! Each entry point gathers what the operands already know (shape, dtype,
//! mask status), applies the rules, and returns the new node's metadata.
//! Operands are never read.
use super::error::ConstructionError;
use super::rules::dtype::{self, Promotable};
use super::rules::shape;
use crate::store::{ArrayMeta, BinaryOp, Operand, Reducer, Shape};

pub(crate) use super::rules::shape::validate_shape;

fn promotable(operand: &Operand) -> Promotable {
    match operand {
        Operand::Lazy(a) => Promotable::Strong(a.dtype()),
        Operand::Eager(s) => Promotable::Strong(s.dtype()),
        Operand::Scalar(s) => Promotable::Weak(*s),
    }
}

/// Metadata of `lhs op rhs`.
pub(crate) fn infer_elementwise(
    op: BinaryOp,
    lhs: &Operand,
    rhs: &Operand,
) -> Result<ArrayMeta, ConstructionError> {
    let shape = shape::broadcast_shapes(lhs.shape(), rhs.shape())?;
    let dtype = dtype::infer_elementwise(op, promotable(lhs), promotable(rhs))?;
    let masked = lhs.is_masked() || rhs.is_masked();
    Ok(ArrayMeta { shape, dtype, masked })
}

/// Metadata of a reduction over `axis`, plus the axis in canonical form.
pub(crate) fn infer_aggregate(
    reducer: Reducer,
    operand: &ArrayMeta,
    axis: isize,
) -> Result<(ArrayMeta, usize), ConstructionError> {
    let axis = shape::resolve_axis(axis, operand.ndim())?;
    if reducer.needs_identity() && operand.shape[axis] == 0 {
        return Err(ConstructionError::EmptyReduction { reducer: reducer.name(), axis });
    }

    let shape: Shape = operand
        .shape
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != axis)
        .map(|(_, &dim)| dim)
        .collect();
    let meta = ArrayMeta {
        shape,
        dtype: dtype::infer_reduction(reducer, operand.dtype),
        masked: operand.masked,
    };
    Ok((meta, axis))
}

/// Metadata of an axis permutation, plus the axis order in canonical form.
/// `None` reverses the axes.
pub(crate) fn infer_transpose(
    operand: &ArrayMeta,
    axes: Option<&[isize]>,
) -> Result<(ArrayMeta, Shape), ConstructionError> {
    let ndim = operand.ndim();
    let axes = match axes {
        None => (0..ndim).rev().collect(),
        Some(axes) => shape::resolve_permutation(axes, ndim)?,
    };
    let shape = axes.iter().map(|&axis| operand.shape[axis]).collect();
    Ok((ArrayMeta { shape, ..operand.clone() }, axes))
}
