//! Rules for dtype promotion.
use crate::store::{BinaryOp, DType, DTypeKind, Reducer, Scalar};
use crate::type_system::ConstructionError;

/// The dtype an operand contributes to promotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Promotable {
    /// An array dtype, which always participates fully.
    Strong(DType),
    /// A scalar, which adapts to the array operand where it can.
    Weak(Scalar),
}

/// Promotes two array dtypes to the smallest type that can hold both.
pub fn result_type(a: DType, b: DType) -> DType {
    use DTypeKind::*;
    if a == b {
        return a;
    }
    match (a.kind(), b.kind()) {
        (Bool, _) => b,
        (_, Bool) => a,
        (Float, Float) | (Signed, Signed) | (Unsigned, Unsigned) => wider(a, b),
        (Signed, Unsigned) => mixed_sign(a, b),
        (Unsigned, Signed) => mixed_sign(b, a),
        (Float, _) => int_with_float(b, a),
        (_, Float) => int_with_float(a, b),
    }
}

fn wider(a: DType, b: DType) -> DType {
    if a.itemsize() >= b.itemsize() {
        a
    } else {
        b
    }
}

fn mixed_sign(signed: DType, unsigned: DType) -> DType {
    if signed.itemsize() > unsigned.itemsize() {
        return signed;
    }
    match unsigned {
        DType::UInt8 => DType::Int16,
        DType::UInt16 => DType::Int32,
        DType::UInt32 => DType::Int64,
        _ => DType::Float64,
    }
}

fn int_with_float(int: DType, float: DType) -> DType {
    match float {
        DType::Float32 if int.itemsize() <= 2 => DType::Float32,
        _ => DType::Float64,
    }
}

fn promote(lhs: Promotable, rhs: Promotable) -> Result<DType, ConstructionError> {
    match (lhs, rhs) {
        (Promotable::Strong(a), Promotable::Strong(b)) => Ok(result_type(a, b)),
        (Promotable::Strong(d), Promotable::Weak(s)) | (Promotable::Weak(s), Promotable::Strong(d)) => {
            weak_promotion(d, s)
        }
        (Promotable::Weak(a), Promotable::Weak(b)) => Ok(result_type(a.default_dtype(), b.default_dtype())),
    }
}

/// An integer scalar keeps an integer array's dtype, so it must fit in it.
fn weak_promotion(array: DType, scalar: Scalar) -> Result<DType, ConstructionError> {
    let dtype = match scalar {
        Scalar::Bool(_) => array,
        Scalar::Int(_) if array == DType::Bool => DType::Int64,
        Scalar::Int(value) if !array.holds_int(value) => {
            return Err(ConstructionError::ScalarOverflow { value, dtype: array });
        }
        Scalar::Int(_) => array,
        Scalar::Float(_) if array.is_float() => array,
        Scalar::Float(_) => DType::Float64,
    };
    Ok(dtype)
}

/// Infers the dtype of an elementwise operation or rejects the combination.
pub(crate) fn infer_elementwise(
    op: BinaryOp,
    lhs: Promotable,
    rhs: Promotable,
) -> Result<DType, ConstructionError> {
    let dtype = promote(lhs, rhs)?;
    let dtype = match op {
        BinaryOp::Divide if !dtype.is_float() => DType::Float64,
        BinaryOp::Subtract if dtype == DType::Bool => {
            return Err(ConstructionError::UnsupportedOperation { op: op.name(), dtype });
        }
        BinaryOp::FloorDivide | BinaryOp::Remainder | BinaryOp::Power if dtype == DType::Bool => DType::Int8,
        _ => dtype,
    };
    Ok(dtype)
}

/// Infers the dtype of a reduction result.
pub(crate) fn infer_reduction(reducer: Reducer, dtype: DType) -> DType {
    match reducer {
        Reducer::Count => DType::Int64,
        Reducer::Min | Reducer::Max => dtype,
        Reducer::Sum => match dtype.kind() {
            DTypeKind::Bool | DTypeKind::Signed => DType::Int64,
            DTypeKind::Unsigned => DType::UInt64,
            DTypeKind::Float => dtype,
        },
        Reducer::Mean | Reducer::Var { .. } | Reducer::Std { .. } => {
            if dtype.is_float() {
                dtype
            } else {
                DType::Float64
            }
        }
    }
}
