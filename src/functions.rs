//! Free-function forms of the construction API.
//!
//! These mirror the `Array` methods and operators and accept eager operands
//! on either side, as long as one operand is lazy.

use crate::store::{Array, ArraySource, BinaryOp, DType, Operand, Reducer, Scalar};
use crate::type_system::ConstructionError;

type Result<T> = std::result::Result<T, ConstructionError>;

/// Wraps an existing array-like source as a lazy leaf.
pub fn wrap<S: ArraySource + 'static>(source: S) -> Result<Array> {
    Array::wrap(source)
}

pub fn constant(shape: &[usize], value: impl Into<Scalar>, dtype: Option<DType>) -> Result<Array> {
    Array::constant(shape, value, dtype)
}

pub fn zeros(shape: &[usize], dtype: Option<DType>) -> Result<Array> {
    Array::zeros(shape, dtype)
}

pub fn ones(shape: &[usize], dtype: Option<DType>) -> Result<Array> {
    Array::ones(shape, dtype)
}

macro_rules! elementwise_fn {
    ($($(#[$doc:meta])* $name:ident => $op:expr),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Result<Array> {
                Array::elementwise($op, lhs, rhs)
            }
        )*
    };
}

elementwise_fn!(
    add => BinaryOp::Add,
    sub => BinaryOp::Subtract,
    mul => BinaryOp::Multiply,
    /// True division; integer operands give `float64`.
    div => BinaryOp::Divide,
    /// Floored division.
    floor_div => BinaryOp::FloorDivide,
    /// Floored modulo; the result takes the sign of the divisor.
    rem => BinaryOp::Remainder,
    pow => BinaryOp::Power,
);

pub fn sum(a: &Array, axis: isize) -> Result<Array> {
    a.aggregate(Reducer::Sum, axis)
}

pub fn mean(a: &Array, axis: isize) -> Result<Array> {
    a.aggregate(Reducer::Mean, axis)
}

pub fn min(a: &Array, axis: isize) -> Result<Array> {
    a.aggregate(Reducer::Min, axis)
}

pub fn max(a: &Array, axis: isize) -> Result<Array> {
    a.aggregate(Reducer::Max, axis)
}

pub fn var(a: &Array, axis: isize, ddof: u32) -> Result<Array> {
    a.aggregate(Reducer::Var { ddof }, axis)
}

pub fn std(a: &Array, axis: isize, ddof: u32) -> Result<Array> {
    a.aggregate(Reducer::Std { ddof }, axis)
}

/// Number of unmasked elements along `axis`.
pub fn count(a: &Array, axis: isize) -> Result<Array> {
    a.aggregate(Reducer::Count, axis)
}

/// Permutes the axes of `a`; `None` reverses them.
pub fn transpose(a: &Array, axes: Option<&[isize]>) -> Result<Array> {
    a.transpose(axes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rstest::rstest;

    #[test]
    fn test_elementwise_values() {
        let a = wrap(arr1(&[1.0, 2.0])).unwrap();
        let b = arr1(&[10.0, 20.0]);
        let check = |c: Result<Array>, expected: &[f64]| {
            assert_eq!(c.unwrap().ndarray().unwrap(), arr1(expected).into_dyn());
        };
        check(add(&a, b.clone()), &[11.0, 22.0]);
        check(sub(&a, b.clone()), &[-9.0, -18.0]);
        check(mul(&a, b.clone()), &[10.0, 40.0]);
        check(div(&a, b.clone()), &[0.1, 0.1]);
        check(floor_div(&a, b.clone()), &[0.0, 0.0]);
        check(rem(&a, b.clone()), &[1.0, 2.0]);
        check(pow(&a, b.clone()), &[1.0, 1_048_576.0]);
        // Eager on the left keeps operand order.
        check(sub(b, &a), &[9.0, 18.0]);
    }

    #[rstest]
    #[case(-7.0, 2.0, -4.0, 1.0)]
    #[case(7.0, -2.0, -4.0, -1.0)]
    #[case(-7.5, 2.0, -4.0, 0.5)]
    fn test_floored_semantics(#[case] a: f64, #[case] b: f64, #[case] quotient: f64, #[case] remainder: f64) {
        let x = wrap(arr1(&[a])).unwrap();
        assert_eq!(floor_div(&x, b).unwrap().ndarray().unwrap()[[0]], quotient);
        assert_eq!(rem(&x, b).unwrap().ndarray().unwrap()[[0]], remainder);
    }

    #[test]
    fn test_reductions() {
        let a = wrap(arr2(&[[1i32, 2, 3], [5, 6, 10]])).unwrap();
        assert_eq!(sum(&a, 1).unwrap().ndarray().unwrap(), arr1(&[6.0, 21.0]).into_dyn());
        assert_eq!(mean(&a, 0).unwrap().ndarray().unwrap(), arr1(&[3.0, 4.0, 6.5]).into_dyn());
        assert_eq!(min(&a, 0).unwrap().ndarray().unwrap(), arr1(&[1.0, 2.0, 3.0]).into_dyn());
        assert_eq!(max(&a, -1).unwrap().ndarray().unwrap(), arr1(&[3.0, 10.0]).into_dyn());
        assert_eq!(var(&a, 0, 0).unwrap().ndarray().unwrap(), arr1(&[4.0, 4.0, 12.25]).into_dyn());
        assert_eq!(std(&a, 0, 0).unwrap().ndarray().unwrap(), arr1(&[2.0, 2.0, 3.5]).into_dyn());
        assert_eq!(count(&a, 1).unwrap().ndarray().unwrap(), arr1(&[3.0, 3.0]).into_dyn());
    }

    #[test]
    fn test_constant_and_zeros() {
        let c = constant(&[2], 7, Some(DType::UInt8)).unwrap();
        assert_eq!(c.ndarray().unwrap(), arr1(&[7.0, 7.0]).into_dyn());
        let z = zeros(&[2, 3], None).unwrap();
        assert_eq!(z.ndarray().unwrap(), ndarray::ArrayD::<f64>::zeros(ndarray::IxDyn(&[2, 3])));
        assert_eq!(ones(&[1], Some(DType::Bool)).unwrap().ndarray().unwrap()[[0]], 1.0);
    }

    #[test]
    fn test_transpose() {
        let a = wrap(arr2(&[[1i64, 2, 3], [4, 5, 6]])).unwrap();
        let t = transpose(&a, None).unwrap();
        assert_eq!(t.dtype(), DType::Int64);
        assert_eq!(t.ndarray().unwrap(), arr2(&[[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]).into_dyn());
        assert_eq!(transpose(&a, Some(&[0, 1])).unwrap().ndarray().unwrap(), a.ndarray().unwrap());
    }

    #[test]
    fn test_eager_only_is_rejected() {
        assert!(matches!(add(arr1(&[1.0]), 1.0), Err(ConstructionError::NoLazyOperand { .. })));
    }
}
