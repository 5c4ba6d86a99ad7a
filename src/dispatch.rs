//! Operator overloading for `Array`.
//!
//! Every operator builds a node and returns `Result<Array, ConstructionError>`
//! so shape mistakes surface at the expression that made them. Eager values
//! on the left (`2.0 - &a`, `ndarray - &a`, `masked * &a`) dispatch to the
//! reflected impls and keep their operand order.

use crate::store::{Array, BinaryOp, Element, MaskedArray, Operand, Reducer};
use crate::type_system::ConstructionError;
use ndarray::Dimension;
use std::ops::{Add, Div, Mul, Rem, Sub};

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<R: Into<Operand>> $trait<R> for Array {
            type Output = Result<Array, ConstructionError>;

            fn $method(self, rhs: R) -> Self::Output {
                Array::elementwise($op, self, rhs)
            }
        }

        impl<R: Into<Operand>> $trait<R> for &Array {
            type Output = Result<Array, ConstructionError>;

            fn $method(self, rhs: R) -> Self::Output {
                Array::elementwise($op, self, rhs)
            }
        }

        impl $trait<Array> for MaskedArray {
            type Output = Result<Array, ConstructionError>;

            fn $method(self, rhs: Array) -> Self::Output {
                Array::elementwise($op, self, rhs)
            }
        }

        impl $trait<&Array> for MaskedArray {
            type Output = Result<Array, ConstructionError>;

            fn $method(self, rhs: &Array) -> Self::Output {
                Array::elementwise($op, self, rhs)
            }
        }

        impl<T: Element, D: Dimension + 'static> $trait<Array> for ndarray::Array<T, D> {
            type Output = Result<Array, ConstructionError>;

            fn $method(self, rhs: Array) -> Self::Output {
                Array::elementwise($op, self, rhs)
            }
        }

        impl<T: Element, D: Dimension + 'static> $trait<&Array> for ndarray::Array<T, D> {
            type Output = Result<Array, ConstructionError>;

            fn $method(self, rhs: &Array) -> Self::Output {
                Array::elementwise($op, self, rhs)
            }
        }

        impl_binary_op!(@scalars $trait, $method, $op; f64, f32, i64, i32);
    };
    (@scalars $trait:ident, $method:ident, $op:expr; $($t:ty),*) => {
        $(
            impl $trait<Array> for $t {
                type Output = Result<Array, ConstructionError>;

                fn $method(self, rhs: Array) -> Self::Output {
                    Array::elementwise($op, self, rhs)
                }
            }

            impl $trait<&Array> for $t {
                type Output = Result<Array, ConstructionError>;

                fn $method(self, rhs: &Array) -> Self::Output {
                    Array::elementwise($op, self, rhs)
                }
            }
        )*
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Subtract);
impl_binary_op!(Mul, mul, BinaryOp::Multiply);
impl_binary_op!(Div, div, BinaryOp::Divide);
impl_binary_op!(Rem, rem, BinaryOp::Remainder);

/// Operations without an operator trait, and reductions in method form.
impl Array {
    pub fn floor_div(&self, rhs: impl Into<Operand>) -> Result<Array, ConstructionError> {
        Array::elementwise(BinaryOp::FloorDivide, self, rhs)
    }

    pub fn pow(&self, rhs: impl Into<Operand>) -> Result<Array, ConstructionError> {
        Array::elementwise(BinaryOp::Power, self, rhs)
    }

    pub fn sum(&self, axis: isize) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Sum, axis)
    }

    pub fn mean(&self, axis: isize) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Mean, axis)
    }

    pub fn min(&self, axis: isize) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Min, axis)
    }

    pub fn max(&self, axis: isize) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Max, axis)
    }

    pub fn var(&self, axis: isize, ddof: u32) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Var { ddof }, axis)
    }

    pub fn std(&self, axis: isize, ddof: u32) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Std { ddof }, axis)
    }

    pub fn count(&self, axis: isize) -> Result<Array, ConstructionError> {
        self.aggregate(Reducer::Count, axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DType;
    use ndarray::{arr1, Array2};

    fn leaf(node: &Array, i: usize) -> Array {
        node.operands()[i].clone()
    }

    #[test]
    fn test_forward_operators() {
        let a = Array::zeros(&[3, 4], None).unwrap();
        let b = Array::ones(&[4], Some(DType::Float32)).unwrap();

        let c = (&a + &b).unwrap();
        assert_eq!(c.shape(), &[3, 4]);
        assert!(leaf(&c, 0).ptr_eq(&a));
        assert!(leaf(&c, 1).ptr_eq(&b));

        let d = (a.clone() * 2.0).unwrap();
        assert_eq!(d.dtype(), DType::Float64);
        assert_eq!(leaf(&d, 1).value(), Some(2.0));
        assert!((&a - Array::zeros(&[2, 4], None).unwrap()).is_err());
    }

    #[test]
    fn test_reflected_scalar_keeps_order() {
        let a = Array::ones(&[2], Some(DType::Int32)).unwrap();
        let c = (10i32 - &a).unwrap();
        assert_eq!(leaf(&c, 0).value(), Some(10.0));
        assert!(leaf(&c, 1).ptr_eq(&a));
        assert_eq!(c.dtype(), DType::Int32);

        let q = (1.0f64 / &a).unwrap();
        assert_eq!(q.dtype(), DType::Float64);
    }

    #[test]
    fn test_reflected_eager_arrays() {
        let a = Array::zeros(&[1, 1], None).unwrap();
        let eager = Array2::<f64>::ones((1, 3));
        let c = (eager * &a).unwrap();
        assert_eq!(c.shape(), &[1, 3]);
        assert!(leaf(&c, 1).ptr_eq(&a));

        let m = MaskedArray::new(arr1(&[1.0, 2.0, 3.0]).into_dyn(), arr1(&[false, true, false]).into_dyn()).unwrap();
        let c = (m % &a).unwrap();
        assert!(c.is_masked());
        assert_eq!(c.shape(), &[1, 3]);
    }

    #[test]
    fn test_method_forms() {
        let a = Array::ones(&[3, 4], Some(DType::Int16)).unwrap();
        assert_eq!(a.sum(0).unwrap().dtype(), DType::Int64);
        assert_eq!(a.mean(-1).unwrap().shape(), &[3]);
        assert_eq!(a.var(1, 1).unwrap().dtype(), DType::Float64);
        assert_eq!(a.count(0).unwrap().dtype(), DType::Int64);
        assert_eq!(a.pow(2).unwrap().dtype(), DType::Int16);
        assert_eq!(a.floor_div(2.5).unwrap().dtype(), DType::Float64);
        assert!(a.max(2).is_err());
    }
}
