//! Rules for broadcasting and axis resolution.
use crate::store::Shape;
use crate::type_system::ConstructionError;

/// Computes the broadcast of two shapes.
///
/// Shapes are aligned on their trailing dimensions; a missing or size-1
/// dimension stretches to match the other side.
///
/// - `[3, 1] + [1, 4] -> [3, 4]`
/// - `[3, 4] + [4] -> [3, 4]`
/// - `[3, 4] + [2, 4] -> error`
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Result<Shape, ConstructionError> {
    let ndim = lhs.len().max(rhs.len());
    let mut result: Shape = smallvec::smallvec![0; ndim];

    for i in 0..ndim {
        let l = if i < lhs.len() { lhs[lhs.len() - 1 - i] } else { 1 };
        let r = if i < rhs.len() { rhs[rhs.len() - 1 - i] } else { 1 };

        result[ndim - 1 - i] = match (l, r) {
            _ if l == r => l,
            (1, _) => r,
            (_, 1) => l,
            _ => {
                return Err(ConstructionError::Broadcast { lhs: lhs.to_vec(), rhs: rhs.to_vec() });
            }
        };
    }

    Ok(result)
}

/// Resolves a possibly negative axis against `ndim`.
pub fn resolve_axis(axis: isize, ndim: usize) -> Result<usize, ConstructionError> {
    let resolved = if axis < 0 { axis + ndim as isize } else { axis };
    if resolved < 0 || resolved >= ndim as isize {
        return Err(ConstructionError::AxisOutOfRange { axis, ndim });
    }
    Ok(resolved as usize)
}

/// Resolves a transpose axis order, which must name every axis exactly once.
pub fn resolve_permutation(axes: &[isize], ndim: usize) -> Result<Shape, ConstructionError> {
    if axes.len() != ndim {
        return Err(ConstructionError::InvalidAxes(format!(
            "{} axes given for an array of dimension {}",
            axes.len(),
            ndim
        )));
    }
    let mut seen = vec![false; ndim];
    axes.iter()
        .map(|&axis| {
            let resolved = resolve_axis(axis, ndim)?;
            if std::mem::replace(&mut seen[resolved], true) {
                return Err(ConstructionError::InvalidAxes(format!("repeated axis {}", resolved)));
            }
            Ok(resolved)
        })
        .collect()
}

/// Rejects shapes whose element count or `f64` byte size overflows.
pub fn validate_shape(shape: &[usize]) -> Result<Shape, ConstructionError> {
    let fits = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .and_then(|size| size.checked_mul(std::mem::size_of::<f64>()))
        .is_some();
    if !fits {
        return Err(ConstructionError::InvalidShape(format!("array of shape {:?} is too big", shape)));
    }
    Ok(Shape::from_slice(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[3, 4], &[3, 4], &[3, 4])]
    #[case(&[], &[3, 4], &[3, 4])]
    #[case(&[3, 4], &[4], &[3, 4])]
    #[case(&[3, 1], &[1, 4], &[3, 4])]
    #[case(&[1, 1], &[3], &[1, 3])]
    #[case(&[2, 1, 5], &[4, 1], &[2, 4, 5])]
    #[case(&[0, 3], &[1, 3], &[0, 3])]
    #[case(&[0], &[1], &[0])]
    fn test_broadcast_shapes(#[case] lhs: &[usize], #[case] rhs: &[usize], #[case] expected: &[usize]) {
        assert_eq!(broadcast_shapes(lhs, rhs).unwrap().as_slice(), expected);
        assert_eq!(broadcast_shapes(rhs, lhs).unwrap().as_slice(), expected);
    }

    #[rstest]
    #[case(&[1, 0, 2], 3, &[1, 0, 2])]
    #[case(&[-1, 0], 2, &[1, 0])]
    #[case(&[], 0, &[])]
    fn test_resolve_permutation(#[case] axes: &[isize], #[case] ndim: usize, #[case] expected: &[usize]) {
        assert_eq!(resolve_permutation(axes, ndim).unwrap().as_slice(), expected);
    }

    #[rstest]
    #[case(&[0], 2)]
    #[case(&[0, -2], 2)]
    #[case(&[0, 1, 2], 2)]
    fn test_resolve_permutation_rejects(#[case] axes: &[isize], #[case] ndim: usize) {
        assert!(matches!(resolve_permutation(axes, ndim), Err(ConstructionError::InvalidAxes(_))));
    }

    #[rstest]
    #[case(&[3, 4], &[2, 4])]
    #[case(&[3], &[4])]
    #[case(&[0], &[2])]
    fn test_broadcast_mismatch(#[case] lhs: &[usize], #[case] rhs: &[usize]) {
        let err = broadcast_shapes(lhs, rhs).unwrap_err();
        assert_eq!(err, ConstructionError::Broadcast { lhs: lhs.to_vec(), rhs: rhs.to_vec() });
    }

    #[rstest]
    #[case(0, 3, 0)]
    #[case(2, 3, 2)]
    #[case(-1, 3, 2)]
    #[case(-3, 3, 0)]
    fn test_resolve_axis(#[case] axis: isize, #[case] ndim: usize, #[case] expected: usize) {
        assert_eq!(resolve_axis(axis, ndim).unwrap(), expected);
    }

    #[rstest]
    #[case(3, 3)]
    #[case(-4, 3)]
    #[case(0, 0)]
    fn test_resolve_axis_out_of_range(#[case] axis: isize, #[case] ndim: usize) {
        assert_eq!(resolve_axis(axis, ndim).unwrap_err(), ConstructionError::AxisOutOfRange { axis, ndim });
    }

    #[test]
    fn test_validate_shape_overflow() {
        assert!(validate_shape(&[usize::MAX, 2]).is_err());
        assert!(validate_shape(&[usize::MAX / 4]).is_err());
        assert_eq!(validate_shape(&[0, usize::MAX]).unwrap().as_slice(), &[0, usize::MAX]);
        assert_eq!(validate_shape(&[]).unwrap().len(), 0);
    }
}
