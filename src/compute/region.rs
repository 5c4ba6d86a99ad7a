//! Hyper-rectangular regions and how they map through broadcasting and reduction.
use crate::store::Shape;
use smallvec::SmallVec;
use std::ops::Range;

/// One half-open index range per axis.
pub type Region = SmallVec<[Range<usize>; 4]>;

/// The region covering all of `shape`.
pub fn full(shape: &[usize]) -> Region {
    shape.iter().map(|&dim| 0..dim).collect()
}

/// Lengths of the region along each axis.
pub fn extent(region: &[Range<usize>]) -> Shape {
    region.iter().map(|r| r.end - r.start).collect()
}

/// Number of elements inside the region.
pub fn size(region: &[Range<usize>]) -> usize {
    region.iter().map(|r| r.end - r.start).product()
}

/// The part of a broadcast operand needed to produce `region` of the output.
///
/// Operand axes are right-aligned with the output; a length-1 operand axis
/// always contributes its single index.
pub fn broadcast_source(operand: &[usize], output: &[usize], region: &[Range<usize>]) -> Region {
    let offset = output.len() - operand.len();
    operand
        .iter()
        .enumerate()
        .map(|(i, &dim)| if dim == 1 { 0..1 } else { region[offset + i].clone() })
        .collect()
}

/// The operand region a reduction over `axis` reads: `region` with the full
/// `0..len` range inserted at `axis`.
pub fn with_axis(region: &[Range<usize>], axis: usize, len: usize) -> Region {
    let mut out: Region = region.iter().cloned().collect();
    out.insert(axis, 0..len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_full_and_size() {
        let r = full(&[3, 0, 2]);
        assert_eq!(r.as_slice(), &[0..3, 0..0, 0..2]);
        assert_eq!(size(&r), 0);
        assert_eq!(extent(&[2..5, 1..2]).as_slice(), &[3, 1]);
        assert_eq!(size(&[]), 1);
    }

    #[rstest]
    #[case(&[3, 4], &[3, 4], &[1..2, 0..4], &[1..2, 0..4])]
    #[case(&[4], &[3, 4], &[1..2, 2..4], &[2..4])]
    #[case(&[1, 4], &[3, 4], &[1..3, 0..2], &[0..1, 0..2])]
    #[case(&[3, 1], &[3, 4], &[0..2, 1..3], &[0..2, 0..1])]
    #[case(&[], &[3, 4], &[0..1, 0..4], &[])]
    fn test_broadcast_source(
        #[case] operand: &[usize],
        #[case] output: &[usize],
        #[case] region: &[Range<usize>],
        #[case] expected: &[Range<usize>],
    ) {
        assert_eq!(broadcast_source(operand, output, region).as_slice(), expected);
    }

    #[test]
    fn test_with_axis() {
        assert_eq!(with_axis(&[0..2, 1..3], 1, 7).as_slice(), &[0..2, 0..7, 1..3]);
        assert_eq!(with_axis(&[], 0, 4).as_slice(), &[0..4]);
    }
}
