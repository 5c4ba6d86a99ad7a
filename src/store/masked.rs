//! The eager mask-carrying array exchanged with the engine.

use super::source::Element;
use super::types::DType;
use crate::type_system::ConstructionError;
use ndarray::{Array, ArrayD, Dimension, IxDyn, Zip};

/// A dense array paired with a per-element validity mask (`true` = masked).
#[derive(Debug, Clone)]
pub struct MaskedArray {
    data: ArrayD<f64>,
    mask: ArrayD<bool>,
    dtype: DType,
}

impl MaskedArray {
    /// Builds a `float64` masked array. The mask must match the data shape.
    pub fn new(data: ArrayD<f64>, mask: ArrayD<bool>) -> Result<Self, ConstructionError> {
        Self::with_dtype(data, mask, DType::Float64)
    }

    /// Builds a masked array from typed elements, keeping their dtype.
    pub fn from_elements<T: Element, D: Dimension>(
        data: Array<T, D>,
        mask: Array<bool, D>,
    ) -> Result<Self, ConstructionError> {
        Self::with_dtype(data.mapv(T::to_f64).into_dyn(), mask.into_dyn(), T::DTYPE)
    }

    pub(crate) fn with_dtype(
        data: ArrayD<f64>,
        mask: ArrayD<bool>,
        dtype: DType,
    ) -> Result<Self, ConstructionError> {
        if data.shape() != mask.shape() {
            return Err(ConstructionError::InvalidShape(format!(
                "mask shape {:?} does not match data shape {:?}",
                mask.shape(),
                data.shape()
            )));
        }
        Ok(Self { data, mask, dtype })
    }

    /// A masked array with nothing masked.
    pub fn unmasked(data: ArrayD<f64>) -> Self {
        let mask = ArrayD::from_elem(data.raw_dim(), false);
        Self { data, mask, dtype: DType::Float64 }
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn mask(&self) -> &ArrayD<bool> {
        &self.mask
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn into_parts(self) -> (ArrayD<f64>, ArrayD<bool>) {
        (self.data, self.mask)
    }

    /// Number of masked elements.
    pub fn masked_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Data with masked positions replaced by `fill`.
    pub fn filled(&self, fill: f64) -> ArrayD<f64> {
        Zip::from(&self.data)
            .and(&self.mask)
            .map_collect(|&d, &m| if m { fill } else { d })
    }

    /// Valid values in row-major order.
    pub fn compressed(&self) -> Vec<f64> {
        self.data
            .iter()
            .zip(self.mask.iter())
            .filter(|&(_, &m)| !m)
            .map(|(&d, _)| d)
            .collect()
    }

    pub(crate) fn from_parts(data: ArrayD<f64>, mask: Option<ArrayD<bool>>, dtype: DType) -> Self {
        let mask = mask.unwrap_or_else(|| ArrayD::from_elem(IxDyn(data.shape()), false));
        Self { data, mask, dtype }
    }
}

/// Equal when shapes and masks agree and data agrees at every valid position.
impl PartialEq for MaskedArray {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && self.mask == other.mask
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .zip(self.mask.iter())
                .all(|((a, b), &m)| m || a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, arr1};

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = MaskedArray::new(arr1(&[1.0, 2.0]).into_dyn(), arr1(&[false]).into_dyn()).unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidShape(_)));
    }

    #[test]
    fn test_equality_ignores_masked_data() {
        let a = MaskedArray::new(arr1(&[1.0, 2.0, 3.0]).into_dyn(), arr1(&[false, true, false]).into_dyn()).unwrap();
        let b = MaskedArray::new(arr1(&[1.0, 99.0, 3.0]).into_dyn(), arr1(&[false, true, false]).into_dyn()).unwrap();
        assert_eq!(a, b);

        let c = MaskedArray::unmasked(arr1(&[1.0, 99.0, 3.0]).into_dyn());
        assert_ne!(a, c);
    }

    #[test]
    fn test_filled_and_compressed() {
        let m = MaskedArray::from_elements(array![[1i32, 2], [3, 4]], array![[false, true], [true, false]]).unwrap();
        assert_eq!(m.dtype(), DType::Int32);
        assert_eq!(m.filled(-1.0), array![[1.0, -1.0], [-1.0, 4.0]].into_dyn());
        assert_eq!(m.compressed(), vec![1.0, 4.0]);
        assert_eq!(m.masked_count(), 2);
    }
}
