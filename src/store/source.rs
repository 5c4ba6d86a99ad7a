//! Leaf data providers.
//!
//! An `ArraySource` is anything with a fixed shape and dtype that can hand back
//! an arbitrary hyper-rectangular region of its data. The engine never asks a
//! source for more than one chunk's worth of data at a time, so a source may
//! live on disk or behind any other slow storage.

use super::masked::MaskedArray;
use super::types::DType;
use ndarray::{ArrayBase, ArrayD, Data, Dimension, Slice};
use std::error::Error;
use std::fmt;
use std::ops::Range;

/// Errors raised by a source are handed back to the caller untouched.
pub type SourceError = Box<dyn Error + Send + Sync + 'static>;

pub trait ArraySource: Send + Sync + fmt::Debug {
    fn shape(&self) -> &[usize];

    fn dtype(&self) -> DType;

    /// Whether `read_mask` can return a mask.
    fn is_masked(&self) -> bool {
        false
    }

    /// Reads `region` (one range per axis) as `f64` values.
    fn read_data(&self, region: &[Range<usize>]) -> Result<ArrayD<f64>, SourceError>;

    /// Reads the mask for `region`; `None` means nothing in it is masked.
    fn read_mask(&self, _region: &[Range<usize>]) -> Result<Option<ArrayD<bool>>, SourceError> {
        Ok(None)
    }
}

/// Element types an eager `ndarray` array may hold to be wrapped.
pub trait Element: Copy + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    fn to_f64(self) -> f64;
}

macro_rules! impl_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn to_f64(self) -> f64 { self as f64 }
        })*
    };
}

impl_element!(
    i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64,
    u8 => UInt8, u16 => UInt16, u32 => UInt32, u64 => UInt64,
    f32 => Float32, f64 => Float64,
);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
}

impl<S, D> ArraySource for ArrayBase<S, D>
where
    S: Data + Send + Sync,
    S::Elem: Element,
    D: Dimension,
{
    fn shape(&self) -> &[usize] {
        ArrayBase::shape(self)
    }

    fn dtype(&self) -> DType {
        <S::Elem as Element>::DTYPE
    }

    fn read_data(&self, region: &[Range<usize>]) -> Result<ArrayD<f64>, SourceError> {
        check_region(ArrayBase::shape(self), region)?;
        let view = self.slice_each_axis(|ax| Slice::from(region[ax.axis.index()].clone()));
        Ok(view.mapv(<S::Elem as Element>::to_f64).into_dyn())
    }
}

impl ArraySource for MaskedArray {
    fn shape(&self) -> &[usize] {
        MaskedArray::shape(self)
    }

    fn dtype(&self) -> DType {
        MaskedArray::dtype(self)
    }

    fn is_masked(&self) -> bool {
        true
    }

    fn read_data(&self, region: &[Range<usize>]) -> Result<ArrayD<f64>, SourceError> {
        check_region(MaskedArray::shape(self), region)?;
        Ok(self
            .data()
            .slice_each_axis(|ax| Slice::from(region[ax.axis.index()].clone()))
            .to_owned())
    }

    fn read_mask(&self, region: &[Range<usize>]) -> Result<Option<ArrayD<bool>>, SourceError> {
        check_region(MaskedArray::shape(self), region)?;
        Ok(Some(
            self.mask()
                .slice_each_axis(|ax| Slice::from(region[ax.axis.index()].clone()))
                .to_owned(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionError {
    pub shape: Vec<usize>,
    pub region: Vec<Range<usize>>,
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {:?} is outside of shape {:?}", self.region, self.shape)
    }
}

impl Error for RegionError {}

/// Rejects regions of the wrong rank or extending past the shape.
pub fn check_region(shape: &[usize], region: &[Range<usize>]) -> Result<(), RegionError> {
    let fits = shape.len() == region.len()
        && shape
            .iter()
            .zip(region)
            .all(|(&dim, r)| r.start <= r.end && r.end <= dim);
    if fits {
        Ok(())
    } else {
        Err(RegionError { shape: shape.to_vec(), region: region.to_vec() })
    }
}
