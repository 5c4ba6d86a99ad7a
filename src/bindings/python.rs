use crate::compute::ComputationError;
use crate::display::trace;
use crate::store::{Array, ArraySource, BinaryOp, DType, MaskedArray, Operand, Reducer, Scalar};
use crate::type_system::ConstructionError;
use ndarray::{ArrayD, IxDyn};
use pyo3::exceptions::{PyOverflowError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyFloat, PyInt};
use std::sync::Arc;

fn construction_err(e: ConstructionError) -> PyErr {
    match e {
        ConstructionError::NoLazyOperand { .. } | ConstructionError::UnsupportedOperation { .. } => {
            PyTypeError::new_err(e.to_string())
        }
        ConstructionError::ScalarOverflow { .. } => PyOverflowError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn computation_err(e: ComputationError) -> PyErr {
    PyRuntimeError::new_err(e.to_string())
}

fn parse_dtype(dtype: Option<&str>) -> PyResult<Option<DType>> {
    dtype
        .map(|d| d.parse::<DType>().map_err(|e| PyValueError::new_err(e.to_string())))
        .transpose()
}

#[pyclass(name = "Array", frozen)]
pub struct PyLazyArray {
    pub inner: Array,
}

impl From<Array> for PyLazyArray {
    fn from(inner: Array) -> Self {
        Self { inner }
    }
}

/// An eager array handed over by the host: whatever `numpy.ma.asarray`
/// accepts with a supported dtype. Only masked arrays bring a mask.
pub struct PyEager {
    data: ArrayD<f64>,
    mask: Option<ArrayD<bool>>,
    dtype: DType,
}

fn flatten<'py>(array: &Bound<'py, PyAny>) -> PyResult<Bound<'py, PyAny>> {
    array.call_method0("ravel")?.call_method0("tolist")
}

fn extract_eager(obj: &Bound<'_, PyAny>) -> PyResult<PyEager> {
    let ma = obj.py().import("numpy.ma")?;
    let array = ma.call_method1("asarray", (obj,))?;
    let code: String = array.getattr("dtype")?.getattr("str")?.extract()?;
    let dtype = code.parse::<DType>().map_err(|e| PyTypeError::new_err(e.to_string()))?;
    let shape: Vec<usize> = array.getattr("shape")?.extract()?;
    let shape_err = |e: ndarray::ShapeError| PyValueError::new_err(e.to_string());

    let values: Vec<f64> = flatten(&array.getattr("data")?.call_method1("astype", ("f8",))?)?.extract()?;
    let data = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(shape_err)?;
    let mask = if ma.call_method1("isMaskedArray", (obj,))?.is_truthy()? {
        let flags: Vec<bool> = flatten(&ma.call_method1("getmaskarray", (&array,))?)?.extract()?;
        Some(ArrayD::from_shape_vec(IxDyn(&shape), flags).map_err(shape_err)?)
    } else {
        None
    };
    Ok(PyEager { data, mask, dtype })
}

impl PyEager {
    /// A leaf source holding the data at its own dtype.
    fn into_source(self) -> Result<Arc<dyn ArraySource>, ConstructionError> {
        let PyEager { data, mask, dtype } = self;
        if let Some(mask) = mask {
            return Ok(Arc::new(MaskedArray::with_dtype(data.mapv(|v| dtype.cast(v)), mask, dtype)?));
        }
        macro_rules! typed {
            ($($variant:ident => $t:ty),*) => {
                match dtype {
                    DType::Bool => Arc::new(data.mapv(|v| v != 0.0)) as Arc<dyn ArraySource>,
                    $(DType::$variant => Arc::new(data.mapv(|v| v as $t)) as Arc<dyn ArraySource>,)*
                }
            };
        }
        Ok(typed!(
            Int8 => i8, Int16 => i16, Int32 => i32, Int64 => i64,
            UInt8 => u8, UInt16 => u16, UInt32 => u32, UInt64 => u64,
            Float32 => f32, Float64 => f64
        ))
    }
}

/// Right-hand side of a numeric dunder. Anything else makes the method
/// return `NotImplemented`.
///
/// Python `bool`, `int` and `float` (and their subclasses) are weak scalars;
/// everything array-like, NumPy scalars included, is an eager operand.
#[derive(FromPyObject)]
pub enum PyOperand<'py> {
    Lazy(PyRef<'py, PyLazyArray>),
    Bool(Bound<'py, PyBool>),
    Int(Bound<'py, PyInt>),
    Float(Bound<'py, PyFloat>),
    Eager(#[pyo3(from_py_with = extract_eager)] PyEager),
}

impl PyOperand<'_> {
    fn into_operand(self) -> PyResult<Operand> {
        Ok(match self {
            PyOperand::Lazy(a) => Operand::Lazy(a.inner.clone()),
            PyOperand::Bool(b) => Operand::Scalar(Scalar::Bool(b.is_true())),
            PyOperand::Int(i) => Operand::Scalar(Scalar::Int(i.extract::<i64>()?)),
            PyOperand::Float(f) => Operand::Scalar(Scalar::Float(f.value())),
            PyOperand::Eager(e) => Operand::Eager(e.into_source().map_err(construction_err)?),
        })
    }
}

impl PyLazyArray {
    fn forward(&self, op: BinaryOp, other: PyOperand<'_>) -> PyResult<Self> {
        Array::elementwise(op, &self.inner, other.into_operand()?)
            .map(Self::from)
            .map_err(construction_err)
    }

    fn reflected(&self, op: BinaryOp, other: PyOperand<'_>) -> PyResult<Self> {
        Array::elementwise(op, other.into_operand()?, &self.inner)
            .map(Self::from)
            .map_err(construction_err)
    }
}

#[pymethods]
impl PyLazyArray {
    /// Makes NumPy defer mixed operations to the reflected methods here.
    #[classattr]
    fn __array_ufunc__(py: Python<'_>) -> Py<PyAny> {
        py.None()
    }

    #[getter]
    fn shape(&self) -> Vec<usize> {
        self.inner.shape().to_vec()
    }

    #[getter]
    fn dtype(&self) -> &'static str {
        self.inner.dtype().name()
    }

    #[getter]
    fn ndim(&self) -> usize {
        self.inner.ndim()
    }

    #[getter]
    fn size(&self) -> usize {
        self.inner.size()
    }

    #[getter]
    fn nbytes(&self) -> usize {
        self.inner.nbytes()
    }

    #[getter]
    fn masked(&self) -> bool {
        self.inner.is_masked()
    }

    /// The stored value of a constant node, `None` for anything else.
    #[getter]
    fn value(&self) -> Option<f64> {
        self.inner.value()
    }

    /// Materializes as `(data, shape)` with data flattened in C order.
    fn ndarray(&self) -> PyResult<(Vec<f64>, Vec<usize>)> {
        let out = self.inner.ndarray().map_err(computation_err)?;
        let shape = out.shape().to_vec();
        Ok((out.iter().copied().collect(), shape))
    }

    /// Materializes as `(data, shape, mask)` with masks propagated.
    fn masked_array(&self) -> PyResult<(Vec<f64>, Vec<usize>, Vec<bool>)> {
        let out = self.inner.masked_array().map_err(computation_err)?;
        let shape = out.shape().to_vec();
        let (data, mask) = out.into_parts();
        Ok((data.iter().copied().collect(), shape, mask.iter().copied().collect()))
    }

    fn astype(&self, dtype: &str) -> PyResult<Self> {
        let dtype = dtype.parse::<DType>().map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(self.inner.astype(dtype).into())
    }

    #[pyo3(signature = (axes=None))]
    fn transpose(&self, axes: Option<Vec<isize>>) -> PyResult<Self> {
        self.inner
            .transpose(axes.as_deref())
            .map(Self::from)
            .map_err(construction_err)
    }

    fn explain(&self) -> String {
        trace::format_tree(&self.inner)
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }

    fn __add__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.forward(BinaryOp::Add, other)
    }

    fn __radd__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.reflected(BinaryOp::Add, other)
    }

    fn __sub__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.forward(BinaryOp::Subtract, other)
    }

    fn __rsub__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.reflected(BinaryOp::Subtract, other)
    }

    fn __mul__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.forward(BinaryOp::Multiply, other)
    }

    fn __rmul__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.reflected(BinaryOp::Multiply, other)
    }

    fn __truediv__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.forward(BinaryOp::Divide, other)
    }

    fn __rtruediv__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.reflected(BinaryOp::Divide, other)
    }

    fn __floordiv__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.forward(BinaryOp::FloorDivide, other)
    }

    fn __rfloordiv__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.reflected(BinaryOp::FloorDivide, other)
    }

    fn __mod__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.forward(BinaryOp::Remainder, other)
    }

    fn __rmod__(&self, other: PyOperand<'_>) -> PyResult<Self> {
        self.reflected(BinaryOp::Remainder, other)
    }

    fn __pow__(&self, other: PyOperand<'_>, _modulo: Option<u32>) -> PyResult<Self> {
        self.forward(BinaryOp::Power, other)
    }

    fn __rpow__(&self, other: PyOperand<'_>, _modulo: Option<u32>) -> PyResult<Self> {
        self.reflected(BinaryOp::Power, other)
    }
}

/// Wraps an array-like as a lazy leaf. A NumPy masked array, or an explicit
/// `mask`, makes it a masked leaf; `dtype` converts lazily.
#[pyfunction]
#[pyo3(signature = (data, mask=None, dtype=None))]
fn wrap(data: &Bound<'_, PyAny>, mask: Option<&Bound<'_, PyAny>>, dtype: Option<&str>) -> PyResult<PyLazyArray> {
    let eager = match mask {
        Some(mask) => {
            let ma = data.py().import("numpy.ma")?;
            extract_eager(&ma.call_method1("masked_array", (data, mask))?)?
        }
        None => extract_eager(data)?,
    };
    let array = Array::wrap_shared(eager.into_source().map_err(construction_err)?).map_err(construction_err)?;
    Ok(match parse_dtype(dtype)? {
        Some(dtype) if dtype != array.dtype() => array.astype(dtype),
        _ => array,
    }
    .into())
}

#[pyfunction]
#[pyo3(signature = (shape, value, dtype=None))]
fn constant(shape: Vec<usize>, value: f64, dtype: Option<&str>) -> PyResult<PyLazyArray> {
    Array::constant(&shape, value, parse_dtype(dtype)?)
        .map(PyLazyArray::from)
        .map_err(construction_err)
}

#[pyfunction]
#[pyo3(signature = (shape, dtype=None))]
fn zeros(shape: Vec<usize>, dtype: Option<&str>) -> PyResult<PyLazyArray> {
    Array::zeros(&shape, parse_dtype(dtype)?)
        .map(PyLazyArray::from)
        .map_err(construction_err)
}

fn reduce(a: &PyLazyArray, reducer: Reducer, axis: isize) -> PyResult<PyLazyArray> {
    a.inner.aggregate(reducer, axis).map(PyLazyArray::from).map_err(construction_err)
}

#[pyfunction]
fn sum(a: PyRef<'_, PyLazyArray>, axis: isize) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Sum, axis)
}

#[pyfunction]
fn mean(a: PyRef<'_, PyLazyArray>, axis: isize) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Mean, axis)
}

#[pyfunction]
fn min(a: PyRef<'_, PyLazyArray>, axis: isize) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Min, axis)
}

#[pyfunction]
fn max(a: PyRef<'_, PyLazyArray>, axis: isize) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Max, axis)
}

#[pyfunction]
#[pyo3(signature = (a, axis, ddof=0))]
fn var(a: PyRef<'_, PyLazyArray>, axis: isize, ddof: u32) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Var { ddof }, axis)
}

#[pyfunction(name = "std")]
#[pyo3(signature = (a, axis, ddof=0))]
fn std_(a: PyRef<'_, PyLazyArray>, axis: isize, ddof: u32) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Std { ddof }, axis)
}

#[pyfunction]
fn count(a: PyRef<'_, PyLazyArray>, axis: isize) -> PyResult<PyLazyArray> {
    reduce(&a, Reducer::Count, axis)
}

#[pyfunction]
#[pyo3(signature = (a, axes=None))]
fn transpose(a: PyRef<'_, PyLazyArray>, axes: Option<Vec<isize>>) -> PyResult<PyLazyArray> {
    a.transpose(axes)
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyLazyArray>()?;
    m.add_function(wrap_pyfunction!(wrap, m)?)?;
    m.add_function(wrap_pyfunction!(constant, m)?)?;
    m.add_function(wrap_pyfunction!(zeros, m)?)?;
    m.add_function(wrap_pyfunction!(sum, m)?)?;
    m.add_function(wrap_pyfunction!(mean, m)?)?;
    m.add_function(wrap_pyfunction!(min, m)?)?;
    m.add_function(wrap_pyfunction!(max, m)?)?;
    m.add_function(wrap_pyfunction!(var, m)?)?;
    m.add_function(wrap_pyfunction!(std_, m)?)?;
    m.add_function(wrap_pyfunction!(count, m)?)?;
    m.add_function(wrap_pyfunction!(transpose, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyo3::types::PyDict;

    fn lazy<'py>(py: Python<'py>, array: Array) -> Bound<'py, PyLazyArray> {
        Bound::new(py, PyLazyArray::from(array)).unwrap()
    }

    fn has_numpy(py: Python<'_>) -> bool {
        py.import("numpy").is_ok()
    }

    #[test]
    fn test_scalar_operands_are_weak() {
        Python::initialize();
        Python::attach(|py| {
            let operand = |code: &std::ffi::CStr| {
                py.eval(code, None, None).unwrap().extract::<PyOperand>().unwrap().into_operand().unwrap()
            };
            assert!(matches!(operand(c"True"), Operand::Scalar(Scalar::Bool(true))));
            assert!(matches!(operand(c"-3"), Operand::Scalar(Scalar::Int(-3))));
            assert!(matches!(operand(c"2.5"), Operand::Scalar(Scalar::Float(f)) if f == 2.5));
        });
    }

    #[test]
    fn test_lazy_operand_is_shared() {
        Python::initialize();
        Python::attach(|py| {
            let array = Array::zeros(&[2], None).unwrap();
            let bound = lazy(py, array.clone());
            let operand = bound.as_any().extract::<PyOperand>().unwrap().into_operand().unwrap();
            assert!(matches!(operand, Operand::Lazy(a) if a.ptr_eq(&array)));
        });
    }

    #[test]
    fn test_unsupported_operand_is_rejected() {
        Python::initialize();
        Python::attach(|py| {
            let text = py.eval(c"'abc'", None, None).unwrap();
            assert!(text.extract::<PyOperand>().is_err());
            let none = py.eval(c"None", None, None).unwrap();
            assert!(none.extract::<PyOperand>().is_err());
        });
    }

    #[test]
    fn test_eager_operands() {
        Python::initialize();
        Python::attach(|py| {
            if !has_numpy(py) {
                return;
            }
            let nested = py.eval(c"[[1.0], [2.0]]", None, None).unwrap();
            let Ok(PyOperand::Eager(eager)) = nested.extract::<PyOperand>() else {
                panic!("a nested list is an eager operand");
            };
            assert_eq!(eager.data.shape(), &[2, 1]);
            assert_eq!(eager.dtype, DType::Float64);
            assert!(eager.mask.is_none());

            let ns = PyDict::new(py);
            py.run(c"import numpy as np\nm = np.ma.array(np.array([1, 2, 3], dtype=np.int16), mask=[0, 1, 0])", None, Some(&ns))
                .unwrap();
            let masked = ns.get_item("m").unwrap().unwrap();
            let Ok(PyOperand::Eager(eager)) = masked.extract::<PyOperand>() else {
                panic!("a masked array is an eager operand");
            };
            assert_eq!(eager.dtype, DType::Int16);
            assert_eq!(eager.mask.as_ref().unwrap().iter().copied().collect::<Vec<_>>(), vec![false, true, false]);
            let source = eager.into_source().unwrap();
            assert!(source.is_masked());
            assert_eq!(source.dtype(), DType::Int16);
        });
    }

    #[test]
    fn test_numpy_on_the_left_defers() {
        Python::initialize();
        Python::attach(|py| {
            if !has_numpy(py) {
                return;
            }
            let barr = lazy(py, Array::ones(&[3], None).unwrap());
            let ns = PyDict::new(py);
            ns.set_item("barr", &barr).unwrap();
            py.run(c"import numpy as np\nr = np.array([[1.0]]) * barr\nq = barr * np.array([[1.0]])", None, Some(&ns))
                .unwrap();
            for name in ["r", "q"] {
                let result = ns.get_item(name).unwrap().unwrap();
                let result = result.downcast::<PyLazyArray>().unwrap();
                assert_eq!(result.get().inner.shape(), &[1, 3]);
            }
        });
    }
}
