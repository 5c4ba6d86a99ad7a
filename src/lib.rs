// Library root: a lazy, chunked array engine.
// Expressions over wrapped arrays build an immutable graph; nothing is
// computed until `ndarray()` or `masked_array()` asks for the result, which
// is then evaluated chunk by chunk under a memory budget.

pub mod analysis;
pub mod bindings;
pub mod compute;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod functions;
pub mod store;
pub mod type_system;

pub use analysis::EvalStats;
pub use compute::{ComputationError, Evaluator, Mode};
pub use config::{ConfigError, EvalConfig};
pub use display::ToDot;
pub use functions::{
    add, constant, count, div, floor_div, max, mean, min, mul, ones, pow, rem, std, sub, sum, transpose,
    var, wrap, zeros,
};
pub use store::{Array, ArraySource, BinaryOp, DType, Element, MaskedArray, Operand, Reducer, Scalar, SourceError};
pub use type_system::ConstructionError;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// This function defines the `lazyarray._core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}
