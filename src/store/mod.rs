//! Graph nodes, leaf data sources and the eager arrays they exchange.
pub mod masked;
pub mod node;
pub mod source;
pub mod types;

pub use masked::MaskedArray;
pub use node::{Array, Operand};
pub use source::{ArraySource, Element, SourceError};
pub use types::{ArrayMeta, BinaryOp, DType, DTypeKind, Reducer, Scalar, Shape};
