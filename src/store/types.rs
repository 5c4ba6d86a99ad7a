use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Dimension sizes of an array. Inline for the common low-rank case.
pub type Shape = SmallVec<[usize; 4]>;

/// Element type tag carried by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    #[default]
    Float64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DTypeKind {
    Bool,
    Signed,
    Unsigned,
    Float,
}

impl DType {
    /// Size in bytes of one element.
    pub fn itemsize(&self) -> usize {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }

    pub fn kind(&self) -> DTypeKind {
        match self {
            DType::Bool => DTypeKind::Bool,
            DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64 => DTypeKind::Signed,
            DType::UInt8 | DType::UInt16 | DType::UInt32 | DType::UInt64 => DTypeKind::Unsigned,
            DType::Float32 | DType::Float64 => DTypeKind::Float,
        }
    }

    pub fn is_float(&self) -> bool {
        self.kind() == DTypeKind::Float
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind(), DTypeKind::Signed | DTypeKind::Unsigned)
    }

    /// Whether `v` is representable without wrapping. Non-integer dtypes
    /// accept every value.
    pub fn holds_int(&self, v: i64) -> bool {
        match self {
            DType::Int8 => i8::try_from(v).is_ok(),
            DType::Int16 => i16::try_from(v).is_ok(),
            DType::Int32 => i32::try_from(v).is_ok(),
            DType::UInt8 => u8::try_from(v).is_ok(),
            DType::UInt16 => u16::try_from(v).is_ok(),
            DType::UInt32 => u32::try_from(v).is_ok(),
            DType::UInt64 => v >= 0,
            DType::Int64 | DType::Bool | DType::Float32 | DType::Float64 => true,
        }
    }

    /// NumPy-compatible name.
    pub fn name(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Coerces an `f64` carrier value to what this dtype can represent.
    ///
    /// Integers truncate toward zero and wrap to their width, `float32`
    /// rounds, `bool` collapses to 0/1. NaN maps to 0 for integer types.
    #[inline]
    pub fn cast(&self, v: f64) -> f64 {
        match self {
            DType::Float64 => v,
            DType::Float32 => v as f32 as f64,
            DType::Bool => {
                if v != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            DType::Int8 => (v as i64) as i8 as f64,
            DType::Int16 => (v as i64) as i16 as f64,
            DType::Int32 => (v as i64) as i32 as f64,
            DType::Int64 => (v as i64) as f64,
            DType::UInt8 => (v as i64) as u8 as f64,
            DType::UInt16 => (v as i64) as u16 as f64,
            DType::UInt32 => (v as i64) as u32 as f64,
            DType::UInt64 => {
                if v < 0.0 {
                    (v as i64) as u64 as f64
                } else {
                    (v as u64) as f64
                }
            }
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDTypeError(pub String);

impl fmt::Display for ParseDTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data type '{}' not understood", self.0)
    }
}

impl std::error::Error for ParseDTypeError {}

impl FromStr for DType {
    type Err = ParseDTypeError;

    /// Accepts NumPy type codes (`f8`, `<i2`, `?`) and names (`float64`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim_start_matches(['<', '>', '=', '|']);
        let dtype = match code {
            "?" | "b1" | "bool" => DType::Bool,
            "i1" | "int8" => DType::Int8,
            "i2" | "int16" => DType::Int16,
            "i4" | "int32" => DType::Int32,
            "i8" | "int64" => DType::Int64,
            "u1" | "uint8" => DType::UInt8,
            "u2" | "uint16" => DType::UInt16,
            "u4" | "uint32" => DType::UInt32,
            "u8" | "uint64" => DType::UInt64,
            "f4" | "float32" => DType::Float32,
            "f8" | "float64" | "float" => DType::Float64,
            _ => return Err(ParseDTypeError(s.to_string())),
        };
        Ok(dtype)
    }
}

/// A host-language scalar operand. Scalars take part in dtype promotion
/// weakly: they adapt to the array operand instead of widening it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
        }
    }

    /// The dtype a scalar has on its own (used for constant leaves).
    pub fn default_dtype(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::Int(_) => DType::Int64,
            Scalar::Float(_) => DType::Float64,
        }
    }
}

macro_rules! scalar_from {
    ($variant:ident, $conv:ty; $($t:ty),*) => {
        $(impl From<$t> for Scalar {
            fn from(v: $t) -> Self { Scalar::$variant(v as $conv) }
        })*
    };
}

scalar_from!(Int, i64; i8, i16, i32, i64, u8, u16, u32);
scalar_from!(Float, f64; f32, f64);

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

/// Elementwise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    /// True division.
    Divide,
    FloorDivide,
    /// Floored modulo; the result takes the sign of the divisor.
    Remainder,
    Power,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "sub",
            BinaryOp::Multiply => "mul",
            BinaryOp::Divide => "div",
            BinaryOp::FloorDivide => "floor_div",
            BinaryOp::Remainder => "rem",
            BinaryOp::Power => "pow",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Remainder => "%",
            BinaryOp::Power => "**",
        }
    }

    /// Operations whose result is masked where the divisor is zero.
    pub fn has_zero_domain(&self) -> bool {
        matches!(self, BinaryOp::Divide | BinaryOp::FloorDivide | BinaryOp::Remainder)
    }
}

/// Axis reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
    Var { ddof: u32 },
    Std { ddof: u32 },
    /// Number of valid (unmasked) elements.
    Count,
}

impl Reducer {
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Var { .. } => "var",
            Reducer::Std { .. } => "std",
            Reducer::Count => "count",
        }
    }

    /// Reducers with no identity element cannot run over an empty axis.
    pub fn needs_identity(&self) -> bool {
        matches!(self, Reducer::Min | Reducer::Max)
    }
}

/// Static description of a node: fixed at construction, never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayMeta {
    pub shape: Shape,
    pub dtype: DType,
    /// Whether any contributing leaf carries a mask.
    pub masked: bool,
}

impl ArrayMeta {
    pub fn new(shape: impl Into<Shape>, dtype: DType, masked: bool) -> Self {
        Self { shape: shape.into(), dtype, masked }
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
}
