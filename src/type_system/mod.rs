//! Construction-time inference for the expression graph.
//!
//! Every node's shape, dtype and mask status are derived from its operands
//! when the node is built, so shape and axis mistakes surface while the
//! expression is being assembled rather than when it is materialized.

pub use self::error::ConstructionError;
pub use self::rules::dtype::result_type;
pub use self::rules::shape::broadcast_shapes;

// --- MODULE DECLARATIONS ---
mod error;
pub(crate) mod checker;
pub(crate) mod rules {
    pub mod dtype;
    pub mod shape;
}
