//! Human-facing renderings of arrays and expression graphs.
pub mod dot;
pub mod trace;

pub use dot::ToDot;
pub use trace::{format_size, format_tree};
