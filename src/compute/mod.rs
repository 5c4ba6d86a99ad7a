//! Chunked evaluation of expression graphs.
pub mod bytecode;
pub mod engine;
pub mod evaluator;
pub mod kernel;
pub mod ledger;
pub mod plan;
pub mod region;

pub use bytecode::{Compiler, NodeId, Program};
pub use engine::Mode;
pub use evaluator::Evaluator;
pub use ledger::{Block, ComputationError};
