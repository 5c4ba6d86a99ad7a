//! Graph inspection and evaluation statistics.
pub mod telemetry;
pub mod topology;

pub use telemetry::EvalStats;
