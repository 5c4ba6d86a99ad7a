use crate::compute::bytecode::Program;
use crate::compute::plan::ChunkPlan;
use serde::Serialize;

/// What a single materialization did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvalStats {
    /// Distinct nodes in the compiled program.
    pub nodes: usize,
    /// Nodes consumed by more than one parent.
    pub shared_nodes: usize,
    pub chunks: usize,
    pub chunk_shape: Vec<usize>,
    /// Working-set estimate of one chunk, in bytes.
    pub estimated_peak_bytes: usize,
    /// Blocks produced by evaluating a node over a region, summed over chunks.
    pub blocks_computed: usize,
    /// Requests answered from the per-chunk memo.
    pub memo_hits: usize,
}

impl EvalStats {
    pub fn planned(program: &Program, plan: &ChunkPlan) -> Self {
        Self {
            nodes: program.len(),
            shared_nodes: program.shared_count(),
            chunks: plan.len(),
            chunk_shape: plan.chunk_shape().to_vec(),
            estimated_peak_bytes: plan.chunk_bytes(),
            blocks_computed: 0,
            memo_hits: 0,
        }
    }

    /// Adds one chunk's ledger counters.
    pub fn record_chunk(&mut self, computed: usize, hits: usize) {
        self.blocks_computed += computed;
        self.memo_hits += hits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::bytecode::Compiler;
    use crate::compute::engine::Mode;
    use crate::store::{Array, BinaryOp};

    #[test]
    fn test_planned_stats() {
        let a = Array::ones(&[4, 2], None).unwrap();
        let b = Array::elementwise(BinaryOp::Multiply, &a, &a).unwrap();
        let program = Compiler::new(&b).compile();
        let plan = ChunkPlan::build(&program, Mode::Dense, 2 * 2 * 8);

        let mut stats = EvalStats::planned(&program, &plan);
        assert_eq!((stats.nodes, stats.shared_nodes), (2, 1));
        assert_eq!(stats.chunk_shape, vec![1, 2]);
        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.estimated_peak_bytes, 32);

        stats.record_chunk(2, 1);
        stats.record_chunk(2, 1);
        assert_eq!((stats.blocks_computed, stats.memo_hits), (4, 2));
    }
}
