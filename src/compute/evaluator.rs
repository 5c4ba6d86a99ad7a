//! Materialization entry points.
//!
//! The evaluator compiles an expression, plans chunks under the configured
//! budget, resolves every chunk with a fresh ledger and writes the blocks into
//! the output. Only one chunk's intermediates are alive at a time unless
//! chunks run in parallel.

use super::bytecode::{Compiler, Program};
use super::engine::{Engine, Mode};
use super::ledger::{Block, ComputationError, Ledger};
use super::plan::ChunkPlan;
use super::region::Region;
use crate::analysis::telemetry::EvalStats;
use crate::config::EvalConfig;
use crate::store::{Array, MaskedArray};
use log::{debug, trace};
use ndarray::{ArrayD, IxDyn, Slice};
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Materializes `array` as a dense array; masks are ignored.
    pub fn ndarray(&self, array: &Array) -> Result<ArrayD<f64>, ComputationError> {
        let (block, _) = self.materialize_with_stats(array, Mode::Dense)?;
        Ok(block.data)
    }

    /// Materializes `array` with masks propagated from every masked leaf.
    pub fn masked_array(&self, array: &Array) -> Result<MaskedArray, ComputationError> {
        let (block, _) = self.materialize_with_stats(array, Mode::Masked)?;
        Ok(MaskedArray::from_parts(block.data, block.mask, array.dtype()))
    }

    pub fn materialize_with_stats(&self, array: &Array, mode: Mode) -> Result<(Block, EvalStats), ComputationError> {
        let program = Compiler::new(array).compile();
        let plan = ChunkPlan::build(&program, mode, self.config.max_chunk_bytes);
        let mut stats = EvalStats::planned(&program, &plan);
        debug!(
            "compiled {} nodes ({} shared) for output shape {:?} dtype {}",
            stats.nodes,
            stats.shared_nodes,
            array.shape(),
            array.dtype()
        );
        debug!(
            "{:?} mode: {} chunk(s) of shape {:?}, ~{} bytes each",
            mode, stats.chunks, stats.chunk_shape, stats.estimated_peak_bytes
        );

        let regions = plan.regions();
        let engine = Engine::new(&program, mode);
        let results: Vec<(Block, usize, usize)> = if self.config.parallel && regions.len() > 1 {
            regions
                .par_iter()
                .enumerate()
                .map(|(i, region)| resolve_chunk(&engine, &program, i, region))
                .collect::<Result<_, _>>()?
        } else {
            regions
                .iter()
                .enumerate()
                .map(|(i, region)| resolve_chunk(&engine, &program, i, region))
                .collect::<Result<_, _>>()?
        };

        for (_, computed, hits) in &results {
            stats.record_chunk(*computed, *hits);
        }

        let mut blocks = results.into_iter().map(|(block, _, _)| block);
        if regions.len() == 1 {
            if let Some(block) = blocks.next() {
                return Ok((block, stats));
            }
        }
        Ok((assemble(array.shape(), &regions, blocks), stats))
    }
}

impl Array {
    /// Materializes the expression as a dense array with the default configuration.
    pub fn ndarray(&self) -> Result<ArrayD<f64>, ComputationError> {
        Evaluator::default().ndarray(self)
    }

    /// Materializes the expression with masks, using the default configuration.
    pub fn masked_array(&self) -> Result<MaskedArray, ComputationError> {
        Evaluator::default().masked_array(self)
    }

    /// The compiled program as JSON: instructions, operands and node metadata.
    pub fn explain_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Compiler::new(self).compile())
    }
}

fn resolve_chunk(
    engine: &Engine<'_>,
    program: &Program,
    index: usize,
    region: &Region,
) -> Result<(Block, usize, usize), ComputationError> {
    trace!("resolving chunk {} {:?}", index, region);
    let mut ledger = Ledger::new();
    let block = engine.resolve(program.root, region, &mut ledger)?;
    let (computed, hits) = (ledger.computed, ledger.hits);
    drop(ledger);
    let block = Arc::try_unwrap(block).unwrap_or_else(|shared| (*shared).clone());
    Ok((block, computed, hits))
}

/// Writes chunk blocks into an output of `shape`.
fn assemble(shape: &[usize], regions: &[Region], blocks: impl Iterator<Item = Block>) -> Block {
    let mut data = ArrayD::<f64>::zeros(IxDyn(shape));
    let mut mask: Option<ArrayD<bool>> = None;

    for (region, block) in regions.iter().zip(blocks) {
        let at = |ax: ndarray::AxisDescription| Slice::from(region[ax.axis.index()].clone());
        data.slice_each_axis_mut(at).assign(&block.data);
        if let Some(m) = &block.mask {
            mask.get_or_insert_with(|| ArrayD::from_elem(IxDyn(shape), false))
                .slice_each_axis_mut(at)
                .assign(m);
        }
    }
    Block { data, mask }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BinaryOp, Reducer};
    use ndarray::{Array2, Array3};

    fn evaluator(bytes: usize) -> Evaluator {
        Evaluator::new(EvalConfig::default().with_max_chunk_bytes(bytes))
    }

    #[test]
    fn test_chunked_matches_single_chunk() {
        let data = Array3::from_shape_fn((6, 5, 4), |(i, j, k)| (i * 20 + j * 4 + k) as f64 * 0.5);
        let x = Array::wrap(data).unwrap();
        let y = Array::elementwise(BinaryOp::Multiply, &x, &x).unwrap();
        let z = Array::elementwise(BinaryOp::Subtract, &y, 3.0).unwrap().aggregate(Reducer::Mean, 1).unwrap();

        let whole = evaluator(usize::MAX).ndarray(&z).unwrap();
        let (chunked, stats) = evaluator(512).materialize_with_stats(&z, Mode::Dense).unwrap();
        assert!(stats.chunks > 1);
        assert_eq!(whole, chunked.data);
        assert_eq!(whole.shape(), &[6, 4]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = Array2::from_shape_fn((40, 3), |(i, j)| (i as f64) - (j as f64) * 1.5);
        let x = Array::wrap(data).unwrap();
        let y = Array::elementwise(BinaryOp::Divide, &x, 7.0).unwrap();

        let config = EvalConfig::default().with_max_chunk_bytes(256);
        let sequential = Evaluator::new(config.clone()).ndarray(&y).unwrap();
        let parallel = Evaluator::new(config.with_parallel(true)).ndarray(&y).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_stats_count_memo_hits() {
        let x = Array::wrap(Array2::<f64>::ones((4, 4))).unwrap();
        let y = Array::elementwise(BinaryOp::Add, &x, &x).unwrap();
        let (_, stats) = evaluator(usize::MAX).materialize_with_stats(&y, Mode::Dense).unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.blocks_computed, 2);
        assert_eq!(stats.memo_hits, 1);
    }

    #[test]
    fn test_masked_output_without_masks() {
        let x = Array::wrap(Array2::<i32>::zeros((2, 2))).unwrap();
        let m = evaluator(usize::MAX).masked_array(&x).unwrap();
        assert_eq!(m.masked_count(), 0);
        assert_eq!(m.dtype(), crate::store::DType::Int32);
    }
}
