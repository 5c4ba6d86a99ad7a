//! Splitting the output into chunks that fit a memory budget.
//!
//! The cost of a chunk is the bytes held by every distinct `(node, region)`
//! block needed to produce it, since the ledger keeps all of them alive until
//! the chunk is finished. Chunks are carved from the leading axis inward: the
//! leading axes are narrowed first so each chunk stays a contiguous run of the
//! output in row-major order.

use super::bytecode::{NodeId, Program};
use super::engine::Mode;
use super::region::{self, Region};
use crate::store::Shape;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    shape: Shape,
    chunk: Shape,
    /// Estimated working set of one full-size chunk.
    cost: usize,
}

impl ChunkPlan {
    /// Plans chunks of the program's output under `budget` bytes.
    ///
    /// If even a chunk of a single output element exceeds the budget, that is
    /// what the plan uses; the budget is a target, not a hard limit.
    pub fn build(program: &Program, mode: Mode, budget: usize) -> Self {
        let shape = program.root_meta().shape.clone();
        let mut chunk = shape.clone();
        let cost = |chunk: &[usize]| working_set(program, mode, chunk);

        if shape.iter().product::<usize>() == 0 {
            return Self { cost: cost(&chunk[..]), shape, chunk };
        }

        for axis in 0..shape.len() {
            if cost(&chunk[..]) <= budget {
                break;
            }
            chunk[axis] = 1;
            let one = cost(&chunk[..]);
            if one > budget || shape[axis] == 1 {
                continue;
            }
            // Cost is affine in the chunk length along a single axis.
            chunk[axis] = 2;
            let slope = cost(&chunk[..]).saturating_sub(one).max(1);
            let fits = 1 + (budget - one) / slope;
            chunk[axis] = fits.min(shape[axis]);
            break;
        }

        Self { cost: cost(&chunk[..]), shape, chunk }
    }

    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk
    }

    pub fn chunk_bytes(&self) -> usize {
        self.cost
    }

    /// Number of chunks; an empty output still has one (empty) chunk.
    pub fn len(&self) -> usize {
        self.shape
            .iter()
            .zip(&self.chunk)
            .map(|(&dim, &c)| if dim == 0 { 1 } else { dim.div_ceil(c) })
            .product()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Chunk regions in row-major order of their position in the output.
    pub fn regions(&self) -> Vec<Region> {
        let counts: Vec<usize> = self
            .shape
            .iter()
            .zip(&self.chunk)
            .map(|(&dim, &c)| if dim == 0 { 1 } else { dim.div_ceil(c) })
            .collect();
        let mut regions = Vec::with_capacity(self.len());
        let mut index = vec![0usize; counts.len()];

        loop {
            regions.push(
                index
                    .iter()
                    .enumerate()
                    .map(|(axis, &k)| {
                        let start = k * self.chunk[axis];
                        start..(start + self.chunk[axis]).min(self.shape[axis])
                    })
                    .collect(),
            );

            // Odometer step, last axis fastest.
            let mut axis = counts.len();
            loop {
                if axis == 0 {
                    return regions;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < counts[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }
}

/// Bytes held while producing a chunk of extent `chunk` at the output origin.
pub fn working_set(program: &Program, mode: Mode, chunk: &[usize]) -> usize {
    let root: Region = chunk.iter().map(|&len| 0..len).collect();
    let mut seen: HashSet<(NodeId, Region)> = HashSet::new();
    let mut stack = vec![(program.root, root)];
    let mut bytes = 0usize;

    while let Some((id, region)) = stack.pop() {
        if !seen.insert((id, region.clone())) {
            continue;
        }
        let per_element = match mode {
            Mode::Masked if program.meta(id).masked => 9,
            _ => 8,
        };
        bytes = bytes.saturating_add(region::size(&region).saturating_mul(per_element));
        stack.extend(program.inputs(id, &region));
    }
    bytes
}
