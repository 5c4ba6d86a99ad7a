//! Per-chunk memo of computed blocks, and evaluation errors.
use super::bytecode::NodeId;
use super::region::Region;
use crate::store::SourceError;
use ndarray::ArrayD;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputationError {
    /// A leaf source failed to read. The source's own error is kept intact.
    #[error("{0}")]
    Source(#[source] SourceError),
    #[error("source returned a block of shape {got:?} for a region of shape {expected:?}")]
    SourceShape { expected: Vec<usize>, got: Vec<usize> },
    #[error("cannot broadcast a block of shape {from:?} to {to:?}")]
    Broadcast { from: Vec<usize>, to: Vec<usize> },
}

impl ComputationError {
    /// Recovers the error a source raised, if that is what this is.
    pub fn into_source(self) -> Option<SourceError> {
        match self {
            ComputationError::Source(e) => Some(e),
            _ => None,
        }
    }
}

/// Values of one node over one region. `mask` is `None` when nothing is masked
/// or when evaluating in dense mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub data: ArrayD<f64>,
    pub mask: Option<ArrayD<bool>>,
}

impl Block {
    pub fn dense(data: ArrayD<f64>) -> Self {
        Self { data, mask: None }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Per-chunk memo of computed blocks.
///
/// A node reached along several paths is evaluated once per region; later
/// requests get the stored block. The ledger is dropped when its chunk is
/// finished, which releases every intermediate.
#[derive(Debug, Default)]
pub struct Ledger {
    blocks: HashMap<(NodeId, Region), Arc<Block>>,
    pub computed: usize,
    pub hits: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, node_id: NodeId, region: &Region) -> Option<Arc<Block>> {
        let found = self.blocks.get(&(node_id, region.clone())).cloned();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn insert(&mut self, node_id: NodeId, region: Region, block: Block) -> Arc<Block> {
        self.computed += 1;
        let block = Arc::new(block);
        self.blocks.insert((node_id, region), Arc::clone(&block));
        block
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
