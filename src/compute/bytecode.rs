//! Compilation of an expression graph into a flat, deduplicated program.
use super::region::{self, Region};
use crate::analysis::topology;
use crate::store::node::NodeKind;
use crate::store::{Array, ArrayMeta, ArraySource, BinaryOp, Reducer, Shape};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

/// Position of an instruction in a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum OpCode {
    /// Read from `sources[aux]`.
    Read,
    /// Broadcast a single value over the requested region.
    Fill(f64),
    Binary(BinaryOp),
    Reduce { reducer: Reducer, axis: usize },
    Cast,
    /// Permute axes by `axes[aux]`.
    Transpose,
}

/// Structure-of-Arrays (SoA) layout for a compiled expression.
///
/// Instructions are in topological order: `p1`/`p2` of instruction `i` always
/// point below `i`, and the root is the last instruction. Every distinct node
/// of the expression graph appears exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub ops: Vec<OpCode>,
    pub p1: Vec<u32>,
    pub p2: Vec<u32>,
    pub aux: Vec<u32>, // Source index for Read, axis order for Transpose, 0 if unused.
    pub axes: Vec<Shape>,
    pub metas: Vec<ArrayMeta>,
    pub labels: Vec<String>,
    #[serde(skip)]
    pub sources: Vec<Arc<dyn ArraySource>>,
    pub root: NodeId,
}

impl Program {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn meta(&self, id: NodeId) -> &ArrayMeta {
        &self.metas[id.index()]
    }

    pub fn root_meta(&self) -> &ArrayMeta {
        self.meta(self.root)
    }

    /// Operands of `id` paired with the regions needed to produce `region` of it.
    pub fn inputs(&self, id: NodeId, region: &[Range<usize>]) -> SmallVec<[(NodeId, Region); 2]> {
        let i = id.index();
        let out = &self.metas[i].shape;
        let mut inputs = SmallVec::new();
        match self.ops[i] {
            OpCode::Read | OpCode::Fill(_) => {}
            OpCode::Binary(_) => {
                for operand in [NodeId(self.p1[i]), NodeId(self.p2[i])] {
                    let shape = &self.meta(operand).shape;
                    inputs.push((operand, region::broadcast_source(shape, out, region)));
                }
            }
            OpCode::Reduce { axis, .. } => {
                let operand = NodeId(self.p1[i]);
                let len = self.meta(operand).shape[axis];
                inputs.push((operand, region::with_axis(region, axis, len)));
            }
            OpCode::Cast => inputs.push((NodeId(self.p1[i]), region.iter().cloned().collect())),
            OpCode::Transpose => {
                let axes = &self.axes[self.aux[i] as usize];
                let mut operand_region: Region = SmallVec::from_elem(0..0, axes.len());
                for (range, &axis) in region.iter().zip(axes.iter()) {
                    operand_region[axis] = range.clone();
                }
                inputs.push((NodeId(self.p1[i]), operand_region));
            }
        }
        inputs
    }

    /// Instructions consumed more than once.
    pub fn shared_count(&self) -> usize {
        let mut uses = vec![0usize; self.len()];
        for (i, op) in self.ops.iter().enumerate() {
            match op {
                OpCode::Binary(_) => {
                    uses[self.p1[i] as usize] += 1;
                    uses[self.p2[i] as usize] += 1;
                }
                OpCode::Reduce { .. } | OpCode::Cast | OpCode::Transpose => uses[self.p1[i] as usize] += 1,
                OpCode::Read | OpCode::Fill(_) => {}
            }
        }
        uses.iter().filter(|&&n| n > 1).count()
    }
}

pub struct Compiler<'a> {
    root: &'a Array,
}

impl<'a> Compiler<'a> {
    pub fn new(root: &'a Array) -> Self {
        Self { root }
    }

    /// Compiles the graph under the root into a linear program.
    ///
    /// A node reachable along several paths is compiled once; every consumer
    /// refers to the same instruction.
    pub fn compile(&self) -> Program {
        let order = topology::sort(self.root);
        let count = order.len();
        let mut layout: HashMap<usize, u32> = HashMap::with_capacity(count);

        let mut ops = Vec::with_capacity(count);
        let mut p1 = Vec::with_capacity(count);
        let mut p2 = Vec::with_capacity(count);
        let mut aux = Vec::with_capacity(count);
        let mut metas = Vec::with_capacity(count);
        let mut labels = Vec::with_capacity(count);
        let mut sources: Vec<Arc<dyn ArraySource>> = Vec::new();
        let mut axes_table: Vec<Shape> = Vec::new();

        for (i, node) in order.iter().enumerate() {
            // Operands precede their consumer in the sort, so they are laid out already.
            let slot = |a: &Array| layout.get(&a.key()).copied().unwrap_or(0);
            let (code, idx1, idx2, aux_val) = match node.kind() {
                NodeKind::Source(source) => {
                    sources.push(Arc::clone(source));
                    (OpCode::Read, 0, 0, (sources.len() - 1) as u32)
                }
                NodeKind::Constant(v) => (OpCode::Fill(*v), 0, 0, 0),
                NodeKind::Elementwise { op, lhs, rhs } => (OpCode::Binary(*op), slot(lhs), slot(rhs), 0),
                NodeKind::Aggregate { reducer, operand, axis } => {
                    (OpCode::Reduce { reducer: *reducer, axis: *axis }, slot(operand), 0, 0)
                }
                NodeKind::Cast { operand } => (OpCode::Cast, slot(operand), 0, 0),
                NodeKind::Transpose { operand, axes } => {
                    axes_table.push(axes.clone());
                    (OpCode::Transpose, slot(operand), 0, (axes_table.len() - 1) as u32)
                }
            };

            ops.push(code);
            p1.push(idx1);
            p2.push(idx2);
            aux.push(aux_val);
            metas.push(node.meta().clone());
            labels.push(node.label());
            layout.insert(node.key(), i as u32);
        }

        Program {
            ops,
            p1,
            p2,
            aux,
            axes: axes_table,
            metas,
            labels,
            sources,
            root: NodeId(count.saturating_sub(1) as u32),
        }
    }
}
