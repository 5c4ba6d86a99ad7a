//! Region-by-region interpretation of a compiled program.
use crate::compute::bytecode::{NodeId, OpCode, Program};
use crate::compute::kernel;
use crate::compute::ledger::{Block, ComputationError, Ledger};
use crate::compute::region::{self, Region};
use ndarray::{ArrayD, ArrayViewD, IxDyn, Zip};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How masks are treated during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Masks are never read; every element is valid.
    Dense,
    /// Leaf masks are read and propagated; domain errors are masked.
    Masked,
}

/// Interprets a [`Program`] one region at a time.
pub struct Engine<'p> {
    program: &'p Program,
    masked: bool,
}

impl<'p> Engine<'p> {
    pub fn new(program: &'p Program, mode: Mode) -> Self {
        Self { program, masked: mode == Mode::Masked }
    }

    /// Produces `region` of node `id`, reusing blocks already in the ledger.
    pub fn resolve(&self, id: NodeId, region: &Region, ledger: &mut Ledger) -> Result<Arc<Block>, ComputationError> {
        if let Some(block) = ledger.get(id, region) {
            return Ok(block);
        }
        let block = self.evaluate(id, region, ledger)?;
        Ok(ledger.insert(id, region.clone(), block))
    }

    fn evaluate(&self, id: NodeId, region: &Region, ledger: &mut Ledger) -> Result<Block, ComputationError> {
        let i = id.index();
        let meta = self.program.meta(id);
        let shape = region::extent(region);
        let inputs = self.program.inputs(id, region);

        match self.program.ops[i] {
            OpCode::Read => {
                let source = &self.program.sources[self.program.aux[i] as usize];
                let data = source.read_data(region).map_err(ComputationError::Source)?;
                check_block(&shape, data.shape())?;
                let mask = if self.masked && meta.masked {
                    let mask = source.read_mask(region).map_err(ComputationError::Source)?;
                    if let Some(m) = &mask {
                        check_block(&shape, m.shape())?;
                    }
                    mask
                } else {
                    None
                };
                Ok(Block { data, mask })
            }

            OpCode::Fill(value) => Ok(Block::dense(ArrayD::from_elem(IxDyn(&shape), value))),

            OpCode::Binary(op) => {
                let lhs = self.resolve(inputs[0].0, &inputs[0].1, ledger)?;
                let rhs = self.resolve(inputs[1].0, &inputs[1].1, ledger)?;
                let lv = broadcast(&lhs.data, &shape)?;
                let rv = broadcast(&rhs.data, &shape)?;
                let data = kernel::binary(op, meta.dtype, lv, rv.clone());

                if !self.masked {
                    return Ok(Block::dense(data));
                }
                let mut mask = merge(lhs.mask.as_ref(), rhs.mask.as_ref(), &shape)?;
                if let Some(domain) = kernel::domain_mask(op, &rv, &data) {
                    mask = Some(match mask {
                        Some(m) => Zip::from(&m).and(&domain).map_collect(|&a, &b| a || b),
                        None => domain,
                    });
                }
                Ok(Block { data, mask: mask.filter(|m| m.iter().any(|&x| x)) })
            }

            OpCode::Reduce { reducer, axis } => {
                let operand = self.resolve(inputs[0].0, &inputs[0].1, ledger)?;
                let (data, mask) =
                    kernel::reduce(reducer, meta.dtype, &operand.data, operand.mask.as_ref(), axis, self.masked);
                Ok(Block { data, mask })
            }

            OpCode::Cast => {
                let operand = self.resolve(inputs[0].0, &inputs[0].1, ledger)?;
                let dtype = meta.dtype;
                Ok(Block { data: operand.data.mapv(|v| dtype.cast(v)), mask: operand.mask.clone() })
            }

            OpCode::Transpose => {
                let operand = self.resolve(inputs[0].0, &inputs[0].1, ledger)?;
                let axes = self.program.axes[self.program.aux[i] as usize].as_slice();
                Ok(Block {
                    data: permute(&operand.data, axes),
                    mask: operand.mask.as_ref().map(|m| permute(m, axes)),
                })
            }
        }
    }
}

fn check_block(expected: &[usize], got: &[usize]) -> Result<(), ComputationError> {
    if expected == got {
        Ok(())
    } else {
        Err(ComputationError::SourceShape { expected: expected.to_vec(), got: got.to_vec() })
    }
}

fn broadcast<'a, T>(block: &'a ArrayD<T>, shape: &[usize]) -> Result<ArrayViewD<'a, T>, ComputationError> {
    block.broadcast(IxDyn(shape)).ok_or_else(|| ComputationError::Broadcast {
        from: block.shape().to_vec(),
        to: shape.to_vec(),
    })
}

/// Copies `block` with its axes reordered, in standard layout.
fn permute<T: Clone>(block: &ArrayD<T>, axes: &[usize]) -> ArrayD<T> {
    block.view().permuted_axes(IxDyn(axes)).as_standard_layout().into_owned()
}

/// Union of two operand masks, broadcast to the output block.
fn merge(
    lhs: Option<&ArrayD<bool>>,
    rhs: Option<&ArrayD<bool>>,
    shape: &[usize],
) -> Result<Option<ArrayD<bool>>, ComputationError> {
    Ok(match (lhs, rhs) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(broadcast(m, shape)?.to_owned()),
        (Some(a), Some(b)) => {
            let a = broadcast(a, shape)?;
            let b = broadcast(b, shape)?;
            Some(Zip::from(&a).and(&b).map_collect(|&x, &y| x || y))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::bytecode::Compiler;
    use crate::store::{Array, BinaryOp, DType, MaskedArray, Reducer};
    use ndarray::{arr1, arr2, Array2, Array3};

    fn run(array: &Array, mode: Mode) -> (Block, Ledger) {
        let program = Compiler::new(array).compile();
        let engine = Engine::new(&program, mode);
        let mut ledger = Ledger::new();
        let block = engine
            .resolve(program.root, &region::full(array.shape()), &mut ledger)
            .unwrap();
        ((*block).clone(), ledger)
    }

    #[test]
    fn test_broadcast_binary() {
        let a = Array::wrap(arr2(&[[1.0], [2.0]])).unwrap();
        let b = Array::wrap(arr1(&[10.0, 20.0, 30.0])).unwrap();
        let s = Array::elementwise(BinaryOp::Add, &a, &b).unwrap();
        let (block, _) = run(&s, Mode::Dense);
        assert_eq!(block.data, arr2(&[[11.0, 21.0, 31.0], [12.0, 22.0, 32.0]]).into_dyn());
        assert!(block.mask.is_none());
    }

    #[test]
    fn test_shared_subexpression_is_computed_once() {
        let a = Array::wrap(Array2::<f64>::ones((2, 3))).unwrap();
        let b = Array::elementwise(BinaryOp::Multiply, &a, 3.0).unwrap();
        let c = Array::elementwise(BinaryOp::Add, &b, &b).unwrap();
        let (block, ledger) = run(&c, Mode::Dense);
        assert!(block.data.iter().all(|&v| v == 6.0));
        // a, the scalar, b and c.
        assert_eq!(ledger.computed, 4);
        assert_eq!(ledger.hits, 1);
    }

    #[test]
    fn test_masks_propagate_in_masked_mode_only() {
        let m = MaskedArray::new(arr1(&[1.0, 2.0, 3.0]).into_dyn(), arr1(&[false, true, false]).into_dyn()).unwrap();
        let x = Array::wrap(m).unwrap();
        let y = Array::elementwise(BinaryOp::Multiply, &x, 2.0).unwrap();

        let (block, _) = run(&y, Mode::Masked);
        assert_eq!(block.mask.unwrap(), arr1(&[false, true, false]).into_dyn());
        let (block, _) = run(&y, Mode::Dense);
        assert!(block.mask.is_none());
        assert_eq!(block.data, arr1(&[2.0, 4.0, 6.0]).into_dyn());
    }

    #[test]
    fn test_division_by_zero_is_masked() {
        let x = Array::wrap(arr1(&[1.0, 2.0, 3.0])).unwrap();
        let y = Array::elementwise(BinaryOp::Divide, &x, arr1(&[1.0, 0.0, 2.0])).unwrap();
        let (block, _) = run(&y, Mode::Masked);
        assert_eq!(block.mask.unwrap(), arr1(&[false, true, false]).into_dyn());
        let (block, _) = run(&y, Mode::Dense);
        assert_eq!(block.data[[1]], f64::INFINITY);
    }

    #[test]
    fn test_transpose_matches_ndarray() {
        let data = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f64);
        let mask = data.mapv(|v| v as usize % 5 == 0);
        let x = Array::wrap(MaskedArray::new(data.clone().into_dyn(), mask.clone().into_dyn()).unwrap()).unwrap();

        let t = x.transpose(Some(&[2, 0, 1])).unwrap();
        let (block, _) = run(&t, Mode::Masked);
        assert_eq!(block.data, data.view().permuted_axes([2, 0, 1]).into_dyn());
        assert_eq!(block.mask.unwrap(), mask.view().permuted_axes([2, 0, 1]).into_dyn());

        let (block, _) = run(&x.transpose(None).unwrap(), Mode::Dense);
        assert_eq!(block.data, data.t().into_dyn());
        assert!(block.data.is_standard_layout());
    }

    #[test]
    fn test_masked_reduction_and_cast() {
        let m = MaskedArray::new(
            arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(),
            arr2(&[[false, false], [true, false]]).into_dyn(),
        )
        .unwrap();
        let x = Array::wrap(m).unwrap();
        let s = x.aggregate(Reducer::Sum, 0).unwrap().astype(DType::Int32);
        let (block, _) = run(&s, Mode::Masked);
        assert_eq!(block.data, arr1(&[1.0, 6.0]).into_dyn());
        assert!(block.mask.is_none());
    }
}
