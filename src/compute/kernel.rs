//! Numeric kernels over dense `f64` blocks.
//!
//! Every value is carried as `f64`; results are coerced to the node's dtype
//! once the arithmetic is done.

use crate::store::{BinaryOp, DType, Reducer};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use wide::f64x4;

const LANES: usize = 4;

/// `lhs op rhs` over two views of the same shape, coerced to `dtype`.
pub fn binary(op: BinaryOp, dtype: DType, lhs: ArrayViewD<'_, f64>, rhs: ArrayViewD<'_, f64>) -> ArrayD<f64> {
    if let (Some(a), Some(b)) = (lhs.as_slice(), rhs.as_slice()) {
        let mut out = ArrayD::<f64>::zeros(lhs.raw_dim());
        if let Some(dst) = out.as_slice_mut() {
            if vectorized(op, a, b, dst) {
                coerce(&mut out, dtype);
                return out;
            }
        }
    }

    let integer = dtype.is_integer();
    let mut out = Zip::from(&lhs).and(&rhs).map_collect(|&a, &b| apply(op, a, b, integer));
    coerce(&mut out, dtype);
    out
}

/// Contiguous fast path for the four basic operations.
fn vectorized(op: BinaryOp, a: &[f64], b: &[f64], dst: &mut [f64]) -> bool {
    let (wide_op, scalar_op): (fn(f64x4, f64x4) -> f64x4, fn(f64, f64) -> f64) = match op {
        BinaryOp::Add => (|x, y| x + y, |x, y| x + y),
        BinaryOp::Subtract => (|x, y| x - y, |x, y| x - y),
        BinaryOp::Multiply => (|x, y| x * y, |x, y| x * y),
        BinaryOp::Divide => (|x, y| x / y, |x, y| x / y),
        _ => return false,
    };

    let split = dst.len() - dst.len() % LANES;
    for ((d, x), y) in dst[..split]
        .chunks_exact_mut(LANES)
        .zip(a[..split].chunks_exact(LANES))
        .zip(b[..split].chunks_exact(LANES))
    {
        let x = f64x4::from([x[0], x[1], x[2], x[3]]);
        let y = f64x4::from([y[0], y[1], y[2], y[3]]);
        d.copy_from_slice(&wide_op(x, y).to_array());
    }
    for i in split..dst.len() {
        dst[i] = scalar_op(a[i], b[i]);
    }
    true
}

/// One element of `a op b`. `integer` selects integer semantics for
/// division by zero, which yields 0 instead of inf/NaN.
#[inline]
pub fn apply(op: BinaryOp, a: f64, b: f64, integer: bool) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::FloorDivide if integer && b == 0.0 => 0.0,
        BinaryOp::FloorDivide => divmod(a, b).0,
        BinaryOp::Remainder if integer && b == 0.0 => 0.0,
        BinaryOp::Remainder => divmod(a, b).1,
        BinaryOp::Power => a.powf(b),
    }
}

/// Floored quotient and remainder; the remainder takes the sign of `b`.
pub fn divmod(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        return (a / b, f64::NAN);
    }
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 {
        if (b < 0.0) != (rem < 0.0) {
            rem += b;
            div -= 1.0;
        }
    } else {
        rem = 0.0f64.copysign(b);
    }

    let floor = if div != 0.0 {
        let mut f = div.floor();
        if div - f > 0.5 {
            f += 1.0;
        }
        f
    } else {
        0.0f64.copysign(a / b)
    };
    (floor, rem)
}

/// Positions a masked-mode result must hide: zero divisors for the division
/// family and non-finite results for every domained operation.
pub fn domain_mask(op: BinaryOp, rhs: &ArrayViewD<'_, f64>, result: &ArrayD<f64>) -> Option<ArrayD<bool>> {
    if op.has_zero_domain() {
        Some(Zip::from(rhs).and(result).map_collect(|&b, &r| b == 0.0 || !r.is_finite()))
    } else if op == BinaryOp::Power {
        Some(result.mapv(|r| !r.is_finite()))
    } else {
        None
    }
}

/// Reduces `data` along `axis`, skipping elements flagged in `mask`.
///
/// Lanes are summed in the same order as `ndarray`'s `sum_axis`, so a lane
/// comes out exactly as an eager `sum_axis`/`mean_axis`/`var_axis` on the
/// whole array would give it, whatever chunk the lane sits in. Masked lanes follow the `numpy.ma`
/// recipe: masked elements are filled with 0 before summing and the valid
/// count divides. In masked mode a lane with nothing to reduce comes back
/// masked; in dense mode it takes the reducer's empty value (0 for sums, NaN
/// otherwise).
pub fn reduce(
    reducer: Reducer,
    dtype: DType,
    data: &ArrayD<f64>,
    mask: Option<&ArrayD<bool>>,
    axis: usize,
    masked: bool,
) -> (ArrayD<f64>, Option<ArrayD<bool>>) {
    let ax = Axis(axis);
    // Lane sums depend on memory order, which must not vary between chunks.
    let data = data.as_standard_layout();
    let view = data.view();
    let (values, invalid) = match mask {
        Some(mask) => reduce_masked(reducer, &view, mask, ax, masked),
        None => reduce_dense(reducer, &view, ax, masked),
    };

    let invalid = invalid.filter(|m| m.iter().any(|&x| x));
    let values = match &invalid {
        Some(m) => Zip::from(&values).and(m).map_collect(|&v, &hide| if hide { 0.0 } else { dtype.cast(v) }),
        None => values.mapv(|v| dtype.cast(v)),
    };
    (values, invalid)
}

fn reduce_dense(reducer: Reducer, data: &ArrayViewD<'_, f64>, ax: Axis, masked: bool) -> (ArrayD<f64>, Option<ArrayD<bool>>) {
    let n = data.len_of(ax);
    let out = lane_dim(data, ax);
    let values = match reducer {
        Reducer::Count => ArrayD::from_elem(out, n as f64),
        Reducer::Sum => axis_sum(data, ax),
        Reducer::Mean if n == 0 => ArrayD::from_elem(out, f64::NAN),
        Reducer::Mean => axis_sum(data, ax).mapv_into(|s| s / n as f64),
        Reducer::Min | Reducer::Max => Zip::from(data.lanes(ax)).map_collect(|lane| extremum(reducer, lane.iter().copied())),
        Reducer::Var { ddof } | Reducer::Std { ddof } => {
            if n <= ddof as usize {
                let invalid = masked.then(|| ArrayD::from_elem(out.clone(), true));
                return (ArrayD::from_elem(out, f64::NAN), invalid);
            }
            let var = data.var_axis(ax, ddof as f64);
            if matches!(reducer, Reducer::Std { .. }) {
                var.mapv_into(f64::sqrt)
            } else {
                var
            }
        }
    };
    (values, None)
}

fn reduce_masked(
    reducer: Reducer,
    data: &ArrayViewD<'_, f64>,
    mask: &ArrayD<bool>,
    ax: Axis,
    masked: bool,
) -> (ArrayD<f64>, Option<ArrayD<bool>>) {
    let filled = Zip::from(data).and(mask).map_collect(|&v, &hide| if hide { 0.0 } else { v });
    let counts = mask.mapv(|hide| if hide { 0.0 } else { 1.0 }).sum_axis(ax);
    let sums = || axis_sum(&filled.view(), ax);
    let means = || Zip::from(&sums()).and(&counts).map_collect(|&s, &c| s / c);

    // Degrees of freedom a lane must exceed, for the variance family.
    let (values, ddof) = match reducer {
        Reducer::Count => return (counts, None),
        Reducer::Sum => (sums(), None),
        Reducer::Mean => (means(), None),
        Reducer::Min | Reducer::Max => {
            let values = Zip::from(data.lanes(ax))
                .and(mask.lanes(ax))
                .map_collect(|d, m| extremum(reducer, d.iter().zip(m.iter()).filter(|&(_, &hide)| !hide).map(|(&v, _)| v)));
            (values, None)
        }
        Reducer::Var { ddof } | Reducer::Std { ddof } => {
            let mean = means().insert_axis(ax);
            let anomalies = Zip::from(&filled)
                .and(mask)
                .and_broadcast(&mean)
                .map_collect(|&v, &hide, &m| if hide { 0.0 } else { (v - m) * (v - m) });
            let ddof = ddof as f64;
            let values = Zip::from(&axis_sum(&anomalies.view(), ax)).and(&counts).map_collect(|&ss, &c| {
                let var = if c > ddof { ss / (c - ddof) } else { f64::NAN };
                if matches!(reducer, Reducer::Std { .. }) {
                    var.sqrt()
                } else {
                    var
                }
            });
            (values, Some(ddof))
        }
    };

    if !masked {
        return (values, None);
    }
    let n = data.len_of(ax);
    let invalid = counts.mapv(|c| match ddof {
        Some(ddof) => c <= ddof,
        None => n > 0 && c == 0.0,
    });
    (values, Some(invalid))
}

/// Sums lanes along `ax` the way `sum_axis` does on a standard-layout array:
/// contiguous lanes of the last axis through `ArrayBase::sum`, any other axis
/// by adding whole subviews in index order.
fn axis_sum(data: &ArrayViewD<'_, f64>, ax: Axis) -> ArrayD<f64> {
    if ax.index() + 1 == data.ndim() {
        Zip::from(data.lanes(ax)).map_collect(|lane| lane.sum())
    } else {
        data.fold_axis(ax, 0.0, |&acc, &v| acc + v)
    }
}

/// Smallest or largest value of a lane; NaN if any value is NaN or the lane is empty.
fn extremum(reducer: Reducer, mut values: impl Iterator<Item = f64>) -> f64 {
    let Some(first) = values.next() else {
        return f64::NAN;
    };
    values.fold(first, |acc, v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else if reducer == Reducer::Max {
            acc.max(v)
        } else {
            acc.min(v)
        }
    })
}

/// Shape of `data` with `ax` removed.
fn lane_dim(data: &ArrayViewD<'_, f64>, ax: Axis) -> IxDyn {
    let mut shape = data.shape().to_vec();
    shape.remove(ax.index());
    IxDyn(&shape)
}

fn coerce(out: &mut ArrayD<f64>, dtype: DType) {
    if dtype != DType::Float64 {
        out.mapv_inplace(|v| dtype.cast(v));
    }
}
