//! Q matrix implementations consumed by the SMO optimizer
//!
//! The Q matrix is the quadratic form of the SVM dual:
//! `Q[i][j] = y[i]·y[j]·K(x[i], x[j])` for classification, the plain kernel
//! for one-class, and a sign/index permutation of the kernel for the 2l
//! regression dual. Rows are materialized on demand through [`RowCache`].

use crate::cache::RowCache;
use crate::core::{SvmNode, SvmParameter};
use crate::kernel::KernelEval;

/// Column access to the Q matrix.
///
/// `row` takes `&mut self` because a miss fills the row cache. The
/// optimizer copies rows into its own buffers before mutating anything.
pub trait QMatrix {
    /// Full row `i` of Q, as the solver's `f32` element type.
    fn row(&mut self, i: usize) -> &[f32];

    /// Diagonal of Q in full precision.
    fn diag(&self) -> &[f64];
}

/// Q matrix for C-SVC and ν-SVC.
pub struct SvcQ<'a> {
    kernel: KernelEval<'a>,
    cache: RowCache,
    y: Vec<i8>,
    qd: Vec<f64>,
    l: usize,
}

impl<'a> SvcQ<'a> {
    pub fn new(x: &'a [Vec<SvmNode>], param: &SvmParameter, y: &[i8]) -> Self {
        let l = x.len();
        let kernel = KernelEval::new(x, param);
        let qd = (0..l).map(|i| kernel.eval(i, i)).collect();
        Self {
            kernel,
            cache: RowCache::new(l, param.cache_size),
            y: y.to_vec(),
            qd,
            l,
        }
    }
}

impl<'a> QMatrix for SvcQ<'a> {
    fn row(&mut self, i: usize) -> &[f32] {
        let Self {
            kernel,
            cache,
            y,
            l,
            ..
        } = self;
        cache.get_or_fill(i, |row| {
            let yi = y[i] as f64;
            for j in 0..*l {
                row[j] = (yi * y[j] as f64 * kernel.eval(i, j)) as f32;
            }
        })
    }

    fn diag(&self) -> &[f64] {
        &self.qd
    }
}

/// Q matrix for one-class estimation: the raw kernel, no label scaling.
pub struct OneClassQ<'a> {
    kernel: KernelEval<'a>,
    cache: RowCache,
    qd: Vec<f64>,
    l: usize,
}

impl<'a> OneClassQ<'a> {
    pub fn new(x: &'a [Vec<SvmNode>], param: &SvmParameter) -> Self {
        let l = x.len();
        let kernel = KernelEval::new(x, param);
        let qd = (0..l).map(|i| kernel.eval(i, i)).collect();
        Self {
            kernel,
            cache: RowCache::new(l, param.cache_size),
            qd,
            l,
        }
    }
}

impl<'a> QMatrix for OneClassQ<'a> {
    fn row(&mut self, i: usize) -> &[f32] {
        let Self {
            kernel, cache, l, ..
        } = self;
        cache.get_or_fill(i, |row| {
            for j in 0..*l {
                row[j] = kernel.eval(i, j) as f32;
            }
        })
    }

    fn diag(&self) -> &[f64] {
        &self.qd
    }
}

/// Q matrix for ε-SVR and ν-SVR.
///
/// The regression dual has `2l` variables (α⁺ and α⁻ per data point), but
/// only `l` distinct kernel rows. The cache holds the kernel rows; each
/// requested Q row is assembled into a scratch buffer by applying the sign
/// and index permutation.
pub struct SvrQ<'a> {
    kernel: KernelEval<'a>,
    cache: RowCache,
    l: usize,
    sign: Vec<i8>,
    index: Vec<usize>,
    qd: Vec<f64>,
    buf: Vec<f32>,
}

impl<'a> SvrQ<'a> {
    pub fn new(x: &'a [Vec<SvmNode>], param: &SvmParameter) -> Self {
        let l = x.len();
        let kernel = KernelEval::new(x, param);

        let mut sign = vec![0i8; 2 * l];
        let mut index = vec![0usize; 2 * l];
        let mut qd = vec![0.0f64; 2 * l];
        for k in 0..l {
            sign[k] = 1;
            sign[k + l] = -1;
            index[k] = k;
            index[k + l] = k;
            let kk = kernel.eval(k, k);
            qd[k] = kk;
            qd[k + l] = kk;
        }

        Self {
            kernel,
            cache: RowCache::new(l, param.cache_size),
            l,
            sign,
            index,
            qd,
            buf: vec![0.0f32; 2 * l],
        }
    }
}

impl<'a> QMatrix for SvrQ<'a> {
    fn row(&mut self, i: usize) -> &[f32] {
        let Self {
            kernel,
            cache,
            l,
            sign,
            index,
            buf,
            ..
        } = self;
        let real_i = index[i];
        let data = cache.get_or_fill(real_i, |row| {
            for j in 0..*l {
                row[j] = kernel.eval(real_i, j) as f32;
            }
        });

        let si = sign[i] as f32;
        for (j, slot) in buf.iter_mut().enumerate() {
            *slot = si * sign[j] as f32 * data[index[j]];
        }
        buf
    }

    fn diag(&self) -> &[f64] {
        &self.qd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KernelType;

    fn nodes(pairs: &[(i32, f64)]) -> Vec<SvmNode> {
        pairs
            .iter()
            .map(|&(index, value)| SvmNode { index, value })
            .collect()
    }

    fn rbf_param() -> SvmParameter {
        SvmParameter {
            kernel_type: KernelType::Rbf,
            gamma: 0.5,
            cache_size: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_svc_q_diagonal_is_one_for_rbf() {
        let data = vec![nodes(&[(1, 1.0)]), nodes(&[(2, 1.0)])];
        let y = vec![1i8, -1i8];
        let q = SvcQ::new(&data, &rbf_param(), &y);
        for &d in q.diag() {
            assert!((d - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_svc_q_symmetry_and_label_sign() {
        let data = vec![nodes(&[(1, 1.0)]), nodes(&[(1, 2.0)]), nodes(&[(1, 3.0)])];
        let y = vec![1i8, -1i8, 1i8];
        let mut q = SvcQ::new(&data, &rbf_param(), &y);
        let l = data.len();

        let mut m = vec![vec![0.0f32; l]; l];
        for (i, row) in m.iter_mut().enumerate() {
            row.copy_from_slice(q.row(i));
        }
        for i in 0..l {
            for j in 0..l {
                assert!((m[i][j] - m[j][i]).abs() < 1e-6);
            }
        }
        // Opposite labels flip the sign of the (positive) RBF kernel
        assert!(m[0][1] < 0.0);
        assert!(m[0][2] > 0.0);
    }

    #[test]
    fn test_one_class_q_keeps_raw_kernel() {
        let data = vec![nodes(&[(1, 1.0)]), nodes(&[(1, 2.0)])];
        let mut q = OneClassQ::new(&data, &rbf_param());
        let row = q.row(0);
        assert!(row[0] > 0.0 && row[1] > 0.0);
        assert!((row[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_svr_q_sign_permutation() {
        let data = vec![nodes(&[(1, 1.0)]), nodes(&[(1, 2.0)])];
        let mut q = SvrQ::new(&data, &rbf_param());
        let row0 = q.row(0).to_vec();

        // Index 2 mirrors data point 0 with flipped sign:
        // Q[0][2] = sign[0]·sign[2]·K(0,0) = -1
        assert!((row0[2] + 1.0).abs() < 1e-6, "Q[0][2] = {}", row0[2]);
        // Q[0][0] = K(0,0) = 1
        assert!((row0[0] - 1.0).abs() < 1e-6);
    }
}
