//! Kernel functions
//!
//! Two entry points: the standalone [`k_function`] used during prediction,
//! and [`KernelEval`] used during training, which borrows the dataset and
//! precomputes the squared norms needed by the RBF kernel.

use crate::core::{KernelType, SvmNode, SvmParameter};

/// Integer power by repeated squaring.
///
/// Non-positive exponents return 1.0, matching the reference solver.
#[inline]
pub fn powi(base: f64, times: i32) -> f64 {
    let mut tmp = base;
    let mut ret = 1.0;
    let mut t = times;
    while t > 0 {
        if t % 2 == 1 {
            ret *= tmp;
        }
        tmp *= tmp;
        t /= 2;
    }
    ret
}

/// Dot product of two sparse vectors with ascending indices.
#[inline]
pub fn dot(x: &[SvmNode], y: &[SvmNode]) -> f64 {
    let mut sum = 0.0;
    let mut ix = 0;
    let mut iy = 0;
    while ix < x.len() && iy < y.len() {
        if x[ix].index == y[iy].index {
            sum += x[ix].value * y[iy].value;
            ix += 1;
            iy += 1;
        } else if x[ix].index > y[iy].index {
            iy += 1;
        } else {
            ix += 1;
        }
    }
    sum
}

/// Squared Euclidean distance ‖x-y‖² over sparse vectors.
#[inline]
fn squared_distance(x: &[SvmNode], y: &[SvmNode]) -> f64 {
    let mut sum = 0.0;
    let mut ix = 0;
    let mut iy = 0;
    while ix < x.len() && iy < y.len() {
        if x[ix].index == y[iy].index {
            let d = x[ix].value - y[iy].value;
            sum += d * d;
            ix += 1;
            iy += 1;
        } else if x[ix].index > y[iy].index {
            sum += y[iy].value * y[iy].value;
            iy += 1;
        } else {
            sum += x[ix].value * x[ix].value;
            ix += 1;
        }
    }
    while ix < x.len() {
        sum += x[ix].value * x[ix].value;
        ix += 1;
    }
    while iy < y.len() {
        sum += y[iy].value * y[iy].value;
        iy += 1;
    }
    sum
}

/// Evaluate K(x, y) for prediction.
///
/// For the precomputed kernel, `y[0].value` carries the column to look up
/// in `x`, following the reference solver's convention.
pub fn k_function(x: &[SvmNode], y: &[SvmNode], param: &SvmParameter) -> f64 {
    match param.kernel_type {
        KernelType::Linear => dot(x, y),
        KernelType::Polynomial => powi(param.gamma * dot(x, y) + param.coef0, param.degree),
        KernelType::Rbf => (-param.gamma * squared_distance(x, y)).exp(),
        KernelType::Sigmoid => (param.gamma * dot(x, y) + param.coef0).tanh(),
        KernelType::Precomputed => {
            let col = y.first().map_or(0, |n| n.value as usize);
            x.get(col).map_or(0.0, |n| n.value)
        }
    }
}

/// Kernel evaluator for training.
///
/// Borrows the dataset and, for RBF, precomputes `x_square[i] = x_i·x_i`
/// so that `‖x_i - x_j‖²` reduces to two lookups and one dot product.
pub struct KernelEval<'a> {
    x: &'a [Vec<SvmNode>],
    x_square: Option<Vec<f64>>,
    kernel_type: KernelType,
    degree: i32,
    gamma: f64,
    coef0: f64,
}

impl<'a> KernelEval<'a> {
    /// Create an evaluator over `x` with the given parameters.
    pub fn new(x: &'a [Vec<SvmNode>], param: &SvmParameter) -> Self {
        let x_square = if param.kernel_type == KernelType::Rbf {
            Some(x.iter().map(|xi| dot(xi, xi)).collect())
        } else {
            None
        };
        Self {
            x,
            x_square,
            kernel_type: param.kernel_type,
            degree: param.degree,
            gamma: param.gamma,
            coef0: param.coef0,
        }
    }

    /// Evaluate K(x\[i\], x\[j\]).
    #[inline]
    pub fn eval(&self, i: usize, j: usize) -> f64 {
        match self.kernel_type {
            KernelType::Linear => dot(&self.x[i], &self.x[j]),
            KernelType::Polynomial => powi(
                self.gamma * dot(&self.x[i], &self.x[j]) + self.coef0,
                self.degree,
            ),
            KernelType::Rbf => {
                let sq = self.x_square.as_ref().expect("x_square precomputed for RBF");
                let dist = sq[i] + sq[j] - 2.0 * dot(&self.x[i], &self.x[j]);
                (-self.gamma * dist).exp()
            }
            KernelType::Sigmoid => {
                (self.gamma * dot(&self.x[i], &self.x[j]) + self.coef0).tanh()
            }
            KernelType::Precomputed => {
                let col = self.x[j].first().map_or(0, |n| n.value as usize);
                self.x[i].get(col).map_or(0.0, |n| n.value)
            }
        }
    }
}
