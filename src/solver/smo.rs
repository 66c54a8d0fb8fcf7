//! SMO optimizer for the SVM dual problem
//!
//! Second-order working-set selection (Fan, Chen, Lin; JMLR 2005) in the
//! standard and ν variants. The optimizer always works on the full variable
//! set; the shrinking heuristic of the reference solver is a speed
//! optimization with no effect on the solution and is not applied here.

use crate::solver::qmatrix::QMatrix;

const TAU: f64 = 1e-12;
const INF: f64 = f64::INFINITY;

/// Result of a single dual optimization.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Final objective value.
    pub obj: f64,
    /// Bias term.
    pub rho: f64,
    /// Effective upper bound for positive-class variables.
    pub upper_bound_p: f64,
    /// Effective upper bound for negative-class variables.
    pub upper_bound_n: f64,
    /// `(r1 + r2) / 2`, produced by the ν variant only.
    pub r: f64,
}

/// Which KKT system the optimizer solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Single equality constraint (C-SVC, one-class, ε-SVR).
    Standard,
    /// Two equality constraints (ν-SVC, ν-SVR).
    Nu,
}

/// Run the SMO optimizer.
///
/// `alpha` holds the initial point on entry and the solution on exit.
/// `p` is the linear term, `y` the ±1 variable signs, `cp`/`cn` the box
/// constraints per sign, `eps` the stopping tolerance.
pub fn solve(
    variant: Variant,
    q: &mut dyn QMatrix,
    p: &[f64],
    y: &[i8],
    alpha: &mut [f64],
    cp: f64,
    cn: f64,
    eps: f64,
) -> Solution {
    let l = alpha.len();
    let qd = q.diag().to_vec();

    // Gradient of the dual objective at the initial point
    let mut g = p.to_vec();
    for i in 0..l {
        if alpha[i] != 0.0 {
            let q_i = q.row(i).to_vec();
            for j in 0..l {
                g[j] += alpha[i] * q_i[j] as f64;
            }
        }
    }

    let mut opt = Optimizer {
        l,
        variant,
        y,
        g,
        alpha,
        qd,
        q,
        cp,
        cn,
        eps,
    };

    let max_iter = 10_000_000usize.max(l.saturating_mul(100));
    let mut iter = 0usize;
    while iter < max_iter {
        let (i, j) = match opt.select_working_set() {
            Some(pair) => pair,
            None => break,
        };
        opt.update_pair(i, j);
        iter += 1;
    }

    if iter >= max_iter {
        crate::solver::info("WARNING: reaching max number of iterations\n");
    }

    let (rho, r) = opt.calculate_rho();

    let mut obj = 0.0;
    for i in 0..l {
        obj += opt.alpha[i] * (opt.g[i] + p[i]);
    }
    obj /= 2.0;

    crate::solver::info(&format!("optimization finished, #iter = {}\n", iter));

    Solution {
        obj,
        rho,
        upper_bound_p: cp,
        upper_bound_n: cn,
        r,
    }
}

struct Optimizer<'a> {
    l: usize,
    variant: Variant,
    y: &'a [i8],
    g: Vec<f64>,
    alpha: &'a mut [f64],
    qd: Vec<f64>,
    q: &'a mut dyn QMatrix,
    cp: f64,
    cn: f64,
    eps: f64,
}

impl<'a> Optimizer<'a> {
    #[inline]
    fn c_of(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    #[inline]
    fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha[i] >= self.c_of(i)
    }

    #[inline]
    fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha[i] <= 0.0
    }

    #[inline]
    fn is_free(&self, i: usize) -> bool {
        !self.is_upper_bound(i) && !self.is_lower_bound(i)
    }

    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.variant {
            Variant::Standard => self.select_standard(),
            Variant::Nu => self.select_nu(),
        }
    }

    /// Maximal-violating-pair selection with a second-order refinement of j.
    fn select_standard(&mut self) -> Option<(usize, usize)> {
        let mut gmax = -INF;
        let mut gmax2 = -INF;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..self.l {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let q_i = self.q.row(i).to_vec();

        for j in 0..self.l {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmax + self.g[j];
                    if self.g[j] >= gmax2 {
                        gmax2 = self.g[j];
                    }
                    if grad_diff > 0.0 {
                        let quad =
                            self.qd[i] + self.qd[j] - 2.0 * self.y[i] as f64 * q_i[j] as f64;
                        let obj_diff = if quad > 0.0 {
                            -(grad_diff * grad_diff) / quad
                        } else {
                            -(grad_diff * grad_diff) / TAU
                        };
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmax - self.g[j];
                if -self.g[j] >= gmax2 {
                    gmax2 = -self.g[j];
                }
                if grad_diff > 0.0 {
                    let quad = self.qd[i] + self.qd[j] + 2.0 * self.y[i] as f64 * q_i[j] as f64;
                    let obj_diff = if quad > 0.0 {
                        -(grad_diff * grad_diff) / quad
                    } else {
                        -(grad_diff * grad_diff) / TAU
                    };
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    /// ν-variant selection: i and j must carry the same sign, so the two
    /// sign groups are scanned independently.
    fn select_nu(&mut self) -> Option<(usize, usize)> {
        let mut gmaxp = -INF;
        let mut gmaxp2 = -INF;
        let mut gmaxp_idx = None;
        let mut gmaxn = -INF;
        let mut gmaxn2 = -INF;
        let mut gmaxn_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..self.l {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        let q_ip = gmaxp_idx.map(|ip| self.q.row(ip).to_vec());
        let q_in = gmaxn_idx.map(|ineg| self.q.row(ineg).to_vec());

        for j in 0..self.l {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmaxp + self.g[j];
                    if self.g[j] >= gmaxp2 {
                        gmaxp2 = self.g[j];
                    }
                    if grad_diff > 0.0 {
                        if let (Some(ip), Some(q_ip)) = (gmaxp_idx, q_ip.as_ref()) {
                            let quad = self.qd[ip] + self.qd[j] - 2.0 * q_ip[j] as f64;
                            let obj_diff = if quad > 0.0 {
                                -(grad_diff * grad_diff) / quad
                            } else {
                                -(grad_diff * grad_diff) / TAU
                            };
                            if obj_diff <= obj_diff_min {
                                gmin_idx = Some(j);
                                obj_diff_min = obj_diff;
                            }
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmaxn - self.g[j];
                if -self.g[j] >= gmaxn2 {
                    gmaxn2 = -self.g[j];
                }
                if grad_diff > 0.0 {
                    if let (Some(ineg), Some(q_in)) = (gmaxn_idx, q_in.as_ref()) {
                        let quad = self.qd[ineg] + self.qd[j] - 2.0 * q_in[j] as f64;
                        let obj_diff = if quad > 0.0 {
                            -(grad_diff * grad_diff) / quad
                        } else {
                            -(grad_diff * grad_diff) / TAU
                        };
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            }
        }

        if f64::max(gmaxp + gmaxp2, gmaxn + gmaxn2) < self.eps {
            return None;
        }

        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx? } else { gmaxn_idx? };
        Some((i, j))
    }

    /// Analytically optimize the (i, j) pair, clip to the box, and update
    /// the gradient.
    fn update_pair(&mut self, i: usize, j: usize) {
        let q_i = self.q.row(i).to_vec();
        let q_j = self.q.row(j).to_vec();

        let c_i = self.c_of(i);
        let c_j = self.c_of(j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];

        if self.y[i] != self.y[j] {
            let mut quad = self.qd[i] + self.qd[j] + 2.0 * q_i[j] as f64;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-self.g[i] - self.g[j]) / quad;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let mut quad = self.qd[i] + self.qd[j] - 2.0 * q_i[j] as f64;
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (self.g[i] - self.g[j]) / quad;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_i = self.alpha[i] - old_alpha_i;
        let delta_j = self.alpha[j] - old_alpha_j;
        for k in 0..self.l {
            self.g[k] += q_i[k] as f64 * delta_i + q_j[k] as f64 * delta_j;
        }
    }

    fn calculate_rho(&self) -> (f64, f64) {
        match self.variant {
            Variant::Standard => (self.rho_standard(), 0.0),
            Variant::Nu => self.rho_nu(),
        }
    }

    fn rho_standard(&self) -> f64 {
        let mut nr_free = 0usize;
        let mut ub = INF;
        let mut lb = -INF;
        let mut sum_free = 0.0;

        for i in 0..self.l {
            let yg = self.y[i] as f64 * self.g[i];
            if self.is_upper_bound(i) {
                if self.y[i] == -1 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                nr_free += 1;
                sum_free += yg;
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    fn rho_nu(&self) -> (f64, f64) {
        let mut nr_free1 = 0usize;
        let mut nr_free2 = 0usize;
        let mut ub1 = INF;
        let mut ub2 = INF;
        let mut lb1 = -INF;
        let mut lb2 = -INF;
        let mut sum_free1 = 0.0;
        let mut sum_free2 = 0.0;

        for i in 0..self.l {
            if self.y[i] == 1 {
                if self.is_upper_bound(i) {
                    lb1 = lb1.max(self.g[i]);
                } else if self.is_lower_bound(i) {
                    ub1 = ub1.min(self.g[i]);
                } else {
                    nr_free1 += 1;
                    sum_free1 += self.g[i];
                }
            } else if self.is_upper_bound(i) {
                lb2 = lb2.max(self.g[i]);
            } else if self.is_lower_bound(i) {
                ub2 = ub2.min(self.g[i]);
            } else {
                nr_free2 += 1;
                sum_free2 += self.g[i];
            }
        }

        let r1 = if nr_free1 > 0 {
            sum_free1 / nr_free1 as f64
        } else {
            (ub1 + lb1) / 2.0
        };
        let r2 = if nr_free2 > 0 {
            sum_free2 / nr_free2 as f64
        } else {
            (ub2 + lb2) / 2.0
        };

        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }
}
