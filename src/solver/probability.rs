//! Probability calibration
//!
//! Platt scaling for binary decision values, pairwise coupling for
//! multiclass estimates, and the Laplace scale estimate that regression
//! models store in `prob_a`.

use crate::core::{SvmParameter, SvmProblem};
use crate::solver::{predict, rng_next, train};

/// Fit Platt scaling parameters (A, B) for decision values against ±1
/// labels, by Newton's method with backtracking line search.
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    let l = dec_values.len();

    let mut prior1 = 0.0;
    let mut prior0 = 0.0;
    for &y in labels {
        if y > 0.0 {
            prior1 += 1.0;
        } else {
            prior0 += 1.0;
        }
    }

    let max_iter = 100;
    let min_step = 1e-10;
    let sigma = 1e-12;
    let eps = 1e-5;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();

    let objective = |a: f64, b: f64| -> f64 {
        let mut fval = 0.0;
        for i in 0..l {
            let f_apb = dec_values[i] * a + b;
            if f_apb >= 0.0 {
                fval += t[i] * f_apb + (1.0 + (-f_apb).exp()).ln();
            } else {
                fval += (t[i] - 1.0) * f_apb + (1.0 + f_apb.exp()).ln();
            }
        }
        fval
    };
    let mut fval = objective(a, b);

    for _ in 0..max_iter {
        // Gradient and regularized Hessian
        let mut h11 = sigma;
        let mut h22 = sigma;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for i in 0..l {
            let f_apb = dec_values[i] * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += dec_values[i] * dec_values[i] * d2;
            h22 += d2;
            h21 += dec_values[i] * d2;
            let d1 = t[i] - p;
            g1 += dec_values[i] * d1;
            g2 += d1;
        }

        if g1.abs() < eps && g2.abs() < eps {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut stepsize = 1.0;
        while stepsize >= min_step {
            let new_a = a + stepsize * da;
            let new_b = b + stepsize * db;
            let newf = objective(new_a, new_b);
            if newf < fval + 0.0001 * stepsize * gd {
                a = new_a;
                b = new_b;
                fval = newf;
                break;
            }
            stepsize /= 2.0;
        }
        if stepsize < min_step {
            break;
        }
    }

    (a, b)
}

/// Numerically stable `P(y=1|f) = 1/(1+exp(A·f+B))`.
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Couple pairwise probabilities `r[i][j] = P(i | i or j)` into class
/// probabilities `p` using the Wu–Lin–Weng second approach.
pub fn pairwise_coupling(k: usize, r: &[Vec<f64>], p: &mut [f64]) {
    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;

    let mut q_mat = vec![vec![0.0; k]; k];
    for t in 0..k {
        q_mat[t][t] = 0.0;
        for j in 0..t {
            q_mat[t][t] += r[j][t] * r[j][t];
            q_mat[t][j] = q_mat[j][t];
        }
        for j in (t + 1)..k {
            q_mat[t][t] += r[j][t] * r[j][t];
            q_mat[t][j] = -r[j][t] * r[t][j];
        }
    }

    for v in p.iter_mut() {
        *v = 1.0 / k as f64;
    }

    let mut qp = vec![0.0; k];
    for _ in 0..max_iter {
        let mut p_qp = 0.0;
        for t in 0..k {
            qp[t] = 0.0;
            for j in 0..k {
                qp[t] += q_mat[t][j] * p[j];
            }
            p_qp += p[t] * qp[t];
        }

        let max_error = (0..k)
            .map(|t| (qp[t] - p_qp).abs())
            .fold(0.0f64, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + p_qp) / q_mat[t][t];
            p[t] += diff;
            p_qp = (p_qp + diff * (diff * q_mat[t][t] + 2.0 * qp[t]))
                / (1.0 + diff)
                / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q_mat[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }
}

/// Fit (A, B) for one binary sub-problem via internal 5-fold CV: train on
/// four folds with the weighted costs, collect held-out decision values,
/// then run [`sigmoid_train`] on them.
pub fn binary_calibration(
    prob: &SvmProblem,
    param: &SvmParameter,
    cp: f64,
    cn: f64,
) -> (f64, f64) {
    let l = prob.len();
    let nr_fold = 5;
    let mut perm: Vec<usize> = (0..l).collect();
    let mut dec_values = vec![0.0; l];

    let mut rng: u64 = 1;
    for i in 0..l {
        let j = i + rng_next(&mut rng) % (l - i);
        perm.swap(i, j);
    }

    for fold in 0..nr_fold {
        let begin = fold * l / nr_fold;
        let end = (fold + 1) * l / nr_fold;

        let mut sub_instances = Vec::with_capacity(l - (end - begin));
        let mut sub_labels = Vec::with_capacity(l - (end - begin));
        for &j in perm[..begin].iter().chain(perm[end..].iter()) {
            sub_instances.push(prob.instances[j].clone());
            sub_labels.push(prob.labels[j]);
        }

        let p_count = sub_labels.iter().filter(|&&y| y > 0.0).count();
        let n_count = sub_labels.len() - p_count;

        if p_count == 0 && n_count == 0 {
            for &j in &perm[begin..end] {
                dec_values[j] = 0.0;
            }
        } else if p_count > 0 && n_count == 0 {
            for &j in &perm[begin..end] {
                dec_values[j] = 1.0;
            }
        } else if p_count == 0 && n_count > 0 {
            for &j in &perm[begin..end] {
                dec_values[j] = -1.0;
            }
        } else {
            let mut subparam = param.clone();
            subparam.probability = false;
            subparam.c = 1.0;
            subparam.weight = vec![(1, cp), (-1, cn)];

            let subprob = SvmProblem {
                labels: sub_labels,
                instances: sub_instances,
            };
            let submodel = train(&subprob, &subparam);

            for &j in &perm[begin..end] {
                let mut dv = [0.0];
                predict::predict_values(&submodel, &prob.instances[j], &mut dv);
                // Orient the decision value by the submodel's first label
                dec_values[j] = dv[0] * submodel.label[0] as f64;
            }
        }
    }

    sigmoid_train(&dec_values, &prob.labels)
}

/// Estimate the Laplace scale σ of the residual distribution for SVR
/// probability output: 5-fold CV residuals, mean absolute error, one
/// outlier-rejection pass.
pub fn svr_laplace_scale(prob: &SvmProblem, param: &SvmParameter) -> f64 {
    let l = prob.len();
    let nr_fold = 5;

    let mut newparam = param.clone();
    newparam.probability = false;
    let ymv = crate::solver::cross_validation::cross_validate(prob, &newparam, nr_fold, 1);

    let residuals: Vec<f64> = (0..l).map(|i| prob.labels[i] - ymv[i]).collect();
    let mut mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l as f64;

    let std_val = (2.0 * mae * mae).sqrt();
    let mut kept = 0usize;
    let mut sum = 0.0;
    for r in &residuals {
        if r.abs() <= 5.0 * std_val {
            kept += 1;
            sum += r.abs();
        }
    }
    if kept > 0 {
        mae = sum / kept as f64;
    }

    crate::solver::info(&format!(
        "Prob. model for test data: target value = predicted value + z,\n\
         z: Laplace distribution e^(-|z|/sigma)/(2sigma),sigma= {:.6}\n",
        mae
    ));

    mae
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_predict_center_and_stability() {
        assert!((sigmoid_predict(0.0, 0.0, 0.0) - 0.5).abs() < 1e-12);

        for dv in [1000.0, -1000.0] {
            let p = sigmoid_predict(dv, 1.0, 0.0);
            assert!(p.is_finite() && (0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_sigmoid_train_orients_slope() {
        // Positive labels at positive decision values: A must be negative
        // so that P(y=1|f) grows with f
        let dec = vec![2.0, 1.0, 0.5, -0.5, -1.0, -2.0];
        let lab = vec![1.0, 1.0, 1.0, -1.0, -1.0, -1.0];
        let (a, b) = sigmoid_train(&dec, &lab);
        assert!(a.is_finite() && b.is_finite());
        assert!(a < 0.0, "slope {} should be negative", a);
        assert!(sigmoid_predict(2.0, a, b) > sigmoid_predict(-2.0, a, b));
    }

    #[test]
    fn test_pairwise_coupling_sums_to_one() {
        let r = vec![
            vec![0.0, 0.6, 0.5],
            vec![0.4, 0.0, 0.7],
            vec![0.5, 0.3, 0.0],
        ];
        let mut p = vec![0.0; 3];
        pairwise_coupling(3, &r, &mut p);

        let sum: f64 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum = {}", sum);
        for &pi in &p {
            assert!(pi > 0.0);
        }
    }
}
