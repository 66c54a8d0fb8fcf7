//! Inference entry points of the solver
//!
//! `predict_values` computes raw decision values, `predict` the label or
//! regression value, and `predict_probability` calibrated class
//! probabilities where the model carries them.

use crate::core::{SvmModel, SvmNode, SvmType};
use crate::kernel::k_function;
use crate::solver::probability::{pairwise_coupling, sigmoid_predict};

/// Compute decision values for one instance into `dec_values` and return
/// the predicted label or function value.
///
/// For classification `dec_values` receives `nr_class·(nr_class-1)/2`
/// pairwise margins; for one-class and regression a single value.
pub fn predict_values(model: &SvmModel, x: &[SvmNode], dec_values: &mut [f64]) -> f64 {
    if model.svm_type().is_single_margin() {
        let coef = &model.sv_coef[0];
        let mut sum = 0.0;
        for (i, sv) in model.sv.iter().enumerate() {
            sum += coef[i] * k_function(x, sv, &model.param);
        }
        sum -= model.rho[0];
        dec_values[0] = sum;

        if model.svm_type() == SvmType::OneClass {
            if sum > 0.0 {
                1.0
            } else {
                -1.0
            }
        } else {
            sum
        }
    } else {
        let nr_class = model.nr_class;

        let kvalue: Vec<f64> = model
            .sv
            .iter()
            .map(|sv| k_function(x, sv, &model.param))
            .collect();

        let mut start = vec![0usize; nr_class];
        for i in 1..nr_class {
            start[i] = start[i - 1] + model.n_sv[i - 1];
        }

        let mut vote = vec![0usize; nr_class];
        let mut p = 0;
        for i in 0..nr_class {
            for j in (i + 1)..nr_class {
                let mut sum = 0.0;
                let coef1 = &model.sv_coef[j - 1];
                let coef2 = &model.sv_coef[i];
                for k in 0..model.n_sv[i] {
                    sum += coef1[start[i] + k] * kvalue[start[i] + k];
                }
                for k in 0..model.n_sv[j] {
                    sum += coef2[start[j] + k] * kvalue[start[j] + k];
                }
                sum -= model.rho[p];
                dec_values[p] = sum;

                if sum > 0.0 {
                    vote[i] += 1;
                } else {
                    vote[j] += 1;
                }
                p += 1;
            }
        }

        let winner = vote
            .iter()
            .enumerate()
            .max_by_key(|&(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap_or(0);
        model.label[winner] as f64
    }
}

/// Predict the label or regression value for one instance.
pub fn predict(model: &SvmModel, x: &[SvmNode]) -> f64 {
    let mut dec_values = vec![0.0; model.n_decision_values()];
    predict_values(model, x, &mut dec_values)
}

/// Predict calibrated class probabilities for one instance.
///
/// Returns `(label, probs)` with `probs[i]` the probability of class
/// `model.label[i]`, or `None` when the model carries no calibration
/// coefficients (including all one-class and regression models).
pub fn predict_probability(model: &SvmModel, x: &[SvmNode]) -> Option<(f64, Vec<f64>)> {
    if !model.has_probability() {
        return None;
    }

    let nr_class = model.nr_class;
    let mut dec_values = vec![0.0; model.n_pairs()];
    predict_values(model, x, &mut dec_values);

    let min_prob = 1e-7;
    let mut pairwise = vec![vec![0.0; nr_class]; nr_class];
    let mut k = 0;
    for i in 0..nr_class {
        for j in (i + 1)..nr_class {
            let p = sigmoid_predict(dec_values[k], model.prob_a[k], model.prob_b[k])
                .clamp(min_prob, 1.0 - min_prob);
            pairwise[i][j] = p;
            pairwise[j][i] = 1.0 - p;
            k += 1;
        }
    }

    let mut probs = vec![0.0; nr_class];
    if nr_class == 2 {
        probs[0] = pairwise[0][1];
        probs[1] = pairwise[1][0];
    } else {
        pairwise_coupling(nr_class, &pairwise, &mut probs);
    }

    let best = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).expect("probabilities are finite"))
        .map(|(i, _)| i)
        .unwrap_or(0);

    Some((model.label[best] as f64, probs))
}
