//! k-fold cross-validation
//!
//! Stratified fold assignment for classification (class ratios preserved
//! per fold), simple shuffled splits otherwise. Returns the held-out
//! prediction for every instance as a plain dense vector.

use crate::core::{SvmParameter, SvmProblem};
use crate::solver::predict::{predict, predict_probability};
use crate::solver::{group_classes, info, rng_next, train};

fn held_out_prediction(
    model: &crate::core::SvmModel,
    param: &SvmParameter,
    x: &[crate::core::SvmNode],
) -> f64 {
    if param.probability && param.svm_type.is_classification() {
        predict_probability(model, x)
            .map(|(label, _)| label)
            .unwrap_or_else(|| predict(model, x))
    } else {
        predict(model, x)
    }
}

/// Perform `nr_fold`-fold cross-validation.
///
/// `target[i]` is the prediction for instance `i` from the fold where it
/// was held out. `nr_fold` values of 0 or above the instance count clamp
/// to leave-one-out. `seed` drives the fold shuffle.
pub fn cross_validate(
    prob: &SvmProblem,
    param: &SvmParameter,
    mut nr_fold: usize,
    seed: u64,
) -> Vec<f64> {
    let l = prob.len();
    if l == 0 {
        return Vec::new();
    }

    if nr_fold == 0 || nr_fold > l {
        info(&format!(
            "WARNING: # folds ({}) out of range. Will use # folds = # data instead \
             (i.e., leave-one-out cross validation)\n",
            nr_fold
        ));
        nr_fold = l;
    }

    let mut rng: u64 = seed;
    let mut perm: Vec<usize> = (0..l).collect();
    let mut fold_start = vec![0usize; nr_fold + 1];

    if param.svm_type.is_classification() && nr_fold < l {
        // Stratified assignment: shuffle within each class, then deal each
        // class's samples across the folds
        let grouped = group_classes(&prob.labels);
        let nr_class = grouped.nr_class();
        let mut index = grouped.perm.clone();

        for c in 0..nr_class {
            let s = grouped.start[c];
            let n = grouped.count[c];
            for i in 0..n {
                let j = i + rng_next(&mut rng) % (n - i);
                index.swap(s + i, s + j);
            }
        }

        let mut fold_count = vec![0usize; nr_fold];
        for (i, fc) in fold_count.iter_mut().enumerate() {
            for &count in &grouped.count {
                *fc += (i + 1) * count / nr_fold - i * count / nr_fold;
            }
        }

        fold_start[0] = 0;
        for i in 1..=nr_fold {
            fold_start[i] = fold_start[i - 1] + fold_count[i - 1];
        }

        let mut offset = vec![0usize; nr_fold];
        for c in 0..nr_class {
            for i in 0..nr_fold {
                let begin = grouped.start[c] + i * grouped.count[c] / nr_fold;
                let end = grouped.start[c] + (i + 1) * grouped.count[c] / nr_fold;
                for &sample in &index[begin..end] {
                    perm[fold_start[i] + offset[i]] = sample;
                    offset[i] += 1;
                }
            }
        }
    } else {
        for i in 0..l {
            let j = i + rng_next(&mut rng) % (l - i);
            perm.swap(i, j);
        }
        for (i, fs) in fold_start.iter_mut().enumerate() {
            *fs = i * l / nr_fold;
        }
    }

    let mut target = vec![0.0; l];
    for fold in 0..nr_fold {
        let begin = fold_start[fold];
        let end = fold_start[fold + 1];

        let mut sub_labels = Vec::with_capacity(l - (end - begin));
        let mut sub_instances = Vec::with_capacity(l - (end - begin));
        for &j in perm[..begin].iter().chain(perm[end..].iter()) {
            sub_labels.push(prob.labels[j]);
            sub_instances.push(prob.instances[j].clone());
        }

        let subprob = SvmProblem {
            labels: sub_labels,
            instances: sub_instances,
        };
        let submodel = train(&subprob, param);

        for &j in &perm[begin..end] {
            target[j] = held_out_prediction(&submodel, param, &prob.instances[j]);
        }
    }

    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SvmNode, SvmType};

    fn alternating_problem(n: usize) -> SvmProblem {
        let labels: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let instances: Vec<Vec<SvmNode>> = (0..n)
            .map(|i| {
                let v = if i % 2 == 0 { 1.0 } else { -1.0 } * (1.0 + 0.1 * (i / 2) as f64);
                vec![SvmNode { index: 1, value: v }]
            })
            .collect();
        SvmProblem { labels, instances }
    }

    #[test]
    fn test_cross_validate_classification_shape_and_labels() {
        let prob = alternating_problem(12);
        let param = SvmParameter {
            kernel_type: KernelType::Linear,
            ..Default::default()
        };
        let target = cross_validate(&prob, &param, 4, 1);
        assert_eq!(target.len(), 12);
        for &pred in &target {
            assert!(pred == 1.0 || pred == -1.0);
        }
        // Clusters are well separated, so held-out accuracy should be high
        let correct = target
            .iter()
            .zip(prob.labels.iter())
            .filter(|(p, y)| p == y)
            .count();
        assert!(correct >= 9, "only {}/12 correct", correct);
    }

    #[test]
    fn test_cross_validate_clamps_to_leave_one_out() {
        let prob = alternating_problem(4);
        let param = SvmParameter {
            kernel_type: KernelType::Linear,
            ..Default::default()
        };
        for folds in [0, 100] {
            let target = cross_validate(&prob, &param, folds, 1);
            assert_eq!(target.len(), 4);
        }
    }

    #[test]
    fn test_cross_validate_empty_problem() {
        let prob = SvmProblem {
            labels: Vec::new(),
            instances: Vec::new(),
        };
        assert!(cross_validate(&prob, &SvmParameter::default(), 5, 1).is_empty());
    }

    #[test]
    fn test_cross_validate_regression() {
        let instances: Vec<Vec<SvmNode>> = (0..10)
            .map(|i| vec![SvmNode { index: 1, value: i as f64 }])
            .collect();
        let labels: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        let prob = SvmProblem { labels, instances };
        let param = SvmParameter {
            svm_type: SvmType::EpsilonSvr,
            kernel_type: KernelType::Linear,
            c: 10.0,
            ..Default::default()
        };
        let target = cross_validate(&prob, &param, 5, 1);
        assert_eq!(target.len(), 10);
        for &v in &target {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_cross_validate_deterministic_for_seed() {
        let prob = alternating_problem(10);
        let param = SvmParameter {
            kernel_type: KernelType::Linear,
            ..Default::default()
        };
        let a = cross_validate(&prob, &param, 5, 7);
        let b = cross_validate(&prob, &param, 5, 7);
        assert_eq!(a, b);
    }
}
