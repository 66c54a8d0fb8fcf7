//! Core type definitions shared by the bridge and the solver

use serde::{Deserialize, Serialize};

/// SVM formulation type.
///
/// The discriminants match the integer constants of the reference solver:
/// `C_SVC=0, NU_SVC=1, ONE_CLASS=2, EPSILON_SVR=3, NU_SVR=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum SvmType {
    /// C-Support Vector Classification
    CSvc = 0,
    /// ν-Support Vector Classification
    NuSvc = 1,
    /// One-class SVM (distribution estimation)
    OneClass = 2,
    /// ε-Support Vector Regression
    EpsilonSvr = 3,
    /// ν-Support Vector Regression
    NuSvr = 4,
}

impl SvmType {
    /// Whether this formulation predicts a class label via one-vs-one voting.
    pub fn is_classification(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    /// Whether the decision function produces a single margin per sample.
    pub fn is_single_margin(self) -> bool {
        matches!(
            self,
            SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr
        )
    }
}

/// Kernel function type.
///
/// Discriminants match the reference solver:
/// `LINEAR=0, POLY=1, RBF=2, SIGMOID=3, PRECOMPUTED=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum KernelType {
    /// `K(x,y) = x·y`
    Linear = 0,
    /// `K(x,y) = (γ·x·y + coef0)^degree`
    Polynomial = 1,
    /// `K(x,y) = exp(-γ·‖x-y‖²)`
    Rbf = 2,
    /// `K(x,y) = tanh(γ·x·y + coef0)`
    Sigmoid = 3,
    /// Kernel values supplied by the caller as a precomputed matrix
    Precomputed = 4,
}

impl KernelType {
    /// Whether the kernel reads the `gamma` parameter.
    pub fn uses_gamma(self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }

    /// Whether the kernel reads the `coef0` parameter.
    pub fn uses_coef0(self) -> bool {
        matches!(self, KernelType::Polynomial | KernelType::Sigmoid)
    }
}

/// A single sparse feature: `index:value`.
///
/// Feature indices are 1-based to stay compatible with the solver's model
/// file format. Instance length is carried by `Vec::len()`, so the reference
/// solver's `index = -1` terminator node has no counterpart here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmNode {
    /// 1-based feature index.
    pub index: i32,
    /// Feature value.
    pub value: f64,
}

/// A training problem: labelled sparse instances.
///
/// Built fresh from the caller's dense arrays for every training or
/// cross-validation call and dropped when the call returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SvmProblem {
    /// Class label or regression target per instance.
    pub labels: Vec<f64>,
    /// Sparse feature vectors, one per instance, indices ascending.
    pub instances: Vec<Vec<SvmNode>>,
}

impl SvmProblem {
    /// Number of instances.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the problem holds no instances.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Solver-facing SVM parameters.
///
/// Defaults match the reference solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SvmParameter {
    /// SVM formulation type.
    pub svm_type: SvmType,
    /// Kernel function type.
    pub kernel_type: KernelType,
    /// Degree for the polynomial kernel.
    pub degree: i32,
    /// γ for RBF, polynomial and sigmoid kernels. `0` means `1/num_features`.
    pub gamma: f64,
    /// Independent term in polynomial and sigmoid kernels.
    pub coef0: f64,
    /// Kernel cache memory budget in MB.
    pub cache_size: f64,
    /// Stopping tolerance of the solver.
    pub eps: f64,
    /// Cost parameter C (C-SVC, ε-SVR, ν-SVR).
    pub c: f64,
    /// Per-class C multipliers: `(class_label, weight)` pairs.
    pub weight: Vec<(i32, f64)>,
    /// ν parameter (ν-SVC, one-class, ν-SVR).
    pub nu: f64,
    /// ε of the ε-insensitive loss (ε-SVR).
    pub p: f64,
    /// Shrinking heuristic flag. Accepted for compatibility; the solver
    /// treats it as advisory.
    pub shrinking: bool,
    /// Whether to fit probability calibration during training.
    pub probability: bool,
}

impl Default for SvmParameter {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0, // resolved to 1/num_features at training time
            coef0: 0.0,
            cache_size: 100.0,
            eps: 0.001,
            c: 1.0,
            weight: Vec::new(),
            nu: 0.5,
            p: 0.1,
            shrinking: true,
            probability: false,
        }
    }
}

/// A trained SVM model.
///
/// Produced by `solver::train` or reconstructed by the model codec. Owned
/// Rust data throughout; dropping the value frees every nested allocation,
/// so no paired destructor discipline is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct SvmModel {
    /// Snapshot of the parameters the model was trained with.
    pub param: SvmParameter,
    /// Number of classes. 2 for binary classification and, by solver
    /// convention, also for regression and one-class models.
    pub nr_class: usize,
    /// Support vectors as sparse feature lists.
    pub sv: Vec<Vec<SvmNode>>,
    /// Dual coefficients: `(nr_class - 1)` rows of `sv.len()` columns.
    pub sv_coef: Vec<Vec<f64>>,
    /// Bias terms, one per class pair: `nr_class*(nr_class-1)/2` values.
    pub rho: Vec<f64>,
    /// Platt-scaling slope per class pair; empty without calibration.
    pub prob_a: Vec<f64>,
    /// Platt-scaling intercept per class pair; empty without calibration.
    pub prob_b: Vec<f64>,
    /// 1-based positions of the support vectors in the training set.
    /// Empty on models loaded from file (the format does not store them).
    pub sv_indices: Vec<usize>,
    /// Class labels in internal order; empty for regression and one-class.
    pub label: Vec<i32>,
    /// Support vector count per class; empty for regression and one-class.
    pub n_sv: Vec<usize>,
}

impl SvmModel {
    /// SVM formulation the model was trained for.
    pub fn svm_type(&self) -> SvmType {
        self.param.svm_type
    }

    /// Number of one-vs-one class pairs.
    pub fn n_pairs(&self) -> usize {
        self.nr_class * (self.nr_class - 1) / 2
    }

    /// Width of the decision-value buffer `predict_values` expects.
    pub fn n_decision_values(&self) -> usize {
        if self.svm_type().is_single_margin() {
            1
        } else {
            self.n_pairs()
        }
    }

    /// Whether the model carries Platt-scaling coefficients usable for
    /// class probability estimates.
    pub fn has_probability(&self) -> bool {
        self.svm_type().is_classification()
            && !self.prob_a.is_empty()
            && !self.prob_b.is_empty()
    }
}
