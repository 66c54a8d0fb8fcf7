//! Caller-facing hyperparameter record
//!
//! [`SvmConfig`] is the flat named-field record callers build and pass to
//! every operation. It is serde-serializable: missing fields take the
//! solver defaults, unknown fields are ignored, and a wrongly-typed field
//! fails deserialization. Range checking is not done here — it is
//! delegated to the solver's parameter check so that its rejection reason
//! can be surfaced verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{KernelType, SvmParameter, SvmType};

/// SVM hyperparameters as a flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    /// SVM formulation type.
    pub svm_type: SvmType,
    /// Kernel function type.
    pub kernel_type: KernelType,
    /// Degree of the polynomial kernel.
    pub degree: i32,
    /// γ for RBF, polynomial and sigmoid kernels. `0` means `1/num_features`.
    pub gamma: f64,
    /// Independent term in polynomial and sigmoid kernels.
    pub coef0: f64,
    /// Cost parameter C.
    pub cost: f64,
    /// Stopping tolerance of the solver.
    pub eps: f64,
    /// Kernel cache memory budget in MB.
    pub cache_size: f64,
    /// Shrinking heuristic flag, kept for solver compatibility.
    pub shrinking: bool,
    /// Whether training also fits probability calibration.
    pub probability: bool,
    /// ν parameter (ν-SVC, one-class, ν-SVR).
    pub nu: f64,
    /// ε of the ε-insensitive loss (ε-SVR).
    pub p: f64,
    /// Per-class weight multipliers on C, keyed by class label.
    pub class_weight: BTreeMap<i32, f64>,
    /// Forward solver diagnostics to the log facade instead of dropping
    /// them.
    pub verbose: bool,
    /// Seed for the cross-validation fold shuffle.
    pub random_seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        let param = SvmParameter::default();
        Self {
            svm_type: param.svm_type,
            kernel_type: param.kernel_type,
            degree: param.degree,
            gamma: param.gamma,
            coef0: param.coef0,
            cost: param.c,
            eps: param.eps,
            cache_size: param.cache_size,
            shrinking: param.shrinking,
            probability: param.probability,
            nu: param.nu,
            p: param.p,
            class_weight: BTreeMap::new(),
            verbose: false,
            random_seed: 1,
        }
    }
}

impl SvmConfig {
    /// Decode the record into the solver's parameter struct.
    pub fn to_parameter(&self) -> SvmParameter {
        SvmParameter {
            svm_type: self.svm_type,
            kernel_type: self.kernel_type,
            degree: self.degree,
            gamma: self.gamma,
            coef0: self.coef0,
            cache_size: self.cache_size,
            eps: self.eps,
            c: self.cost,
            weight: self
                .class_weight
                .iter()
                .map(|(&label, &w)| (label, w))
                .collect(),
            nu: self.nu,
            p: self.p,
            shrinking: self.shrinking,
            probability: self.probability,
        }
    }

    /// Encode a solver parameter struct back into a record, used when
    /// returning a loaded model's parameters to the caller.
    pub fn from_parameter(param: &SvmParameter) -> Self {
        Self {
            svm_type: param.svm_type,
            kernel_type: param.kernel_type,
            degree: param.degree,
            gamma: param.gamma,
            coef0: param.coef0,
            cost: param.c,
            eps: param.eps,
            cache_size: param.cache_size,
            shrinking: param.shrinking,
            probability: param.probability,
            nu: param.nu,
            p: param.p,
            class_weight: param.weight.iter().copied().collect(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_track_solver_defaults() {
        let config = SvmConfig::default();
        let param = SvmParameter::default();
        assert_eq!(config.to_parameter(), param);
        assert!(!config.verbose);
        assert_eq!(config.random_seed, 1);
    }

    #[test]
    fn test_parameter_roundtrip() {
        let config = SvmConfig {
            svm_type: SvmType::NuSvr,
            kernel_type: KernelType::Sigmoid,
            degree: 5,
            gamma: 0.25,
            coef0: 1.5,
            cost: 10.0,
            nu: 0.3,
            class_weight: [(1, 2.0), (-1, 0.5)].into_iter().collect(),
            ..Default::default()
        };
        let back = SvmConfig::from_parameter(&config.to_parameter());
        assert_eq!(back.svm_type, config.svm_type);
        assert_eq!(back.kernel_type, config.kernel_type);
        assert_eq!(back.gamma, config.gamma);
        assert_eq!(back.cost, config.cost);
        assert_eq!(back.nu, config.nu);
        assert_eq!(back.class_weight, config.class_weight);
    }

    #[test]
    fn test_serde_defaults_and_unknown_keys() {
        // Missing keys take defaults, unknown keys are ignored
        let config: SvmConfig =
            serde_json::from_str(r#"{"cost": 4.0, "not_a_real_option": true}"#).unwrap();
        assert_eq!(config.cost, 4.0);
        assert_eq!(config.svm_type, SvmType::CSvc);
        assert_eq!(config.eps, 0.001);
    }

    #[test]
    fn test_serde_rejects_wrong_types() {
        // A wrongly-typed field is a deserialization error, not a silent default
        assert!(serde_json::from_str::<SvmConfig>(r#"{"cost": "high"}"#).is_err());
        assert!(serde_json::from_str::<SvmConfig>(r#"{"svm_type": 3}"#).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = SvmConfig {
            svm_type: SvmType::EpsilonSvr,
            gamma: 0.1,
            p: 0.05,
            verbose: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SvmConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
