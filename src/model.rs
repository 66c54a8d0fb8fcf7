//! Portable trained-model representation
//!
//! [`ModelRecord`] mirrors the solver's model struct field-for-field in a
//! serde-friendly shape, so a trained model can be stored, shipped across
//! a process boundary, and reconstructed without loss. The text-file
//! surface delegates to the solver's own reader and writer.

use serde::{Deserialize, Serialize};

use crate::core::{KernelType, SvmModel, SvmNode, SvmParameter, SvmType};

/// Serializable snapshot of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// SVM formulation the model was trained for.
    pub svm_type: SvmType,
    /// Kernel function type.
    pub kernel_type: KernelType,
    /// Degree of the polynomial kernel.
    pub degree: i32,
    /// Effective γ the model was trained with.
    pub gamma: f64,
    /// Independent kernel term.
    pub coef0: f64,
    /// Number of classes.
    pub nr_class: usize,
    /// Total support vector count.
    pub l: usize,
    /// Support vectors as sparse node lists.
    pub sv: Vec<Vec<SvmNode>>,
    /// Dual coefficients, `(nr_class - 1) × l`.
    pub sv_coef: Vec<Vec<f64>>,
    /// Bias terms per class pair.
    pub rho: Vec<f64>,
    /// Platt-scaling slopes; empty without calibration.
    #[serde(default)]
    pub prob_a: Vec<f64>,
    /// Platt-scaling intercepts; empty without calibration.
    #[serde(default)]
    pub prob_b: Vec<f64>,
    /// 1-based training-set positions of the support vectors.
    #[serde(default)]
    pub sv_indices: Vec<usize>,
    /// Class labels in internal order.
    #[serde(default)]
    pub label: Vec<i32>,
    /// Support vector count per class.
    #[serde(default)]
    pub n_sv: Vec<usize>,
}

/// Snapshot a trained model into its portable representation.
pub fn encode(model: &SvmModel) -> ModelRecord {
    ModelRecord {
        svm_type: model.param.svm_type,
        kernel_type: model.param.kernel_type,
        degree: model.param.degree,
        gamma: model.param.gamma,
        coef0: model.param.coef0,
        nr_class: model.nr_class,
        l: model.sv.len(),
        sv: model.sv.clone(),
        sv_coef: model.sv_coef.clone(),
        rho: model.rho.clone(),
        prob_a: model.prob_a.clone(),
        prob_b: model.prob_b.clone(),
        sv_indices: model.sv_indices.clone(),
        label: model.label.clone(),
        n_sv: model.n_sv.clone(),
    }
}

/// Reconstruct a solver model from its portable representation.
///
/// The embedded kernel fields seed the parameter snapshot; everything the
/// record does not carry keeps the solver defaults. Callers that hold a
/// fresh [`crate::SvmConfig`] overwrite the snapshot afterwards, mirroring
/// the reference system's `model.param = *param` assignment.
pub fn decode(record: &ModelRecord) -> SvmModel {
    let param = SvmParameter {
        svm_type: record.svm_type,
        kernel_type: record.kernel_type,
        degree: record.degree,
        gamma: record.gamma,
        coef0: record.coef0,
        ..Default::default()
    };

    SvmModel {
        param,
        nr_class: record.nr_class,
        sv: record.sv.clone(),
        sv_coef: record.sv_coef.clone(),
        rho: record.rho.clone(),
        prob_a: record.prob_a.clone(),
        prob_b: record.prob_b.clone(),
        sv_indices: record.sv_indices.clone(),
        label: record.label.clone(),
        n_sv: record.n_sv.clone(),
    }
}
