//! Training, cross-validation and inference entry points
//!
//! Every operation is a stateless call: validate the dense inputs, build
//! the transient solver structures, invoke the solver, shape the output.
//! All intermediate buffers are owned locals, so they are released on
//! every exit path, including validation failures.
//!
//! # Quick start
//!
//! ```rust
//! use ndarray::array;
//! use ndsvm::{train, predict, SvmConfig, KernelType};
//!
//! # fn main() -> Result<(), ndsvm::SvmError> {
//! let x = array![[2.0, 2.0], [1.5, 1.8], [-2.0, -2.1], [-1.6, -1.8]].into_dyn();
//! let y = array![1.0, 1.0, -1.0, -1.0].into_dyn();
//!
//! let config = SvmConfig {
//!     kernel_type: KernelType::Linear,
//!     ..Default::default()
//! };
//! let model = train(x.view(), y.view(), &config)?;
//! let labels = predict(x.view(), &config, &model)?;
//! assert_eq!(labels.len(), 4);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use ndarray::{Array1, Array2, ArrayViewD, Ix2};

use crate::config::SvmConfig;
use crate::core::{Result, SvmError, SvmModel};
use crate::dense;
use crate::model::{self, ModelRecord};
use crate::solver;

/// Raw decision values, shaped by the SVM variant.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionValues {
    /// One margin per sample: one-class and regression models.
    Margin(Array1<f64>),
    /// `nr_class*(nr_class-1)/2` pairwise margins per sample:
    /// classification models.
    Pairwise(Array2<f64>),
}

fn log_sink(msg: &str) {
    log::debug!(target: "ndsvm::solver", "{}", msg.trim_end());
}

fn null_sink(_msg: &str) {}

/// (Re)install the solver's diagnostic sink. The solver may be used by
/// other callers between our calls, so this runs before every operation
/// that can produce output.
fn install_print_sink(config: &SvmConfig) {
    if config.verbose {
        solver::set_print_fn(log_sink);
    } else {
        solver::set_print_fn(null_sink);
    }
}

/// Rebuild a solver model from a record and apply the caller's
/// configuration onto it, mirroring the reference system's
/// `model.param = *param` before inference. A `gamma` of zero falls back
/// to the value the model was trained with.
fn decode_with_config(record: &ModelRecord, config: &SvmConfig) -> SvmModel {
    let mut model = model::decode(record);
    let mut param = config.to_parameter();
    if param.gamma == 0.0 {
        param.gamma = record.gamma;
    }
    model.param = param;
    model
}

/// Train an SVM model on dense samples and labels.
///
/// `samples` must be 2-D `(n_samples, n_features)` and `labels` 1-D of
/// matching length. The configuration is checked by the solver before any
/// training work starts.
pub fn train(
    samples: ArrayViewD<'_, f64>,
    labels: ArrayViewD<'_, f64>,
    config: &SvmConfig,
) -> Result<ModelRecord> {
    let problem = dense::to_problem(samples, labels)?;
    let param = config.to_parameter();
    solver::check_parameter(&problem, &param).map_err(SvmError::InvalidParameter)?;

    install_print_sink(config);
    let trained = solver::train(&problem, &param);
    Ok(model::encode(&trained))
}

/// k-fold cross-validation.
///
/// Returns the held-out prediction per sample as a plain dense vector of
/// length `n_samples`.
pub fn cross_validate(
    samples: ArrayViewD<'_, f64>,
    labels: ArrayViewD<'_, f64>,
    config: &SvmConfig,
    n_folds: usize,
) -> Result<Array1<f64>> {
    let problem = dense::to_problem(samples, labels)?;
    let param = config.to_parameter();
    solver::check_parameter(&problem, &param).map_err(SvmError::InvalidParameter)?;

    install_print_sink(config);
    let target =
        solver::cross_validation::cross_validate(&problem, &param, n_folds, config.random_seed);
    Ok(Array1::from(target))
}

/// Predict class labels or regression values.
///
/// Output shape is `(n_samples,)` for every SVM variant.
pub fn predict(
    samples: ArrayViewD<'_, f64>,
    config: &SvmConfig,
    record: &ModelRecord,
) -> Result<Array1<f64>> {
    let samples = samples
        .into_dimensionality::<Ix2>()
        .map_err(|_| SvmError::Dimension(dense::SAMPLES_NOT_2D.into()))?;
    let model = decode_with_config(record, config);

    let mut out = Array1::zeros(samples.nrows());
    let mut nodes = Vec::with_capacity(samples.ncols());
    for (i, row) in samples.rows().into_iter().enumerate() {
        dense::fill_node_row(&mut nodes, row);
        out[i] = solver::predict::predict(&model, &nodes);
    }
    Ok(out)
}

/// Compute raw decision values.
///
/// One-class and regression models yield [`DecisionValues::Margin`] of
/// length `n_samples`; classification models yield
/// [`DecisionValues::Pairwise`] of shape
/// `(n_samples, nr_class*(nr_class-1)/2)`.
pub fn decision_function(
    samples: ArrayViewD<'_, f64>,
    config: &SvmConfig,
    record: &ModelRecord,
) -> Result<DecisionValues> {
    let samples = samples
        .into_dimensionality::<Ix2>()
        .map_err(|_| SvmError::Dimension(dense::SAMPLES_NOT_2D.into()))?;
    let model = decode_with_config(record, config);

    let n_samples = samples.nrows();
    let mut nodes = Vec::with_capacity(samples.ncols());

    if model.svm_type().is_single_margin() {
        let mut out = Array1::zeros(n_samples);
        let mut scratch = [0.0];
        for (i, row) in samples.rows().into_iter().enumerate() {
            dense::fill_node_row(&mut nodes, row);
            solver::predict::predict_values(&model, &nodes, &mut scratch);
            out[i] = scratch[0];
        }
        Ok(DecisionValues::Margin(out))
    } else {
        let width = model.n_pairs();
        let mut out = Array2::zeros((n_samples, width));
        let mut scratch = vec![0.0; width];
        for (i, row) in samples.rows().into_iter().enumerate() {
            dense::fill_node_row(&mut nodes, row);
            solver::predict::predict_values(&model, &nodes, &mut scratch);
            for (slot, &v) in out.row_mut(i).iter_mut().zip(scratch.iter()) {
                *slot = v;
            }
        }
        Ok(DecisionValues::Pairwise(out))
    }
}

/// Predict calibrated class probabilities.
///
/// Returns `Some` with shape `(n_samples, nr_class)` for classification
/// models that carry calibration coefficients, `None` for every other
/// model — an absent result, not an error.
pub fn predict_proba(
    samples: ArrayViewD<'_, f64>,
    config: &SvmConfig,
    record: &ModelRecord,
) -> Result<Option<Array2<f64>>> {
    let samples = samples
        .into_dimensionality::<Ix2>()
        .map_err(|_| SvmError::Dimension(dense::SAMPLES_NOT_2D.into()))?;
    let model = decode_with_config(record, config);

    if !model.has_probability() {
        return Ok(None);
    }

    let nr_class = model.nr_class;
    let mut out = Array2::zeros((samples.nrows(), nr_class));
    let mut nodes = Vec::with_capacity(samples.ncols());
    for (i, row) in samples.rows().into_iter().enumerate() {
        dense::fill_node_row(&mut nodes, row);
        let (_, probs) = solver::predict::predict_probability(&model, &nodes)
            .expect("calibrated model yields probabilities");
        for (slot, &p) in out.row_mut(i).iter_mut().zip(probs.iter()) {
            *slot = p;
        }
    }
    Ok(Some(out))
}

/// Load parameters and model from a solver-format text file.
pub fn load_model(path: impl AsRef<Path>) -> Result<(SvmConfig, ModelRecord)> {
    let path = path.as_ref();
    let model = solver::io::load_model(path)
        .ok_or_else(|| SvmError::ModelLoad(path.to_path_buf()))?;
    Ok((SvmConfig::from_parameter(&model.param), model::encode(&model)))
}

/// Save parameters and model as a solver-format text file.
///
/// The caller's configuration is applied onto the model before writing,
/// since the format embeds the parameter fields.
pub fn save_model(
    path: impl AsRef<Path>,
    config: &SvmConfig,
    record: &ModelRecord,
) -> Result<()> {
    let path = path.as_ref();
    let model = decode_with_config(record, config);
    if solver::io::save_model(path, &model) {
        Ok(())
    } else {
        Err(SvmError::ModelSave(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SvmType};
    use ndarray::{array, Array3, ArrayD};

    fn blobs() -> (ArrayD<f64>, ArrayD<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for k in 0..8 {
            let off = 0.05 * k as f64;
            rows.push([2.0 + off, 2.0 - off]);
            labels.push(1.0);
            rows.push([-2.0 - off, -2.0 + off]);
            labels.push(-1.0);
        }
        let n = rows.len();
        let x = Array2::from_shape_vec((n, 2), rows.concat()).unwrap();
        (x.into_dyn(), Array1::from(labels).into_dyn())
    }

    fn linear_config() -> SvmConfig {
        SvmConfig {
            kernel_type: KernelType::Linear,
            ..Default::default()
        }
    }

    #[test]
    fn test_train_predict_shapes_and_accuracy() {
        let (x, y) = blobs();
        let config = linear_config();
        let record = train(x.view(), y.view(), &config).unwrap();
        assert_eq!(record.nr_class, 2);
        assert_eq!(record.l, record.sv.len());

        let preds = predict(x.view(), &config, &record).unwrap();
        assert_eq!(preds.len(), 16);
        let correct = preds
            .iter()
            .zip(y.iter())
            .filter(|(p, want)| p == want)
            .count();
        assert_eq!(correct, 16);
    }

    #[test]
    fn test_dimension_errors_name_the_offending_array() {
        let (x, y) = blobs();
        let config = linear_config();
        let x3 = Array3::<f64>::zeros((3, 2, 2)).into_dyn();

        let err = train(x3.view(), y.view(), &config).unwrap_err();
        assert_eq!(err.to_string(), "Expect samples to be 2-D array.");

        let err = train(x.view(), x.view(), &config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expect label or target values to be 1-D array."
        );
    }

    #[test]
    fn test_size_mismatch() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]].into_dyn();
        let y = array![1.0, -1.0, 1.0].into_dyn();
        let config = linear_config();

        let err = train(x.view(), y.view(), &config).unwrap_err();
        assert!(matches!(err, SvmError::SizeMismatch(_)));
        assert_eq!(
            err.to_string(),
            "Expect to have the same number of samples for samples and labels."
        );

        let err = cross_validate(x.view(), y.view(), &config, 3).unwrap_err();
        assert!(matches!(err, SvmError::SizeMismatch(_)));
    }

    #[test]
    fn test_invalid_parameter_surfaces_solver_reason() {
        let (x, y) = blobs();
        let config = SvmConfig {
            gamma: -100.0,
            ..Default::default()
        };

        let err = train(x.view(), y.view(), &config).unwrap_err();
        assert!(matches!(err, SvmError::InvalidParameter(_)));
        assert_eq!(err.to_string(), "Invalid parameter: gamma < 0");

        let err = cross_validate(x.view(), y.view(), &config, 3).unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter: gamma < 0");
    }

    #[test]
    fn test_decision_function_binary_is_single_pair() {
        let (x, y) = blobs();
        let config = linear_config();
        let record = train(x.view(), y.view(), &config).unwrap();

        match decision_function(x.view(), &config, &record).unwrap() {
            DecisionValues::Pairwise(values) => {
                assert_eq!(values.shape(), &[16, 1]);
                // Positive class first: its samples get positive margins
                assert!(values[[0, 0]] > 0.0);
                assert!(values[[1, 0]] < 0.0);
            }
            other => panic!("expected pairwise values, got {:?}", other),
        }
    }

    #[test]
    fn test_decision_function_regression_is_flat() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]].into_dyn();
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0].into_dyn();
        let config = SvmConfig {
            svm_type: SvmType::EpsilonSvr,
            kernel_type: KernelType::Linear,
            cost: 10.0,
            p: 0.01,
            ..Default::default()
        };
        let record = train(x.view(), y.view(), &config).unwrap();

        match decision_function(x.view(), &config, &record).unwrap() {
            DecisionValues::Margin(values) => assert_eq!(values.len(), 6),
            other => panic!("expected single margins, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_proba_absent_without_calibration() {
        let (x, y) = blobs();
        let config = linear_config();
        let record = train(x.view(), y.view(), &config).unwrap();
        assert!(predict_proba(x.view(), &config, &record)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_model_file_errors_name_the_path() {
        let err = load_model("/no/such/dir/model.txt").unwrap_err();
        assert!(matches!(err, SvmError::ModelLoad(_)));
        assert!(err.to_string().contains("/no/such/dir/model.txt"));

        let (x, y) = blobs();
        let config = linear_config();
        let record = train(x.view(), y.view(), &config).unwrap();
        let err = save_model("/no/such/dir/model.txt", &config, &record).unwrap_err();
        assert!(matches!(err, SvmError::ModelSave(_)));
        assert!(err.to_string().contains("/no/such/dir/model.txt"));
    }
}
