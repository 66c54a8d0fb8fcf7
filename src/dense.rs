//! Dense-to-sparse sample conversion
//!
//! The solver consumes per-sample sparse node lists; callers hold dense
//! `ndarray` matrices. Conversion emits every column — including zeros —
//! with 1-based indices in column order, so the solver sees exactly the
//! dense row. Rank validation happens here, before anything is allocated
//! for the solver.

use ndarray::{ArrayView1, ArrayViewD, Ix1, Ix2};

use crate::core::{Result, SvmError, SvmNode, SvmProblem};

pub(crate) const SAMPLES_NOT_2D: &str = "Expect samples to be 2-D array.";
pub(crate) const LABELS_NOT_1D: &str = "Expect label or target values to be 1-D array.";
pub(crate) const LENGTH_MISMATCH: &str =
    "Expect to have the same number of samples for samples and labels.";

/// Convert a dense sample matrix into per-sample node lists.
///
/// Returns the lists along with `(n_samples, n_features)`. Non-contiguous
/// views are read in logical row-major order, so no copy is needed.
pub fn to_node_rows(samples: ArrayViewD<'_, f64>) -> Result<(Vec<Vec<SvmNode>>, usize, usize)> {
    let samples = samples
        .into_dimensionality::<Ix2>()
        .map_err(|_| SvmError::Dimension(SAMPLES_NOT_2D.into()))?;

    let n_samples = samples.nrows();
    let n_features = samples.ncols();

    let mut rows = Vec::with_capacity(n_samples);
    for row in samples.rows() {
        let mut nodes = Vec::with_capacity(n_features);
        fill_node_row(&mut nodes, row);
        rows.push(nodes);
    }

    Ok((rows, n_samples, n_features))
}

/// Fill `nodes` with one dense row, reusing its allocation.
///
/// Used by the batch prediction loops so that a single buffer serves the
/// whole batch.
pub fn fill_node_row(nodes: &mut Vec<SvmNode>, row: ArrayView1<'_, f64>) {
    nodes.clear();
    nodes.extend(row.iter().enumerate().map(|(j, &value)| SvmNode {
        index: j as i32 + 1,
        value,
    }));
}

/// Validate a label/target vector against the sample count and return it
/// as a plain `Vec`.
pub fn to_targets(labels: ArrayViewD<'_, f64>, n_samples: usize) -> Result<Vec<f64>> {
    let labels = labels
        .into_dimensionality::<Ix1>()
        .map_err(|_| SvmError::Dimension(LABELS_NOT_1D.into()))?;

    if labels.len() != n_samples {
        return Err(SvmError::SizeMismatch(LENGTH_MISMATCH.into()));
    }

    Ok(labels.iter().copied().collect())
}

/// Build the transient training problem from dense samples and labels.
pub fn to_problem(
    samples: ArrayViewD<'_, f64>,
    labels: ArrayViewD<'_, f64>,
) -> Result<SvmProblem> {
    let (instances, n_samples, _) = to_node_rows(samples)?;
    let labels = to_targets(labels, n_samples)?;
    Ok(SvmProblem { labels, instances })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_dense_rows_emit_every_column() {
        let x = array![[1.0, 0.0, 3.0], [0.0, 5.0, 0.0]].into_dyn();
        let (rows, n_samples, n_features) = to_node_rows(x.view()).unwrap();

        assert_eq!(n_samples, 2);
        assert_eq!(n_features, 3);
        assert_eq!(
            rows[0],
            vec![
                SvmNode { index: 1, value: 1.0 },
                SvmNode { index: 2, value: 0.0 },
                SvmNode { index: 3, value: 3.0 },
            ]
        );
        // Zeros are kept, indices stay 1-based and ascending
        assert_eq!(rows[1][0].value, 0.0);
        assert_eq!(rows[1][2].index, 3);
    }

    #[test]
    fn test_non_2d_samples_rejected() {
        let x3 = Array3::<f64>::zeros((3, 2, 2)).into_dyn();
        let err = to_node_rows(x3.view()).unwrap_err();
        assert!(matches!(err, SvmError::Dimension(_)));
        assert_eq!(err.to_string(), SAMPLES_NOT_2D);

        let x1 = array![1.0, 2.0].into_dyn();
        assert!(to_node_rows(x1.view()).is_err());
    }

    #[test]
    fn test_transposed_view_reads_logically() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let xt = x.t().into_dyn();
        let (rows, _, _) = to_node_rows(xt.view()).unwrap();
        // Transposed view: first row is the first column of x
        assert_eq!(rows[0][0].value, 1.0);
        assert_eq!(rows[0][1].value, 3.0);
    }

    #[test]
    fn test_fill_node_row_reuses_buffer() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let mut nodes = Vec::new();

        fill_node_row(&mut nodes, x.row(0));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].value, 2.0);

        fill_node_row(&mut nodes, x.row(1));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].value, 3.0);
        assert_eq!(nodes[0].index, 1);
    }

    #[test]
    fn test_targets_validation() {
        let y = array![1.0, -1.0, 1.0].into_dyn();
        assert_eq!(to_targets(y.view(), 3).unwrap(), vec![1.0, -1.0, 1.0]);

        let err = to_targets(y.view(), 5).unwrap_err();
        assert!(matches!(err, SvmError::SizeMismatch(_)));
        assert_eq!(err.to_string(), LENGTH_MISMATCH);

        let y2 = array![[1.0], [2.0]].into_dyn();
        let err = to_targets(y2.view(), 2).unwrap_err();
        assert_eq!(err.to_string(), LABELS_NOT_1D);
    }

    #[test]
    fn test_problem_assembly() {
        let x = array![[1.0, 2.0], [3.0, 4.0]].into_dyn();
        let y = array![1.0, -1.0].into_dyn();
        let prob = to_problem(x.view(), y.view()).unwrap();
        assert_eq!(prob.len(), 2);
        assert_eq!(prob.labels, vec![1.0, -1.0]);
        assert_eq!(prob.instances[1][1].value, 4.0);
    }
}
