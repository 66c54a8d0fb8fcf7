//! Error types for the SVM bridge

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SvmError {
    /// An input array does not have the rank an operation requires.
    #[error("{0}")]
    Dimension(String),

    /// The sample matrix and the label vector disagree on the sample count.
    #[error("{0}")]
    SizeMismatch(String),

    /// The solver's parameter check rejected the configuration. The payload
    /// is the solver's rejection reason, verbatim.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to load model file: {}", .0.display())]
    ModelLoad(PathBuf),

    #[error("Failed to save model file: {}", .0.display())]
    ModelSave(PathBuf),
}

pub type Result<T> = std::result::Result<T, SvmError>;
