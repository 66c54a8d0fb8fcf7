//! Dense-array bridge for training and querying SVM models
//!
//! Callers hold dense `ndarray` sample matrices; the solver wants sparse
//! per-sample node lists, a parameter struct, and gives back an opaque
//! model. This crate does the conversions in both directions and
//! orchestrates training, cross-validation, prediction, decision scoring,
//! probability estimation, and the solver-format model files.

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod dense;
pub mod kernel;
pub mod model;
pub mod solver;

// Re-export the call surface and the record types
pub use crate::api::{
    cross_validate, decision_function, load_model, predict, predict_proba, save_model, train,
    DecisionValues,
};
pub use crate::config::SvmConfig;
pub use crate::core::{KernelType, Result, SvmError, SvmNode, SvmType};
pub use crate::model::ModelRecord;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
