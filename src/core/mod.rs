//! Core types and errors shared by the bridge and the solver

pub mod error;
pub mod types;

pub use self::error::*;
pub use self::types::*;
