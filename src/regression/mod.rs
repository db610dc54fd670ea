//! Linear regression on sample covariates
//!
//! Treatment-coded design matrices and ordinary least squares with explicit
//! estimability flags, used by the confounder detector.

mod design;
mod ols;

pub use design::{create_design_matrix, estimable_columns, DesignInfo};
pub use ols::{fit_covariates, fit_ols, Coefficient, RegressionFit};
