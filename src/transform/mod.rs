//! Transformation functions for proteomics abundance data
//!
//! Provides the variance-stabilizing normalization applied before imputation
//! and downstream modelling.

mod vsn;

pub use vsn::{normalize, VsnParams, VsnResult};
