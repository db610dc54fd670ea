//! Missing-value imputation for abundance matrices

mod knn;

pub use knn::{impute, ImputationReport, ImputeResult, KnnFallback, KnnParams, KnnWeighting};
