//! Data structures for biomarker discovery

mod abundance_matrix;
mod metadata;

pub use abundance_matrix::{AbundanceMatrix, SampleStatistic};
pub(crate) use abundance_matrix::median_in_place;
pub use metadata::{Covariate, FeatureMeta, SampleAnnotation};
pub(crate) use metadata::days_since_earliest;
