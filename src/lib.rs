//! rust_biomarker: biomarker discovery for quantitative proteomics
//!
//! A protein abundance matrix goes through variance-stabilizing
//! normalization and kNN imputation, clinical covariates are screened for
//! confounding, a compact feature panel is chosen by repeated cross-validated
//! recursive feature elimination with random forests, and the panel's genes
//! are tested for pathway over-representation.
//!
//! # Example
//!
//! ```ignore
//! use rust_biomarker::prelude::*;
//!
//! let matrix = read_abundance_matrix("proteins.tsv", true)?;
//! let annotation = read_annotation("samples.tsv")?;
//! let gene_sets = read_gene_sets("hallmark.gmt")?;
//!
//! let config = PipelineConfig {
//!     outcome: "diagnosis".to_string(),
//!     confounder_covariates: vec!["site".to_string(), "age".to_string()],
//!     ..PipelineConfig::default()
//! };
//! let report = run_pipeline(&matrix, &annotation, &gene_sets, None, &config)?;
//! println!("{:?}", report.selection.selected);
//! ```

pub mod cli;
pub mod confounder;
pub mod data;
pub mod enrichment;
pub mod error;
pub mod impute;
pub mod io;
pub mod pipeline;
pub mod regression;
pub mod rfe;
pub mod rng;
pub mod testing;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::confounder::{detect_confounders, ConfounderParams, ConfounderVerdict};
    pub use crate::data::{AbundanceMatrix, Covariate, FeatureMeta, SampleAnnotation, SampleStatistic};
    pub use crate::enrichment::{enrich, EnrichmentParams, EnrichmentResult, GeneSet, Similarity};
    pub use crate::error::{BiomarkerError, Result};
    pub use crate::impute::{impute, ImputeResult, KnnParams};
    pub use crate::io::{
        read_abundance_matrix, read_annotation, read_feature_mapping, read_gene_list,
        read_gene_sets, write_enrichment_table, write_json, write_matrix,
    };
    pub use crate::pipeline::{run_pipeline, PipelineConfig, PipelineReport};
    pub use crate::regression::{fit_covariates, RegressionFit};
    pub use crate::rfe::{
        cross_validate, select_features, ForestParams, Outcome, RfeParams, RfeResult,
    };
    pub use crate::testing::{benjamini_hochberg, Correction};
    pub use crate::transform::{normalize, VsnParams, VsnResult};
}
