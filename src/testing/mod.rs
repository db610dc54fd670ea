//! Statistical tests and multiple-testing correction for enrichment analysis

mod fdr;
mod hypergeometric;

pub use fdr::{benjamini_hochberg, bonferroni, Correction};
pub use hypergeometric::hypergeometric_upper_tail;
