//! P-value adjustment methods for multiple testing correction
//!
//! - Benjamini-Hochberg (BH) false discovery rate control
//! - Bonferroni family-wise error rate control
//!
//! NaN p-values (untested hypotheses) stay NaN and do not count towards the
//! number of tests.

use serde::{Deserialize, Serialize};

/// Multiple-testing correction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correction {
    /// Benjamini-Hochberg step-up FDR
    #[default]
    #[serde(alias = "bh", alias = "fdr")]
    BenjaminiHochberg,
    Bonferroni,
}

impl Correction {
    /// Adjust a vector of p-values, preserving input order
    pub fn apply(self, pvalues: &[f64]) -> Vec<f64> {
        match self {
            Correction::BenjaminiHochberg => benjamini_hochberg(pvalues),
            Correction::Bonferroni => bonferroni(pvalues),
        }
    }
}

/// Apply Benjamini-Hochberg FDR correction to p-values
///
/// Returns adjusted p-values (q-values) that control the false discovery rate.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    // Sort indices by p-value, NaN last
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        let pa = pvalues[a];
        let pb = pvalues[b];
        match (pa.is_nan(), pb.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => pa.total_cmp(&pb),
        }
    });

    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    // Step-up pass from the largest p-value, enforcing monotonicity
    let mut padj = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;
    let mut rank = m;

    for &i in indices.iter().rev() {
        let p = pvalues[i];
        if p.is_finite() {
            let adj = (p * m as f64 / rank as f64).min(1.0);
            cummin = cummin.min(adj);
            padj[i] = cummin;
            rank -= 1;
        }
    }

    padj
}

/// Apply Bonferroni correction to p-values
///
/// Multiplies each p-value by the number of tests, capped at 1.
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; pvalues.len()];
    }
    pvalues
        .iter()
        .map(|&p| {
            if p.is_nan() {
                f64::NAN
            } else {
                (p * m as f64).min(1.0)
            }
        })
        .collect()
}
