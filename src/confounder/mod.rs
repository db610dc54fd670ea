//! Confounder detection by coefficient comparison
//!
//! For every candidate covariate the outcome is regressed on that covariate
//! alone (solo fit) and on all candidates together (full fit). Coefficients
//! are joined by level name; a covariate whose solo estimate moves by more
//! than the threshold once the others are adjusted for is reported as a
//! confounder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::SampleAnnotation;
use crate::error::{BiomarkerError, Result};
use crate::regression::fit_covariates;

/// Parameters for confounder detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfounderParams {
    /// Relative change (percent) above which a covariate is flagged
    pub threshold: f64,
}

impl Default for ConfounderParams {
    fn default() -> Self {
        Self { threshold: 10.0 }
    }
}

/// Solo vs. full estimate of one coefficient
#[derive(Debug, Clone, Serialize)]
pub struct LevelComparison {
    /// Coefficient name (e.g. `site_B_vs_A`)
    pub name: String,
    pub solo_estimate: Option<f64>,
    pub full_estimate: Option<f64>,
    /// Percent change; `None` when the level is not estimable in the solo fit
    pub relative_change: Option<f64>,
}

/// Verdict for one covariate
#[derive(Debug, Clone, Serialize)]
pub struct ConfounderVerdict {
    pub is_confounder: bool,
    /// Largest relative change over compared levels (0 when none compared)
    pub max_relative_change: f64,
    /// Number of levels with a solo estimate
    pub compared_levels: usize,
    pub levels: Vec<LevelComparison>,
}

/// Flag covariates whose effect estimate changes when adjusted for the others
///
/// Returns one verdict per covariate, keyed by name.
pub fn detect_confounders(
    outcome: &[f64],
    covariates: &[&str],
    annotation: &SampleAnnotation,
    params: &ConfounderParams,
) -> Result<BTreeMap<String, ConfounderVerdict>> {
    if covariates.is_empty() {
        return Err(BiomarkerError::validation("no covariates given for confounder detection"));
    }
    if outcome.len() != annotation.n_samples() {
        return Err(BiomarkerError::validation(format!(
            "outcome has {} values but the annotation has {} samples",
            outcome.len(),
            annotation.n_samples()
        )));
    }
    if let Some(i) = outcome.iter().position(|v| !v.is_finite()) {
        return Err(BiomarkerError::validation(format!(
            "outcome value for sample '{}' is not finite",
            annotation.sample_ids()[i]
        )));
    }
    for &name in covariates {
        if annotation.require(name)?.is_constant() {
            return Err(BiomarkerError::degenerate(format!(
                "covariate '{}' has no variation across samples",
                name
            )));
        }
    }

    let full = fit_covariates(outcome, annotation, covariates)?;

    let mut verdicts = BTreeMap::new();
    for &name in covariates {
        let solo = fit_covariates(outcome, annotation, &[name])?;

        let levels: Vec<LevelComparison> = solo
            .coefficients_for(name)
            .map(|coef| {
                let full_estimate = full.coefficient(&coef.name).and_then(|c| c.estimate);
                LevelComparison {
                    name: coef.name.clone(),
                    solo_estimate: coef.estimate,
                    full_estimate,
                    relative_change: coef.estimate.map(|s| relative_change(s, full_estimate)),
                }
            })
            .collect();

        let changes: Vec<f64> = levels.iter().filter_map(|l| l.relative_change).collect();
        let max_relative_change = changes.iter().cloned().fold(0.0, f64::max);
        let is_confounder = changes.iter().any(|&c| c > params.threshold);

        if is_confounder {
            log::info!(
                "Covariate '{}' flagged as confounder (max change {:.1}%)",
                name,
                max_relative_change
            );
        }

        verdicts.insert(
            name.to_string(),
            ConfounderVerdict {
                is_confounder,
                max_relative_change,
                compared_levels: changes.len(),
                levels,
            },
        );
    }

    Ok(verdicts)
}

/// Percent change from the solo to the full estimate
///
/// A level lost in the full fit, or a zero solo estimate that becomes
/// non-zero, counts as an infinite change.
fn relative_change(solo: f64, full: Option<f64>) -> f64 {
    match full {
        None => f64::INFINITY,
        Some(f) if solo == 0.0 => {
            if f == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        }
        Some(f) => (solo - f).abs() / solo.abs() * 100.0,
    }
}
