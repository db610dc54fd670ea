//! Design matrix creation for covariate regression

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::data::{days_since_earliest, Covariate, SampleAnnotation};
use crate::error::{BiomarkerError, Result};

/// Relative residual norm below which a column counts as a linear
/// combination of the columns before it
const COLLINEARITY_TOL: f64 = 1e-7;

/// Information about the design matrix
#[derive(Debug, Clone)]
pub struct DesignInfo {
    /// Names of the coefficients, one per column
    pub coef_names: Vec<String>,
    /// Covariate each column belongs to (`None` for the intercept)
    pub column_covariates: Vec<Option<String>>,
    /// Reference level of each categorical covariate
    pub reference_levels: BTreeMap<String, String>,
    /// Categorical covariate to column indices mapping
    pub factor_columns: BTreeMap<String, Vec<usize>>,
    /// Numeric/date covariate to column index mapping
    pub continuous_columns: BTreeMap<String, usize>,
}

/// Create a treatment-coded design matrix `~ cov1 + cov2 + ...`
///
/// Column 0 is the intercept. A categorical covariate contributes one
/// indicator per non-reference level, named `{cov}_{level}_vs_{ref}`; the
/// reference is the first level in sorted order. Numeric covariates enter
/// as-is and dates as days since the earliest date.
pub fn create_design_matrix(
    annotation: &SampleAnnotation,
    covariates: &[&str],
) -> Result<(Array2<f64>, DesignInfo)> {
    let n_samples = annotation.n_samples();
    if n_samples == 0 {
        return Err(BiomarkerError::EmptyData {
            reason: "annotation has no samples".to_string(),
        });
    }

    let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n_samples]];
    let mut info = DesignInfo {
        coef_names: vec!["Intercept".to_string()],
        column_covariates: vec![None],
        reference_levels: BTreeMap::new(),
        factor_columns: BTreeMap::new(),
        continuous_columns: BTreeMap::new(),
    };

    for &name in covariates {
        if info.column_covariates.iter().any(|c| c.as_deref() == Some(name)) {
            return Err(BiomarkerError::validation(format!(
                "covariate '{}' listed twice in the model",
                name
            )));
        }

        let covariate = annotation.require(name)?;
        match covariate {
            Covariate::Categorical(values) => {
                let levels = covariate.levels().unwrap_or_default();
                let reference = levels[0].clone();
                let mut col_indices = Vec::new();
                for level in levels.iter().skip(1) {
                    col_indices.push(columns.len());
                    columns.push(
                        values
                            .iter()
                            .map(|v| if v == level { 1.0 } else { 0.0 })
                            .collect(),
                    );
                    info.coef_names
                        .push(format!("{}_{}_vs_{}", name, level, reference));
                    info.column_covariates.push(Some(name.to_string()));
                }
                info.factor_columns.insert(name.to_string(), col_indices);
                info.reference_levels.insert(name.to_string(), reference);
            }
            Covariate::Numeric(values) => {
                info.continuous_columns.insert(name.to_string(), columns.len());
                columns.push(values.clone());
                info.coef_names.push(name.to_string());
                info.column_covariates.push(Some(name.to_string()));
            }
            Covariate::Date(values) => {
                info.continuous_columns.insert(name.to_string(), columns.len());
                columns.push(days_since_earliest(values));
                info.coef_names.push(name.to_string());
                info.column_covariates.push(Some(name.to_string()));
            }
        }
    }

    let mut design = Array2::zeros((n_samples, columns.len()));
    for (j, col) in columns.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            design[[i, j]] = v;
        }
    }

    Ok((design, info))
}

/// Flag the columns that can be estimated, scanning left to right
///
/// A column whose residual after projecting out the earlier estimable columns
/// is negligible is a linear combination of them and gets `false`; columns of
/// zeros are never estimable. Uses modified Gram-Schmidt with one
/// re-orthogonalization pass.
pub fn estimable_columns(design: &Array2<f64>) -> Vec<bool> {
    let nrow = design.nrows();
    let mut basis: Vec<Vec<f64>> = Vec::new();
    let mut estimable = Vec::with_capacity(design.ncols());

    for col in design.columns() {
        let original_norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
        if original_norm == 0.0 || nrow == 0 {
            estimable.push(false);
            continue;
        }

        let mut r: Vec<f64> = col.to_vec();
        for _ in 0..2 {
            for q in &basis {
                let dot: f64 = q.iter().zip(r.iter()).map(|(a, b)| a * b).sum();
                for (ri, qi) in r.iter_mut().zip(q.iter()) {
                    *ri -= dot * qi;
                }
            }
        }

        let norm = r.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm <= COLLINEARITY_TOL * original_norm {
            estimable.push(false);
        } else {
            basis.push(r.into_iter().map(|v| v / norm).collect());
            estimable.push(true);
        }
    }

    estimable
}
