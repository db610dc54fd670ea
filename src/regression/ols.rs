//! Ordinary least squares with estimability flags

use ndarray::{Array2, Axis};
use serde::Serialize;

use super::design::{create_design_matrix, estimable_columns, DesignInfo};
use crate::data::SampleAnnotation;
use crate::error::{BiomarkerError, Result};

/// One fitted coefficient
#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    /// Coefficient name (`Intercept`, `age`, `site_B_vs_A`, ...)
    pub name: String,
    /// Covariate the coefficient belongs to (`None` for the intercept)
    pub covariate: Option<String>,
    /// Estimate, `None` when the column is not estimable
    pub estimate: Option<f64>,
    /// Standard error (NaN without residual degrees of freedom)
    pub std_error: Option<f64>,
}

impl Coefficient {
    pub fn is_estimable(&self) -> bool {
        self.estimate.is_some()
    }
}

/// Result of an OLS fit
#[derive(Debug, Clone, Serialize)]
pub struct RegressionFit {
    pub coefficients: Vec<Coefficient>,
    /// n - rank
    pub df_residual: usize,
    /// Residual standard deviation (NaN when df_residual is 0)
    pub sigma: f64,
    pub n_obs: usize,
}

impl RegressionFit {
    /// Coefficient lookup by name
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Coefficients belonging to one covariate, in design order
    pub fn coefficients_for<'a>(&'a self, covariate: &'a str) -> impl Iterator<Item = &'a Coefficient> + 'a {
        self.coefficients
            .iter()
            .filter(move |c| c.covariate.as_deref() == Some(covariate))
    }

    /// Rank of the design matrix
    pub fn rank(&self) -> usize {
        self.coefficients.iter().filter(|c| c.is_estimable()).count()
    }
}

/// Fit `y ~ covariates` by OLS on a treatment-coded design
pub fn fit_covariates(y: &[f64], annotation: &SampleAnnotation, covariates: &[&str]) -> Result<RegressionFit> {
    let (design, info) = create_design_matrix(annotation, covariates)?;
    fit_ols(&design, &info, y)
}

/// Fit OLS on a design matrix
///
/// Columns that are linear combinations of earlier columns are reported as
/// non-estimable (`estimate = None`) and dropped from the solve; the
/// remaining columns are fitted by the normal equations.
pub fn fit_ols(design: &Array2<f64>, info: &DesignInfo, y: &[f64]) -> Result<RegressionFit> {
    let n = design.nrows();
    if y.len() != n {
        return Err(BiomarkerError::DimensionMismatch {
            expected: format!("{} outcome values", n),
            got: format!("{} outcome values", y.len()),
        });
    }
    if info.coef_names.len() != design.ncols() {
        return Err(BiomarkerError::DimensionMismatch {
            expected: format!("{} coefficient names", design.ncols()),
            got: format!("{} coefficient names", info.coef_names.len()),
        });
    }

    let estimable = estimable_columns(design);
    let kept: Vec<usize> = (0..design.ncols()).filter(|&j| estimable[j]).collect();
    let x = design.select(Axis(1), &kept);
    let p = kept.len();

    let (beta, xtx_inv) = if p > 0 {
        let xtx = x.t().dot(&x);
        let xty: Vec<f64> = (0..p)
            .map(|j| x.column(j).iter().zip(y.iter()).map(|(a, b)| a * b).sum())
            .collect();
        let xtx_flat: Vec<f64> = xtx.iter().copied().collect();
        let beta = solve_symmetric_system(&xtx_flat, &xty, p)?;
        let inv = invert_symmetric_matrix(&xtx_flat, p)?;
        (beta, inv)
    } else {
        (Vec::new(), Vec::new())
    };

    let rss: f64 = (0..n)
        .map(|i| {
            let fitted: f64 = (0..p).map(|j| x[[i, j]] * beta[j]).sum();
            (y[i] - fitted).powi(2)
        })
        .sum();
    let df_residual = n.saturating_sub(p);
    let sigma = if df_residual > 0 {
        (rss / df_residual as f64).sqrt()
    } else {
        f64::NAN
    };

    let mut coefficients = Vec::with_capacity(design.ncols());
    let mut k = 0;
    for j in 0..design.ncols() {
        let (estimate, std_error) = if estimable[j] {
            let var = sigma * sigma * xtx_inv[k * p + k];
            let se = if var >= 0.0 { var.sqrt() } else { f64::NAN };
            let out = (Some(beta[k]), Some(se));
            k += 1;
            out
        } else {
            (None, None)
        };
        coefficients.push(Coefficient {
            name: info.coef_names[j].clone(),
            covariate: info.column_covariates[j].clone(),
            estimate,
            std_error,
        });
    }

    let n_dropped = design.ncols() - p;
    if n_dropped > 0 {
        log::debug!(
            "OLS: {} of {} coefficient(s) not estimable",
            n_dropped,
            design.ncols()
        );
    }

    Ok(RegressionFit {
        coefficients,
        df_residual,
        sigma,
        n_obs: n,
    })
}

/// Cholesky solve of a symmetric positive definite system (row-major `a`)
fn solve_symmetric_system(a: &[f64], b: &[f64], n: usize) -> Result<Vec<f64>> {
    let mut l = vec![0.0; n * n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 {
                    return Err(BiomarkerError::Convergence {
                        operation: "OLS normal equations".to_string(),
                        reason: "cross-product matrix is not positive definite".to_string(),
                    });
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * z[j];
        }
        z[i] = sum / l[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }
    Ok(x)
}

fn invert_symmetric_matrix(a: &[f64], n: usize) -> Result<Vec<f64>> {
    let mut result = vec![0.0; n * n];
    for i in 0..n {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        let col = solve_symmetric_system(a, &e, n)?;
        for j in 0..n {
            result[j * n + i] = col[j];
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_linear_fit() {
        let mut ann = SampleAnnotation::new(ids(&["a", "b", "c", "d", "e"])).unwrap();
        ann.add_numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = vec![3.1, 4.9, 7.2, 8.8, 11.0];

        let fit = fit_covariates(&y, &ann, &["x"]).unwrap();
        let slope = fit.coefficient("x").unwrap().estimate.unwrap();
        let intercept = fit.coefficient("Intercept").unwrap().estimate.unwrap();
        // Least squares: slope = 1.97, intercept = 1.09
        assert!((slope - 1.97).abs() < 1e-10, "slope = {}", slope);
        assert!((intercept - 1.09).abs() < 1e-10, "intercept = {}", intercept);
        assert_eq!(fit.df_residual, 3);
        assert!(fit.coefficient("x").unwrap().std_error.unwrap() > 0.0);
    }

    #[test]
    fn test_group_means_recovered() {
        let mut ann = SampleAnnotation::new(ids(&["a", "b", "c", "d"])).unwrap();
        ann.add_categorical("group", ids(&["ctl", "ctl", "trt", "trt"])).unwrap();
        let y = vec![1.0, 3.0, 6.0, 8.0];

        let fit = fit_covariates(&y, &ann, &["group"]).unwrap();
        assert!((fit.coefficient("Intercept").unwrap().estimate.unwrap() - 2.0).abs() < 1e-12);
        assert!((fit.coefficient("group_trt_vs_ctl").unwrap().estimate.unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_collinear_level_not_estimable() {
        // 'site' is fully determined by 'batch'
        let mut ann = SampleAnnotation::new(ids(&["a", "b", "c", "d", "e", "f"])).unwrap();
        ann.add_categorical("batch", ids(&["b1", "b1", "b2", "b2", "b1", "b2"])).unwrap();
        ann.add_categorical("site", ids(&["x", "x", "y", "y", "x", "y"])).unwrap();
        let y = vec![1.0, 1.2, 2.0, 2.1, 0.9, 2.3];

        let fit = fit_covariates(&y, &ann, &["batch", "site"]).unwrap();
        assert!(fit.coefficient("batch_b2_vs_b1").unwrap().is_estimable());
        let site = fit.coefficient("site_y_vs_x").unwrap();
        assert!(site.estimate.is_none());
        assert!(site.std_error.is_none());
        assert_eq!(fit.rank(), 2);
    }

    #[test]
    fn test_saturated_fit_has_nan_sigma() {
        let mut ann = SampleAnnotation::new(ids(&["a", "b"])).unwrap();
        ann.add_numeric("x", vec![0.0, 1.0]).unwrap();
        let fit = fit_covariates(&[1.0, 2.0], &ann, &["x"]).unwrap();
        assert_eq!(fit.df_residual, 0);
        assert!(fit.sigma.is_nan());
        assert!((fit.coefficient("x").unwrap().estimate.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_outcome_length_mismatch() {
        let mut ann = SampleAnnotation::new(ids(&["a", "b", "c"])).unwrap();
        ann.add_numeric("x", vec![0.0, 1.0, 2.0]).unwrap();
        let err = fit_covariates(&[1.0, 2.0], &ann, &["x"]).unwrap_err();
        assert!(matches!(err, BiomarkerError::DimensionMismatch { .. }));
    }
}
