//! k-nearest-neighbour imputation over features
//!
//! Each missing cell is filled from the rows (features) closest to its own
//! row, where closeness is the root-mean-square difference over the samples
//! both rows observe. Distances and donor values always come from the input
//! matrix, never from cells imputed earlier, so rows are processed
//! independently and in parallel with a result that does not depend on
//! scheduling.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::AbundanceMatrix;
use crate::error::{BiomarkerError, Result};

/// How donor values are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnWeighting {
    /// Plain mean of the neighbours' values
    #[default]
    Uniform,
    /// Weights 1/d; zero-distance neighbours take all the weight
    InverseDistance,
}

/// What to do with a cell none of the chosen neighbours observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnnFallback {
    /// Fill with the mean observed value of that sample (reported)
    #[default]
    SampleMean,
    /// Keep the cell missing (reported)
    LeaveMissing,
}

/// Parameters for kNN imputation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnParams {
    /// Number of neighbours
    pub k: usize,
    /// Rows with a larger missing fraction are left untouched
    pub row_missing_ceiling: f64,
    pub weighting: KnnWeighting,
    pub fallback: KnnFallback,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            k: 10,
            row_missing_ceiling: 1.0,
            weighting: KnnWeighting::Uniform,
            fallback: KnnFallback::SampleMean,
        }
    }
}

/// Cells and rows that were not imputed from neighbours
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImputationReport {
    /// Cells filled from neighbours
    pub imputed_cells: usize,
    /// (feature, sample) cells filled with the sample mean
    pub fallback_cells: Vec<(String, String)>,
    /// (feature, sample) cells left missing
    pub failed_cells: Vec<(String, String)>,
    /// Features above the missingness ceiling, left as-is
    pub skipped_rows: Vec<String>,
}

/// Result of kNN imputation
#[derive(Debug, Clone)]
pub struct ImputeResult {
    pub matrix: AbundanceMatrix,
    pub report: ImputationReport,
}

/// Per-cell outcome for one row
enum CellFill {
    Neighbours(usize, f64),
    Unfilled(usize),
}

/// Impute missing values by k-nearest-neighbour averaging over features
pub fn impute(matrix: &AbundanceMatrix, params: &KnnParams) -> Result<ImputeResult> {
    if params.k == 0 {
        return Err(BiomarkerError::validation("k must be at least 1"));
    }
    if !(0.0..=1.0).contains(&params.row_missing_ceiling) {
        return Err(BiomarkerError::validation(format!(
            "row_missing_ceiling must be within [0, 1], got {}",
            params.row_missing_ceiling
        )));
    }

    let n_features = matrix.n_features();
    let n_samples = matrix.n_samples();

    // Per-sample means double as the fallback fill
    let mut sample_means = Vec::with_capacity(n_samples);
    for j in 0..n_samples {
        let observed: Vec<f64> = matrix.column(j).iter().flatten().copied().collect();
        if observed.is_empty() {
            return Err(BiomarkerError::degenerate(format!(
                "sample '{}' has no observed values; cannot impute",
                matrix.sample_ids()[j]
            )));
        }
        sample_means.push(observed.iter().sum::<f64>() / observed.len() as f64);
    }

    let rows: Vec<Vec<Option<f64>>> = (0..n_features).map(|i| matrix.row(i).to_vec()).collect();
    let features = matrix.features();

    let mut skipped_rows = Vec::new();
    let mut targets = Vec::new();
    for i in 0..n_features {
        if rows[i].iter().all(|v| v.is_some()) {
            continue;
        }
        if matrix.missing_fraction_row(i) > params.row_missing_ceiling {
            skipped_rows.push(features[i].id.clone());
        } else {
            targets.push(i);
        }
    }

    if !skipped_rows.is_empty() {
        log::warn!(
            "Skipping {} feature(s) above the missingness ceiling of {}",
            skipped_rows.len(),
            params.row_missing_ceiling
        );
    }

    // Impute each target row in parallel from the original values
    let fills: Vec<(usize, Vec<CellFill>)> = targets
        .into_par_iter()
        .map(|i| (i, impute_row(i, &rows, matrix, params)))
        .collect();

    let mut values: Array2<Option<f64>> = matrix.values().to_owned();
    let mut report = ImputationReport {
        skipped_rows,
        ..Default::default()
    };

    for (i, cells) in fills {
        for cell in cells {
            match cell {
                CellFill::Neighbours(j, v) => {
                    values[[i, j]] = Some(v);
                    report.imputed_cells += 1;
                }
                CellFill::Unfilled(j) => {
                    let key = (features[i].id.clone(), matrix.sample_ids()[j].clone());
                    match params.fallback {
                        KnnFallback::SampleMean => {
                            values[[i, j]] = Some(sample_means[j]);
                            report.fallback_cells.push(key);
                        }
                        KnnFallback::LeaveMissing => report.failed_cells.push(key),
                    }
                }
            }
        }
    }

    log::info!(
        "kNN imputation (k={}): {} cell(s) from neighbours, {} by sample mean, {} left missing",
        params.k,
        report.imputed_cells,
        report.fallback_cells.len(),
        report.failed_cells.len()
    );

    Ok(ImputeResult {
        matrix: matrix.with_values(values)?,
        report,
    })
}

/// Root-mean-square difference over jointly observed columns
fn rms_distance(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some((x.as_ref()? - y.as_ref()?).powi(2)))
        .fold((0.0, 0usize), |(s, c), d| (s + d, c + 1));
    (count > 0).then(|| (sum / count as f64).sqrt())
}

fn impute_row(
    target: usize,
    rows: &[Vec<Option<f64>>],
    matrix: &AbundanceMatrix,
    params: &KnnParams,
) -> Vec<CellFill> {
    let features = matrix.features();

    let mut candidates: Vec<(f64, usize)> = rows
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != target)
        .filter_map(|(j, row)| rms_distance(&rows[target], row).map(|d| (d, j)))
        .collect();

    // Nearest first, ties by feature ID
    candidates.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| features[a.1].id.cmp(&features[b.1].id))
    });
    candidates.truncate(params.k);

    rows[target]
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_none())
        .map(|(col, _)| {
            let donors: Vec<(f64, f64)> = candidates
                .iter()
                .filter_map(|&(d, j)| rows[j][col].map(|v| (d, v)))
                .collect();
            match weighted_mean(&donors, params.weighting) {
                Some(v) => CellFill::Neighbours(col, v),
                None => CellFill::Unfilled(col),
            }
        })
        .collect()
}

/// Combine (distance, value) donor pairs
fn weighted_mean(donors: &[(f64, f64)], weighting: KnnWeighting) -> Option<f64> {
    if donors.is_empty() {
        return None;
    }
    match weighting {
        KnnWeighting::Uniform => Some(mean(donors.iter().map(|d| d.1))),
        KnnWeighting::InverseDistance => {
            if donors.iter().any(|d| d.0 == 0.0) {
                return Some(mean(donors.iter().filter(|d| d.0 == 0.0).map(|d| d.1)));
            }
            let (num, den) = donors
                .iter()
                .fold((0.0, 0.0), |(n, w), &(d, v)| (n + v / d, w + 1.0 / d));
            Some(num / den)
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    sum / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMeta;
    use crate::rng::MersenneTwister;
    use ndarray::array;

    fn make_matrix(values: Array2<f64>) -> AbundanceMatrix {
        let features = (0..values.nrows())
            .map(|i| FeatureMeta::new(format!("P{:03}", i), format!("PROT{}", i)))
            .collect();
        let samples = (0..values.ncols()).map(|j| format!("s{}", j + 1)).collect();
        AbundanceMatrix::from_nan_array(values, features, samples).unwrap()
    }

    fn random_with_missing(n: usize, m: usize, frac: f64, seed: u64) -> Array2<f64> {
        let mut rng = MersenneTwister::new(seed);
        let mut values = Array2::zeros((n, m));
        for i in 0..n {
            let base = 20.0 + 5.0 * rng.runif();
            for j in 0..m {
                values[[i, j]] = if rng.runif() < frac { f64::NAN } else { base + rng.rnorm() };
            }
        }
        values
    }

    #[test]
    fn test_k1_copies_exact_neighbour() {
        let values = array![
            [1.0, 2.0, 3.0, f64::NAN],
            [1.0, 2.0, 3.0, 7.5],
            [10.0, 20.0, 30.0, 40.0]
        ];
        let m = make_matrix(values);
        let params = KnnParams { k: 1, ..Default::default() };
        let result = impute(&m, &params).unwrap();
        assert_eq!(result.matrix.get(0, 3), Some(7.5));
        assert_eq!(result.report.imputed_cells, 1);
        assert!(result.report.fallback_cells.is_empty());
    }

    #[test]
    fn test_equal_distance_prefers_lower_feature_id() {
        // B precedes A in the matrix; both lie at distance 1 from C
        let values = array![[0.0, 30.0], [2.0, 20.0], [1.0, f64::NAN]];
        let features = ["B", "A", "C"]
            .iter()
            .map(|id| FeatureMeta::new(*id, format!("PROT_{}", id)))
            .collect();
        let samples = vec!["s1".to_string(), "s2".to_string()];
        let m = AbundanceMatrix::from_nan_array(values, features, samples).unwrap();

        let result = impute(&m, &KnnParams { k: 1, ..Default::default() }).unwrap();
        assert_eq!(result.matrix.get(2, 1), Some(20.0));
        assert_eq!(result.report.imputed_cells, 1);
    }

    #[test]
    fn test_no_missing_after_default_ceiling() {
        let m = make_matrix(random_with_missing(40, 8, 0.2, 3));
        assert!(m.missing_count() > 0);
        let result = impute(&m, &KnnParams::default()).unwrap();
        assert_eq!(result.matrix.missing_count(), 0);
        assert!(result.report.failed_cells.is_empty());
        assert!(result.report.skipped_rows.is_empty());
    }

    #[test]
    fn test_observed_values_untouched() {
        let m = make_matrix(random_with_missing(30, 6, 0.1, 8));
        let result = impute(&m, &KnnParams::default()).unwrap();
        for ((i, j), v) in m.values().indexed_iter() {
            if let Some(x) = v {
                assert_eq!(result.matrix.get(i, j), Some(*x));
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let m = make_matrix(random_with_missing(50, 10, 0.15, 5));
        let params = KnnParams { k: 3, weighting: KnnWeighting::InverseDistance, ..Default::default() };
        let a = impute(&m, &params).unwrap();
        let b = impute(&m, &params).unwrap();
        assert_eq!(a.matrix.values(), b.matrix.values());
    }

    #[test]
    fn test_ceiling_skips_rows() {
        let values = array![
            [1.0, f64::NAN, f64::NAN, f64::NAN],
            [1.0, 2.0, 3.0, f64::NAN],
            [1.5, 2.5, 3.5, 4.5]
        ];
        let m = make_matrix(values);
        let params = KnnParams { k: 2, row_missing_ceiling: 0.5, ..Default::default() };
        let result = impute(&m, &params).unwrap();
        assert_eq!(result.report.skipped_rows, vec!["P000".to_string()]);
        assert_eq!(result.matrix.missing_count(), 3);
    }

    #[test]
    fn test_fallback_is_reported() {
        // Row 0 only overlaps row 1, which is missing the same column
        let values = array![
            [5.0, f64::NAN, f64::NAN],
            [6.0, f64::NAN, 1.0],
            [f64::NAN, 3.0, 9.0]
        ];
        let m = make_matrix(values);

        let result = impute(&m, &KnnParams { k: 1, ..Default::default() }).unwrap();
        assert!(result
            .report
            .fallback_cells
            .contains(&("P000".to_string(), "s2".to_string())));
        assert_eq!(result.matrix.get(0, 1), Some(3.0));

        let params = KnnParams { k: 1, fallback: KnnFallback::LeaveMissing, ..Default::default() };
        let result = impute(&m, &params).unwrap();
        assert!(result.matrix.get(0, 1).is_none());
        assert!(!result.report.failed_cells.is_empty());
    }

    #[test]
    fn test_inverse_distance_zero_distance() {
        let donors = [(0.0, 4.0), (1.0, 100.0)];
        assert_eq!(weighted_mean(&donors, KnnWeighting::InverseDistance), Some(4.0));
        assert_eq!(weighted_mean(&donors, KnnWeighting::Uniform), Some(52.0));
    }

    #[test]
    fn test_all_missing_sample_rejected() {
        let values = array![[1.0, f64::NAN], [2.0, f64::NAN]];
        let err = impute(&make_matrix(values), &KnnParams::default()).unwrap_err();
        assert!(matches!(err, BiomarkerError::DegenerateInput { .. }));
    }
}
