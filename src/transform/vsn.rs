//! Variance Stabilizing Normalization (VSN)
//!
//! Fits a generalized-logarithm transform `h(y) = asinh(a + b*y)` on linear
//! intensities so that the feature-wise standard deviation becomes
//! approximately independent of abundance. The two parameters are shared by
//! all samples and estimated jointly: features are ranked by their
//! transformed mean, split into bins, and the fit minimises the variance of
//! log(median SD) across bins.

use ndarray::Array2;
use rayon::prelude::*;

use crate::data::{median_in_place, AbundanceMatrix};
use crate::error::{BiomarkerError, Result};

/// Parameters of the VSN fit
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VsnParams {
    /// Number of abundance bins used to compare standard deviations
    pub n_bins: usize,
    /// Grid points per parameter axis in every search round
    pub grid_points: usize,
    /// Maximum number of coarse-to-fine refinement rounds
    pub max_rounds: usize,
    /// Stop refining once the objective improves by less than this
    pub tol: f64,
    /// Initial search interval for the offset `a`
    pub a_range: (f64, f64),
    /// Initial search interval for `ln(b)`
    pub log_b_range: (f64, f64),
    /// Minimum number of features with at least two observations
    pub min_features: usize,
}

impl Default for VsnParams {
    fn default() -> Self {
        Self {
            n_bins: 10,
            grid_points: 21,
            max_rounds: 8,
            tol: 1e-8,
            a_range: (-4.0, 4.0),
            log_b_range: (-4.0, 8.0),
            min_features: 4,
        }
    }
}

/// Result of the VSN transformation
#[derive(Debug, Clone)]
pub struct VsnResult {
    /// Transformed matrix (same shape and missingness as the input)
    pub matrix: AbundanceMatrix,
    /// Fitted offset
    pub a: f64,
    /// Fitted slope (always > 0)
    pub b: f64,
    /// Linear intensities are divided by this before the transform
    pub scale: f64,
    /// Constant added to the log2-scaled output to keep the input median
    pub shift: f64,
    /// Objective value at the optimum
    pub objective: f64,
    /// Number of grid rounds run
    pub rounds: usize,
}

impl VsnResult {
    /// Apply the fitted transform to a single log2 value
    pub fn transform_value(&self, log2_value: f64) -> f64 {
        glog2(log2_value, self.a, self.b, self.scale) + self.shift
    }
}

/// Observed values of one informative feature (>= 2 observations), linear scale
struct FeatureRow {
    intensities: Vec<f64>,
}

/// Variance stabilizing normalization of a log2 abundance matrix
///
/// Missing entries pass through untouched; observed values are replaced by
/// `asinh(a + b * 2^x / scale) / ln 2 + shift`.
pub fn normalize(matrix: &AbundanceMatrix, params: &VsnParams) -> Result<VsnResult> {
    let n_samples = matrix.n_samples();
    if n_samples < 2 {
        return Err(BiomarkerError::degenerate(format!(
            "normalization needs at least 2 samples, got {}",
            n_samples
        )));
    }

    for (j, &n_obs) in matrix.observed_per_sample().iter().enumerate() {
        if n_obs == 0 {
            return Err(BiomarkerError::degenerate(format!(
                "sample '{}' is entirely missing",
                matrix.sample_ids()[j]
            )));
        }
    }

    // Step 1: back to linear intensities, scaled so the overall median is 1
    let mut observed_log2: Vec<f64> = matrix.values().iter().flatten().copied().collect();
    let mut linear: Vec<f64> = observed_log2.iter().map(|x| x.exp2()).collect();
    let scale = median_in_place(&mut linear);
    if !(scale.is_finite() && scale > 0.0) {
        return Err(BiomarkerError::degenerate(format!(
            "median linear intensity is {} (log2 values out of range)",
            scale
        )));
    }
    let input_median = median_in_place(&mut observed_log2);

    // Step 2: features informative about within-feature spread
    let rows: Vec<FeatureRow> = (0..matrix.n_features())
        .filter_map(|i| {
            let intensities: Vec<f64> = matrix
                .row(i)
                .iter()
                .flatten()
                .map(|x| x.exp2() / scale)
                .collect();
            (intensities.len() >= 2).then_some(FeatureRow { intensities })
        })
        .collect();

    if rows.len() < params.min_features.max(4) {
        return Err(BiomarkerError::degenerate(format!(
            "only {} feature(s) observed in at least two samples; need {}",
            rows.len(),
            params.min_features.max(4)
        )));
    }
    let n_bins = params.n_bins.max(2).min(rows.len() / 2);

    // Step 3: coarse-to-fine grid search over (a, ln b)
    let (a, log_b, objective, rounds) = grid_search(&rows, n_bins, params)?;
    let b = log_b.exp();
    log::debug!(
        "VSN fit: a={:.6}, b={:.6e}, scale={:.6e}, objective={:.6e}, rounds={}",
        a,
        b,
        scale,
        objective,
        rounds
    );

    // Step 4: transform observed values and re-anchor the median
    let mut transformed: Vec<f64> = matrix
        .values()
        .iter()
        .flatten()
        .map(|&x| glog2(x, a, b, scale))
        .collect();
    let shift = input_median - median_in_place(&mut transformed);

    let values: Array2<Option<f64>> = matrix
        .values()
        .mapv(|v| v.map(|x| glog2(x, a, b, scale) + shift));

    Ok(VsnResult {
        matrix: matrix.with_values(values)?,
        a,
        b,
        scale,
        shift,
        objective,
        rounds,
    })
}

/// asinh transform of a log2 value, reported on a log2-comparable scale
fn glog2(log2_value: f64, a: f64, b: f64, scale: f64) -> f64 {
    (a + b * log2_value.exp2() / scale).asinh() / std::f64::consts::LN_2
}

/// Heterogeneity of the standard deviation across abundance bins
///
/// Returns NaN when fewer than two bins have a positive median SD.
fn heterogeneity(rows: &[FeatureRow], n_bins: usize, a: f64, b: f64) -> f64 {
    let mut stats: Vec<(f64, f64)> = rows
        .iter()
        .map(|row| {
            let h: Vec<f64> = row.intensities.iter().map(|&y| (a + b * y).asinh()).collect();
            let n = h.len() as f64;
            let mean = h.iter().sum::<f64>() / n;
            let var = h.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (mean, var.sqrt())
        })
        .collect();

    stats.sort_by(|x, y| x.0.total_cmp(&y.0));

    let n = stats.len();
    let log_sds: Vec<f64> = (0..n_bins)
        .filter_map(|k| {
            let start = k * n / n_bins;
            let end = (k + 1) * n / n_bins;
            let mut sds: Vec<f64> = stats[start..end].iter().map(|s| s.1).collect();
            if sds.is_empty() {
                return None;
            }
            let med = median_in_place(&mut sds);
            (med > 0.0 && med.is_finite()).then(|| med.ln())
        })
        .collect();

    if log_sds.len() < 2 {
        return f64::NAN;
    }
    let m = log_sds.len() as f64;
    let mean = log_sds.iter().sum::<f64>() / m;
    log_sds.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / m
}

/// Coarse grid followed by successively finer grids around the best point
/// Returns (a, ln b, objective, rounds)
fn grid_search(rows: &[FeatureRow], n_bins: usize, params: &VsnParams) -> Result<(f64, f64, f64, usize)> {
    let n_grid = params.grid_points.max(3);
    let (mut a_lo, mut a_hi) = params.a_range;
    let (mut lb_lo, mut lb_hi) = params.log_b_range;

    let mut best: Option<(f64, f64, f64)> = None;
    let mut rounds = 0;

    for round in 0..params.max_rounds.max(1) {
        rounds = round + 1;
        let a_step = (a_hi - a_lo) / (n_grid - 1) as f64;
        let lb_step = (lb_hi - lb_lo) / (n_grid - 1) as f64;

        let grid: Vec<(f64, f64)> = (0..n_grid)
            .flat_map(|i| (0..n_grid).map(move |j| (i, j)))
            .map(|(i, j)| (a_lo + i as f64 * a_step, lb_lo + j as f64 * lb_step))
            .collect();

        // Evaluate in parallel, pick the minimum in grid order so ties are deterministic
        let objectives: Vec<f64> = grid
            .par_iter()
            .map(|&(a, lb)| heterogeneity(rows, n_bins, a, lb.exp()))
            .collect();

        let round_best = grid
            .iter()
            .zip(objectives.iter())
            .filter(|(_, obj)| obj.is_finite())
            .fold(None, |acc: Option<(f64, f64, f64)>, (&(a, lb), &obj)| match acc {
                Some((_, _, best_obj)) if best_obj <= obj => acc,
                _ => Some((a, lb, obj)),
            });

        let Some((a, lb, obj)) = round_best else {
            if best.is_none() {
                return Err(BiomarkerError::Convergence {
                    operation: "VSN parameter fit".to_string(),
                    reason: "objective is not finite anywhere on the search grid".to_string(),
                });
            }
            break;
        };

        let improvement = best.map(|(_, _, prev)| prev - obj);
        if best.map_or(true, |(_, _, prev)| obj < prev) {
            best = Some((a, lb, obj));
        }

        log::debug!(
            "VSN grid round {}: a={:.5}, ln(b)={:.5}, objective={:.6e}",
            rounds,
            a,
            lb,
            obj
        );

        if matches!(improvement, Some(d) if d.abs() < params.tol) {
            break;
        }

        // Zoom in around the current best point
        let (ba, blb, _) = best.unwrap_or((a, lb, obj));
        a_lo = ba - a_step;
        a_hi = ba + a_step;
        lb_lo = blb - lb_step;
        lb_hi = blb + lb_step;
    }

    match best {
        Some((a, lb, obj)) => Ok((a, lb, obj, rounds)),
        None => Err(BiomarkerError::Convergence {
            operation: "VSN parameter fit".to_string(),
            reason: "no grid round produced a finite objective".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMeta;
    use crate::rng::MersenneTwister;

    fn make_matrix(values: Array2<f64>) -> AbundanceMatrix {
        let features = (0..values.nrows())
            .map(|i| FeatureMeta::new(format!("P{:04}", i), format!("PROT{}", i)))
            .collect();
        let samples = (0..values.ncols()).map(|j| format!("s{}", j + 1)).collect();
        AbundanceMatrix::from_nan_array(values, features, samples).unwrap()
    }

    /// Log-normal intensities with constant log-scale noise
    fn simulated(n_features: usize, n_samples: usize, seed: u64) -> Array2<f64> {
        let mut rng = MersenneTwister::new(seed);
        let mut values = Array2::zeros((n_features, n_samples));
        for i in 0..n_features {
            let mu = 18.0 + 12.0 * rng.runif();
            for j in 0..n_samples {
                values[[i, j]] = mu + 0.25 * rng.rnorm();
            }
        }
        values
    }

    #[test]
    fn test_vsn_preserves_shape_and_missingness() {
        let mut values = simulated(60, 6, 1);
        values[[3, 2]] = f64::NAN;
        values[[10, 0]] = f64::NAN;
        let m = make_matrix(values);

        let result = normalize(&m, &VsnParams::default()).unwrap();
        assert_eq!(result.matrix.n_features(), 60);
        assert_eq!(result.matrix.n_samples(), 6);
        assert_eq!(result.matrix.missing_count(), 2);
        assert!(result.matrix.get(3, 2).is_none());
        assert!(result.matrix.get(10, 0).is_none());
        assert!(result.b > 0.0);
    }

    #[test]
    fn test_vsn_monotonic_two_columns() {
        let m = make_matrix(simulated(40, 2, 5));
        let result = normalize(&m, &VsnParams::default()).unwrap();

        let mut pairs: Vec<(f64, f64)> = Vec::new();
        for i in 0..m.n_features() {
            for j in 0..2 {
                let (input, output) = (m.get(i, j).unwrap(), result.matrix.get(i, j).unwrap());
                assert!((result.transform_value(input) - output).abs() < 1e-12);
                pairs.push((input, output));
            }
        }
        pairs.sort_by(|x, y| x.0.total_cmp(&y.0));
        for w in pairs.windows(2) {
            if w[0].0 < w[1].0 {
                assert!(w[0].1 <= w[1].1, "transform not monotonic: {:?} -> {:?}", w[0], w[1]);
            }
        }
    }

    #[test]
    fn test_vsn_approximately_idempotent() {
        let m = make_matrix(simulated(400, 8, 9));
        let params = VsnParams::default();
        let once = normalize(&m, &params).unwrap();
        let twice = normalize(&once.matrix, &params).unwrap();

        let diffs: Vec<f64> = once
            .matrix
            .values()
            .iter()
            .zip(twice.matrix.values().iter())
            .map(|(a, b)| (a.unwrap() - b.unwrap()).abs())
            .collect();
        let mean_diff = diffs.iter().sum::<f64>() / diffs.len() as f64;
        let max_diff = diffs.iter().cloned().fold(0.0, f64::max);
        assert!(mean_diff < 0.05, "mean abs change on re-normalization: {}", mean_diff);
        assert!(max_diff < 0.3, "max abs change on re-normalization: {}", max_diff);
    }

    #[test]
    fn test_vsn_keeps_log2_scale_for_log_normal_data() {
        let m = make_matrix(simulated(200, 6, 21));
        let result = normalize(&m, &VsnParams::default()).unwrap();
        // Constant log-scale noise: the best transform is log-like, so values barely move
        let mut max_diff: f64 = 0.0;
        for (a, b) in m.values().iter().zip(result.matrix.values().iter()) {
            max_diff = max_diff.max((a.unwrap() - b.unwrap()).abs());
        }
        assert!(max_diff < 0.5, "max deviation from input: {}", max_diff);
    }

    #[test]
    fn test_vsn_single_sample_rejected() {
        let m = make_matrix(simulated(20, 1, 2));
        let err = normalize(&m, &VsnParams::default()).unwrap_err();
        assert!(matches!(err, BiomarkerError::DegenerateInput { .. }));
    }

    #[test]
    fn test_vsn_all_missing_sample_rejected() {
        let mut values = simulated(20, 3, 2);
        for i in 0..20 {
            values[[i, 1]] = f64::NAN;
        }
        let m = make_matrix(values);
        let err = normalize(&m, &VsnParams::default()).unwrap_err();
        assert!(err.to_string().contains("s2"));
    }
}
