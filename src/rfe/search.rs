//! Repeated cross-validated recursive feature elimination
//!
//! Every (repeat, fold) unit ranks features on its training rows only, then
//! scores the top-`s` features for each candidate size on the held-out fold.
//! Units run in parallel; each draws from its own seed derived from
//! `(seed, repeat, fold)` and results are aggregated in a fixed order, so the
//! outcome does not depend on the thread count.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::folds::{kfold, split, stratified_kfold};
use super::forest::{ForestParams, RandomForest};
use super::scorer::{ClassMetric, ClassificationScorer, RegressionMetric, RegressionScorer, Scorer};
use crate::error::{BiomarkerError, Result};
use crate::rng::{derive_seed, MersenneTwister};

/// Stream tags for seeds that are not tied to a (repeat, fold) unit
const PARTITION_STREAM: u64 = 0x5041_5254;
const FINAL_STREAM: u64 = 0x4649_4e41;
/// Sub-streams of a unit seed
const RANK_STREAM: u64 = 0;
const EVAL_STREAM: u64 = 1;

/// Outcome to predict, one entry per sample
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Class label per sample
    Classes(Vec<String>),
    /// Continuous response per sample
    Continuous(Vec<f64>),
}

impl Outcome {
    pub fn len(&self) -> usize {
        match self {
            Outcome::Classes(v) => v.len(),
            Outcome::Continuous(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters for recursive feature elimination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RfeParams {
    /// Subset sizes to evaluate
    pub candidate_sizes: Vec<usize>,
    /// Folds per repeat
    pub folds: usize,
    /// Independent fold partitions
    pub repeats: usize,
    pub seed: u64,
    pub forest: ForestParams,
    pub class_metric: ClassMetric,
    pub regression_metric: RegressionMetric,
    /// Set to true from another thread to stop before the next unit
    #[serde(skip)]
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RfeParams {
    fn default() -> Self {
        Self {
            candidate_sizes: vec![5, 10, 20, 50],
            folds: 5,
            repeats: 5,
            seed: 42,
            forest: ForestParams::default(),
            class_metric: ClassMetric::Accuracy,
            regression_metric: RegressionMetric::NegRmse,
            cancel: None,
        }
    }
}

/// Cross-validated performance of one subset size
#[derive(Debug, Clone, Serialize)]
pub struct SizePerformance {
    pub size: usize,
    pub mean: f64,
    /// Sample standard deviation over cells
    pub std: f64,
    pub n_cells: usize,
}

/// One cell of the resampling table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampleRecord {
    pub repeat: usize,
    pub fold: usize,
    pub size: usize,
    pub metric: f64,
}

/// Feature with its full-data importance
#[derive(Debug, Clone, Serialize)]
pub struct RankedFeature {
    pub id: String,
    pub importance: f64,
}

/// Prediction of a [`BiomarkerModel`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Prediction {
    Class(String),
    Value(f64),
}

/// Final model refit on the whole dataset with the selected features
#[derive(Debug, Clone)]
pub struct BiomarkerModel {
    /// Model inputs, in the column order `predict` expects
    feature_ids: Vec<String>,
    forest: RandomForest,
    /// Class names for classification models
    classes: Option<Vec<String>>,
}

impl BiomarkerModel {
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Predict samples (rows of `x`, columns ordered like `feature_ids`)
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<Prediction>> {
        if x.ncols() != self.feature_ids.len() {
            return Err(BiomarkerError::DimensionMismatch {
                expected: format!("{} feature columns", self.feature_ids.len()),
                got: format!("{} feature columns", x.ncols()),
            });
        }
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let raw = self.forest.predict(x, &rows);
        Ok(match &self.classes {
            Some(classes) => raw
                .into_iter()
                .map(|p| Prediction::Class(classes[p as usize].clone()))
                .collect(),
            None => raw.into_iter().map(Prediction::Value).collect(),
        })
    }
}

/// Result of recursive feature elimination
#[derive(Debug, Clone)]
pub struct RfeResult {
    /// Metric name (higher is better)
    pub metric: String,
    /// Performance per evaluated size, ascending by size
    pub performance: Vec<SizePerformance>,
    pub best_size: usize,
    /// Selected feature IDs, most important first
    pub selected: Vec<String>,
    /// Full-data ranking of all features
    pub ranking: Vec<RankedFeature>,
    pub model: BiomarkerModel,
    /// Every (repeat, fold, size) cell, in repeat/fold/descending-size order
    pub resamples: Vec<ResampleRecord>,
}

/// Cross-validated performance with all features
#[derive(Debug, Clone, Serialize)]
pub struct CvSummary {
    pub metric: String,
    pub mean: f64,
    pub std: f64,
    pub scores: Vec<ResampleRecord>,
}

/// Select the smallest informative feature subset for an outcome
///
/// `x` is samples x features with column `j` named `feature_ids[j]`.
pub fn select_features(
    x: &Array2<f64>,
    feature_ids: &[String],
    y: &Outcome,
    params: &RfeParams,
) -> Result<RfeResult> {
    validate_inputs(x, feature_ids, y, params)?;
    match y {
        Outcome::Classes(labels) => {
            let scorer = classification_scorer(labels, params)?;
            let classes = scorer.classes().to_vec();
            run_rfe(&scorer, x, feature_ids, params, Some(classes))
        }
        Outcome::Continuous(values) => {
            let scorer = RegressionScorer::new(values.clone(), params.forest.clone(), params.regression_metric);
            run_rfe(&scorer, x, feature_ids, params, None)
        }
    }
}

/// Cross-validate a forest on all features with the same partitions as RFE
///
/// Scores equal the `size = p` cells of [`select_features`].
pub fn cross_validate(x: &Array2<f64>, y: &Outcome, params: &RfeParams) -> Result<CvSummary> {
    let ids: Vec<String> = (0..x.ncols()).map(|j| j.to_string()).collect();
    validate_inputs(x, &ids, y, params)?;
    match y {
        Outcome::Classes(labels) => {
            let scorer = classification_scorer(labels, params)?;
            run_cv(&scorer, x, params)
        }
        Outcome::Continuous(values) => {
            let scorer = RegressionScorer::new(values.clone(), params.forest.clone(), params.regression_metric);
            run_cv(&scorer, x, params)
        }
    }
}

fn validate_inputs(x: &Array2<f64>, feature_ids: &[String], y: &Outcome, params: &RfeParams) -> Result<()> {
    let (n, p) = x.dim();
    if p == 0 || n == 0 {
        return Err(BiomarkerError::EmptyData {
            reason: format!("feature matrix is {} x {}", n, p),
        });
    }
    if feature_ids.len() != p {
        return Err(BiomarkerError::DimensionMismatch {
            expected: format!("{} feature IDs", p),
            got: format!("{} feature IDs", feature_ids.len()),
        });
    }
    if y.len() != n {
        return Err(BiomarkerError::DimensionMismatch {
            expected: format!("{} outcome values", n),
            got: format!("{} outcome values", y.len()),
        });
    }
    if let Some(((i, j), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(BiomarkerError::validation(format!(
            "non-finite value for feature '{}' in sample {}",
            feature_ids[j], i
        )));
    }
    if let Outcome::Continuous(values) = y {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(BiomarkerError::validation(format!("outcome for sample {} is not finite", i)));
        }
    }
    if params.repeats == 0 {
        return Err(BiomarkerError::validation("repeats must be at least 1"));
    }
    if params.candidate_sizes.is_empty() {
        return Err(BiomarkerError::validation("no candidate subset sizes given"));
    }
    if params.candidate_sizes.contains(&0) {
        return Err(BiomarkerError::validation("candidate subset size 0 is not allowed"));
    }
    Ok(())
}

fn classification_scorer(labels: &[String], params: &RfeParams) -> Result<ClassificationScorer> {
    let classes: Vec<String> = labels.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
    if classes.len() < 2 {
        return Err(BiomarkerError::degenerate(format!(
            "classification needs at least 2 classes, found {}",
            classes.len()
        )));
    }
    let index: Vec<usize> = labels
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or_default())
        .collect();
    Ok(ClassificationScorer::new(
        index,
        classes,
        params.forest.clone(),
        params.class_metric,
    ))
}

/// Fold partitions for every repeat, drawn before any unit runs
fn draw_partitions<S: Scorer>(scorer: &S, n_samples: usize, params: &RfeParams) -> Result<Vec<Vec<Vec<usize>>>> {
    let strata = scorer.strata();
    (0..params.repeats)
        .map(|r| {
            let mut rng = MersenneTwister::new(derive_seed(params.seed, &[PARTITION_STREAM, r as u64]));
            match strata {
                Some(s) => stratified_kfold(s, params.folds, &mut rng),
                None => kfold(n_samples, params.folds, &mut rng),
            }
        })
        .collect()
}

fn check_cancelled(params: &RfeParams) -> Result<()> {
    match &params.cancel {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(BiomarkerError::Cancelled),
        _ => Ok(()),
    }
}

/// Feature indices by decreasing importance, ties by column index
fn order_by_importance(importance: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..importance.len()).collect();
    order.sort_by(|&a, &b| importance[b].total_cmp(&importance[a]).then(a.cmp(&b)));
    order
}

/// Top `size` features of a ranking, in original column order
fn top_columns(order: &[usize], size: usize) -> Vec<usize> {
    let mut cols = order[..size].to_vec();
    cols.sort_unstable();
    cols
}

fn run_rfe<S: Scorer>(
    scorer: &S,
    x: &Array2<f64>,
    feature_ids: &[String],
    params: &RfeParams,
    classes: Option<Vec<String>>,
) -> Result<RfeResult> {
    let (n, p) = x.dim();

    // Cap at p, merge duplicates, evaluate largest first
    let sizes: Vec<usize> = params
        .candidate_sizes
        .iter()
        .map(|&s| s.min(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect();
    if params.candidate_sizes.iter().any(|&s| s > p) {
        log::warn!("Candidate sizes above the feature count ({}) were capped", p);
    }

    let partitions = draw_partitions(scorer, n, params)?;
    let units: Vec<(usize, usize)> = (0..params.repeats)
        .flat_map(|r| (0..params.folds).map(move |f| (r, f)))
        .collect();

    log::info!(
        "RFE: {} samples, {} features, sizes {:?}, {} repeat(s) x {} fold(s)",
        n,
        p,
        sizes,
        params.repeats,
        params.folds
    );

    let unit_results: Vec<Vec<ResampleRecord>> = units
        .par_iter()
        .map(|&(r, f)| {
            check_cancelled(params)?;
            let (train, test) = split(&partitions[r], f);
            let unit_seed = derive_seed(params.seed, &[r as u64, f as u64]);

            let importance = scorer.rank(x.view(), &train, derive_seed(unit_seed, &[RANK_STREAM]))?;
            let order = order_by_importance(&importance);

            sizes
                .iter()
                .map(|&size| {
                    let xs = x.select(Axis(1), &top_columns(&order, size));
                    let metric = scorer.evaluate(xs.view(), &train, &test, derive_seed(unit_seed, &[EVAL_STREAM]))?;
                    Ok(ResampleRecord {
                        repeat: r,
                        fold: f,
                        size,
                        metric,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let resamples: Vec<ResampleRecord> = unit_results.into_iter().flatten().collect();

    // Aggregate per size, ascending
    let performance: Vec<SizePerformance> = sizes
        .iter()
        .rev()
        .map(|&size| {
            let metrics: Vec<f64> = resamples.iter().filter(|c| c.size == size).map(|c| c.metric).collect();
            let (mean, std) = mean_and_sd(&metrics);
            SizePerformance {
                size,
                mean,
                std,
                n_cells: metrics.len(),
            }
        })
        .collect();

    // Best mean, ties to the smaller size
    let mut best = &performance[0];
    for perf in &performance[1..] {
        if perf.mean > best.mean {
            best = perf;
        }
    }
    let best_size = best.size;
    log::info!(
        "RFE: best size {} ({} = {:.4} +/- {:.4})",
        best_size,
        scorer.metric_name(),
        best.mean,
        best.std
    );

    // Rank on all rows and refit on the winning subset
    check_cancelled(params)?;
    let all_rows: Vec<usize> = (0..n).collect();
    let final_seed = derive_seed(params.seed, &[FINAL_STREAM]);
    let importance = scorer.rank(x.view(), &all_rows, derive_seed(final_seed, &[RANK_STREAM]))?;
    let order = order_by_importance(&importance);

    let ranking: Vec<RankedFeature> = order
        .iter()
        .map(|&j| RankedFeature {
            id: feature_ids[j].clone(),
            importance: importance[j],
        })
        .collect();
    let selected: Vec<String> = order[..best_size].iter().map(|&j| feature_ids[j].clone()).collect();

    let model_columns = top_columns(&order, best_size);
    let xs = x.select(Axis(1), &model_columns);
    let forest = scorer.fit(xs.view(), &all_rows, derive_seed(final_seed, &[EVAL_STREAM]))?;
    let model = BiomarkerModel {
        feature_ids: model_columns.iter().map(|&j| feature_ids[j].clone()).collect(),
        forest,
        classes,
    };

    Ok(RfeResult {
        metric: scorer.metric_name().to_string(),
        performance,
        best_size,
        selected,
        ranking,
        model,
        resamples,
    })
}

fn run_cv<S: Scorer>(scorer: &S, x: &Array2<f64>, params: &RfeParams) -> Result<CvSummary> {
    let n = x.nrows();
    let p = x.ncols();
    let partitions = draw_partitions(scorer, n, params)?;
    let units: Vec<(usize, usize)> = (0..params.repeats)
        .flat_map(|r| (0..params.folds).map(move |f| (r, f)))
        .collect();

    let scores: Vec<ResampleRecord> = units
        .par_iter()
        .map(|&(r, f)| {
            check_cancelled(params)?;
            let (train, test) = split(&partitions[r], f);
            let unit_seed = derive_seed(params.seed, &[r as u64, f as u64]);
            let metric = scorer.evaluate(x.view(), &train, &test, derive_seed(unit_seed, &[EVAL_STREAM]))?;
            Ok(ResampleRecord {
                repeat: r,
                fold: f,
                size: p,
                metric,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let metrics: Vec<f64> = scores.iter().map(|s| s.metric).collect();
    let (mean, std) = mean_and_sd(&metrics);
    Ok(CvSummary {
        metric: scorer.metric_name().to_string(),
        mean,
        std,
        scores,
    })
}

/// Mean and sample standard deviation (0 for a single value)
fn mean_and_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfe::folds::Strata;
    use std::sync::Mutex;

    /// Two informative features (0 and 1) among `p`
    fn classification_data(n: usize, p: usize, seed: u64) -> (Array2<f64>, Vec<String>, Outcome) {
        let mut rng = MersenneTwister::new(seed);
        let labels: Vec<String> = (0..n).map(|i| if i % 2 == 0 { "control" } else { "case" }.to_string()).collect();
        let mut x = Array2::zeros((n, p));
        for i in 0..n {
            let shift = if i % 2 == 0 { 0.0 } else { 3.0 };
            for j in 0..p {
                x[[i, j]] = rng.rnorm();
            }
            x[[i, 0]] += shift;
            x[[i, 1]] += shift;
        }
        let ids = (0..p).map(|j| format!("P{:02}", j)).collect();
        (x, ids, Outcome::Classes(labels))
    }

    fn fast_params(sizes: Vec<usize>) -> RfeParams {
        RfeParams {
            candidate_sizes: sizes,
            folds: 3,
            repeats: 2,
            seed: 17,
            forest: ForestParams {
                n_trees: 25,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_informative_features_ranked_first() {
        let (x, ids, y) = classification_data(60, 10, 1);
        let result = select_features(&x, &ids, &y, &fast_params(vec![1, 2, 5, 10])).unwrap();

        let mut top2: Vec<&str> = result.ranking[..2].iter().map(|r| r.id.as_str()).collect();
        top2.sort();
        assert_eq!(top2, vec!["P00", "P01"]);
        assert_eq!(result.metric, "accuracy");
        assert_eq!(result.selected.len(), result.best_size);
        assert_eq!(result.model.feature_ids().len(), result.best_size);
        assert_eq!(result.resamples.len(), 2 * 3 * 4);
        assert!(result.performance.iter().all(|p| p.n_cells == 6));
    }

    /// Delegates to a classification scorer and records every row set it fits on
    struct RecordingScorer {
        inner: ClassificationScorer,
        fitted_rows: Mutex<Vec<Vec<usize>>>,
    }

    impl Scorer for RecordingScorer {
        fn metric_name(&self) -> &'static str {
            self.inner.metric_name()
        }

        fn strata(&self) -> Option<Strata<'_>> {
            self.inner.strata()
        }

        fn fit(&self, x: ArrayView2<'_, f64>, rows: &[usize], seed: u64) -> Result<RandomForest> {
            self.fitted_rows.lock().unwrap().push(rows.to_vec());
            self.inner.fit(x, rows, seed)
        }

        fn importance(&self, forest: &RandomForest, x: ArrayView2<'_, f64>) -> Vec<f64> {
            self.inner.importance(forest, x)
        }

        fn score(&self, forest: &RandomForest, x: ArrayView2<'_, f64>, test: &[usize]) -> f64 {
            self.inner.score(forest, x, test)
        }
    }

    #[test]
    fn test_units_fit_on_training_rows_only() {
        let (x, ids, y) = classification_data(30, 6, 12);
        let params = fast_params(vec![2, 4]);
        let Outcome::Classes(labels) = &y else { unreachable!() };
        let inner = classification_scorer(labels, &params).unwrap();
        let classes = inner.classes().to_vec();
        let scorer = RecordingScorer {
            inner,
            fitted_rows: Mutex::new(Vec::new()),
        };
        run_rfe(&scorer, &x, &ids, &params, Some(classes)).unwrap();

        let partitions = draw_partitions(&scorer, 30, &params).unwrap();
        let all_rows: Vec<usize> = (0..30).collect();
        let fitted = scorer.fitted_rows.into_inner().unwrap();

        // Per unit: one ranking fit plus one per size; then the final rank and refit
        assert_eq!(fitted.len(), 2 * 3 * 3 + 2);
        let mut unit_fits = 0;
        for rows in &fitted {
            if *rows == all_rows {
                continue;
            }
            let (_, test) = (0..params.repeats)
                .flat_map(|r| (0..params.folds).map(move |f| (r, f)))
                .map(|(r, f)| split(&partitions[r], f))
                .find(|(train, _)| train == rows)
                .expect("fit rows match a unit's training partition");
            assert!(rows.iter().all(|r| !test.contains(r)));
            unit_fits += 1;
        }
        assert_eq!(unit_fits, 2 * 3 * 3);
    }

    #[test]
    fn test_deterministic_for_seed_and_threads() {
        let (x, ids, y) = classification_data(30, 6, 2);
        let params = fast_params(vec![2, 4]);
        let a = select_features(&x, &ids, &y, &params).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let b = pool.install(|| select_features(&x, &ids, &y, &params)).unwrap();

        assert_eq!(a.resamples, b.resamples);
        assert_eq!(a.selected, b.selected);
        assert_eq!(a.best_size, b.best_size);
    }

    #[test]
    fn test_full_size_row_matches_cross_validate() {
        let (x, ids, y) = classification_data(30, 5, 3);
        let params = fast_params(vec![2, 5]);
        let rfe = select_features(&x, &ids, &y, &params).unwrap();
        let cv = cross_validate(&x, &y, &params).unwrap();

        let full: Vec<f64> = rfe.resamples.iter().filter(|c| c.size == 5).map(|c| c.metric).collect();
        let baseline: Vec<f64> = cv.scores.iter().map(|c| c.metric).collect();
        assert_eq!(full, baseline);
    }

    #[test]
    fn test_oversized_sizes_capped() {
        let (x, ids, y) = classification_data(24, 4, 4);
        let result = select_features(&x, &ids, &y, &fast_params(vec![2, 10, 100])).unwrap();
        let sizes: Vec<usize> = result.performance.iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![2, 4]);
    }

    #[test]
    fn test_size_zero_rejected() {
        let (x, ids, y) = classification_data(12, 3, 5);
        let err = select_features(&x, &ids, &y, &fast_params(vec![0, 2])).unwrap_err();
        assert!(matches!(err, BiomarkerError::Validation { .. }));
    }

    #[test]
    fn test_stratification_error() {
        let (x, ids, _) = classification_data(10, 3, 6);
        let labels: Vec<String> = (0..10).map(|i| if i < 8 { "a" } else { "b" }.to_string()).collect();
        let err = select_features(&x, &ids, &Outcome::Classes(labels), &fast_params(vec![2])).unwrap_err();
        assert!(matches!(err, BiomarkerError::Stratification { count: 2, folds: 3, .. }));
    }

    #[test]
    fn test_single_class_rejected() {
        let (x, ids, _) = classification_data(9, 3, 6);
        let labels = vec!["a".to_string(); 9];
        let err = select_features(&x, &ids, &Outcome::Classes(labels), &fast_params(vec![2])).unwrap_err();
        assert!(matches!(err, BiomarkerError::DegenerateInput { .. }));
    }

    #[test]
    fn test_regression_outcome() {
        let mut rng = MersenneTwister::new(8);
        let n = 40;
        let mut x = Array2::zeros((n, 6));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            for j in 0..6 {
                x[[i, j]] = rng.rnorm();
            }
            y.push(2.0 * x[[i, 3]] + 0.1 * rng.rnorm());
        }
        let ids: Vec<String> = (0..6).map(|j| format!("F{}", j)).collect();
        let params = RfeParams {
            regression_metric: RegressionMetric::RSquared,
            ..fast_params(vec![1, 3, 6])
        };
        let result = select_features(&x, &ids, &Outcome::Continuous(y), &params).unwrap();
        assert_eq!(result.metric, "r_squared");
        assert_eq!(result.ranking[0].id, "F3");

        let cols: Vec<usize> = result
            .model
            .feature_ids()
            .iter()
            .map(|id| ids.iter().position(|f| f == id).unwrap())
            .collect();
        let preds = result.model.predict(x.select(Axis(1), &cols).view()).unwrap();
        assert_eq!(preds.len(), n);
        assert!(matches!(preds[0], Prediction::Value(_)));
        assert!(result.model.predict(x.view()).is_err() || cols.len() == 6);
    }

    #[test]
    fn test_cancellation() {
        let (x, ids, y) = classification_data(20, 4, 9);
        let flag = Arc::new(AtomicBool::new(true));
        let params = RfeParams {
            cancel: Some(flag),
            ..fast_params(vec![2])
        };
        let err = select_features(&x, &ids, &y, &params).unwrap_err();
        assert!(matches!(err, BiomarkerError::Cancelled));
    }

    #[test]
    fn test_folds_exceeding_samples() {
        let (x, ids, y) = classification_data(6, 3, 10);
        let params = RfeParams {
            folds: 7,
            ..fast_params(vec![2])
        };
        let err = select_features(&x, &ids, &y, &params).unwrap_err();
        assert!(matches!(err, BiomarkerError::Validation { .. }));
    }
}
