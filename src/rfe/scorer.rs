//! Outcome-specific model fitting, ranking and scoring
//!
//! The cross-validation driver is generic over [`Scorer`]; classification and
//! regression differ only in the target, the importance measure and the
//! metric. Every metric is oriented so that higher is better.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::folds::Strata;
use super::forest::{ForestParams, RandomForest};
use super::tree::Target;
use crate::error::Result;

/// Classification performance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassMetric {
    #[default]
    Accuracy,
    /// Cohen's kappa
    Kappa,
}

/// Regression performance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionMetric {
    /// Negative root mean squared error
    #[default]
    NegRmse,
    RSquared,
}

/// Model family used by recursive feature elimination
pub trait Scorer: Sync {
    /// Metric name for reports
    fn metric_name(&self) -> &'static str;

    /// Class labels to stratify folds by, if any
    fn strata(&self) -> Option<Strata<'_>>;

    /// Fit a forest on the given rows of `x`
    fn fit(&self, x: ArrayView2<'_, f64>, rows: &[usize], seed: u64) -> Result<RandomForest>;

    /// Per-column importance of a fitted forest (higher = more important)
    fn importance(&self, forest: &RandomForest, x: ArrayView2<'_, f64>) -> Vec<f64>;

    /// Metric of the forest's predictions on the test rows
    fn score(&self, forest: &RandomForest, x: ArrayView2<'_, f64>, test: &[usize]) -> f64;

    /// Fit on the training rows and return per-column importances
    fn rank(&self, x: ArrayView2<'_, f64>, rows: &[usize], seed: u64) -> Result<Vec<f64>> {
        let forest = self.fit(x, rows, seed)?;
        Ok(self.importance(&forest, x))
    }

    /// Fit on the training rows and score on the held-out rows
    fn evaluate(&self, x: ArrayView2<'_, f64>, train: &[usize], test: &[usize], seed: u64) -> Result<f64> {
        let forest = self.fit(x, train, seed)?;
        Ok(self.score(&forest, x, test))
    }
}

/// Random forest classification with OOB permutation importance
#[derive(Debug, Clone)]
pub struct ClassificationScorer {
    labels: Vec<usize>,
    classes: Vec<String>,
    forest: ForestParams,
    metric: ClassMetric,
}

impl ClassificationScorer {
    /// `labels` are class indices into `classes`
    pub fn new(labels: Vec<usize>, classes: Vec<String>, forest: ForestParams, metric: ClassMetric) -> Self {
        Self {
            labels,
            classes,
            forest,
            metric,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn target(&self) -> Target<'_> {
        Target::Classes {
            labels: &self.labels,
            n_classes: self.classes.len(),
        }
    }
}

impl Scorer for ClassificationScorer {
    fn metric_name(&self) -> &'static str {
        match self.metric {
            ClassMetric::Accuracy => "accuracy",
            ClassMetric::Kappa => "kappa",
        }
    }

    fn strata(&self) -> Option<Strata<'_>> {
        Some(Strata {
            labels: &self.labels,
            classes: &self.classes,
        })
    }

    fn fit(&self, x: ArrayView2<'_, f64>, rows: &[usize], seed: u64) -> Result<RandomForest> {
        RandomForest::fit(x, self.target(), rows, &self.forest, seed)
    }

    fn importance(&self, forest: &RandomForest, x: ArrayView2<'_, f64>) -> Vec<f64> {
        forest.permutation_importance(x, &self.labels)
    }

    fn score(&self, forest: &RandomForest, x: ArrayView2<'_, f64>, test: &[usize]) -> f64 {
        let predicted: Vec<usize> = forest.predict(x, test).into_iter().map(|p| p as usize).collect();
        let observed: Vec<usize> = test.iter().map(|&r| self.labels[r]).collect();
        match self.metric {
            ClassMetric::Accuracy => accuracy(&observed, &predicted),
            ClassMetric::Kappa => cohen_kappa(&observed, &predicted, self.classes.len()),
        }
    }
}

/// Random forest regression with impurity importance
#[derive(Debug, Clone)]
pub struct RegressionScorer {
    y: Vec<f64>,
    forest: ForestParams,
    metric: RegressionMetric,
}

impl RegressionScorer {
    pub fn new(y: Vec<f64>, forest: ForestParams, metric: RegressionMetric) -> Self {
        Self { y, forest, metric }
    }
}

impl Scorer for RegressionScorer {
    fn metric_name(&self) -> &'static str {
        match self.metric {
            RegressionMetric::NegRmse => "neg_rmse",
            RegressionMetric::RSquared => "r_squared",
        }
    }

    fn strata(&self) -> Option<Strata<'_>> {
        None
    }

    fn fit(&self, x: ArrayView2<'_, f64>, rows: &[usize], seed: u64) -> Result<RandomForest> {
        RandomForest::fit(x, Target::Continuous(&self.y), rows, &self.forest, seed)
    }

    fn importance(&self, forest: &RandomForest, _x: ArrayView2<'_, f64>) -> Vec<f64> {
        forest.impurity_importance()
    }

    fn score(&self, forest: &RandomForest, x: ArrayView2<'_, f64>, test: &[usize]) -> f64 {
        let predicted = forest.predict(x, test);
        let observed: Vec<f64> = test.iter().map(|&r| self.y[r]).collect();
        match self.metric {
            RegressionMetric::NegRmse => -rmse(&observed, &predicted),
            RegressionMetric::RSquared => r_squared(&observed, &predicted),
        }
    }
}

/// Fraction of correct predictions
pub fn accuracy(observed: &[usize], predicted: &[usize]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let correct = observed.iter().zip(predicted).filter(|(o, p)| o == p).count();
    correct as f64 / observed.len() as f64
}

/// Cohen's kappa
///
/// When chance agreement is 1 (a single class in both vectors) kappa is
/// undefined; perfect agreement then scores 1 and anything else 0.
pub fn cohen_kappa(observed: &[usize], predicted: &[usize], n_classes: usize) -> f64 {
    let n = observed.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mut obs_counts = vec![0.0; n_classes];
    let mut pred_counts = vec![0.0; n_classes];
    for (&o, &p) in observed.iter().zip(predicted) {
        obs_counts[o] += 1.0;
        pred_counts[p] += 1.0;
    }
    let po = accuracy(observed, predicted);
    let pe: f64 = obs_counts
        .iter()
        .zip(pred_counts.iter())
        .map(|(a, b)| a * b)
        .sum::<f64>()
        / (n * n);

    if (1.0 - pe).abs() < 1e-12 {
        return if po == 1.0 { 1.0 } else { 0.0 };
    }
    (po - pe) / (1.0 - pe)
}

/// Root mean squared error
pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let sse: f64 = observed.iter().zip(predicted).map(|(o, p)| (o - p).powi(2)).sum();
    (sse / observed.len() as f64).sqrt()
}

/// Coefficient of determination around the observed mean
///
/// A constant observed vector scores 1 for an exact fit and 0 otherwise.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let sst: f64 = observed.iter().map(|o| (o - mean).powi(2)).sum();
    let sse: f64 = observed.iter().zip(predicted).map(|(o, p)| (o - p).powi(2)).sum();
    if sst == 0.0 {
        return if sse == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - sse / sst
}
