//! Random forest: bagged CART trees with per-split feature sampling
//!
//! Provides the ranking model used inside recursive feature elimination.
//! Each tree is grown on a bootstrap sample of the training rows from its own
//! seeded stream, so a forest depends only on its seed and inputs.

use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, Target, TreeParams};
use crate::error::{BiomarkerError, Result};
use crate::rng::{derive_seed, MersenneTwister};

/// Random forest hyper-parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_trees: usize,
    /// Candidate features per split; `None` uses sqrt(p) for classification
    /// and max(p/3, 1) for regression
    pub mtry: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            mtry: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Stream tags for per-tree random draws
const GROW_STREAM: u64 = 0;
const PERMUTE_STREAM: u64 = 1;

/// A fitted random forest
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Out-of-bag rows of each tree
    oob_rows: Vec<Vec<usize>>,
    n_features: usize,
    /// `Some` for classification forests
    n_classes: Option<usize>,
    seed: u64,
}

impl RandomForest {
    /// Fit on the given rows of `x` (samples x features)
    pub(crate) fn fit(
        x: ArrayView2<'_, f64>,
        target: Target<'_>,
        rows: &[usize],
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self> {
        if rows.is_empty() {
            return Err(BiomarkerError::EmptyData {
                reason: "no training rows for random forest".to_string(),
            });
        }
        if params.n_trees == 0 {
            return Err(BiomarkerError::validation("n_trees must be at least 1"));
        }
        let n_features = x.ncols();
        if n_features == 0 {
            return Err(BiomarkerError::EmptyData {
                reason: "no features for random forest".to_string(),
            });
        }

        let n_classes = match target {
            Target::Classes { n_classes, .. } => Some(n_classes),
            Target::Continuous(_) => None,
        };
        let mtry = params.mtry.unwrap_or(match n_classes {
            Some(_) => ((n_features as f64).sqrt().floor() as usize).max(1),
            None => (n_features / 3).max(1),
        });
        let tree_params = TreeParams {
            mtry,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
        };

        let grown: Vec<(DecisionTree, Vec<usize>)> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = MersenneTwister::new(derive_seed(seed, &[t as u64, GROW_STREAM]));
                let draws = rng.sample_with_replacement(rows.len(), rows.len());
                let mut in_bag = vec![false; rows.len()];
                let bootstrap: Vec<usize> = draws
                    .iter()
                    .map(|&d| {
                        in_bag[d] = true;
                        rows[d]
                    })
                    .collect();
                let oob: Vec<usize> = rows
                    .iter()
                    .zip(in_bag.iter())
                    .filter(|(_, &b)| !b)
                    .map(|(&r, _)| r)
                    .collect();
                let tree = DecisionTree::fit(x, target, &bootstrap, &tree_params, &mut rng);
                (tree, oob)
            })
            .collect();

        let (trees, oob_rows) = grown.into_iter().unzip();
        Ok(Self {
            trees,
            oob_rows,
            n_features,
            n_classes,
            seed,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_classifier(&self) -> bool {
        self.n_classes.is_some()
    }

    /// Combine per-tree predictions: majority vote (lowest class on ties) or mean
    fn aggregate(&self, votes: impl Iterator<Item = f64>) -> f64 {
        match self.n_classes {
            Some(n_classes) => {
                let mut counts = vec![0usize; n_classes.max(1)];
                for v in votes {
                    let class = v as usize;
                    if class < counts.len() {
                        counts[class] += 1;
                    }
                }
                let mut best = 0;
                for (k, &c) in counts.iter().enumerate() {
                    if c > counts[best] {
                        best = k;
                    }
                }
                best as f64
            }
            None => {
                let (sum, n) = votes.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                sum / n as f64
            }
        }
    }

    /// Predict the given rows of `x`; class predictions are class indices
    pub fn predict(&self, x: ArrayView2<'_, f64>, rows: &[usize]) -> Vec<f64> {
        rows.iter()
            .map(|&r| {
                let row = x.row(r);
                self.aggregate(self.trees.iter().map(|t| t.predict_row(row)))
            })
            .collect()
    }

    /// Mean total impurity decrease per feature
    pub fn impurity_importance(&self) -> Vec<f64> {
        let mut importance = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, v) in importance.iter_mut().zip(tree.impurity_decrease()) {
                *acc += v;
            }
        }
        let n = self.trees.len() as f64;
        importance.iter_mut().for_each(|v| *v /= n);
        importance
    }

    /// Out-of-bag permutation importance (mean decrease in accuracy)
    ///
    /// For each tree, the accuracy on its out-of-bag rows is compared with the
    /// accuracy after permuting one feature among those rows. Features a tree
    /// never splits on contribute zero for that tree. Averaged over trees with
    /// a non-empty out-of-bag set.
    pub(crate) fn permutation_importance(&self, x: ArrayView2<'_, f64>, labels: &[usize]) -> Vec<f64> {
        let per_tree: Vec<Option<Vec<f64>>> = self
            .trees
            .par_iter()
            .zip(self.oob_rows.par_iter())
            .enumerate()
            .map(|(t, (tree, oob))| {
                if oob.is_empty() {
                    return None;
                }
                let mut rng = MersenneTwister::new(derive_seed(self.seed, &[t as u64, PERMUTE_STREAM]));
                let n_oob = oob.len() as f64;
                let correct = |pred: f64, row: usize| (pred as usize == labels[row]) as usize;

                let baseline: usize = oob
                    .iter()
                    .map(|&r| correct(tree.predict_row(x.row(r)), r))
                    .sum();

                let mut decrease = vec![0.0; self.n_features];
                for feature in tree.split_features() {
                    let mut permuted = oob.clone();
                    rng.shuffle(&mut permuted);
                    let permuted_correct: usize = oob
                        .iter()
                        .zip(permuted.iter())
                        .map(|(&r, &donor)| {
                            let pred = tree.predict_with(|f| if f == feature { x[[donor, f]] } else { x[[r, f]] });
                            correct(pred, r)
                        })
                        .sum();
                    decrease[feature] = (baseline as f64 - permuted_correct as f64) / n_oob;
                }
                Some(decrease)
            })
            .collect();

        let mut importance = vec![0.0; self.n_features];
        let mut n_used = 0usize;
        for decrease in per_tree.into_iter().flatten() {
            n_used += 1;
            for (acc, v) in importance.iter_mut().zip(decrease) {
                *acc += v;
            }
        }
        if n_used > 0 {
            importance.iter_mut().for_each(|v| *v /= n_used as f64);
        }
        importance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Feature 0 separates the classes; the rest is noise
    fn two_class_data(n: usize, p: usize, seed: u64) -> (Array2<f64>, Vec<usize>) {
        let mut rng = MersenneTwister::new(seed);
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let mut x = Array2::zeros((n, p));
        for i in 0..n {
            for j in 0..p {
                x[[i, j]] = rng.rnorm();
            }
            x[[i, 0]] += 4.0 * labels[i] as f64;
        }
        (x, labels)
    }

    fn small_forest() -> ForestParams {
        ForestParams {
            n_trees: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_forest_classifies_training_data() {
        let (x, labels) = two_class_data(40, 5, 3);
        let rows: Vec<usize> = (0..40).collect();
        let target = Target::Classes { labels: &labels, n_classes: 2 };
        let forest = RandomForest::fit(x.view(), target, &rows, &small_forest(), 7).unwrap();
        assert_eq!(forest.n_trees(), 30);
        assert!(forest.is_classifier());

        let preds = forest.predict(x.view(), &rows);
        let accuracy = preds
            .iter()
            .zip(labels.iter())
            .filter(|(p, &l)| **p as usize == l)
            .count() as f64
            / 40.0;
        assert!(accuracy > 0.9, "training accuracy {}", accuracy);
    }

    #[test]
    fn test_permutation_importance_finds_signal() {
        let (x, labels) = two_class_data(60, 6, 11);
        let rows: Vec<usize> = (0..60).collect();
        let target = Target::Classes { labels: &labels, n_classes: 2 };
        let forest = RandomForest::fit(x.view(), target, &rows, &small_forest(), 5).unwrap();

        let importance = forest.permutation_importance(x.view(), &labels);
        let top = importance
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(top, Some(0), "importance: {:?}", importance);
    }

    #[test]
    fn test_regression_impurity_importance() {
        let mut rng = MersenneTwister::new(4);
        let n = 50;
        let mut x = Array2::zeros((n, 4));
        let mut y = vec![0.0; n];
        for i in 0..n {
            for j in 0..4 {
                x[[i, j]] = rng.rnorm();
            }
            y[i] = 3.0 * x[[i, 2]] + 0.1 * rng.rnorm();
        }
        let rows: Vec<usize> = (0..n).collect();
        let forest = RandomForest::fit(x.view(), Target::Continuous(&y), &rows, &small_forest(), 1).unwrap();
        assert!(!forest.is_classifier());

        let importance = forest.impurity_importance();
        for j in [0, 1, 3] {
            assert!(importance[2] > importance[j], "importance: {:?}", importance);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, labels) = two_class_data(30, 4, 2);
        let rows: Vec<usize> = (0..30).collect();
        let target = Target::Classes { labels: &labels, n_classes: 2 };
        let a = RandomForest::fit(x.view(), target, &rows, &small_forest(), 9).unwrap();
        let b = RandomForest::fit(x.view(), target, &rows, &small_forest(), 9).unwrap();
        assert_eq!(
            a.permutation_importance(x.view(), &labels),
            b.permutation_importance(x.view(), &labels)
        );
    }

    #[test]
    fn test_empty_rows_rejected() {
        let (x, labels) = two_class_data(10, 2, 1);
        let target = Target::Classes { labels: &labels, n_classes: 2 };
        assert!(RandomForest::fit(x.view(), target, &[], &small_forest(), 1).is_err());
    }
}
