//! CART decision trees for the random forest
//!
//! Trees are grown on rows of a samples x features matrix, with a fresh
//! random subset of candidate features at every split. Classification trees
//! split on Gini impurity, regression trees on the residual sum of squares.
//! Nodes live in a flat arena with index 0 as the root.

use ndarray::{ArrayView1, ArrayView2};

use crate::rng::MersenneTwister;

/// Minimum impurity decrease for a split to be kept
const MIN_GAIN: f64 = 1e-12;

/// Response the tree is grown against, indexed by sample
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Classes { labels: &'a [usize], n_classes: usize },
    Continuous(&'a [f64]),
}

/// Growth limits for a single tree
#[derive(Debug, Clone)]
pub(crate) struct TreeParams {
    /// Candidate features per split
    pub mtry: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class index (as f64) for classification, mean for regression
    Leaf { value: f64 },
}

/// A fitted CART tree
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    /// Total impurity decrease per feature
    impurity_decrease: Vec<f64>,
}

/// Sufficient statistics of a node's response
#[derive(Debug, Clone)]
enum NodeStats {
    Counts(Vec<f64>),
    Moments { n: f64, sum: f64, sum_sq: f64 },
}

impl NodeStats {
    fn empty(target: &Target<'_>) -> Self {
        match target {
            Target::Classes { n_classes, .. } => NodeStats::Counts(vec![0.0; *n_classes]),
            Target::Continuous(_) => NodeStats::Moments { n: 0.0, sum: 0.0, sum_sq: 0.0 },
        }
    }

    fn add(&mut self, target: &Target<'_>, row: usize) {
        match (self, target) {
            (NodeStats::Counts(c), Target::Classes { labels, .. }) => c[labels[row]] += 1.0,
            (NodeStats::Moments { n, sum, sum_sq }, Target::Continuous(y)) => {
                *n += 1.0;
                *sum += y[row];
                *sum_sq += y[row] * y[row];
            }
            _ => unreachable!("node statistics do not match the target kind"),
        }
    }

    fn remove(&mut self, target: &Target<'_>, row: usize) {
        match (self, target) {
            (NodeStats::Counts(c), Target::Classes { labels, .. }) => c[labels[row]] -= 1.0,
            (NodeStats::Moments { n, sum, sum_sq }, Target::Continuous(y)) => {
                *n -= 1.0;
                *sum -= y[row];
                *sum_sq -= y[row] * y[row];
            }
            _ => unreachable!("node statistics do not match the target kind"),
        }
    }

    /// Impurity weighted by node size: n * Gini, or the sum of squares
    fn weighted_impurity(&self) -> f64 {
        match self {
            NodeStats::Counts(c) => {
                let n: f64 = c.iter().sum();
                if n == 0.0 {
                    0.0
                } else {
                    n - c.iter().map(|v| v * v).sum::<f64>() / n
                }
            }
            NodeStats::Moments { n, sum, sum_sq } => {
                if *n == 0.0 {
                    0.0
                } else {
                    (sum_sq - sum * sum / n).max(0.0)
                }
            }
        }
    }

    /// Majority class (lowest index on ties) or mean
    fn leaf_value(&self) -> f64 {
        match self {
            NodeStats::Counts(c) => {
                let mut best = 0;
                for (k, &v) in c.iter().enumerate() {
                    if v > c[best] {
                        best = k;
                    }
                }
                best as f64
            }
            NodeStats::Moments { n, sum, .. } => {
                if *n == 0.0 {
                    0.0
                } else {
                    sum / n
                }
            }
        }
    }
}

struct Builder<'a, 'r> {
    x: ArrayView2<'a, f64>,
    target: Target<'a>,
    params: &'a TreeParams,
    rng: &'r mut MersenneTwister,
    nodes: Vec<TreeNode>,
    impurity_decrease: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the given rows (duplicates allowed, e.g. a bootstrap sample)
    pub(crate) fn fit(
        x: ArrayView2<'_, f64>,
        target: Target<'_>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut MersenneTwister,
    ) -> Self {
        let n_features = x.ncols();
        let mut builder = Builder {
            x: x.view(),
            target,
            params,
            rng,
            nodes: Vec::new(),
            impurity_decrease: vec![0.0; n_features],
        };
        builder.build(rows.to_vec(), 0);
        DecisionTree {
            nodes: builder.nodes,
            impurity_decrease: builder.impurity_decrease,
        }
    }

    /// Predict from a feature accessor `value(feature_index)`
    pub(crate) fn predict_with(&self, value: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if value(*feature) <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Predict one sample
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.predict_with(|f| row[f])
    }

    pub(crate) fn impurity_decrease(&self) -> &[f64] {
        &self.impurity_decrease
    }

    /// Features used by at least one split
    pub(crate) fn split_features(&self) -> Vec<usize> {
        let mut features: Vec<usize> = self
            .nodes
            .iter()
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .collect();
        features.sort_unstable();
        features.dedup();
        features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

impl Builder<'_, '_> {
    fn stats(&self, rows: &[usize]) -> NodeStats {
        let mut s = NodeStats::empty(&self.target);
        for &r in rows {
            s.add(&self.target, r);
        }
        s
    }

    fn leaf(&mut self, value: f64) -> usize {
        self.nodes.push(TreeNode::Leaf { value });
        self.nodes.len() - 1
    }

    /// Recursively build the subtree for `rows`, returning its arena index
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let stats = self.stats(&rows);
        let parent_impurity = stats.weighted_impurity();
        let value = stats.leaf_value();

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || rows.len() < self.params.min_samples_split.max(2)
            || parent_impurity <= MIN_GAIN
        {
            return self.leaf(value);
        }

        let Some((feature, threshold, gain)) = self.best_split(&rows, &stats, parent_impurity) else {
            return self.leaf(value);
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[[r, feature]] <= threshold);

        self.impurity_decrease[feature] += gain;

        // Reserve the slot so the parent precedes its children
        let node_idx = self.leaf(value);
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_idx
    }

    /// Best (feature, threshold, gain) over a random subset of features
    fn best_split(&mut self, rows: &[usize], parent: &NodeStats, parent_impurity: f64) -> Option<(usize, f64, f64)> {
        let n_features = self.x.ncols();
        let mtry = self.params.mtry.clamp(1, n_features);
        let candidates = self.rng.sample_without_replacement(n_features, mtry);
        let min_leaf = self.params.min_samples_leaf.max(1);
        let n = rows.len();

        let mut best: Option<(usize, f64, f64)> = None;
        let mut best_gain = MIN_GAIN;

        for feature in candidates {
            let mut sorted: Vec<(f64, usize)> = rows.iter().map(|&r| (self.x[[r, feature]], r)).collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 == sorted[n - 1].0 {
                continue;
            }

            let mut left = NodeStats::empty(&self.target);
            let mut right = parent.clone();
            for k in 1..n {
                let row = sorted[k - 1].1;
                left.add(&self.target, row);
                right.remove(&self.target, row);

                if sorted[k - 1].0 == sorted[k].0 || k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let gain = parent_impurity - left.weighted_impurity() - right.weighted_impurity();
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, (sorted[k - 1].0 + sorted[k].0) / 2.0, gain));
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(mtry: usize) -> TreeParams {
        TreeParams {
            mtry,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_separable_classification() {
        let x = array![[0.1, 5.0], [0.2, 3.0], [0.3, 4.0], [0.9, 3.5], [1.0, 4.5], [1.1, 5.5]];
        let labels = vec![0, 0, 0, 1, 1, 1];
        let target = Target::Classes { labels: &labels, n_classes: 2 };
        let rows: Vec<usize> = (0..6).collect();
        let tree = DecisionTree::fit(x.view(), target, &rows, &params(2), &mut MersenneTwister::new(1));

        for i in 0..6 {
            assert_eq!(tree.predict_row(x.row(i)) as usize, labels[i]);
        }
        assert_eq!(tree.split_features(), vec![0]);
        assert!(tree.impurity_decrease()[0] > 0.0);
        assert_eq!(tree.impurity_decrease()[1], 0.0);
    }

    #[test]
    fn test_regression_step_function() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = vec![1.0, 1.0, 1.0, 5.0, 5.0, 5.0];
        let rows: Vec<usize> = (0..6).collect();
        let tree = DecisionTree::fit(x.view(), Target::Continuous(&y), &rows, &params(1), &mut MersenneTwister::new(1));

        assert_eq!(tree.n_nodes(), 3);
        assert!((tree.predict_row(array![2.5].view()) - 1.0).abs() < 1e-12);
        assert!((tree.predict_row(array![4.2].view()) - 5.0).abs() < 1e-12);
        // SSE of the root (24) is fully removed by the split
        assert!((tree.impurity_decrease()[0] - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let labels = vec![1, 1, 1];
        let target = Target::Classes { labels: &labels, n_classes: 2 };
        let tree = DecisionTree::fit(x.view(), target, &[0, 1, 2], &params(1), &mut MersenneTwister::new(1));
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict_row(x.row(0)), 1.0);
    }

    #[test]
    fn test_max_depth_zero() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let p = TreeParams { max_depth: Some(0), ..params(1) };
        let tree = DecisionTree::fit(x.view(), Target::Continuous(&y), &[0, 1, 2, 3], &p, &mut MersenneTwister::new(1));
        assert_eq!(tree.n_nodes(), 1);
        assert!((tree.predict_row(x.row(0)) - 2.5).abs() < 1e-12);
    }
}
