//! Recursive feature elimination with repeated cross-validation
//!
//! - `folds`: stratified and plain k-fold partitions
//! - `tree`, `forest`: bagged CART models used for ranking and scoring
//! - `scorer`: classification and regression behind one [`Scorer`] trait
//! - `search`: the repeated-CV driver

mod folds;
mod forest;
mod scorer;
mod search;
mod tree;

pub use folds::{kfold, split, stratified_kfold, Strata};
pub use forest::{ForestParams, RandomForest};
pub use scorer::{
    accuracy, cohen_kappa, r_squared, rmse, ClassMetric, ClassificationScorer, RegressionMetric,
    RegressionScorer, Scorer,
};
pub use search::{
    cross_validate, select_features, BiomarkerModel, CvSummary, Outcome, Prediction, RankedFeature,
    ResampleRecord, RfeParams, RfeResult, SizePerformance,
};
pub use tree::DecisionTree;
