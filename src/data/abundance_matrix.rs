//! Abundance matrix representation for proteomics data
//!
//! Rows are features (proteins/peptides), columns are samples. Missing
//! observations are stored explicitly as `None`.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::metadata::FeatureMeta;
use crate::error::{BiomarkerError, Result};

/// Per-sample summary used as a matrix-derived outcome (e.g. for confounder screening)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStatistic {
    #[default]
    Median,
    Mean,
}

/// Feature-by-sample abundance matrix with explicit missing values
#[derive(Debug, Clone)]
pub struct AbundanceMatrix {
    /// Abundance values (features x samples), `None` = not observed
    values: Array2<Option<f64>>,
    /// Per-row feature annotation, attached once at construction
    features: Vec<FeatureMeta>,
    /// Sample identifiers
    sample_ids: Vec<String>,
}

/// Report the first duplicated identifier, if any
fn first_duplicate(ids: impl IntoIterator<Item = impl AsRef<str>>) -> Option<String> {
    let mut seen = HashSet::new();
    for id in ids {
        let id = id.as_ref().to_string();
        if !seen.insert(id.clone()) {
            return Some(id);
        }
    }
    None
}

impl AbundanceMatrix {
    /// Create a new abundance matrix
    pub fn new(
        values: Array2<Option<f64>>,
        features: Vec<FeatureMeta>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_features, n_samples) = values.dim();

        if features.len() != n_features {
            return Err(BiomarkerError::DimensionMismatch {
                expected: format!("{} feature IDs", n_features),
                got: format!("{} feature IDs", features.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(BiomarkerError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if let Some(dup) = first_duplicate(features.iter().map(|f| f.id.as_str())) {
            return Err(BiomarkerError::validation(format!(
                "duplicate feature ID '{}'",
                dup
            )));
        }
        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(BiomarkerError::validation(format!(
                "duplicate sample ID '{}'",
                dup
            )));
        }

        if let Some(((i, j), _)) = values
            .indexed_iter()
            .find(|(_, v)| matches!(v, Some(x) if !x.is_finite()))
        {
            return Err(BiomarkerError::validation(format!(
                "non-finite value for feature '{}' in sample '{}' (use a missing entry instead)",
                features[i].id, sample_ids[j]
            )));
        }

        Ok(Self {
            values,
            features,
            sample_ids,
        })
    }

    /// Create from a dense array where NaN marks a missing observation
    pub fn from_nan_array(
        values: Array2<f64>,
        features: Vec<FeatureMeta>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let values = values.mapv(|x| if x.is_nan() { None } else { Some(x) });
        Self::new(values, features, sample_ids)
    }

    /// Build a new matrix with the same row/column identifiers and different values
    ///
    /// Used by every transform stage so each stage returns an independent copy.
    pub fn with_values(&self, values: Array2<Option<f64>>) -> Result<Self> {
        if values.dim() != self.values.dim() {
            return Err(BiomarkerError::DimensionMismatch {
                expected: format!("{:?}", self.values.dim()),
                got: format!("{:?}", values.dim()),
            });
        }
        Self::new(values, self.features.clone(), self.sample_ids.clone())
    }

    pub fn n_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, Option<f64>> {
        self.values.view()
    }

    pub fn get(&self, feature_idx: usize, sample_idx: usize) -> Option<f64> {
        self.values[[feature_idx, sample_idx]]
    }

    pub fn row(&self, feature_idx: usize) -> ArrayView1<'_, Option<f64>> {
        self.values.row(feature_idx)
    }

    pub fn column(&self, sample_idx: usize) -> ArrayView1<'_, Option<f64>> {
        self.values.column(sample_idx)
    }

    pub fn features(&self) -> &[FeatureMeta] {
        &self.features
    }

    /// Feature IDs in row order
    pub fn feature_ids(&self) -> Vec<String> {
        self.features.iter().map(|f| f.id.clone()).collect()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn feature_index(&self, feature_id: &str) -> Option<usize> {
        self.features.iter().position(|f| f.id == feature_id)
    }

    /// Total number of missing entries
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Fraction of missing entries in one row
    pub fn missing_fraction_row(&self, feature_idx: usize) -> f64 {
        let n = self.n_samples();
        if n == 0 {
            return 0.0;
        }
        let missing = self.values.row(feature_idx).iter().filter(|v| v.is_none()).count();
        missing as f64 / n as f64
    }

    /// Number of observed values per sample
    pub fn observed_per_sample(&self) -> Vec<usize> {
        self.values
            .axis_iter(Axis(1))
            .map(|col| col.iter().filter(|v| v.is_some()).count())
            .collect()
    }

    /// Subset to specific features (row order follows `feature_indices`)
    pub fn subset_features(&self, feature_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(0), feature_indices);
        let features = feature_indices
            .iter()
            .map(|&i| self.features[i].clone())
            .collect();
        Self::new(values, features, self.sample_ids.clone())
    }

    /// Drop every row that still has a missing entry
    ///
    /// Returns the complete matrix and the IDs of the dropped features.
    pub fn drop_incomplete_rows(&self) -> Result<(Self, Vec<String>)> {
        let (keep, dropped): (Vec<usize>, Vec<usize>) = (0..self.n_features())
            .partition(|&i| self.values.row(i).iter().all(|v| v.is_some()));

        if keep.is_empty() {
            return Err(BiomarkerError::EmptyData {
                reason: "no feature is observed in every sample".to_string(),
            });
        }

        let dropped_ids = dropped
            .iter()
            .map(|&i| self.features[i].id.clone())
            .collect::<Vec<_>>();
        if !dropped_ids.is_empty() {
            log::warn!(
                "Dropping {} feature(s) with remaining missing values",
                dropped_ids.len()
            );
        }

        Ok((self.subset_features(&keep)?, dropped_ids))
    }

    /// Dense samples x features array for model fitting
    ///
    /// Fails if any entry is missing, naming the first incomplete feature.
    pub fn to_sample_major(&self) -> Result<Array2<f64>> {
        let (n_features, n_samples) = self.values.dim();
        let mut x = Array2::zeros((n_samples, n_features));
        for ((i, j), v) in self.values.indexed_iter() {
            match v {
                Some(val) => x[[j, i]] = *val,
                None => {
                    return Err(BiomarkerError::validation(format!(
                        "feature '{}' is missing in sample '{}'; impute or drop incomplete rows first",
                        self.features[i].id, self.sample_ids[j]
                    )))
                }
            }
        }
        Ok(x)
    }

    /// Per-sample statistic over observed values
    pub fn sample_statistic(&self, statistic: SampleStatistic) -> Result<Vec<f64>> {
        self.values
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(j, col)| {
                let mut observed: Vec<f64> = col.iter().flatten().copied().collect();
                if observed.is_empty() {
                    return Err(BiomarkerError::degenerate(format!(
                        "sample '{}' has no observed values",
                        self.sample_ids[j]
                    )));
                }
                Ok(match statistic {
                    SampleStatistic::Mean => observed.iter().sum::<f64>() / observed.len() as f64,
                    SampleStatistic::Median => median_in_place(&mut observed),
                })
            })
            .collect()
    }
}

/// Median of a non-empty slice (reorders the slice)
pub(crate) fn median_in_place(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn features(ids: &[&str]) -> Vec<FeatureMeta> {
        ids.iter().map(|id| FeatureMeta::new(*id, *id)).collect()
    }

    fn samples(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matrix_creation() {
        let values = array![[1.0, f64::NAN, 3.0], [4.0, 5.0, 6.0]];
        let m = AbundanceMatrix::from_nan_array(values, features(&["p1", "p2"]), samples(&["s1", "s2", "s3"]))
            .unwrap();
        assert_eq!(m.n_features(), 2);
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.missing_count(), 1);
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.get(1, 2), Some(6.0));
        assert!((m.missing_fraction_row(0) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let err = AbundanceMatrix::from_nan_array(values.clone(), features(&["p1", "p1"]), samples(&["s1", "s2"]));
        assert!(matches!(err, Err(BiomarkerError::Validation { .. })));

        let err = AbundanceMatrix::from_nan_array(values, features(&["p1", "p2"]), samples(&["s1", "s1"]));
        assert!(matches!(err, Err(BiomarkerError::Validation { .. })));
    }

    #[test]
    fn test_infinite_value_rejected() {
        let values = array![[1.0, f64::INFINITY]];
        let result = AbundanceMatrix::from_nan_array(values, features(&["p1"]), samples(&["s1", "s2"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_sample_major_requires_complete_data() {
        let values = array![[1.0, 2.0], [3.0, f64::NAN]];
        let m = AbundanceMatrix::from_nan_array(values, features(&["p1", "p2"]), samples(&["s1", "s2"])).unwrap();
        assert!(m.to_sample_major().is_err());

        let (complete, dropped) = m.drop_incomplete_rows().unwrap();
        assert_eq!(dropped, vec!["p2".to_string()]);
        let x = complete.to_sample_major().unwrap();
        assert_eq!(x.dim(), (2, 1));
        assert_eq!(x[[1, 0]], 2.0);
    }

    #[test]
    fn test_sample_statistic() {
        let values = array![[1.0, 10.0], [3.0, f64::NAN], [5.0, 20.0]];
        let m = AbundanceMatrix::from_nan_array(values, features(&["a", "b", "c"]), samples(&["s1", "s2"])).unwrap();
        let medians = m.sample_statistic(SampleStatistic::Median).unwrap();
        assert_eq!(medians, vec![3.0, 15.0]);
        let means = m.sample_statistic(SampleStatistic::Mean).unwrap();
        assert!((means[0] - 3.0).abs() < 1e-12);
    }
}
