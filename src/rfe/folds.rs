//! Fold partitions for repeated k-fold cross-validation

use crate::error::{BiomarkerError, Result};
use crate::rng::MersenneTwister;

/// Class membership used to stratify folds
#[derive(Debug, Clone, Copy)]
pub struct Strata<'a> {
    /// Class index per sample
    pub labels: &'a [usize],
    /// Class names, indexed by class
    pub classes: &'a [String],
}

/// Check the fold count against the sample count (and class sizes when stratified)
pub fn validate_folds(n_samples: usize, k: usize, strata: Option<Strata<'_>>) -> Result<()> {
    if k < 2 {
        return Err(BiomarkerError::validation(format!(
            "number of folds must be at least 2, got {}",
            k
        )));
    }
    if k > n_samples {
        return Err(BiomarkerError::validation(format!(
            "number of folds ({}) exceeds number of samples ({})",
            k, n_samples
        )));
    }
    if let Some(strata) = strata {
        let mut counts = vec![0usize; strata.classes.len()];
        for &label in strata.labels {
            counts[label] += 1;
        }
        if let Some((class, &count)) = counts.iter().enumerate().find(|(_, &c)| c < k) {
            return Err(BiomarkerError::Stratification {
                class: strata.classes[class].clone(),
                count,
                folds: k,
            });
        }
    }
    Ok(())
}

/// Shuffle all samples and split them into `k` near-equal folds
pub fn kfold(n_samples: usize, k: usize, rng: &mut MersenneTwister) -> Result<Vec<Vec<usize>>> {
    validate_folds(n_samples, k, None)?;
    let mut indices: Vec<usize> = (0..n_samples).collect();
    rng.shuffle(&mut indices);

    let base_size = n_samples / k;
    let remainder = n_samples % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = base_size + usize::from(i < remainder);
        let mut fold = indices[start..start + size].to_vec();
        fold.sort_unstable();
        folds.push(fold);
        start += size;
    }
    Ok(folds)
}

/// Stratified folds: shuffle each class, then deal its members round-robin
///
/// Dealing continues where the previous class stopped, so fold sizes differ
/// by at most one overall and each class is spread as evenly as possible.
pub fn stratified_kfold(strata: Strata<'_>, k: usize, rng: &mut MersenneTwister) -> Result<Vec<Vec<usize>>> {
    validate_folds(strata.labels.len(), k, Some(strata))?;
    let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); strata.classes.len()];
    for (i, &label) in strata.labels.iter().enumerate() {
        class_indices[label].push(i);
    }

    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    let mut next = 0;
    for group in &mut class_indices {
        rng.shuffle(group);
        for &idx in group.iter() {
            folds[next].push(idx);
            next = (next + 1) % k;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Training and test rows for held-out fold `i`
pub fn split(folds: &[Vec<usize>], i: usize) -> (Vec<usize>, Vec<usize>) {
    let mut train: Vec<usize> = folds
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .flat_map(|(_, v)| v.iter().copied())
        .collect();
    train.sort_unstable();
    (train, folds[i].clone())
}
