//! Gene-set similarity and module detection

use std::collections::HashSet;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Pairwise gene-set similarity measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// |A ∩ B| / |A ∪ B|
    #[default]
    Jaccard,
    /// |A ∩ B| / min(|A|, |B|)
    Overlap,
}

impl Similarity {
    pub fn compute(self, a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
        let shared = a.intersection(b).count() as f64;
        let denom = match self {
            Similarity::Jaccard => (a.len() + b.len()) as f64 - shared,
            Similarity::Overlap => a.len().min(b.len()) as f64,
        };
        if denom == 0.0 {
            0.0
        } else {
            shared / denom
        }
    }
}

/// Symmetric similarity matrix with ones on the diagonal
pub fn similarity_matrix(sets: &[HashSet<&str>], measure: Similarity) -> Array2<f64> {
    let n = sets.len();
    let mut m = Array2::zeros((n, n));
    for i in 0..n {
        m[[i, i]] = 1.0;
        for j in (i + 1)..n {
            let s = measure.compute(&sets[i], &sets[j]);
            m[[i, j]] = s;
            m[[j, i]] = s;
        }
    }
    m
}

/// Connected components of the graph linking sets with similarity >= `cutoff`
///
/// Components are listed by their smallest member index; members ascend.
pub fn connected_components(similarity: &Array2<f64>, cutoff: f64) -> Vec<Vec<usize>> {
    let n = similarity.nrows();
    let mut component = vec![usize::MAX; n];
    let mut modules = Vec::new();

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let id = modules.len();
        let mut members = vec![start];
        let mut stack = vec![start];
        component[start] = id;
        while let Some(i) = stack.pop() {
            for j in 0..n {
                if component[j] == usize::MAX && j != i && similarity[[i, j]] >= cutoff {
                    component[j] = id;
                    members.push(j);
                    stack.push(j);
                }
            }
        }
        members.sort_unstable();
        modules.push(members);
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set<'a>(genes: &[&'a str]) -> HashSet<&'a str> {
        genes.iter().copied().collect()
    }

    #[test]
    fn test_jaccard_and_overlap() {
        let a = set(&["A", "B", "C", "D"]);
        let b = set(&["C", "D"]);
        assert!((Similarity::Jaccard.compute(&a, &b) - 0.5).abs() < 1e-12);
        assert!((Similarity::Overlap.compute(&a, &b) - 1.0).abs() < 1e-12);
        assert_eq!(Similarity::Jaccard.compute(&set(&[]), &set(&[])), 0.0);
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let sets = vec![set(&["A", "B"]), set(&["B", "C"]), set(&["X"])];
        let m = similarity_matrix(&sets, Similarity::Jaccard);
        assert_eq!(m[[0, 1]], m[[1, 0]]);
        assert_eq!(m[[2, 2]], 1.0);
        assert_eq!(m[[0, 2]], 0.0);
    }

    #[test]
    fn test_components() {
        let sets = vec![set(&["A", "B"]), set(&["X", "Y"]), set(&["B", "C"]), set(&["C", "D"])];
        let m = similarity_matrix(&sets, Similarity::Jaccard);
        let modules = connected_components(&m, 0.3);
        assert_eq!(modules, vec![vec![0, 2, 3], vec![1]]);
    }
}
