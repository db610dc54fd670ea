//! Over-representation analysis of a feature subset in known pathways
//!
//! Each catalogue gene set is tested with a one-sided hypergeometric test
//! against a universe of measurable genes, p-values are corrected for
//! multiple testing, and the retained sets are compared by member overlap.

mod mapping;
mod similarity;

pub use mapping::{genes_from_features, map_features_to_genes, GeneMapping};
pub use similarity::{connected_components, similarity_matrix, Similarity};

use std::collections::HashSet;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{BiomarkerError, Result};
use crate::testing::{hypergeometric_upper_tail, Correction};

/// Named gene set from a pathway catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSet {
    pub id: String,
    pub description: String,
    pub genes: Vec<String>,
}

impl GeneSet {
    pub fn new(id: impl Into<String>, description: impl Into<String>, genes: Vec<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            genes,
        }
    }
}

/// Parameters for enrichment analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentParams {
    /// Sets with adjusted p-value <= alpha are retained
    pub alpha: f64,
    pub correction: Correction,
    pub similarity: Similarity,
    /// Minimum set size after restriction to the universe
    pub min_set_size: usize,
    /// Maximum set size after restriction to the universe
    pub max_set_size: Option<usize>,
}

impl Default for EnrichmentParams {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            correction: Correction::BenjaminiHochberg,
            similarity: Similarity::Jaccard,
            min_set_size: 1,
            max_set_size: None,
        }
    }
}

/// Test statistics of one gene set
#[derive(Debug, Clone, Serialize)]
pub struct SetResult {
    pub id: String,
    pub description: String,
    /// |query ∩ set|
    pub overlap_count: usize,
    /// |set ∩ universe|
    pub geneset_size: usize,
    pub universe_size: usize,
    /// |query ∩ universe|
    pub query_size: usize,
    pub p_value: f64,
    pub p_adjusted: f64,
    /// Query genes in the set, sorted
    pub overlap_genes: Vec<String>,
}

/// Gene set excluded from testing
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSet {
    pub id: String,
    /// Members inside the universe
    pub size_in_universe: usize,
}

/// Result of enrichment analysis
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    /// Tested sets in catalogue order
    pub tested: Vec<SetResult>,
    /// IDs of sets with adjusted p-value <= alpha, in catalogue order
    pub retained: Vec<String>,
    /// Similarity between retained sets (rows/columns follow `retained`)
    pub similarity: Array2<f64>,
    /// Query genes outside the universe
    pub dropped_query_genes: usize,
    pub skipped_sets: Vec<SkippedSet>,
}

impl EnrichmentResult {
    /// Retained sets grouped into modules of mutually similar sets
    pub fn modules(&self, cutoff: f64) -> Vec<Vec<String>> {
        connected_components(&self.similarity, cutoff)
            .into_iter()
            .map(|members| members.into_iter().map(|i| self.retained[i].clone()).collect())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&SetResult> {
        self.tested.iter().find(|r| r.id == id)
    }
}

/// Test a gene list for over-representation in each catalogue set
pub fn enrich(
    query: &[String],
    universe: &[String],
    gene_sets: &[GeneSet],
    params: &EnrichmentParams,
) -> Result<EnrichmentResult> {
    if !(params.alpha > 0.0 && params.alpha <= 1.0) {
        return Err(BiomarkerError::validation(format!(
            "alpha must be in (0, 1], got {}",
            params.alpha
        )));
    }
    let universe: HashSet<&str> = universe.iter().map(String::as_str).collect();
    if universe.is_empty() {
        return Err(BiomarkerError::EmptyData {
            reason: "gene universe is empty".to_string(),
        });
    }

    let query_all: HashSet<&str> = query.iter().map(String::as_str).collect();
    let query: HashSet<&str> = query_all.intersection(&universe).copied().collect();
    let dropped_query_genes = query_all.len() - query.len();
    if dropped_query_genes > 0 {
        log::warn!(
            "{} query gene(s) outside the universe were dropped",
            dropped_query_genes
        );
    }
    if query.is_empty() {
        log::warn!("No query gene falls inside the universe; every set will have p = 1");
    }

    let n_universe = universe.len();
    let n_query = query.len();

    // Restrict to the universe and apply size bounds
    let mut skipped_sets = Vec::new();
    let mut candidates = Vec::new();
    for set in gene_sets {
        let members: HashSet<&str> = set
            .genes
            .iter()
            .map(String::as_str)
            .filter(|g| universe.contains(g))
            .collect();
        let size = members.len();
        let too_large = params.max_set_size.is_some_and(|m| size > m);
        if size == 0 || size < params.min_set_size || too_large {
            skipped_sets.push(SkippedSet {
                id: set.id.clone(),
                size_in_universe: size,
            });
        } else {
            candidates.push((set, members));
        }
    }
    if !skipped_sets.is_empty() {
        log::info!("Skipped {} gene set(s) outside the size bounds", skipped_sets.len());
    }

    // One-sided hypergeometric test per set, in parallel
    let mut tested: Vec<SetResult> = candidates
        .par_iter()
        .map(|(set, members)| {
            let mut overlap_genes: Vec<String> = members
                .intersection(&query)
                .map(|g| g.to_string())
                .collect();
            overlap_genes.sort();
            let k = overlap_genes.len();
            SetResult {
                id: set.id.clone(),
                description: set.description.clone(),
                overlap_count: k,
                geneset_size: members.len(),
                universe_size: n_universe,
                query_size: n_query,
                p_value: hypergeometric_upper_tail(k, n_query, members.len(), n_universe),
                p_adjusted: f64::NAN,
                overlap_genes,
            }
        })
        .collect();

    let pvalues: Vec<f64> = tested.iter().map(|r| r.p_value).collect();
    for (r, padj) in tested.iter_mut().zip(params.correction.apply(&pvalues)) {
        r.p_adjusted = padj;
    }

    let retained_idx: Vec<usize> = (0..tested.len())
        .filter(|&i| tested[i].p_adjusted <= params.alpha)
        .collect();
    let retained: Vec<String> = retained_idx.iter().map(|&i| tested[i].id.clone()).collect();

    // Similarity over the full catalogue membership of the retained sets
    let full_members: Vec<HashSet<&str>> = retained_idx
        .iter()
        .map(|&i| candidates[i].0.genes.iter().map(String::as_str).collect())
        .collect();
    let similarity = similarity_matrix(&full_members, params.similarity);

    log::info!(
        "Enrichment: {} set(s) tested, {} retained at alpha = {}",
        tested.len(),
        retained.len(),
        params.alpha
    );

    Ok(EnrichmentResult {
        tested,
        retained,
        similarity,
        dropped_query_genes,
        skipped_sets,
    })
}
