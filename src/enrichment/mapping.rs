//! Feature to gene identifier mapping

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::data::FeatureMeta;

/// Genes for a feature subset
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeneMapping {
    /// Distinct gene IDs, in first-seen order
    pub genes: Vec<String>,
    /// Features without a gene ID (excluded from enrichment)
    pub unmapped: Vec<String>,
}

/// Map feature IDs to canonical gene IDs through an external table
pub fn map_features_to_genes(features: &[String], mapping: &HashMap<String, String>) -> GeneMapping {
    collect_genes(features.iter().map(|f| (f.as_str(), mapping.get(f).map(String::as_str))))
}

/// Gene IDs already attached to feature metadata
pub fn genes_from_features(features: &[FeatureMeta]) -> GeneMapping {
    collect_genes(features.iter().map(|f| (f.id.as_str(), f.gene_id.as_deref())))
}

fn collect_genes<'a>(pairs: impl Iterator<Item = (&'a str, Option<&'a str>)>) -> GeneMapping {
    let mut seen = HashSet::new();
    let mut result = GeneMapping::default();
    for (feature, gene) in pairs {
        match gene {
            Some(g) if !g.is_empty() => {
                if seen.insert(g) {
                    result.genes.push(g.to_string());
                }
            }
            _ => result.unmapped.push(feature.to_string()),
        }
    }
    if !result.unmapped.is_empty() {
        log::warn!(
            "{} feature(s) have no gene mapping and are excluded from enrichment",
            result.unmapped.len()
        );
    }
    result
}
