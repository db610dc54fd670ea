//! End-to-end biomarker discovery
//!
//! normalize -> impute -> confounder screen -> RFE -> gene mapping -> enrichment.
//! Every stage is configured through [`PipelineConfig`], which can be loaded
//! from JSON; fields left out keep their defaults.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::confounder::{detect_confounders, ConfounderParams, ConfounderVerdict};
use crate::data::{AbundanceMatrix, Covariate, SampleAnnotation, SampleStatistic};
use crate::enrichment::{
    enrich, genes_from_features, map_features_to_genes, EnrichmentParams, EnrichmentResult,
    GeneMapping, GeneSet,
};
use crate::error::{BiomarkerError, Result};
use crate::impute::{impute, ImputationReport, KnnParams};
use crate::rfe::{
    select_features, BiomarkerModel, Outcome, RankedFeature, ResampleRecord, RfeParams, RfeResult,
    SizePerformance,
};
use crate::transform::{normalize, VsnParams, VsnResult};

/// Configuration of a full pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Annotation column with the outcome; categorical gives classification,
    /// numeric or date gives regression
    pub outcome: String,
    /// Covariates screened for confounding (empty skips the screen)
    pub confounder_covariates: Vec<String>,
    /// Per-sample summary of the matrix used as the screening response
    pub confounder_statistic: SampleStatistic,
    /// Retained gene sets at or above this similarity share a module
    pub module_cutoff: f64,
    pub vsn: VsnParams,
    pub knn: KnnParams,
    pub confounder: ConfounderParams,
    pub rfe: RfeParams,
    pub enrichment: EnrichmentParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outcome: String::new(),
            confounder_covariates: Vec::new(),
            confounder_statistic: SampleStatistic::Median,
            module_cutoff: 0.5,
            vsn: VsnParams::default(),
            knn: KnnParams::default(),
            confounder: ConfounderParams::default(),
            rfe: RfeParams::default(),
            enrichment: EnrichmentParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Fitted normalization parameters
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationSummary {
    pub a: f64,
    pub b: f64,
    pub scale: f64,
    pub shift: f64,
    pub objective: f64,
    pub rounds: usize,
}

impl From<&VsnResult> for NormalizationSummary {
    fn from(vsn: &VsnResult) -> Self {
        Self {
            a: vsn.a,
            b: vsn.b,
            scale: vsn.scale,
            shift: vsn.shift,
            objective: vsn.objective,
            rounds: vsn.rounds,
        }
    }
}

/// Feature selection outcome without the fitted model
#[derive(Debug, Clone, Serialize)]
pub struct SelectionSummary {
    pub metric: String,
    pub performance: Vec<SizePerformance>,
    pub best_size: usize,
    pub selected: Vec<String>,
    pub ranking: Vec<RankedFeature>,
    pub resamples: Vec<ResampleRecord>,
}

impl From<&RfeResult> for SelectionSummary {
    fn from(rfe: &RfeResult) -> Self {
        Self {
            metric: rfe.metric.clone(),
            performance: rfe.performance.clone(),
            best_size: rfe.best_size,
            selected: rfe.selected.clone(),
            ranking: rfe.ranking.clone(),
            resamples: rfe.resamples.clone(),
        }
    }
}

/// Everything a pipeline run produces
///
/// Matrices and the model are kept for further use but left out of the JSON
/// summary.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub n_features: usize,
    pub n_samples: usize,
    pub normalization: NormalizationSummary,
    pub imputation: ImputationReport,
    /// Features still incomplete after imputation, excluded from selection
    pub dropped_incomplete: Vec<String>,
    pub confounders: BTreeMap<String, ConfounderVerdict>,
    pub selection: SelectionSummary,
    /// Genes of the selected features
    pub gene_mapping: GeneMapping,
    pub enrichment: EnrichmentResult,
    pub modules: Vec<Vec<String>>,
    #[serde(skip)]
    pub normalized: AbundanceMatrix,
    #[serde(skip)]
    pub imputed: AbundanceMatrix,
    #[serde(skip)]
    pub model: BiomarkerModel,
}

/// Outcome vector from an annotation column
pub fn outcome_from_annotation(annotation: &SampleAnnotation, name: &str) -> Result<Outcome> {
    match annotation.require(name)? {
        Covariate::Categorical(labels) => Ok(Outcome::Classes(labels.clone())),
        Covariate::Numeric(_) | Covariate::Date(_) => {
            Ok(Outcome::Continuous(annotation.numeric_values(name)?))
        }
    }
}

/// Gene IDs for a list of features, through the external table when given
fn map_genes(
    matrix: &AbundanceMatrix,
    feature_ids: &[String],
    mapping: Option<&HashMap<String, String>>,
) -> GeneMapping {
    match mapping {
        Some(table) => map_features_to_genes(feature_ids, table),
        None => {
            let metas: Vec<_> = feature_ids
                .iter()
                .filter_map(|id| matrix.feature_index(id))
                .map(|i| matrix.features()[i].clone())
                .collect();
            genes_from_features(&metas)
        }
    }
}

/// Run the complete pipeline on a log2 abundance matrix
///
/// The annotation is aligned to the matrix samples first. The gene universe
/// is the set of genes of every feature that entered selection.
pub fn run_pipeline(
    matrix: &AbundanceMatrix,
    annotation: &SampleAnnotation,
    gene_sets: &[GeneSet],
    feature_mapping: Option<&HashMap<String, String>>,
    config: &PipelineConfig,
) -> Result<PipelineReport> {
    if config.outcome.is_empty() {
        return Err(BiomarkerError::validation("no outcome column configured"));
    }
    let annotation = annotation.align_to(matrix.sample_ids())?;
    let outcome = outcome_from_annotation(&annotation, &config.outcome)?;

    info!(
        "Step 1/5: normalizing {} features x {} samples",
        matrix.n_features(),
        matrix.n_samples()
    );
    let vsn = normalize(matrix, &config.vsn)?;

    info!("Step 2/5: imputing {} missing value(s)", vsn.matrix.missing_count());
    let imputed = impute(&vsn.matrix, &config.knn)?;

    let confounders = if config.confounder_covariates.is_empty() {
        info!("Step 3/5: no covariates given, confounder screen skipped");
        BTreeMap::new()
    } else {
        info!(
            "Step 3/5: screening {} covariate(s) for confounding",
            config.confounder_covariates.len()
        );
        let response = imputed.matrix.sample_statistic(config.confounder_statistic)?;
        let names: Vec<&str> = config.confounder_covariates.iter().map(String::as_str).collect();
        let verdicts = detect_confounders(&response, &names, &annotation, &config.confounder)?;
        for (name, verdict) in &verdicts {
            if verdict.is_confounder {
                log::warn!(
                    "Covariate '{}' is a likely confounder (max relative change {:.1}%)",
                    name,
                    verdict.max_relative_change
                );
            }
        }
        verdicts
    };

    info!("Step 4/5: recursive feature elimination on '{}'", config.outcome);
    let (complete, dropped_incomplete) = imputed.matrix.drop_incomplete_rows()?;
    let x = complete.to_sample_major()?;
    let feature_ids = complete.feature_ids();
    let rfe = select_features(&x, &feature_ids, &outcome, &config.rfe)?;

    info!("Step 5/5: enrichment of {} selected feature(s)", rfe.selected.len());
    let universe = map_genes(matrix, &feature_ids, feature_mapping);
    let gene_mapping = map_genes(matrix, &rfe.selected, feature_mapping);
    let enrichment = enrich(&gene_mapping.genes, &universe.genes, gene_sets, &config.enrichment)?;
    let modules = enrichment.modules(config.module_cutoff);

    Ok(PipelineReport {
        n_features: matrix.n_features(),
        n_samples: matrix.n_samples(),
        normalization: NormalizationSummary::from(&vsn),
        imputation: imputed.report,
        dropped_incomplete,
        confounders,
        selection: SelectionSummary::from(&rfe),
        gene_mapping,
        enrichment,
        modules,
        normalized: vsn.matrix,
        imputed: imputed.matrix,
        model: rfe.model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMeta;
    use crate::rfe::ForestParams;
    use crate::rng::MersenneTwister;
    use ndarray::Array2;
    use std::io::Write;

    const N_FEATURES: usize = 50;
    const N_SAMPLES: usize = 10;

    fn synthetic_inputs() -> (AbundanceMatrix, SampleAnnotation, Vec<GeneSet>, HashMap<String, String>) {
        let samples: Vec<String> = (0..N_SAMPLES).map(|j| format!("s{}", j)).collect();
        let group: Vec<String> = (0..N_SAMPLES)
            .map(|j| if j % 2 == 0 { "case" } else { "control" }.to_string())
            .collect();
        let site: Vec<String> = (0..N_SAMPLES).map(|j| ["A", "B", "C"][j % 3].to_string()).collect();
        let age: Vec<f64> = (0..N_SAMPLES).map(|j| 40.0 + 3.0 * j as f64 + (j % 4) as f64).collect();

        let mut rng = MersenneTwister::new(2024);
        let mut values = Array2::from_elem((N_FEATURES, N_SAMPLES), None);
        for i in 0..N_FEATURES {
            for j in 0..N_SAMPLES {
                // One missing cell per feature: 10% overall
                if (7 * i + 3 * j) % 10 == 0 {
                    continue;
                }
                let signal = if i < 5 && j % 2 == 0 { 1.5 } else { 0.0 };
                values[[i, j]] = Some(20.0 + 0.1 * i as f64 + signal + 0.3 * rng.rnorm());
            }
        }
        let features: Vec<FeatureMeta> = (0..N_FEATURES)
            .map(|i| FeatureMeta::from_compound_key(&format!("sp|P{:03}|PROT{}_HUMAN", i, i), '|'))
            .collect();
        let matrix = AbundanceMatrix::new(values, features, samples.clone()).unwrap();

        let mut annotation = SampleAnnotation::new(samples).unwrap();
        annotation.add_categorical("group", group).unwrap();
        annotation.add_categorical("site", site).unwrap();
        annotation.add_numeric("age", age).unwrap();

        let mapping: HashMap<String, String> = (0..N_FEATURES)
            .map(|i| (format!("P{:03}", i), format!("G{:03}", i)))
            .collect();
        let genes = |range: std::ops::Range<usize>| range.map(|i| format!("G{:03}", i)).collect::<Vec<_>>();
        let mut late = genes(30..45);
        late.push("GX_UNMEASURED".to_string());
        let gene_sets = vec![
            GeneSet::new("SIGNAL", "first five features", genes(0..5)),
            GeneSet::new("MID", "features 10-19", genes(10..20)),
            GeneSet::new("LATE", "features 30-44", late),
        ];

        (matrix, annotation, gene_sets, mapping)
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            outcome: "group".to_string(),
            confounder_covariates: vec!["site".to_string(), "group".to_string(), "age".to_string()],
            rfe: RfeParams {
                candidate_sizes: vec![5, 10, 20],
                folds: 3,
                repeats: 2,
                seed: 7,
                forest: ForestParams {
                    n_trees: 30,
                    ..ForestParams::default()
                },
                ..RfeParams::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_end_to_end() {
        let (matrix, annotation, gene_sets, mapping) = synthetic_inputs();
        assert_eq!(matrix.missing_count(), 50);

        let report = run_pipeline(&matrix, &annotation, &gene_sets, Some(&mapping), &fast_config()).unwrap();

        assert_eq!(report.normalized.n_features(), N_FEATURES);
        assert_eq!(report.normalized.n_samples(), N_SAMPLES);
        assert_eq!(report.normalized.missing_count(), 50);
        assert_eq!(report.imputed.missing_count(), 0);
        assert_eq!(
            report.imputation.imputed_cells + report.imputation.fallback_cells.len(),
            50
        );
        assert!(report.dropped_incomplete.is_empty());

        assert_eq!(report.confounders.len(), 3);
        assert!(report.confounders.contains_key("site"));

        let sizes: Vec<usize> = report.selection.performance.iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![5, 10, 20]);
        assert_eq!(report.selection.selected.len(), report.selection.best_size);
        assert_eq!(report.selection.ranking.len(), N_FEATURES);
        assert_eq!(report.gene_mapping.genes.len(), report.selection.best_size);

        assert_eq!(report.enrichment.tested.len(), 3);
        let late = report.enrichment.get("LATE").unwrap();
        assert_eq!(late.geneset_size, 15);
        assert_eq!(late.universe_size, N_FEATURES);

        assert!(serde_json::to_string(&report).is_ok());
    }

    #[test]
    fn test_missing_outcome_rejected() {
        let (matrix, annotation, gene_sets, mapping) = synthetic_inputs();
        let config = PipelineConfig {
            outcome: String::new(),
            ..fast_config()
        };
        assert!(matches!(
            run_pipeline(&matrix, &annotation, &gene_sets, Some(&mapping), &config),
            Err(BiomarkerError::Validation { .. })
        ));

        let config = PipelineConfig {
            outcome: "survival".to_string(),
            ..fast_config()
        };
        let err = run_pipeline(&matrix, &annotation, &gene_sets, Some(&mapping), &config).unwrap_err();
        assert!(err.to_string().contains("survival"));
    }

    #[test]
    fn test_outcome_type_follows_covariate() {
        let (_, annotation, _, _) = synthetic_inputs();
        assert!(matches!(
            outcome_from_annotation(&annotation, "group").unwrap(),
            Outcome::Classes(_)
        ));
        match outcome_from_annotation(&annotation, "age").unwrap() {
            Outcome::Continuous(v) => assert_eq!(v.len(), N_SAMPLES),
            other => panic!("expected continuous outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"outcome": "group", "rfe": {{"folds": 3}}, "enrichment": {{"correction": "bonferroni"}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.outcome, "group");
        assert_eq!(config.rfe.folds, 3);
        assert_eq!(config.rfe.repeats, 5);
        assert_eq!(config.knn.k, 10);
        assert_eq!(config.confounder.threshold, 10.0);
        assert_eq!(config.enrichment.alpha, 0.05);
        assert_eq!(config.confounder_statistic, SampleStatistic::Median);
    }
}
