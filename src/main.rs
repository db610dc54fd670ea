//! rust_biomarker command-line interface

use std::collections::HashSet;

use clap::Parser;
use log::{info, LevelFilter};

use rust_biomarker::cli::{Cli, Commands};
use rust_biomarker::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    if std::env::args().len() == 1 {
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
        {
            log::warn!("Could not configure {} worker threads: {}", cli.threads, e);
        }
    }

    let result = match cli.command {
        Some(Commands::Run {
            matrix,
            annotation,
            gene_sets,
            mapping,
            config,
            outcome,
            covariate,
            raw,
            sizes,
            folds,
            repeats,
            seed,
            output,
            matrix_out,
            enrichment_out,
        }) => {
            let paths = RunPaths {
                matrix: &matrix,
                annotation: &annotation,
                gene_sets: &gene_sets,
                mapping: mapping.as_deref(),
                output: &output,
                matrix_out: matrix_out.as_deref(),
                enrichment_out: enrichment_out.as_deref(),
            };
            let overrides = RunOverrides {
                outcome,
                covariates: covariate,
                sizes,
                folds,
                repeats,
                seed,
            };
            run_analysis(&paths, config.as_deref(), overrides, raw)
        }
        Some(Commands::Normalize {
            matrix,
            output,
            raw,
            k,
            ceiling,
            no_impute,
        }) => run_normalize(&matrix, &output, raw, k, ceiling, no_impute),
        Some(Commands::Enrich {
            genes,
            universe,
            gene_sets,
            alpha,
            correction,
            output,
            module_cutoff,
        }) => run_enrich(
            &genes,
            universe.as_deref(),
            &gene_sets,
            alpha,
            &correction,
            &output,
            module_cutoff,
        ),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("rust_biomarker v{}", VERSION);
    println!("Commands: run, normalize, enrich");
    println!("Run `rust_biomarker --help` for usage.");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

struct RunPaths<'a> {
    matrix: &'a str,
    annotation: &'a str,
    gene_sets: &'a str,
    mapping: Option<&'a str>,
    output: &'a str,
    matrix_out: Option<&'a str>,
    enrichment_out: Option<&'a str>,
}

/// Command-line values that take precedence over the configuration file
struct RunOverrides {
    outcome: Option<String>,
    covariates: Vec<String>,
    sizes: Vec<usize>,
    folds: Option<usize>,
    repeats: Option<usize>,
    seed: Option<u64>,
}

impl RunOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(outcome) = self.outcome {
            config.outcome = outcome;
        }
        if !self.covariates.is_empty() {
            config.confounder_covariates = self.covariates;
        }
        if !self.sizes.is_empty() {
            config.rfe.candidate_sizes = self.sizes;
        }
        if let Some(folds) = self.folds {
            config.rfe.folds = folds;
        }
        if let Some(repeats) = self.repeats {
            config.rfe.repeats = repeats;
        }
        if let Some(seed) = self.seed {
            config.rfe.seed = seed;
        }
    }
}

fn run_analysis(
    paths: &RunPaths<'_>,
    config_path: Option<&str>,
    overrides: RunOverrides,
    raw: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);

    info!("Loading abundance matrix from: {}", paths.matrix);
    let matrix = read_abundance_matrix(paths.matrix, raw)?;
    info!("  {} features, {} samples", matrix.n_features(), matrix.n_samples());

    info!("Loading sample annotation from: {}", paths.annotation);
    let annotation = read_annotation(paths.annotation)?;

    info!("Loading gene sets from: {}", paths.gene_sets);
    let gene_sets = read_gene_sets(paths.gene_sets)?;

    let mapping = match paths.mapping {
        Some(path) => {
            info!("Loading feature mapping from: {}", path);
            Some(read_feature_mapping(path)?)
        }
        None => None,
    };

    let report = run_pipeline(&matrix, &annotation, &gene_sets, mapping.as_ref(), &config)?;

    info!(
        "Selected {} feature(s) ({} = {:.4})",
        report.selection.best_size,
        report.selection.metric,
        report
            .selection
            .performance
            .iter()
            .find(|p| p.size == report.selection.best_size)
            .map_or(f64::NAN, |p| p.mean)
    );
    info!("Writing report to: {}", paths.output);
    write_json(paths.output, &report)?;

    if let Some(path) = paths.matrix_out {
        info!("Writing imputed matrix to: {}", path);
        write_matrix(path, &report.imputed)?;
    }
    if let Some(path) = paths.enrichment_out {
        info!("Writing enrichment table to: {}", path);
        write_enrichment_table(path, &report.enrichment)?;
    }

    info!("Done!");
    Ok(())
}

fn run_normalize(
    matrix_path: &str,
    output_path: &str,
    raw: bool,
    k: usize,
    ceiling: f64,
    no_impute: bool,
) -> Result<()> {
    info!("Loading abundance matrix from: {}", matrix_path);
    let matrix = read_abundance_matrix(matrix_path, raw)?;
    info!("  {} features, {} samples", matrix.n_features(), matrix.n_samples());

    let vsn = normalize(&matrix, &VsnParams::default())?;
    info!("  fitted a = {:.4}, b = {:.4}", vsn.a, vsn.b);

    let result = if no_impute {
        vsn.matrix
    } else {
        let params = KnnParams {
            k,
            row_missing_ceiling: ceiling,
            ..KnnParams::default()
        };
        let imputed = impute(&vsn.matrix, &params)?;
        if !imputed.report.skipped_rows.is_empty() {
            info!(
                "  {} feature(s) above the missingness ceiling left unimputed",
                imputed.report.skipped_rows.len()
            );
        }
        imputed.matrix
    };

    info!("Writing matrix to: {}", output_path);
    write_matrix(output_path, &result)?;
    info!("Done!");
    Ok(())
}

fn run_enrich(
    genes_path: &str,
    universe_path: Option<&str>,
    gene_sets_path: &str,
    alpha: f64,
    correction: &str,
    output_path: &str,
    module_cutoff: f64,
) -> Result<()> {
    let correction = match correction {
        "bh" | "fdr" => Correction::BenjaminiHochberg,
        "bonferroni" => Correction::Bonferroni,
        other => {
            return Err(BiomarkerError::Validation {
                reason: format!("Unknown correction method: {} (use bh or bonferroni)", other),
            });
        }
    };

    let query = read_gene_list(genes_path)?;
    let gene_sets = read_gene_sets(gene_sets_path)?;
    let universe = match universe_path {
        Some(path) => read_gene_list(path)?,
        None => {
            let mut seen = HashSet::new();
            gene_sets
                .iter()
                .flat_map(|s| s.genes.iter().map(String::as_str))
                .filter(|g| seen.insert(*g))
                .map(str::to_string)
                .collect()
        }
    };
    info!(
        "{} query gene(s), universe of {}, {} gene set(s)",
        query.len(),
        universe.len(),
        gene_sets.len()
    );

    let params = EnrichmentParams {
        alpha,
        correction,
        ..EnrichmentParams::default()
    };
    let result = enrich(&query, &universe, &gene_sets, &params)?;
    for (i, module) in result.modules(module_cutoff).iter().enumerate() {
        info!("  module {}: {}", i + 1, module.join(", "));
    }

    info!("Writing enrichment table to: {}", output_path);
    write_enrichment_table(output_path, &result)?;
    info!("Done!");
    Ok(())
}
