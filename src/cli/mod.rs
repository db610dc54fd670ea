//! Command-line interface for rust_biomarker

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_biomarker")]
#[command(version)]
#[command(about = "Biomarker discovery for quantitative proteomics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Worker threads (0 = all cores)
    #[arg(short = 't', long, global = true, default_value = "0")]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full discovery pipeline
    #[command(
        about = "Run the full discovery pipeline",
        long_about = "Run the full discovery pipeline\n\n\
            Normalizes and imputes the abundance matrix, screens covariates for\n\
            confounding, selects a biomarker panel by repeated cross-validated\n\
            recursive feature elimination and tests the panel's genes for\n\
            pathway enrichment.",
        after_long_help = "\
Examples:
  # Classification on a categorical annotation column
  rust_biomarker run -m proteins.tsv -a samples.tsv -g hallmark.gmt \\
    --outcome diagnosis --covariate site --covariate age -o report.json

  # Everything from a JSON configuration, raw intensities
  rust_biomarker run -m proteins.tsv -a samples.tsv -g hallmark.gmt \\
    --config pipeline.json --raw --seed 7"
    )]
    Run {
        /// Abundance matrix (CSV/TSV)
        #[arg(short, long,
            long_help = "Abundance matrix, features x samples.\n\
                First column = feature key (e.g. sp|P02768|ALBU_HUMAN), header = sample IDs.\n\
                NA, NaN and empty cells are missing. Delimiter is auto-detected.")]
        matrix: String,

        /// Sample annotation (CSV/TSV)
        #[arg(short, long)]
        annotation: String,

        /// Gene-set catalogue (GMT)
        #[arg(short, long)]
        gene_sets: String,

        /// Feature -> gene table (two columns with header)
        #[arg(long,
            long_help = "Feature -> gene identifier table.\n\
                Without it, gene identifiers are taken from feature metadata.")]
        mapping: Option<String>,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Outcome column in the annotation
        #[arg(long)]
        outcome: Option<String>,

        /// Covariate to screen for confounding (repeatable)
        #[arg(long, value_name = "VAR")]
        covariate: Vec<String>,

        /// Input holds raw intensities (log2-transform on read)
        #[arg(long)]
        raw: bool,

        /// Candidate panel sizes, comma separated
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<usize>,

        /// Cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Cross-validation repeats
        #[arg(long)]
        repeats: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// JSON report path
        #[arg(short, long, default_value = "biomarker_report.json")]
        output: String,

        /// Also write the normalized, imputed matrix (TSV)
        #[arg(long)]
        matrix_out: Option<String>,

        /// Also write the enrichment table (TSV)
        #[arg(long)]
        enrichment_out: Option<String>,
    },

    /// Normalize and impute an abundance matrix
    #[command(
        about = "Normalize and impute an abundance matrix",
        after_long_help = "\
Examples:
  rust_biomarker normalize -m proteins.tsv -o normalized.tsv --raw
  rust_biomarker normalize -m proteins.tsv -o normalized.tsv -k 5 --ceiling 0.5"
    )]
    Normalize {
        /// Abundance matrix (CSV/TSV)
        #[arg(short, long)]
        matrix: String,

        /// Output matrix (TSV)
        #[arg(short, long)]
        output: String,

        /// Input holds raw intensities (log2-transform on read)
        #[arg(long)]
        raw: bool,

        /// Neighbours used for imputation
        #[arg(short, long, default_value = "10")]
        k: usize,

        /// Rows with a larger missing fraction are not imputed
        #[arg(long, default_value = "1.0")]
        ceiling: f64,

        /// Skip imputation
        #[arg(long)]
        no_impute: bool,
    },

    /// Test a gene list for over-representation
    #[command(
        about = "Test a gene list for over-representation",
        after_long_help = "\
Examples:
  rust_biomarker enrich -l panel_genes.txt -u measured_genes.txt -g hallmark.gmt -o enrichment.tsv"
    )]
    Enrich {
        /// Query genes, one per line
        #[arg(short = 'l', long)]
        genes: String,

        /// Universe genes, one per line
        #[arg(short, long,
            long_help = "Universe of measurable genes, one per line.\n\
                Defaults to the union of all catalogue genes.")]
        universe: Option<String>,

        /// Gene-set catalogue (GMT)
        #[arg(short, long)]
        gene_sets: String,

        /// Significance level on adjusted p-values
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Multiple-testing correction: bh or bonferroni
        #[arg(long, default_value = "bh")]
        correction: String,

        /// Output table (TSV)
        #[arg(short, long)]
        output: String,

        /// Module similarity cutoff
        #[arg(long, default_value = "0.5")]
        module_cutoff: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "rust_biomarker", "run", "-m", "m.tsv", "-a", "a.tsv", "-g", "s.gmt", "--outcome",
            "diagnosis", "--covariate", "site", "--covariate", "age", "--sizes", "5,10", "-t", "2",
        ])
        .unwrap();
        assert_eq!(cli.threads, 2);
        match cli.command {
            Some(Commands::Run { covariate, sizes, outcome, .. }) => {
                assert_eq!(covariate, vec!["site", "age"]);
                assert_eq!(sizes, vec![5, 10]);
                assert_eq!(outcome.as_deref(), Some("diagnosis"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_enrich_defaults() {
        let cli = Cli::try_parse_from([
            "rust_biomarker", "enrich", "-l", "q.txt", "-g", "s.gmt", "-o", "out.tsv", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Enrich { alpha, correction, universe, .. }) => {
                assert_eq!(alpha, 0.05);
                assert_eq!(correction, "bh");
                assert!(universe.is_none());
            }
            _ => panic!("expected enrich"),
        }
    }
}
