//! Delimited-text reading and writing
//!
//! Tables may be tab- or comma-separated; the delimiter is taken from the
//! header line. Gene-set catalogues use the GMT layout
//! (`set_id<TAB>description<TAB>gene...`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord, Trim};
use chrono::NaiveDate;
use ndarray::Array2;
use serde::Serialize;

use crate::data::{AbundanceMatrix, Covariate, FeatureMeta, SampleAnnotation};
use crate::enrichment::{EnrichmentResult, GeneSet};
use crate::error::{BiomarkerError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tokens read as a missing value
fn is_missing_token(s: &str) -> bool {
    matches!(s, "" | "NA" | "NaN" | "nan" | "NULL" | "null")
}

/// Tab if the header line contains one, comma otherwise
fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut header = String::new();
    reader.read_line(&mut header)?;
    if header.trim().is_empty() {
        return Err(BiomarkerError::EmptyData {
            reason: format!("{} has no header line", path.display()),
        });
    }
    Ok(if header.contains('\t') { b'\t' } else { b',' })
}

/// Open a delimited table and return its header and records
fn read_table(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
    let delimiter = detect_delimiter(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)?;
    let header = reader.headers()?.clone();
    let records = reader
        .records()
        .filter(|r| !matches!(r, Ok(rec) if rec.iter().all(str::is_empty)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((header, records))
}

/// Read a feature x sample abundance matrix
///
/// The first column holds the feature key (`sp|P02768|ALBU_HUMAN` or a plain
/// ID), the header holds sample IDs. `NA`, `NaN` and empty cells are missing.
/// With `log2 = true` raw intensities are log2-transformed and non-positive
/// intensities become missing.
pub fn read_abundance_matrix<P: AsRef<Path>>(path: P, log2: bool) -> Result<AbundanceMatrix> {
    let path = path.as_ref();
    let (header, records) = read_table(path)?;
    if header.len() < 2 {
        return Err(BiomarkerError::validation(format!(
            "{}: need a feature column and at least one sample column",
            path.display()
        )));
    }
    let sample_ids: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
    if records.is_empty() {
        return Err(BiomarkerError::EmptyData {
            reason: format!("no features found in {}", path.display()),
        });
    }

    let mut features = Vec::with_capacity(records.len());
    let mut values = Array2::from_elem((records.len(), sample_ids.len()), None);
    let mut n_non_positive = 0usize;

    for (i, record) in records.iter().enumerate() {
        let key = record.get(0).unwrap_or_default();
        features.push(FeatureMeta::from_compound_key(key, '|'));

        for (j, field) in record.iter().skip(1).enumerate() {
            if is_missing_token(field) {
                continue;
            }
            let v: f64 = field.parse().map_err(|_| {
                BiomarkerError::validation(format!(
                    "invalid abundance '{}' for feature '{}' in sample '{}'",
                    field, key, sample_ids[j]
                ))
            })?;
            values[[i, j]] = if !log2 {
                v.is_finite().then_some(v)
            } else if v > 0.0 {
                Some(v.log2())
            } else {
                n_non_positive += 1;
                None
            };
        }
    }

    if n_non_positive > 0 {
        log::warn!(
            "{} non-positive intensit{} treated as missing before log2",
            n_non_positive,
            if n_non_positive == 1 { "y" } else { "ies" }
        );
    }
    log::info!(
        "Read {} features x {} samples from {}",
        features.len(),
        sample_ids.len(),
        path.display()
    );

    AbundanceMatrix::new(values, features, sample_ids)
}

/// Read a sample annotation table
///
/// First column: sample ID. Every other column is numeric when all values
/// parse as numbers, a date when its values are `YYYY-MM-DD`, and
/// categorical otherwise.
pub fn read_annotation<P: AsRef<Path>>(path: P) -> Result<SampleAnnotation> {
    let path = path.as_ref();
    let (header, records) = read_table(path)?;
    if records.is_empty() {
        return Err(BiomarkerError::EmptyData {
            reason: format!("no samples found in {}", path.display()),
        });
    }

    let sample_ids: Vec<String> = records
        .iter()
        .map(|r| r.get(0).unwrap_or_default().to_string())
        .collect();
    let mut annotation = SampleAnnotation::new(sample_ids)?;

    for (col, name) in header.iter().enumerate().skip(1) {
        let raw: Vec<&str> = records.iter().map(|r| r.get(col).unwrap_or_default()).collect();
        annotation.add_covariate(name, parse_covariate(name, &raw)?)?;
    }

    Ok(annotation)
}

/// Type a raw annotation column
///
/// Covariates carry no missing values: a numeric or date column with a
/// missing token is rejected rather than read as categorical.
fn parse_covariate(name: &str, raw: &[&str]) -> Result<Covariate> {
    let present: Vec<&str> = raw.iter().copied().filter(|s| !is_missing_token(s)).collect();
    if !present.is_empty() && present.len() < raw.len() {
        let typed = present.iter().all(|s| s.parse::<f64>().is_ok_and(f64::is_finite))
            || present.iter().all(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok());
        if typed {
            let missing = raw.iter().filter(|s| is_missing_token(s)).count();
            return Err(BiomarkerError::validation(format!(
                "covariate '{}' has {} missing value(s); covariates must be complete",
                name, missing
            )));
        }
    }

    let numeric: Option<Vec<f64>> = raw.iter().map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite())).collect();
    if let Some(values) = numeric {
        return Ok(Covariate::Numeric(values));
    }

    // A column starting with a date must be all dates
    if raw.first().is_some_and(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()) {
        let dates = raw
            .iter()
            .map(|s| {
                NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|source| BiomarkerError::DateParse {
                    value: s.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(Covariate::Date(dates));
    }

    Ok(Covariate::Categorical(raw.iter().map(|s| s.to_string()).collect()))
}

/// Read a GMT gene-set catalogue
pub fn read_gene_sets<P: AsRef<Path>>(path: P) -> Result<Vec<GeneSet>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut sets = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 2 {
            return Err(BiomarkerError::validation(format!(
                "{} line {}: expected set ID, description and genes",
                path.display(),
                line_no + 1
            )));
        }
        let genes = fields[2..]
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| g.to_string())
            .collect();
        sets.push(GeneSet::new(fields[0], fields[1], genes));
    }

    log::info!("Read {} gene set(s) from {}", sets.len(), path.display());
    Ok(sets)
}

/// Read a two-column feature -> gene table (with header)
pub fn read_feature_mapping<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let (_, records) = read_table(path)?;
    let mut mapping = HashMap::with_capacity(records.len());
    for record in &records {
        match (record.get(0), record.get(1)) {
            (Some(feature), Some(gene)) if !gene.is_empty() => {
                mapping.insert(feature.to_string(), gene.to_string());
            }
            _ => {}
        }
    }
    Ok(mapping)
}

/// Read a gene list, one identifier per line
pub fn read_gene_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut genes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let gene = line.trim();
        if !gene.is_empty() && !gene.starts_with('#') {
            genes.push(gene.to_string());
        }
    }
    Ok(genes)
}

/// Write a matrix as TSV (`NA` for missing)
pub fn write_matrix<P: AsRef<Path>>(path: P, matrix: &AbundanceMatrix) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    write!(file, "feature_id")?;
    for sample in matrix.sample_ids() {
        write!(file, "\t{}", sample)?;
    }
    writeln!(file)?;

    for (i, feature) in matrix.features().iter().enumerate() {
        write!(file, "{}", feature.id)?;
        for v in matrix.row(i) {
            match v {
                Some(x) => write!(file, "\t{:.6}", x)?,
                None => write!(file, "\tNA")?,
            }
        }
        writeln!(file)?;
    }
    file.flush()?;
    Ok(())
}

/// Write the tested gene sets as TSV
pub fn write_enrichment_table<P: AsRef<Path>>(path: P, result: &EnrichmentResult) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(
        file,
        "set_id\tdescription\toverlap\tset_size\tquery_size\tuniverse_size\tpvalue\tpadj\tgenes"
    )?;
    for r in &result.tested {
        writeln!(
            file,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.6e}\t{:.6e}\t{}",
            r.id,
            r.description,
            r.overlap_count,
            r.geneset_size,
            r.query_size,
            r.universe_size,
            r.p_value,
            r.p_adjusted,
            r.overlap_genes.join(",")
        )?;
    }
    file.flush()?;
    Ok(())
}

/// Serialize a value as pretty JSON
pub fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
