//! Metadata structures for features and samples

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{BiomarkerError, Result};

/// Per-row feature annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMeta {
    /// Stable identifier (e.g. UniProt accession)
    pub id: String,
    /// Display name
    pub name: String,
    /// Canonical gene identifier, filled by an external mapping
    pub gene_id: Option<String>,
}

impl FeatureMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gene_id: None,
        }
    }

    /// Parse a compound row key of the form `prefix|id|name`
    ///
    /// `sp|P02768|ALBU_HUMAN` gives id `P02768` and name `ALBU_HUMAN`.
    /// Two-part keys are read as `id|name`; keys without separators are both.
    pub fn from_compound_key(key: &str, separator: char) -> Self {
        let parts: Vec<&str> = key.split(separator).map(str::trim).collect();
        match parts.as_slice() {
            [_, id, name, ..] => Self::new(*id, *name),
            [id, name] => Self::new(*id, *name),
            _ => Self::new(key.trim(), key.trim()),
        }
    }

    pub fn with_gene(mut self, gene_id: impl Into<String>) -> Self {
        self.gene_id = Some(gene_id.into());
        self
    }
}

/// Values of one covariate across samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Covariate {
    /// Finite label set
    Categorical(Vec<String>),
    /// Real-valued
    Numeric(Vec<f64>),
    /// Calendar date
    Date(Vec<NaiveDate>),
}

impl Covariate {
    pub fn len(&self) -> usize {
        match self {
            Covariate::Categorical(v) => v.len(),
            Covariate::Numeric(v) => v.len(),
            Covariate::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Covariate::Categorical(_) => "categorical",
            Covariate::Numeric(_) => "numeric",
            Covariate::Date(_) => "date",
        }
    }

    /// Sorted unique levels of a categorical covariate
    pub fn levels(&self) -> Option<Vec<String>> {
        match self {
            Covariate::Categorical(values) => {
                let mut unique = values.clone();
                unique.sort();
                unique.dedup();
                Some(unique)
            }
            _ => None,
        }
    }

    /// True when the covariate carries no variation across samples
    pub fn is_constant(&self) -> bool {
        match self {
            Covariate::Categorical(v) => v.windows(2).all(|w| w[0] == w[1]),
            Covariate::Numeric(v) => v.windows(2).all(|w| w[0] == w[1]),
            Covariate::Date(v) => v.windows(2).all(|w| w[0] == w[1]),
        }
    }

    fn select(&self, indices: &[usize]) -> Self {
        match self {
            Covariate::Categorical(v) => Covariate::Categorical(indices.iter().map(|&i| v[i].clone()).collect()),
            Covariate::Numeric(v) => Covariate::Numeric(indices.iter().map(|&i| v[i]).collect()),
            Covariate::Date(v) => Covariate::Date(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// Sample annotation: one covariate record per sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleAnnotation {
    /// Sample identifiers
    sample_ids: Vec<String>,
    /// Covariate name -> values for each sample
    covariates: BTreeMap<String, Covariate>,
}

impl SampleAnnotation {
    /// Create an empty annotation for the given samples
    pub fn new(sample_ids: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id) {
                return Err(BiomarkerError::validation(format!(
                    "duplicate annotation record for sample '{}'",
                    id
                )));
            }
        }
        Ok(Self {
            sample_ids,
            covariates: BTreeMap::new(),
        })
    }

    /// Add a covariate column
    pub fn add_covariate(&mut self, name: &str, values: Covariate) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(BiomarkerError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        if let Covariate::Numeric(v) = &values {
            if let Some(i) = v.iter().position(|x| !x.is_finite()) {
                return Err(BiomarkerError::validation(format!(
                    "covariate '{}' has a non-finite value for sample '{}'",
                    name, self.sample_ids[i]
                )));
            }
        }
        self.covariates.insert(name.to_string(), values);
        Ok(())
    }

    pub fn add_categorical(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        self.add_covariate(name, Covariate::Categorical(values))
    }

    pub fn add_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.add_covariate(name, Covariate::Numeric(values))
    }

    pub fn add_date(&mut self, name: &str, values: Vec<NaiveDate>) -> Result<()> {
        self.add_covariate(name, Covariate::Date(values))
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn covariate(&self, name: &str) -> Option<&Covariate> {
        self.covariates.get(name)
    }

    /// Covariate lookup that names the missing covariate on failure
    pub fn require(&self, name: &str) -> Result<&Covariate> {
        self.covariates.get(name).ok_or_else(|| {
            BiomarkerError::validation(format!(
                "covariate '{}' not found in annotation (available: {})",
                name,
                self.covariate_names().join(", ")
            ))
        })
    }

    /// Covariate names in sorted order
    pub fn covariate_names(&self) -> Vec<&str> {
        self.covariates.keys().map(|s| s.as_str()).collect()
    }

    /// Numeric view of a covariate (dates as days since the earliest date)
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        match self.require(name)? {
            Covariate::Numeric(v) => Ok(v.clone()),
            Covariate::Date(v) => Ok(days_since_earliest(v)),
            Covariate::Categorical(_) => Err(BiomarkerError::validation(format!(
                "covariate '{}' is categorical, expected numeric or date",
                name
            ))),
        }
    }

    /// Reorder and restrict the annotation to the given sample IDs
    ///
    /// Every requested sample must have a record; extra records are dropped.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        let index: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let missing: Vec<&str> = sample_ids
            .iter()
            .filter(|id| !index.contains_key(id.as_str()))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(BiomarkerError::validation(format!(
                "samples without an annotation record: {:?}",
                missing
            )));
        }

        let order: Vec<usize> = sample_ids.iter().map(|id| index[id.as_str()]).collect();
        let n_dropped = self.sample_ids.len() - order.len();
        if n_dropped > 0 {
            log::info!(
                "Dropping {} annotation record(s) for samples absent from the matrix",
                n_dropped
            );
        }

        let mut aligned = SampleAnnotation::new(sample_ids.to_vec())?;
        for (name, values) in &self.covariates {
            aligned.add_covariate(name, values.select(&order))?;
        }
        Ok(aligned)
    }

    /// Add a numeric covariate equal to the absolute day difference of two date covariates
    ///
    /// Typical use: survival duration from diagnosis and follow-up dates.
    pub fn derive_day_difference(&mut self, name: &str, from: &str, to: &str) -> Result<()> {
        let start = self.date_values(from)?;
        let end = self.date_values(to)?;
        let days = start
            .iter()
            .zip(end.iter())
            .map(|(a, b)| (*b - *a).num_days().abs() as f64)
            .collect();
        self.add_numeric(name, days)
    }

    fn date_values(&self, name: &str) -> Result<&[NaiveDate]> {
        match self.require(name)? {
            Covariate::Date(v) => Ok(v),
            other => Err(BiomarkerError::validation(format!(
                "covariate '{}' is {}, expected date",
                name,
                other.kind()
            ))),
        }
    }
}

/// Days elapsed since the earliest date in the column
pub(crate) fn days_since_earliest(dates: &[NaiveDate]) -> Vec<f64> {
    match dates.iter().min() {
        Some(origin) => dates
            .iter()
            .map(|d| (*d - *origin).num_days() as f64)
            .collect(),
        None => Vec::new(),
    }
}
