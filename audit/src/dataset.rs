// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset loading and cohort partitioning for the risk-score audit
//!
//! A [`Population`] is an owned, already-filtered set of [`Record`]s. Rows
//! with missing or unparseable required fields are dropped while loading,
//! so everything downstream works on complete records only.

use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// One defendant row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Protected attribute value (e.g. race)
    pub group: String,
    /// Risk score as published by the tool (decile 1..=10 for COMPAS)
    pub risk_score: f64,
    /// Ground truth: did the predicted event occur
    pub outcome: bool,
    /// Descriptive columns carried through when the input has them
    #[serde(default)]
    pub attributes: Attributes,
}

/// Optional, non-metric columns of the COMPAS table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub priors_count: Option<u32>,
    pub charge_degree: Option<String>,
    pub score_text: Option<String>,
}

impl Record {
    pub fn new(group: impl Into<String>, risk_score: f64, outcome: bool) -> Self {
        Self {
            group: group.into(),
            risk_score,
            outcome,
            attributes: Attributes::default(),
        }
    }

    /// High-risk decision; the threshold is inclusive
    pub fn decision(&self, threshold: f64) -> bool {
        self.risk_score >= threshold
    }
}

/// Names of the columns the loader needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub group: String,
    pub score: String,
    pub outcome: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            group: "race".to_string(),
            score: "decile_score".to_string(),
            outcome: "two_year_recid".to_string(),
        }
    }
}

/// Which side of the comparison a record falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cohort {
    Reference,
    Comparison,
}

/// Two-way split of the population on a single group value
///
/// Records whose group equals `comparison_group` form the comparison
/// cohort; every other record is reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortSplit {
    pub comparison_group: String,
    pub comparison_label: String,
    pub reference_label: String,
}

impl Default for CohortSplit {
    fn default() -> Self {
        Self {
            comparison_group: "African-American".to_string(),
            comparison_label: "African American".to_string(),
            reference_label: "Others".to_string(),
        }
    }
}

impl CohortSplit {
    /// Split on `group`, labelling the rest "Others"
    pub fn on_group(group: &str) -> Self {
        Self {
            comparison_group: group.to_string(),
            comparison_label: group.to_string(),
            reference_label: "Others".to_string(),
        }
    }

    pub fn is_comparison(&self, record: &Record) -> bool {
        record.group == self.comparison_group
    }

    pub fn cohort_of(&self, record: &Record) -> Cohort {
        if self.is_comparison(record) {
            Cohort::Comparison
        } else {
            Cohort::Reference
        }
    }

    pub fn label(&self, cohort: Cohort) -> &str {
        match cohort {
            Cohort::Reference => &self.reference_label,
            Cohort::Comparison => &self.comparison_label,
        }
    }
}

/// A filtered, in-memory population ready for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    /// Where the records came from (file path or "synthetic")
    pub source: String,
    pub records: Vec<Record>,
    /// Data rows seen in the source, before filtering
    pub rows_read: usize,
    /// Rows excluded for missing or unparseable required fields
    pub rows_dropped: usize,
}

impl Population {
    pub fn from_records(records: Vec<Record>) -> Self {
        let rows_read = records.len();
        Self {
            source: "memory".to_string(),
            records,
            rows_read,
            rows_dropped: 0,
        }
    }

    /// Load a delimited file, validating the schema before reading rows
    pub fn load_csv(path: &Path, columns: &ColumnMapping) -> Result<Self, DatasetError> {
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let csv_error = |source: csv::Error| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader.headers().map_err(csv_error)?.clone();
        let index_of = |name: &str| headers.iter().position(|h| h == name);

        let group_idx = index_of(&columns.group);
        let score_idx = index_of(&columns.score);
        let outcome_idx = index_of(&columns.outcome);

        let (group_idx, score_idx, outcome_idx) = match (group_idx, score_idx, outcome_idx) {
            (Some(g), Some(s), Some(o)) => (g, s, o),
            _ => {
                let missing = [
                    (&columns.group, group_idx),
                    (&columns.score, score_idx),
                    (&columns.outcome, outcome_idx),
                ]
                .iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
                return Err(DatasetError::MissingColumns {
                    path: path.to_path_buf(),
                    missing,
                });
            }
        };

        let optional = OptionalColumns {
            age: index_of("age"),
            sex: index_of("sex"),
            priors_count: index_of("priors_count"),
            charge_degree: index_of("c_charge_degree"),
            score_text: index_of("score_text"),
        };

        let mut records = Vec::new();
        let mut rows_read = 0;
        let mut rows_dropped = 0;

        for result in reader.records() {
            let row = result.map_err(csv_error)?;
            rows_read += 1;

            let group = field(&row, group_idx);
            let score = field(&row, score_idx).and_then(parse_score);
            let outcome = field(&row, outcome_idx).and_then(parse_outcome);

            let (Some(group), Some(risk_score), Some(outcome)) = (group, score, outcome) else {
                rows_dropped += 1;
                continue;
            };

            records.push(Record {
                group: group.to_string(),
                risk_score,
                outcome,
                attributes: optional.read(&row),
            });
        }

        if rows_dropped > 0 {
            tracing::warn!(
                "Dropped {} of {} rows in {} with missing or invalid required fields",
                rows_dropped,
                rows_read,
                path.display()
            );
        }
        tracing::debug!("Loaded {} records from {}", records.len(), path.display());

        Ok(Self {
            source: path.display().to_string(),
            records,
            rows_read,
            rows_dropped,
        })
    }

    /// Generate a COMPAS-like population for development and testing
    pub fn synthetic(size: usize, seed: u64) -> Self {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        // Approximate race mix of the Broward County two-year table
        let groups: [(&str, f64); 5] = [
            ("African-American", 0.51),
            ("Caucasian", 0.34),
            ("Hispanic", 0.09),
            ("Other", 0.05),
            ("Asian", 0.01),
        ];

        let records = (0..size)
            .map(|_| {
                let draw: f64 = rng.gen();
                let mut acc = 0.0;
                let group = groups
                    .iter()
                    .find(|(_, weight)| {
                        acc += weight;
                        draw < acc
                    })
                    .map_or("Other", |(name, _)| *name);

                let mut decile: u32 = rng.gen_range(1..=10);
                if group == "African-American" && rng.gen_bool(0.35) {
                    decile = (decile + rng.gen_range(1..=3)).min(10);
                }

                let outcome = rng.gen_bool(0.12 + 0.06 * decile as f64);
                let score_text = match decile {
                    1..=4 => "Low",
                    5..=7 => "Medium",
                    _ => "High",
                };

                Record {
                    group: group.to_string(),
                    risk_score: decile as f64,
                    outcome,
                    attributes: Attributes {
                        age: Some(rng.gen_range(18..=70)),
                        sex: Some(if rng.gen_bool(0.8) { "Male" } else { "Female" }.to_string()),
                        priors_count: Some(rng.gen_range(0..=decile * 2)),
                        charge_degree: Some(if rng.gen_bool(0.65) { "F" } else { "M" }.to_string()),
                        score_text: Some(score_text.to_string()),
                    },
                }
            })
            .collect();

        Self {
            source: "synthetic".to_string(),
            records,
            rows_read: size,
            rows_dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records per group value, ordered by group name
    pub fn group_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.group.clone()).or_insert(0) += 1;
        }
        counts
    }
}

struct OptionalColumns {
    age: Option<usize>,
    sex: Option<usize>,
    priors_count: Option<usize>,
    charge_degree: Option<usize>,
    score_text: Option<usize>,
}

impl OptionalColumns {
    fn read(&self, row: &csv::StringRecord) -> Attributes {
        let text = |idx: Option<usize>| idx.and_then(|i| field(row, i)).map(str::to_string);
        let count = |idx: Option<usize>| idx.and_then(|i| field(row, i)).and_then(|v| v.parse().ok());

        Attributes {
            age: count(self.age),
            sex: text(self.sex),
            priors_count: count(self.priors_count),
            charge_degree: text(self.charge_degree),
            score_text: text(self.score_text),
        }
    }
}

/// Non-null cell value
fn field(row: &csv::StringRecord, idx: usize) -> Option<&str> {
    row.get(idx).map(str::trim).filter(|v| !is_null(v))
}

fn is_null(value: &str) -> bool {
    value.is_empty()
        || ["na", "nan", "null", "none"]
            .iter()
            .any(|marker| value.eq_ignore_ascii_case(marker))
}

fn parse_score(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|score| score.is_finite())
}

fn parse_outcome(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(true),
        "0" | "0.0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file
    }

    #[test]
    fn test_decision_threshold_is_inclusive() {
        let record = Record::new("Caucasian", 5.0, false);
        assert!(record.decision(5.0));
        assert!(!record.decision(5.5));
    }

    #[test]
    fn test_load_csv_drops_rows_with_nulls() {
        let file = write_csv(
            "id,race,age,sex,decile_score,two_year_recid,score_text\n\
             1,African-American,34,Male,7,1,Medium\n\
             2,Caucasian,,Female,3,0,Low\n\
             3,,25,Male,4,0,Low\n\
             4,Hispanic,41,Male,NA,1,High\n\
             5,Caucasian,52,Male,9,,High\n\
             6,Other,29,Female,2,false,Low\n",
        );

        let population = Population::load_csv(file.path(), &ColumnMapping::default()).unwrap();

        assert_eq!(population.rows_read, 6);
        assert_eq!(population.rows_dropped, 3);
        assert_eq!(population.len(), 3);
        assert_eq!(population.records[0].group, "African-American");
        assert_eq!(population.records[0].attributes.age, Some(34));
        assert_eq!(population.records[0].attributes.score_text.as_deref(), Some("Medium"));
        // A missing optional column value does not drop the row
        assert_eq!(population.records[1].attributes.age, None);
        assert!(!population.records[2].outcome);
    }

    #[test]
    fn test_load_csv_unparseable_score_is_dropped() {
        let file = write_csv("race,decile_score,two_year_recid\nCaucasian,high,1\nCaucasian,8,1\n");
        let population = Population::load_csv(file.path(), &ColumnMapping::default()).unwrap();

        assert_eq!(population.len(), 1);
        assert_eq!(population.rows_dropped, 1);
    }

    #[test]
    fn test_load_csv_missing_columns() {
        let file = write_csv("race,score\nCaucasian,4\n");
        let err = Population::load_csv(file.path(), &ColumnMapping::default()).unwrap_err();

        assert!(err.is_schema_error());
        match err {
            DatasetError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["decile_score".to_string(), "two_year_recid".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = Population::load_csv(Path::new("/nonexistent/compas.csv"), &ColumnMapping::default())
            .unwrap_err();

        assert!(matches!(err, DatasetError::Io { .. }));
        assert!(!err.is_schema_error());
    }

    #[test]
    fn test_custom_column_mapping() {
        let file = write_csv("ethnicity,risk,reoffended\nGroupA,6,yes\nGroupB,2,no\n");
        let columns = ColumnMapping {
            group: "ethnicity".to_string(),
            score: "risk".to_string(),
            outcome: "reoffended".to_string(),
        };

        let population = Population::load_csv(file.path(), &columns).unwrap();
        assert_eq!(population.len(), 2);
        assert!(population.records[0].outcome);
        assert_eq!(population.records[1].attributes, Attributes::default());
    }

    #[test]
    fn test_synthetic_population() {
        let population = Population::synthetic(500, 42);

        assert_eq!(population.len(), 500);
        assert_eq!(population.source, "synthetic");
        assert!(population
            .records
            .iter()
            .all(|r| (1.0..=10.0).contains(&r.risk_score)));
        assert!(population.group_counts().contains_key("African-American"));
    }

    #[test]
    fn test_synthetic_population_is_seeded() {
        let a = Population::synthetic(200, 7);
        let b = Population::synthetic(200, 7);
        let c = Population::synthetic(200, 8);

        assert_eq!(a.records, b.records);
        assert_ne!(a.records, c.records);
    }

    #[test]
    fn test_cohort_split() {
        let split = CohortSplit::default();
        let aa = Record::new("African-American", 3.0, false);
        let other = Record::new("Caucasian", 3.0, false);

        assert_eq!(split.cohort_of(&aa), Cohort::Comparison);
        assert_eq!(split.cohort_of(&other), Cohort::Reference);
        assert_eq!(split.label(Cohort::Reference), "Others");
    }

    #[test]
    fn test_group_counts() {
        let population = Population::from_records(vec![
            Record::new("B", 1.0, false),
            Record::new("A", 1.0, false),
            Record::new("B", 1.0, true),
        ]);

        let counts: Vec<_> = population.group_counts().into_iter().collect();
        assert_eq!(counts, vec![("A".to_string(), 1), ("B".to_string(), 2)]);
    }
}
