// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Descriptive statistics of the population before any fairness metric

use crate::dataset::{Cohort, CohortSplit, Population};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome and score summary for one group value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub group: String,
    pub count: usize,
    pub outcome_rate: f64,
    pub mean_score: f64,
    /// Sample standard deviation; needs at least two records
    pub score_std: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub score: i64,
    pub count: usize,
}

/// Score distribution of one cohort, bucketed on the integer part of the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    pub cohort: Cohort,
    pub label: String,
    pub buckets: Vec<ScoreBucket>,
}

impl ScoreHistogram {
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub population: usize,
    /// `None` for an empty population
    pub overall_outcome_rate: Option<f64>,
    /// One entry per group value, ordered by name
    pub groups: Vec<GroupStats>,
    /// Reference cohort first, then comparison
    pub histograms: Vec<ScoreHistogram>,
}

impl DescriptiveStats {
    pub fn describe(population: &Population, split: &CohortSplit) -> Self {
        let records = &population.records;

        let overall_outcome_rate = (!records.is_empty())
            .then(|| records.iter().filter(|r| r.outcome).count() as f64 / records.len() as f64);

        let mut by_group: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
        for record in records {
            let entry = by_group.entry(record.group.as_str()).or_default();
            entry.0.push(record.risk_score);
            if record.outcome {
                entry.1 += 1;
            }
        }

        let groups = by_group
            .into_iter()
            .map(|(group, (scores, outcomes))| {
                let count = scores.len();
                let mean_score = mean(&scores);
                GroupStats {
                    group: group.to_string(),
                    count,
                    outcome_rate: outcomes as f64 / count as f64,
                    mean_score,
                    score_std: sample_std(&scores, mean_score),
                }
            })
            .collect();

        let histograms = [Cohort::Reference, Cohort::Comparison]
            .into_iter()
            .map(|cohort| {
                let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
                for record in records.iter().filter(|r| split.cohort_of(r) == cohort) {
                    *buckets.entry(record.risk_score.floor() as i64).or_insert(0) += 1;
                }
                ScoreHistogram {
                    cohort,
                    label: split.label(cohort).to_string(),
                    buckets: buckets
                        .into_iter()
                        .map(|(score, count)| ScoreBucket { score, count })
                        .collect(),
                }
            })
            .collect();

        Self {
            population: records.len(),
            overall_outcome_rate,
            groups,
            histograms,
        }
    }

    pub fn group(&self, name: &str) -> Option<&GroupStats> {
        self.groups.iter().find(|g| g.group == name)
    }

    /// Groups ordered by outcome rate, highest first
    pub fn groups_by_outcome_rate(&self) -> Vec<&GroupStats> {
        let mut sorted: Vec<_> = self.groups.iter().collect();
        sorted.sort_by(|a, b| b.outcome_rate.total_cmp(&a.outcome_rate));
        sorted
    }

    /// Fixed-width table for console output
    pub fn format(&self) -> String {
        let mut out = String::new();
        match self.overall_outcome_rate {
            Some(rate) => out.push_str(&format!("Overall recidivism rate: {:.3}\n", rate)),
            None => out.push_str("Overall recidivism rate: n/a (empty population)\n"),
        }
        out.push_str(&format!(
            "\n{:<20} {:>8} {:>12} {:>11} {:>10}\n",
            "Group", "Count", "Recid. rate", "Mean score", "Std"
        ));
        for g in &self.groups {
            let std = g.score_std.map_or("-".to_string(), |s| format!("{:.3}", s));
            out.push_str(&format!(
                "{:<20} {:>8} {:>12.3} {:>11.3} {:>10}\n",
                g.group, g.count, g.outcome_rate, g.mean_score, std
            ));
        }
        out
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;

    fn population() -> Population {
        Population::from_records(vec![
            Record::new("African-American", 8.0, true),
            Record::new("African-American", 4.0, false),
            Record::new("Caucasian", 2.0, false),
            Record::new("Caucasian", 4.0, true),
            Record::new("Caucasian", 6.0, false),
            Record::new("Asian", 3.0, false),
        ])
    }

    #[test]
    fn test_describe_groups() {
        let stats = DescriptiveStats::describe(&population(), &CohortSplit::default());

        assert_eq!(stats.population, 6);
        assert!((stats.overall_outcome_rate.unwrap() - 2.0 / 6.0).abs() < 1e-12);

        let names: Vec<_> = stats.groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(names, vec!["African-American", "Asian", "Caucasian"]);

        let caucasian = stats.group("Caucasian").unwrap();
        assert_eq!(caucasian.count, 3);
        assert!((caucasian.mean_score - 4.0).abs() < 1e-12);
        assert!((caucasian.score_std.unwrap() - 2.0).abs() < 1e-12);

        assert_eq!(stats.group("Asian").unwrap().score_std, None);
    }

    #[test]
    fn test_histograms_per_cohort() {
        let stats = DescriptiveStats::describe(&population(), &CohortSplit::default());

        assert_eq!(stats.histograms.len(), 2);
        assert_eq!(stats.histograms[0].cohort, Cohort::Reference);
        assert_eq!(stats.histograms[0].total(), 4);
        assert_eq!(
            stats.histograms[1].buckets,
            vec![ScoreBucket { score: 4, count: 1 }, ScoreBucket { score: 8, count: 1 }]
        );
    }

    #[test]
    fn test_groups_by_outcome_rate() {
        let stats = DescriptiveStats::describe(&population(), &CohortSplit::default());
        let order: Vec<_> = stats.groups_by_outcome_rate().iter().map(|g| g.group.clone()).collect();

        assert_eq!(order, vec!["African-American", "Caucasian", "Asian"]);
    }

    #[test]
    fn test_empty_population() {
        let stats = DescriptiveStats::describe(&Population::from_records(vec![]), &CohortSplit::default());

        assert_eq!(stats.overall_outcome_rate, None);
        assert!(stats.groups.is_empty());
        assert!(stats.histograms.iter().all(|h| h.buckets.is_empty()));
        assert!(stats.format().contains("n/a"));
    }
}
