// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Audit pipeline
//!
//! Orchestrates:
//! - Population loading (CSV or synthetic)
//! - Descriptive statistics
//! - Fairness metric computation and assessment
//! - Artifact output (SVG figure, text/markdown reports, JSON results)
//!
//! Loading is the only fallible, effectful step. [`AuditPipeline::analyze`]
//! is a pure function of the configuration and the population it is given.

use crate::assessment::{Assessment, FairnessThresholds};
use crate::dataset::{CohortSplit, ColumnMapping, Population};
use crate::metrics::{evaluate_split, Evaluation, DEFAULT_THRESHOLD};
use crate::stats::DescriptiveStats;
use crate::{plot, report};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where the population comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    Csv { path: PathBuf },
    Synthetic { size: usize, seed: u64 },
}

impl Default for DatasetSource {
    fn default() -> Self {
        DatasetSource::Synthetic { size: 1000, seed: 42 }
    }
}

/// Which artifacts [`AuditPipeline::write_artifacts`] produces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputToggles {
    pub plot: bool,
    pub text: bool,
    pub markdown: bool,
    pub json: bool,
}

impl Default for OutputToggles {
    fn default() -> Self {
        Self {
            plot: true,
            text: true,
            markdown: true,
            json: true,
        }
    }
}

/// Configuration for the audit pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub dataset: DatasetSource,
    pub columns: ColumnMapping,
    pub cohorts: CohortSplit,
    /// Scores at or above this value are classified high risk
    pub threshold: f64,
    pub fairness: FairnessThresholds,
    pub output_dir: PathBuf,
    pub outputs: OutputToggles,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetSource::default(),
            columns: ColumnMapping::default(),
            cohorts: CohortSplit::default(),
            threshold: DEFAULT_THRESHOLD,
            fairness: FairnessThresholds::default(),
            output_dir: PathBuf::from("audit_output"),
            outputs: OutputToggles::default(),
        }
    }
}

impl AuditConfig {
    /// Read a JSON config; absent fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub source: String,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub records: usize,
    pub group_counts: BTreeMap<String, usize>,
}

impl DatasetInfo {
    fn from_population(population: &Population) -> Self {
        Self {
            source: population.source.clone(),
            rows_read: population.rows_read,
            rows_dropped: population.rows_dropped,
            records: population.len(),
            group_counts: population.group_counts(),
        }
    }
}

/// Complete audit results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResults {
    pub config: AuditConfig,
    pub dataset: DatasetInfo,
    pub statistics: DescriptiveStats,
    pub evaluation: Evaluation,
    pub assessment: Assessment,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl AuditResults {
    /// Size of one side of the split, counted from the dataset summary
    pub fn cohort_size(&self, comparison: bool) -> usize {
        let group = &self.config.cohorts.comparison_group;
        let in_comparison = self.dataset.group_counts.get(group).copied().unwrap_or(0);
        if comparison {
            in_comparison
        } else {
            self.dataset.records - in_comparison
        }
    }
}

/// Paths written by [`AuditPipeline::write_artifacts`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub plot: Option<PathBuf>,
    pub text_report: Option<PathBuf>,
    pub markdown_report: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl Artifacts {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.plot, &self.text_report, &self.markdown_report, &self.json]
            .into_iter()
            .flatten()
    }
}

pub struct AuditPipeline {
    config: AuditConfig,
}

impl AuditPipeline {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Load the configured population
    pub fn load_population(&self) -> Result<Population> {
        let population = match &self.config.dataset {
            DatasetSource::Csv { path } => {
                tracing::info!("Loading dataset from {}", path.display());
                Population::load_csv(path, &self.config.columns)?
            }
            DatasetSource::Synthetic { size, seed } => {
                tracing::info!("Generating synthetic population ({} records, seed {})", size, seed);
                Population::synthetic(*size, *seed)
            }
        };

        tracing::info!(
            "Population ready: {} records ({} rows read, {} dropped)",
            population.len(),
            population.rows_read,
            population.rows_dropped
        );
        Ok(population)
    }

    /// Compute statistics, metrics and verdicts for a population
    pub fn analyze(&self, population: &Population) -> AuditResults {
        let config = &self.config;

        let statistics = DescriptiveStats::describe(population, &config.cohorts);
        let evaluation = evaluate_split(&population.records, &config.cohorts, config.threshold);
        let assessment = Assessment::from_evaluation(&evaluation, &config.fairness);

        match evaluation.metric_set() {
            Some(m) => tracing::info!(
                "Selection rate {}={:.3} {}={:.3}, disparate impact {:.3}, FPR gap {:.3}",
                m.comparison.label,
                m.comparison.selection_rate,
                m.reference.label,
                m.reference.selection_rate,
                m.disparate_impact,
                m.fpr_gap
            ),
            None => tracing::warn!("Insufficient data for cross-cohort metrics"),
        }

        AuditResults {
            config: config.clone(),
            dataset: DatasetInfo::from_population(population),
            statistics,
            evaluation,
            assessment,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Load then analyze
    pub fn run(&self) -> Result<AuditResults> {
        let population = self.load_population()?;
        Ok(self.analyze(&population))
    }

    /// Save results to JSON file
    pub fn save_results(results: &AuditResults, output_path: &Path) -> Result<()> {
        std::fs::create_dir_all(output_path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        tracing::info!("Results saved to {}", output_path.display());
        Ok(())
    }

    /// Write every enabled artifact into the configured output directory
    pub fn write_artifacts(&self, results: &AuditResults) -> Result<Artifacts> {
        let dir = &self.config.output_dir;
        let outputs = self.config.outputs;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let mut artifacts = Artifacts::default();

        if outputs.plot {
            let path = dir.join("bias_analysis.svg");
            plot::render_dashboard(results, &path)?;
            tracing::info!("Visualization saved to {}", path.display());
            artifacts.plot = Some(path);
        }

        if outputs.text {
            let path = dir.join("bias_audit_report.txt");
            write_text(&path, &report::plain_text(results))?;
            artifacts.text_report = Some(path);
        }

        if outputs.markdown {
            let path = dir.join("bias_audit_report.md");
            write_text(&path, &report::markdown(results))?;
            artifacts.markdown_report = Some(path);
        }

        if outputs.json {
            let path = dir.join("audit_results.json");
            Self::save_results(results, &path)?;
            artifacts.json = Some(path);
        }

        Ok(artifacts)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Report saved to {}", path.display());
    Ok(())
}
