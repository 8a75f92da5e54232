// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fairness audit CLI for recidivism risk scores
//!
//! Usage:
//!   compas-audit --path compas-scores-two-years.csv
//!   compas-audit --dataset synthetic --samples 5000 --seed 7 --format markdown

use anyhow::Result;
use clap::{Parser, ValueEnum};
use compas_audit::metrics::CohortMetrics;
use compas_audit::pipeline::{AuditConfig, AuditPipeline, AuditResults, DatasetSource};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_DATASET: &str = "compas-scores-two-years.csv";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DatasetKind {
    Csv,
    Synthetic,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Markdown,
    Json,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "compas-audit")]
#[command(about = "Audit risk scores for group-fairness violations")]
#[command(version)]
struct Args {
    /// Population source (defaults to the CSV at --path)
    #[arg(short, long, value_enum)]
    dataset: Option<DatasetKind>,

    /// Path to the scores CSV
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// JSON audit configuration; flags override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// High-risk cut-off on the decile score (inclusive)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Lowest acceptable disparate impact
    #[arg(long)]
    parity_lower: Option<f64>,

    /// Highest acceptable disparate impact
    #[arg(long)]
    parity_upper: Option<f64>,

    /// Largest acceptable error-rate gap
    #[arg(long)]
    opportunity_bound: Option<f64>,

    /// Group value forming the comparison cohort
    #[arg(long)]
    comparison_group: Option<String>,

    /// Output directory for artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Reports to write
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Skip the SVG dashboard
    #[arg(long)]
    no_plot: bool,

    /// Seed for the synthetic population
    #[arg(short, long)]
    seed: Option<u64>,

    /// Size of the synthetic population
    #[arg(long)]
    samples: Option<usize>,
}

fn build_config(args: &Args) -> Result<AuditConfig> {
    let mut config = match &args.config {
        Some(path) => AuditConfig::from_json_file(path)?,
        None => AuditConfig {
            dataset: DatasetSource::Csv {
                path: PathBuf::from(DEFAULT_DATASET),
            },
            ..AuditConfig::default()
        },
    };

    match (args.dataset, &args.path) {
        (Some(DatasetKind::Synthetic), _) => {
            if !matches!(config.dataset, DatasetSource::Synthetic { .. }) {
                config.dataset = DatasetSource::default();
            }
        }
        (Some(DatasetKind::Csv), path) => {
            config.dataset = DatasetSource::Csv {
                path: path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET)),
            };
        }
        (None, Some(path)) => {
            config.dataset = DatasetSource::Csv { path: path.clone() };
        }
        (None, None) => {}
    }

    if let DatasetSource::Synthetic { size, seed } = &mut config.dataset {
        if let Some(samples) = args.samples {
            *size = samples;
        }
        if let Some(s) = args.seed {
            *seed = s;
        }
    }

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(lower) = args.parity_lower {
        config.fairness.parity_lower = lower;
    }
    if let Some(upper) = args.parity_upper {
        config.fairness.parity_upper = upper;
    }
    if let Some(bound) = args.opportunity_bound {
        config.fairness.opportunity_bound = bound;
    }
    if let Some(group) = &args.comparison_group {
        config.cohorts.comparison_group = group.clone();
        config.cohorts.comparison_label = group.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(format) = args.format {
        let outputs = &mut config.outputs;
        outputs.text = matches!(format, ReportFormat::Text | ReportFormat::All);
        outputs.markdown = matches!(format, ReportFormat::Markdown | ReportFormat::All);
        outputs.json = matches!(format, ReportFormat::Json | ReportFormat::All);
    }
    if args.no_plot {
        config.outputs.plot = false;
    }

    Ok(config)
}

fn print_cohort(metrics: &CohortMetrics) {
    println!(
        "{:<20} {:>8} {:>10.4} {:>10.4} {:>10.4}{}",
        metrics.label,
        metrics.size,
        metrics.selection_rate,
        metrics.false_positive_rate,
        metrics.true_positive_rate,
        if metrics.low_confidence { "  (low confidence)" } else { "" }
    );
}

fn print_summary(results: &AuditResults) {
    println!("\n{}", "=".repeat(70));
    println!("RISK SCORE BIAS AUDIT");
    println!("{}", "=".repeat(70));
    println!(
        "\nDataset: {} ({} records, {} rows dropped)",
        results.dataset.source, results.dataset.records, results.dataset.rows_dropped
    );
    println!("High-risk threshold: score >= {}", results.evaluation.threshold());

    println!("\n{}", results.statistics.format());

    let Some(metrics) = results.evaluation.metric_set() else {
        println!("\nInsufficient data: at least one cohort is empty, no cross-cohort metrics computed.");
        return;
    };

    println!("\n{:-<70}", "");
    println!("{:<20} {:>8} {:>10} {:>10} {:>10}", "Cohort", "Size", "Selected", "FPR", "TPR");
    println!("{:-<70}", "");
    print_cohort(&metrics.comparison);
    print_cohort(&metrics.reference);
    println!("{:-<70}", "");

    let assessment = &results.assessment;
    println!("\nDisparate impact:   {:.4}  [{}]", metrics.disparate_impact, assessment.demographic_parity);
    println!("FPR gap:            {:.4}  [{}]", metrics.fpr_gap, assessment.equal_opportunity);
    println!("TPR gap:            {:.4}  [equalized odds {}]", metrics.tpr_gap, assessment.equalized_odds);
    match assessment.fairness_score {
        Some(score) => println!("Fairness score:     {:.4}", score),
        None => println!("Fairness score:     undefined"),
    }

    let violations = assessment.violations();
    if violations.is_empty() {
        println!("\nNo fairness violations at the configured bounds.");
    } else {
        println!("\nViolations: {}", violations.join(", "));
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    tracing::info!("Risk Score Bias Audit");
    tracing::info!("Dataset: {:?}", config.dataset);
    tracing::info!("Threshold: {}", config.threshold);

    let pipeline = AuditPipeline::new(config);
    let results = pipeline.run()?;

    print_summary(&results);

    let artifacts = pipeline.write_artifacts(&results)?;
    println!();
    for path in artifacts.paths() {
        println!("Saved: {}", path.display());
    }
    println!("\nAudit complete!");

    Ok(())
}
