// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use compas_audit::pipeline::{AuditConfig, AuditPipeline, DatasetSource};
use compas_audit::{DatasetError, DisparateImpact, Verdict};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::tempdir;

/// 10 comparison and 10 reference defendants; `high` of each are scored 8, the rest 2
fn write_scores(path: &Path, comparison_high: usize, reference_high: usize) {
    let mut csv = String::from("id,race,decile_score,two_year_recid\n");
    let mut id = 0;
    for (race, high) in [("African-American", comparison_high), ("Caucasian", reference_high)] {
        for i in 0..10 {
            let score = if i < high { 8 } else { 2 };
            let outcome = i % 2;
            writeln!(csv, "{},{},{},{}", id, race, score, outcome).unwrap();
            id += 1;
        }
    }
    // Rows without a usable score are dropped
    csv.push_str("98,Hispanic,,1\n99,Other,NA,0\n");
    std::fs::write(path, csv).unwrap();
}

fn csv_config(path: &Path, output: &Path) -> AuditConfig {
    AuditConfig {
        dataset: DatasetSource::Csv { path: path.to_path_buf() },
        output_dir: output.to_path_buf(),
        ..AuditConfig::default()
    }
}

#[test]
fn test_biased_scores_from_csv() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("scores.csv");
    write_scores(&input, 6, 3);

    let pipeline = AuditPipeline::new(csv_config(&input, &dir.path().join("out")));
    let results = pipeline.run().unwrap();

    assert_eq!(results.dataset.rows_read, 22);
    assert_eq!(results.dataset.rows_dropped, 2);
    assert_eq!(results.dataset.records, 20);

    let metrics = results.evaluation.metric_set().unwrap();
    assert!((metrics.comparison.selection_rate - 0.6).abs() < 1e-12);
    assert!((metrics.reference.selection_rate - 0.3).abs() < 1e-12);
    assert_eq!(metrics.disparate_impact.ratio().map(|v| (v * 1e9).round() / 1e9), Some(2.0));
    assert_eq!(results.assessment.demographic_parity, Verdict::Violated);

    let artifacts = pipeline.write_artifacts(&results).unwrap();
    assert_eq!(artifacts.paths().count(), 4);
    for path in artifacts.paths() {
        assert!(path.exists(), "missing {}", path.display());
    }
    let report = std::fs::read_to_string(artifacts.text_report.unwrap()).unwrap();
    assert!(report.contains("VIOLATED"));
}

#[test]
fn test_equal_scores_pass_parity() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("scores.csv");
    write_scores(&input, 4, 4);

    let results = AuditPipeline::new(csv_config(&input, dir.path())).run().unwrap();
    let metrics = results.evaluation.metric_set().unwrap();

    assert_eq!(metrics.disparate_impact, DisparateImpact::Ratio(1.0));
    assert_eq!(results.assessment.demographic_parity, Verdict::Acceptable);
    assert_eq!(results.assessment.fairness_score, Some(1.0));
}

#[test]
fn test_zero_reference_selection_is_unbounded() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("scores.csv");
    write_scores(&input, 5, 0);

    let results = AuditPipeline::new(csv_config(&input, dir.path())).run().unwrap();
    let metrics = results.evaluation.metric_set().unwrap();

    assert_eq!(metrics.disparate_impact, DisparateImpact::Unbounded);
    assert_eq!(results.assessment.demographic_parity, Verdict::Violated);
    assert_eq!(results.assessment.fairness_score, None);
}

#[test]
fn test_missing_columns_is_schema_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("scores.csv");
    std::fs::write(&input, "id,race,score\n1,Caucasian,4\n").unwrap();

    let err = AuditPipeline::new(csv_config(&input, dir.path())).run().unwrap_err();
    let dataset_err = err.downcast_ref::<DatasetError>().unwrap();
    assert!(dataset_err.is_schema_error());
}

#[test]
fn test_config_file_drives_run() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("audit.json");
    std::fs::write(
        &config_path,
        r#"{ "dataset": { "kind": "synthetic", "size": 300, "seed": 5 }, "threshold": 7.0 }"#,
    )
    .unwrap();

    let config = AuditConfig::from_json_file(&config_path).unwrap();
    let results = AuditPipeline::new(config).run().unwrap();

    assert_eq!(results.dataset.records, 300);
    assert_eq!(results.evaluation.threshold(), 7.0);
}
