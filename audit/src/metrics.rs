// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Group-fairness metrics over a binary high-risk decision
//!
//! The engine is a single counting pass: every record is mapped to its
//! cohort and to a confusion-matrix cell, and all rates are ratios of those
//! counts. Traversal order therefore never affects the result.
//!
//! Every rate uses the same policy for an empty denominator: the rate is
//! reported as 0 and the cohort is flagged low-confidence.

use crate::dataset::{Cohort, CohortSplit, Record};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default high-risk cut-off on the decile score
pub const DEFAULT_THRESHOLD: f64 = 5.0;

/// Confusion matrix for the high-risk decision against the observed outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// High risk, reoffended
    pub tp: usize,
    /// Low risk, did not reoffend
    pub tn: usize,
    /// High risk, did not reoffend
    pub fp: usize,
    /// Low risk, reoffended
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, decision: bool, outcome: bool) {
        match (decision, outcome) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (true, false) => self.fp += 1,
            (false, true) => self.fn_ += 1,
        }
    }

    /// Combine counts from two disjoint sets of records
    pub fn merge(&self, other: &ConfusionMatrix) -> ConfusionMatrix {
        ConfusionMatrix {
            tp: self.tp + other.tp,
            tn: self.tn + other.tn,
            fp: self.fp + other.fp,
            fn_: self.fn_ + other.fn_,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Records with a positive outcome
    pub fn positives(&self) -> usize {
        self.tp + self.fn_
    }

    /// Records with a negative outcome
    pub fn negatives(&self) -> usize {
        self.tn + self.fp
    }

    /// Fraction of records flagged high risk
    pub fn selection_rate(&self) -> f64 {
        ratio(self.tp + self.fp, self.total())
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Recall / true positive rate: TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.positives())
    }

    /// False positive rate: FP / (FP + TN)
    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.fp, self.negatives())
    }

    /// Specificity / true negative rate: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.negatives())
    }

    /// F1 Score: 2 * (Precision * Recall) / (Precision + Recall)
    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        let denom = precision + recall;
        if denom == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / denom
    }
}

/// `num / denom`, or 0 when the denominator is empty
fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    num as f64 / denom as f64
}

/// Ratio of comparison to reference selection rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DisparateImpact {
    /// Finite, non-negative ratio
    Ratio(f64),
    /// Reference rate is zero while the comparison rate is not
    Unbounded,
    /// Both selection rates are zero
    Indeterminate,
}

impl DisparateImpact {
    pub fn from_rates(comparison: f64, reference: f64) -> Self {
        if reference > 0.0 {
            DisparateImpact::Ratio(comparison / reference)
        } else if comparison > 0.0 {
            DisparateImpact::Unbounded
        } else {
            DisparateImpact::Indeterminate
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            DisparateImpact::Ratio(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, DisparateImpact::Ratio(_))
    }
}

impl fmt::Display for DisparateImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisparateImpact::Ratio(value) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, value),
                None => write!(f, "{}", value),
            },
            DisparateImpact::Unbounded => write!(f, "∞ (undefined: reference selection rate is zero)"),
            DisparateImpact::Indeterminate => write!(f, "undefined (no high-risk decisions in either cohort)"),
        }
    }
}

/// Rates for one cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMetrics {
    pub cohort: Cohort,
    pub label: String,
    pub size: usize,
    pub confusion: ConfusionMatrix,
    pub selection_rate: f64,
    pub true_positive_rate: f64,
    pub false_positive_rate: f64,
    pub true_negative_rate: f64,
    /// A positive- or negative-outcome subset was empty, so its rate was zero-filled
    pub low_confidence: bool,
}

impl CohortMetrics {
    pub fn from_confusion(cohort: Cohort, label: &str, confusion: ConfusionMatrix) -> Self {
        Self {
            cohort,
            label: label.to_string(),
            size: confusion.total(),
            selection_rate: confusion.selection_rate(),
            true_positive_rate: confusion.recall(),
            false_positive_rate: confusion.false_positive_rate(),
            true_negative_rate: confusion.specificity(),
            low_confidence: confusion.positives() == 0 || confusion.negatives() == 0,
            confusion,
        }
    }

    /// Named per-cohort rates, in display order
    pub fn rates(&self) -> [(&'static str, f64); 4] {
        [
            ("Selection rate", self.selection_rate),
            ("True positive rate", self.true_positive_rate),
            ("False positive rate", self.false_positive_rate),
            ("True negative rate", self.true_negative_rate),
        ]
    }
}

/// Population-wide classification quality of the high-risk decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub specificity: f64,
    pub support: usize,
}

impl ClassificationSummary {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        Self {
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1_score: confusion.f1_score(),
            specificity: confusion.specificity(),
            support: confusion.total(),
            confusion,
        }
    }
}

/// Fairness metrics for a reference/comparison pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub threshold: f64,
    pub reference: CohortMetrics,
    pub comparison: CohortMetrics,
    pub disparate_impact: DisparateImpact,
    /// |FPR(comparison) - FPR(reference)|
    pub fpr_gap: f64,
    /// |TPR(comparison) - TPR(reference)|
    pub tpr_gap: f64,
    pub overall: ClassificationSummary,
}

/// Result of running the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Complete(MetricSet),
    /// The population or one of the cohorts is empty. Metrics of a
    /// non-empty cohort are still reported.
    InsufficientData {
        threshold: f64,
        population: usize,
        reference: Option<CohortMetrics>,
        comparison: Option<CohortMetrics>,
    },
}

impl Evaluation {
    pub fn metric_set(&self) -> Option<&MetricSet> {
        match self {
            Evaluation::Complete(metrics) => Some(metrics),
            Evaluation::InsufficientData { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Evaluation::Complete(_))
    }

    pub fn cohort(&self, cohort: Cohort) -> Option<&CohortMetrics> {
        match (self, cohort) {
            (Evaluation::Complete(m), Cohort::Reference) => Some(&m.reference),
            (Evaluation::Complete(m), Cohort::Comparison) => Some(&m.comparison),
            (Evaluation::InsufficientData { reference, .. }, Cohort::Reference) => reference.as_ref(),
            (Evaluation::InsufficientData { comparison, .. }, Cohort::Comparison) => comparison.as_ref(),
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            Evaluation::Complete(metrics) => metrics.threshold,
            Evaluation::InsufficientData { threshold, .. } => *threshold,
        }
    }
}

/// The fairness-metric engine: pure function of records, predicate and threshold
///
/// `is_comparison` decides cohort membership; records for which it returns
/// false form the reference cohort.
pub fn evaluate<F>(records: &[Record], is_comparison: F, threshold: f64, labels: (&str, &str)) -> Evaluation
where
    F: Fn(&Record) -> bool,
{
    let (reference_label, comparison_label) = labels;
    let mut reference = ConfusionMatrix::default();
    let mut comparison = ConfusionMatrix::default();

    for record in records {
        let cell = if is_comparison(record) { &mut comparison } else { &mut reference };
        cell.record(record.decision(threshold), record.outcome);
    }

    let cohort_metrics = |cohort, label: &str, confusion: ConfusionMatrix| {
        (confusion.total() > 0).then(|| CohortMetrics::from_confusion(cohort, label, confusion))
    };
    let reference_metrics = cohort_metrics(Cohort::Reference, reference_label, reference);
    let comparison_metrics = cohort_metrics(Cohort::Comparison, comparison_label, comparison);

    let (reference_metrics, comparison_metrics) = match (reference_metrics, comparison_metrics) {
        (Some(r), Some(c)) => (r, c),
        (r, c) => {
            tracing::warn!(
                "Insufficient data: reference={} comparison={} records",
                reference.total(),
                comparison.total()
            );
            return Evaluation::InsufficientData {
                threshold,
                population: records.len(),
                reference: r,
                comparison: c,
            };
        }
    };

    let disparate_impact =
        DisparateImpact::from_rates(comparison_metrics.selection_rate, reference_metrics.selection_rate);
    let fpr_gap = (comparison_metrics.false_positive_rate - reference_metrics.false_positive_rate).abs();
    let tpr_gap = (comparison_metrics.true_positive_rate - reference_metrics.true_positive_rate).abs();

    Evaluation::Complete(MetricSet {
        threshold,
        disparate_impact,
        fpr_gap,
        tpr_gap,
        overall: ClassificationSummary::from_confusion(reference.merge(&comparison)),
        reference: reference_metrics,
        comparison: comparison_metrics,
    })
}

/// Run the engine with a named cohort split
pub fn evaluate_split(records: &[Record], split: &CohortSplit, threshold: f64) -> Evaluation {
    evaluate(
        records,
        |record| split.is_comparison(record),
        threshold,
        (&split.reference_label, &split.comparison_label),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `n` records with the given group, decision and outcome pattern
    fn cohort(group: &str, n: usize, selected: usize, positive: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let score = if i < selected { 8.0 } else { 2.0 };
                Record::new(group, score, i >= n - positive)
            })
            .collect()
    }

    fn split() -> CohortSplit {
        CohortSplit::on_group("B")
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let mut cm = ConfusionMatrix::default();
        cm.record(true, true);
        cm.record(true, false);
        cm.record(false, false);
        cm.record(false, true);
        cm.record(false, false);

        assert_eq!(cm, ConfusionMatrix { tp: 1, tn: 2, fp: 1, fn_: 1 });
        assert_eq!(cm.positives(), 2);
        assert_eq!(cm.negatives(), 3);
        assert!((cm.selection_rate() - 0.4).abs() < 1e-12);
        assert!((cm.false_positive_rate() - 1.0 / 3.0).abs() < 1e-12);
        assert!((cm.recall() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_confusion_matrix_rates_are_zero() {
        let cm = ConfusionMatrix::default();
        assert_eq!(cm.selection_rate(), 0.0);
        assert_eq!(cm.false_positive_rate(), 0.0);
        assert_eq!(cm.recall(), 0.0);
        assert_eq!(cm.f1_score(), 0.0);
    }

    #[test]
    fn test_disparate_impact_markers() {
        assert_eq!(DisparateImpact::from_rates(0.3, 0.6), DisparateImpact::Ratio(0.5));
        assert_eq!(DisparateImpact::from_rates(0.3, 0.0), DisparateImpact::Unbounded);
        assert_eq!(DisparateImpact::from_rates(0.0, 0.0), DisparateImpact::Indeterminate);
        assert_eq!(DisparateImpact::from_rates(0.0, 0.4), DisparateImpact::Ratio(0.0));
        assert!(format!("{}", DisparateImpact::Unbounded).starts_with('∞'));
        assert_eq!(format!("{:.2}", DisparateImpact::Ratio(0.5)), "0.50");
    }

    #[test]
    fn test_reference_scenario_halved_selection() {
        let mut records = cohort("A", 100, 60, 40);
        records.extend(cohort("B", 100, 30, 40));

        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);
        let metrics = evaluation.metric_set().expect("both cohorts populated");

        assert!((metrics.reference.selection_rate - 0.60).abs() < 1e-12);
        assert!((metrics.comparison.selection_rate - 0.30).abs() < 1e-12);
        let di = metrics.disparate_impact.ratio().expect("finite ratio");
        assert!((di - 0.50).abs() < 1e-12);
    }

    #[test]
    fn test_identical_cohorts_have_no_disparity() {
        let mut records = cohort("A", 40, 18, 10);
        records.extend(cohort("B", 40, 18, 10));

        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);
        let metrics = evaluation.metric_set().unwrap();

        assert_eq!(metrics.disparate_impact, DisparateImpact::Ratio(1.0));
        assert_eq!(metrics.fpr_gap, 0.0);
        assert_eq!(metrics.tpr_gap, 0.0);
        assert!((metrics.reference.selection_rate - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_known_rates() {
        // Reference: 4 negatives (1 selected), 2 positives (2 selected)
        // Comparison: 2 negatives (2 selected), 2 positives (1 selected)
        let records = vec![
            Record::new("A", 7.0, false),
            Record::new("A", 1.0, false),
            Record::new("A", 1.0, false),
            Record::new("A", 1.0, false),
            Record::new("A", 9.0, true),
            Record::new("A", 5.0, true),
            Record::new("B", 6.0, false),
            Record::new("B", 10.0, false),
            Record::new("B", 5.0, true),
            Record::new("B", 4.0, true),
        ];

        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);
        let m = evaluation.metric_set().unwrap();

        assert!((m.reference.false_positive_rate - 0.25).abs() < 1e-12);
        assert!((m.comparison.false_positive_rate - 1.0).abs() < 1e-12);
        assert!((m.reference.true_positive_rate - 1.0).abs() < 1e-12);
        assert!((m.comparison.true_positive_rate - 0.5).abs() < 1e-12);
        assert!((m.fpr_gap - 0.75).abs() < 1e-12);
        assert!((m.tpr_gap - 0.5).abs() < 1e-12);
        assert!((m.reference.true_negative_rate - 0.75).abs() < 1e-12);
        assert_eq!(m.overall.support, 10);
        assert_eq!(m.overall.confusion.tp, 3);
    }

    #[test]
    fn test_empty_outcome_subset_is_zero_and_low_confidence() {
        // Comparison cohort has no negative outcomes at all
        let records = vec![
            Record::new("A", 7.0, false),
            Record::new("A", 2.0, true),
            Record::new("B", 7.0, true),
            Record::new("B", 8.0, true),
        ];

        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);
        let m = evaluation.metric_set().unwrap();

        assert_eq!(m.comparison.false_positive_rate, 0.0);
        assert_eq!(m.comparison.true_negative_rate, 0.0);
        assert!(m.comparison.low_confidence);
        assert!(!m.reference.low_confidence);
        assert!(m.fpr_gap.is_finite());
    }

    #[test]
    fn test_zero_reference_selection_is_unbounded() {
        let records = vec![
            Record::new("A", 1.0, false),
            Record::new("A", 2.0, true),
            Record::new("B", 9.0, true),
            Record::new("B", 3.0, false),
        ];

        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);
        assert_eq!(evaluation.metric_set().unwrap().disparate_impact, DisparateImpact::Unbounded);
    }

    #[test]
    fn test_empty_comparison_cohort_is_insufficient() {
        let records = cohort("A", 10, 5, 5);
        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);

        match evaluation {
            Evaluation::InsufficientData { population, reference, comparison, .. } => {
                assert_eq!(population, 10);
                assert!(reference.is_some());
                assert!(comparison.is_none());
            }
            Evaluation::Complete(_) => panic!("expected insufficient data"),
        }
    }

    #[test]
    fn test_empty_population_is_insufficient() {
        let evaluation = evaluate_split(&[], &split(), DEFAULT_THRESHOLD);

        assert!(!evaluation.is_complete());
        assert!(evaluation.cohort(Cohort::Reference).is_none());
        assert!(evaluation.cohort(Cohort::Comparison).is_none());
    }

    #[test]
    fn test_arbitrary_predicate() {
        let records = vec![
            Record::new("x", 6.0, true),
            Record::new("y", 6.0, false),
            Record::new("z", 1.0, false),
        ];

        let evaluation = evaluate(&records, |r| r.group != "x", 5.0, ("X", "not X"));
        let m = evaluation.metric_set().unwrap();
        assert_eq!(m.reference.size, 1);
        assert_eq!(m.comparison.size, 2);
        assert_eq!(m.comparison.label, "not X");
    }

    #[test]
    fn test_evaluation_serializes_markers() {
        let records = vec![Record::new("A", 1.0, false), Record::new("B", 9.0, true)];
        let evaluation = evaluate_split(&records, &split(), DEFAULT_THRESHOLD);

        let json = serde_json::to_string(&evaluation).unwrap();
        assert!(json.contains("\"status\":\"complete\""));
        assert!(json.contains("\"kind\":\"unbounded\""));
    }
}
