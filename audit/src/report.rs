// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Narrative audit reports
//!
//! Both renderers interpolate an [`AuditResults`] into a fixed template.
//! Non-finite disparate impact and empty cohorts are written out
//! explicitly, never replaced by a number.

use crate::assessment::Verdict;
use crate::metrics::{CohortMetrics, Evaluation, MetricSet};
use crate::pipeline::AuditResults;

const RECOMMENDATIONS: &[(&str, &[&str])] = &[
    (
        "IMMEDIATE ACTIONS",
        &[
            "Implement continuous bias monitoring with automated alerts when disparate impact leaves the configured bounds",
            "Establish a diverse oversight committee including affected community representatives",
            "Create a transparent appeals process for high-risk classifications",
        ],
    ),
    (
        "ALGORITHMIC IMPROVEMENTS",
        &[
            "Retrain the model with fairness constraints (equalized odds, demographic parity)",
            "Apply adversarial debiasing to remove correlations with the protected attribute",
            "Add fairness regularizers to the training objective",
        ],
    ),
    (
        "DATA INTERVENTIONS",
        &[
            "Audit historical training data for bias patterns",
            "Use balanced sampling across demographic groups",
            "Run regular data quality assessments and bias detection",
        ],
    ),
    (
        "PROCESS SAFEGUARDS",
        &[
            "Require human review for high-risk classifications",
            "Provide clear explanations for risk scores",
            "Commission regular external audits by independent researchers",
        ],
    ),
];

fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Plain-text executive report
pub fn plain_text(results: &AuditResults) -> String {
    let split = &results.config.cohorts;
    let mut report = String::new();

    report.push_str("RISK SCORE BIAS AUDIT - EXECUTIVE SUMMARY\n");
    report.push_str("=========================================\n\n");

    report.push_str("Dataset Overview:\n");
    report.push_str(&format!("- Source: {}\n", results.dataset.source));
    report.push_str(&format!("- Total records analyzed: {}\n", results.dataset.records));
    report.push_str(&format!(
        "- Rows excluded for missing fields: {}\n",
        results.dataset.rows_dropped
    ));
    report.push_str(&format!(
        "- {} defendants: {}\n",
        split.comparison_label,
        results.cohort_size(true)
    ));
    report.push_str(&format!(
        "- {} defendants: {}\n",
        split.reference_label,
        results.cohort_size(false)
    ));
    match results.statistics.overall_outcome_rate {
        Some(rate) => report.push_str(&format!("- Overall recidivism rate: {:.3}\n", rate)),
        None => report.push_str("- Overall recidivism rate: n/a\n"),
    }
    report.push_str(&format!(
        "- High-risk threshold: score >= {}\n\n",
        results.evaluation.threshold()
    ));

    match &results.evaluation {
        Evaluation::Complete(metrics) => push_findings(&mut report, results, metrics),
        Evaluation::InsufficientData {
            population,
            reference,
            comparison,
            ..
        } => {
            report.push_str("INSUFFICIENT DATA:\n");
            report.push_str(&format!(
                "   Cross-cohort fairness metrics were not computed ({} records).\n",
                population
            ));
            for (label, cohort) in [
                (&split.comparison_label, comparison),
                (&split.reference_label, reference),
            ] {
                match cohort {
                    Some(m) => report.push_str(&format!(
                        "   - {}: {} records, selection rate {:.3}, FPR {:.3}, TPR {:.3}\n",
                        label, m.size, m.selection_rate, m.false_positive_rate, m.true_positive_rate
                    )),
                    None => report.push_str(&format!("   - {}: no records\n", label)),
                }
            }
            report.push_str("   All fairness assessments are INCONCLUSIVE.\n\n");
        }
    }

    report.push_str("REMEDIATION RECOMMENDATIONS:\n\n");
    for (i, (heading, items)) in RECOMMENDATIONS.iter().enumerate() {
        report.push_str(&format!("{}. {}:\n", i + 1, heading));
        for item in items.iter() {
            report.push_str(&format!("   - {}\n", item));
        }
        report.push('\n');
    }

    report.push_str("CONCLUSION:\n");
    report.push_str(&conclusion(results));
    report.push_str("\n\n");

    report.push_str(&format!(
        "Report Generated: {}\n",
        results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Tool version: {}\n", results.version));

    report
}

fn push_findings(report: &mut String, results: &AuditResults, m: &MetricSet) {
    let assessment = &results.assessment;
    let thresholds = &assessment.thresholds;
    let (cmp, refr) = (&m.comparison, &m.reference);

    report.push_str("KEY FINDINGS:\n\n");

    report.push_str("1. DEMOGRAPHIC PARITY:\n");
    report.push_str(&format!("   - {} high-risk classification: {:.3}\n", cmp.label, cmp.selection_rate));
    report.push_str(&format!("   - {} high-risk classification: {:.3}\n", refr.label, refr.selection_rate));
    report.push_str(&format!("   - Disparate impact ratio: {:.3}\n", m.disparate_impact));
    report.push_str(&format!(
        "   - ASSESSMENT: {} (acceptable range {:.2}-{:.2})\n\n",
        assessment.demographic_parity, thresholds.parity_lower, thresholds.parity_upper
    ));

    report.push_str("2. EQUAL OPPORTUNITY:\n");
    report.push_str(&format!("   - False positive rate {}: {:.3}\n", cmp.label, cmp.false_positive_rate));
    report.push_str(&format!("   - False positive rate {}: {:.3}\n", refr.label, refr.false_positive_rate));
    report.push_str(&format!("   - FPR difference: {:.3}\n", m.fpr_gap));
    report.push_str(&format!(
        "   - ASSESSMENT: {} (maximum gap {:.2})\n\n",
        assessment.equal_opportunity, thresholds.opportunity_bound
    ));

    report.push_str("3. PREDICTIVE PARITY:\n");
    report.push_str(&format!("   - True positive rate {}: {:.3}\n", cmp.label, cmp.true_positive_rate));
    report.push_str(&format!("   - True positive rate {}: {:.3}\n", refr.label, refr.true_positive_rate));
    report.push_str(&format!("   - TPR difference: {:.3}\n", m.tpr_gap));
    report.push_str(&format!("   - Equalized odds ASSESSMENT: {}\n\n", assessment.equalized_odds));

    match assessment.fairness_score {
        Some(score) => report.push_str(&format!("4. ALGORITHMIC FAIRNESS SCORE: {:.3}/1.0\n\n", score)),
        None => report.push_str("4. ALGORITHMIC FAIRNESS SCORE: n/a (disparate impact is undefined)\n\n"),
    }

    report.push_str("CRITICAL BIAS INDICATORS:\n");
    match m.disparate_impact.ratio() {
        Some(di) => report.push_str(&format!(
            "- {} defendants are classified high-risk at {:.2}x the rate of {} defendants ({} vs {})\n",
            cmp.label,
            di,
            refr.label,
            pct(cmp.selection_rate),
            pct(refr.selection_rate)
        )),
        None => report.push_str(&format!(
            "- Disparate impact is {}; no {} defendant was classified high-risk\n",
            m.disparate_impact, refr.label
        )),
    }
    report.push_str(&format!(
        "- {} of {} defendants who did not reoffend were classified high-risk, versus {} of {} defendants\n",
        pct(cmp.false_positive_rate),
        cmp.label,
        pct(refr.false_positive_rate),
        refr.label
    ));
    for cohort in [cmp, refr] {
        if let Some(note) = low_confidence_note(cohort) {
            report.push_str(&format!("- {}\n", note));
        }
    }
    report.push('\n');
}

fn low_confidence_note(cohort: &CohortMetrics) -> Option<String> {
    if !cohort.low_confidence {
        return None;
    }
    let missing = if cohort.confusion.negatives() == 0 {
        "non-reoffending"
    } else {
        "reoffending"
    };
    Some(format!(
        "LOW CONFIDENCE: the {} cohort has no {} defendants; the affected rate is reported as 0",
        cohort.label, missing
    ))
}

fn conclusion(results: &AuditResults) -> String {
    let violations = results.assessment.violations();
    if !results.evaluation.is_complete() {
        "The population does not contain both cohorts, so no fairness conclusion can be drawn. \
         Collect data covering both groups before relying on this audit."
            .to_string()
    } else if violations.is_empty() {
        "Within the configured bounds, the high-risk classification shows no violation of \
         demographic parity, equal opportunity or equalized odds. Continued monitoring is recommended."
            .to_string()
    } else {
        format!(
            "The analysis finds violations of {}. The risk score treats the {} and {} cohorts \
             unequally, and remediation is required before it informs decisions about individuals.",
            violations.join(", "),
            results.config.cohorts.comparison_label,
            results.config.cohorts.reference_label
        )
    }
}

/// Markdown rendering of the same results
pub fn markdown(results: &AuditResults) -> String {
    let mut md = String::new();

    md.push_str("# Risk Score Bias Audit Report\n\n");
    md.push_str(&format!(
        "**Generated:** {}\n\n",
        results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("**Version:** {}\n\n", results.version));

    md.push_str("## Dataset\n\n");
    md.push_str(&format!("- **Source:** {}\n", results.dataset.source));
    md.push_str(&format!("- **Rows read:** {}\n", results.dataset.rows_read));
    md.push_str(&format!("- **Rows dropped:** {}\n", results.dataset.rows_dropped));
    md.push_str(&format!("- **Records analyzed:** {}\n", results.dataset.records));
    md.push_str(&format!(
        "- **High-risk threshold:** score >= {}\n\n",
        results.evaluation.threshold()
    ));

    md.push_str("### Descriptive Statistics\n\n");
    md.push_str("| Group | Count | Recidivism Rate | Mean Score | Score Std |\n");
    md.push_str("|-------|-------|-----------------|------------|-----------|\n");
    for g in &results.statistics.groups {
        let std = g.score_std.map_or("-".to_string(), |s| format!("{:.3}", s));
        md.push_str(&format!(
            "| {} | {} | {:.3} | {:.3} | {} |\n",
            g.group, g.count, g.outcome_rate, g.mean_score, std
        ));
    }
    md.push('\n');

    md.push_str("## Fairness Metrics\n\n");
    let metrics = match &results.evaluation {
        Evaluation::Complete(m) => m,
        Evaluation::InsufficientData { population, .. } => {
            md.push_str(&format!(
                "**Insufficient data:** at least one cohort is empty ({} records). \
                 All assessments are inconclusive.\n",
                population
            ));
            return md;
        }
    };

    md.push_str(&format!(
        "| Metric | {} | {} |\n",
        metrics.comparison.label, metrics.reference.label
    ));
    md.push_str("|--------|-----|-----|\n");
    for ((name, comparison), (_, reference)) in metrics
        .comparison
        .rates()
        .into_iter()
        .zip(metrics.reference.rates())
    {
        md.push_str(&format!("| {} | {:.4} | {:.4} |\n", name, comparison, reference));
    }
    md.push_str(&format!(
        "| Cohort size | {} | {} |\n\n",
        metrics.comparison.size, metrics.reference.size
    ));

    md.push_str("### Assessment\n\n");
    md.push_str("| Criterion | Value | Verdict |\n");
    md.push_str("|-----------|-------|---------|\n");
    let a = &results.assessment;
    md.push_str(&format!(
        "| Demographic parity | DI = {:.4} | {} |\n",
        metrics.disparate_impact,
        verdict_badge(a.demographic_parity)
    ));
    md.push_str(&format!(
        "| Equal opportunity | FPR gap = {:.4} | {} |\n",
        metrics.fpr_gap,
        verdict_badge(a.equal_opportunity)
    ));
    md.push_str(&format!(
        "| Equalized odds | TPR gap = {:.4} | {} |\n",
        metrics.tpr_gap,
        verdict_badge(a.equalized_odds)
    ));
    md.push('\n');

    if let Some(score) = a.fairness_score {
        md.push_str(&format!("**Fairness score:** {:.3}/1.0\n\n", score));
    }

    md.push_str("### Overall Classification\n\n");
    md.push_str(&format!(
        "Accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4} over {} records.\n\n",
        metrics.overall.accuracy,
        metrics.overall.precision,
        metrics.overall.recall,
        metrics.overall.f1_score,
        metrics.overall.support
    ));

    for cohort in [&metrics.comparison, &metrics.reference] {
        if let Some(note) = low_confidence_note(cohort) {
            md.push_str(&format!("> {}\n\n", note));
        }
    }

    md
}

fn verdict_badge(verdict: Verdict) -> String {
    match verdict {
        Verdict::Violated => format!("**{}**", verdict),
        _ => verdict.to_string(),
    }
}
