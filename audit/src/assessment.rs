// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Pass/fail rules applied to a computed [`Evaluation`]

use crate::metrics::{DisparateImpact, Evaluation, MetricSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounds the fairness rules are judged against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairnessThresholds {
    /// Lowest acceptable disparate impact (the 80% rule)
    pub parity_lower: f64,
    /// Highest acceptable disparate impact
    pub parity_upper: f64,
    /// Largest acceptable error-rate gap between cohorts
    pub opportunity_bound: f64,
}

impl Default for FairnessThresholds {
    fn default() -> Self {
        Self {
            parity_lower: 0.8,
            parity_upper: 1.2,
            opportunity_bound: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Acceptable,
    Violated,
    /// Not enough data to judge
    Inconclusive,
}

impl Verdict {
    fn from_violation(violated: bool) -> Self {
        if violated {
            Verdict::Violated
        } else {
            Verdict::Acceptable
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::Acceptable => "ACCEPTABLE",
            Verdict::Violated => "VIOLATED",
            Verdict::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub thresholds: FairnessThresholds,
    pub demographic_parity: Verdict,
    /// Judged on the false positive rate gap
    pub equal_opportunity: Verdict,
    /// Judged on the larger of the two error-rate gaps
    pub equalized_odds: Verdict,
    /// `1 - fpr_gap - |disparate_impact - 1|`; absent when the ratio is not finite
    pub fairness_score: Option<f64>,
}

impl Assessment {
    pub fn from_evaluation(evaluation: &Evaluation, thresholds: &FairnessThresholds) -> Self {
        match evaluation.metric_set() {
            Some(metrics) => Self::from_metrics(metrics, thresholds),
            None => Self {
                thresholds: *thresholds,
                demographic_parity: Verdict::Inconclusive,
                equal_opportunity: Verdict::Inconclusive,
                equalized_odds: Verdict::Inconclusive,
                fairness_score: None,
            },
        }
    }

    pub fn from_metrics(metrics: &MetricSet, thresholds: &FairnessThresholds) -> Self {
        Self {
            thresholds: *thresholds,
            demographic_parity: demographic_parity(&metrics.disparate_impact, thresholds),
            equal_opportunity: Verdict::from_violation(metrics.fpr_gap > thresholds.opportunity_bound),
            equalized_odds: Verdict::from_violation(
                metrics.fpr_gap.max(metrics.tpr_gap) > thresholds.opportunity_bound,
            ),
            fairness_score: metrics
                .disparate_impact
                .ratio()
                .map(|di| 1.0 - metrics.fpr_gap - (di - 1.0).abs()),
        }
    }

    /// Names of the rules that were violated
    pub fn violations(&self) -> Vec<&'static str> {
        [
            ("demographic parity", self.demographic_parity),
            ("equal opportunity", self.equal_opportunity),
            ("equalized odds", self.equalized_odds),
        ]
        .into_iter()
        .filter(|(_, verdict)| *verdict == Verdict::Violated)
        .map(|(name, _)| name)
        .collect()
    }
}

/// The 80% rule on the disparate-impact ratio
pub fn demographic_parity(di: &DisparateImpact, thresholds: &FairnessThresholds) -> Verdict {
    match di {
        DisparateImpact::Ratio(value) => {
            Verdict::from_violation(*value < thresholds.parity_lower || *value > thresholds.parity_upper)
        }
        DisparateImpact::Unbounded => Verdict::Violated,
        DisparateImpact::Indeterminate => Verdict::Inconclusive,
    }
}
