// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fairness audit of recidivism risk scores
//!
//! This crate provides:
//! - Population loading from COMPAS-style CSV files, or a seeded synthetic population
//! - Descriptive statistics per demographic group
//! - Group-fairness metrics (disparate impact, error-rate gaps) over a binary high-risk decision
//! - Pass/fail assessment against configurable fairness bounds
//! - Plain-text and markdown reports, JSON results and an SVG dashboard

pub mod assessment;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod stats;

pub use assessment::{Assessment, FairnessThresholds, Verdict};
pub use dataset::{Cohort, CohortSplit, ColumnMapping, Population, Record};
pub use error::DatasetError;
pub use metrics::{
    evaluate, evaluate_split, CohortMetrics, ConfusionMatrix, DisparateImpact, Evaluation, MetricSet,
};
pub use pipeline::{AuditConfig, AuditPipeline, AuditResults, DatasetSource};
pub use stats::DescriptiveStats;
