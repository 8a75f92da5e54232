// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Six-panel SVG dashboard of an audit run

use crate::dataset::Cohort;
use crate::metrics::{CohortMetrics, Evaluation};
use crate::pipeline::AuditResults;
use crate::stats::DescriptiveStats;
use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::TextStyle;
use std::path::Path;

type Panel<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const DASHBOARD_SIZE: (u32, u32) = (1800, 1100);
const REFERENCE_COLOR: RGBColor = RGBColor(31, 119, 180);
const COMPARISON_COLOR: RGBColor = RGBColor(214, 39, 40);
const IMPACT_COLOR: RGBColor = RGBColor(128, 0, 128);
const GROUP_COLORS: [RGBColor; 6] = [
    RGBColor(214, 39, 40),
    RGBColor(255, 127, 14),
    RGBColor(31, 119, 180),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

struct Bar {
    label: String,
    value: f64,
    color: RGBColor,
}

/// Render the dashboard to `path` as SVG
pub fn render_dashboard(results: &AuditResults, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, DASHBOARD_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Risk Score Bias Analysis", ("sans-serif", 32.0).into_font())?;
    let panels = root.split_evenly((2, 3));

    outcome_rate_panel(&panels[0], &results.statistics)?;
    score_distribution_panel(&panels[1], &results.statistics)?;

    let cohorts = cohort_series(&results.evaluation);
    let bars = |rate: fn(&CohortMetrics) -> f64| -> Vec<Bar> {
        cohorts
            .iter()
            .map(|(metrics, color)| Bar {
                label: metrics.label.clone(),
                value: rate(*metrics),
                color: *color,
            })
            .collect()
    };
    bar_panel(
        &panels[2],
        "False Positive Rate by Cohort",
        "False positive rate",
        &bars(|m| m.false_positive_rate),
    )?;
    bar_panel(
        &panels[3],
        "High-Risk Classification Rate",
        "Selection rate",
        &bars(|m| m.selection_rate),
    )?;

    disparate_impact_panel(&panels[4], results)?;
    heatmap_panel(&panels[5], &results.evaluation)?;

    root.present()?;
    Ok(())
}

fn cohort_series(evaluation: &Evaluation) -> Vec<(&CohortMetrics, RGBColor)> {
    [(Cohort::Comparison, COMPARISON_COLOR), (Cohort::Reference, REFERENCE_COLOR)]
        .into_iter()
        .filter_map(|(cohort, color)| evaluation.cohort(cohort).map(|m| (m, color)))
        .collect()
}

fn centered(size: f64, vertical: VPos) -> TextStyle<'static> {
    TextStyle::from(("sans-serif", size).into_font()).pos(Pos::new(HPos::Center, vertical))
}

/// Bars sit at `[i, i + 1)`; only the slot centres get a label
fn category_label(names: &[&str], x: f64) -> String {
    let slot = x - 0.5;
    let idx = slot.round();
    if idx < 0.0 || (slot - idx).abs() > 1e-6 {
        return String::new();
    }
    names.get(idx as usize).map_or_else(String::new, |name| name.to_string())
}

fn no_data(area: &Panel<'_>, title: &str) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    area.draw(&Text::new(
        format!("{}: insufficient data", title),
        ((width / 2) as i32, (height / 2) as i32),
        centered(18.0, VPos::Center),
    ))?;
    Ok(())
}

fn bar_panel(area: &Panel<'_>, title: &str, y_desc: &str, bars: &[Bar]) -> Result<()> {
    if bars.is_empty() {
        return no_data(area, title);
    }
    let y_max = bars.iter().map(|b| b.value).fold(0.0, f64::max).max(0.1) * 1.2;
    let names: Vec<&str> = bars.iter().map(|b| b.label.as_str()).collect();
    let label = |x: &f64| category_label(&names, *x);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22.0).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..bars.len() as f64, 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len() * 2 + 1)
        .x_label_formatter(&label)
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
        let x = i as f64;
        Rectangle::new([(x + 0.15, 0.0), (x + 0.85, bar.value)], bar.color.mix(0.75).filled())
    }))?;
    chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
        Text::new(
            format!("{:.3}", bar.value),
            (i as f64 + 0.5, bar.value + y_max * 0.02),
            centered(14.0, VPos::Bottom),
        )
    }))?;
    Ok(())
}

fn outcome_rate_panel(area: &Panel<'_>, stats: &DescriptiveStats) -> Result<()> {
    let bars: Vec<Bar> = stats
        .groups_by_outcome_rate()
        .into_iter()
        .enumerate()
        .map(|(i, group)| Bar {
            label: group.group.clone(),
            value: group.outcome_rate,
            color: GROUP_COLORS[i % GROUP_COLORS.len()],
        })
        .collect();
    bar_panel(area, "Recidivism Rate by Group", "Two-year recidivism rate", &bars)
}

fn score_distribution_panel(area: &Panel<'_>, stats: &DescriptiveStats) -> Result<()> {
    let title = "Risk Score Distribution";
    let buckets = || stats.histograms.iter().flat_map(|h| h.buckets.iter());
    let (Some(lo), Some(hi)) = (buckets().map(|b| b.score).min(), buckets().map(|b| b.score).max()) else {
        return no_data(area, title);
    };
    let peak = buckets().map(|b| b.count).max().unwrap_or(1).max(1);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22.0).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d((lo as f64 - 0.5)..(hi as f64 + 1.5), 0.0..(peak as f64 * 1.15))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Risk score")
        .y_desc("Frequency")
        .draw()?;

    for histogram in &stats.histograms {
        let (color, slot) = match histogram.cohort {
            Cohort::Comparison => (COMPARISON_COLOR, 0.0),
            Cohort::Reference => (REFERENCE_COLOR, 1.0),
        };
        chart
            .draw_series(histogram.buckets.iter().map(move |b| {
                let x = b.score as f64 + 0.1 + 0.4 * slot;
                Rectangle::new([(x, 0.0), (x + 0.4, b.count as f64)], color.mix(0.7).filled())
            }))?
            .label(histogram.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.mix(0.7).filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn disparate_impact_panel(area: &Panel<'_>, results: &AuditResults) -> Result<()> {
    let thresholds = &results.assessment.thresholds;
    let impact = results.evaluation.metric_set().map(|m| m.disparate_impact);
    let value = impact.and_then(|di| di.ratio());
    let y_max = value.unwrap_or(0.0).max(thresholds.parity_upper) * 1.3;
    let names = ["Disparate impact"];
    let label = |x: &f64| category_label(&names, *x);

    let mut chart = ChartBuilder::on(area)
        .caption("Disparate Impact Ratio", ("sans-serif", 22.0).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(3)
        .x_label_formatter(&label)
        .y_desc("Selection rate ratio")
        .draw()?;

    match value {
        Some(v) => {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(0.3, 0.0), (0.7, v)],
                IMPACT_COLOR.mix(0.7).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                format!("{:.3}", v),
                (0.5, v + y_max * 0.02),
                centered(14.0, VPos::Bottom),
            )))?;
        }
        None => {
            let text = match impact {
                Some(di) => di.to_string(),
                None => "insufficient data".to_string(),
            };
            chart.draw_series(std::iter::once(Text::new(
                text,
                (0.5, y_max * 0.5),
                centered(14.0, VPos::Center),
            )))?;
        }
    }

    for (bound, name) in [
        (thresholds.parity_lower, "Lower bound"),
        (thresholds.parity_upper, "Upper bound"),
    ] {
        chart
            .draw_series(LineSeries::new(vec![(0.0, bound), (1.0, bound)], RED.stroke_width(2)))?
            .label(format!("{} ({:.2})", name, bound))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

/// Blue for low rates through red for high ones
fn heat_color(rate: f64) -> RGBColor {
    let t = rate.clamp(0.0, 1.0);
    let lerp = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    RGBColor(lerp(171, 244), lerp(217, 109), lerp(233, 67))
}

fn heatmap_panel(area: &Panel<'_>, evaluation: &Evaluation) -> Result<()> {
    let title = "Fairness Metrics Heatmap";
    let columns = cohort_series(evaluation);
    let Some((first, _)) = columns.first() else {
        return no_data(area, title);
    };
    let rows = first.rates().len();
    let width = columns.len() as f64 + 1.0;
    let top = rows as f64;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22.0).into_font())
        .margin(15)
        .build_cartesian_2d(0.0..width, 0.0..top + 1.0)?;

    // (x, y, fill, text) with the header row on top
    let mut cells: Vec<(f64, f64, RGBColor, String)> = Vec::new();
    for (c, (metrics, _)) in columns.iter().enumerate() {
        cells.push((c as f64 + 1.0, top, WHITE, metrics.label.clone()));
        for (r, (name, rate)) in metrics.rates().into_iter().enumerate() {
            let y = top - 1.0 - r as f64;
            if c == 0 {
                cells.push((0.0, y, WHITE, name.to_string()));
            }
            cells.push((c as f64 + 1.0, y, heat_color(rate), format!("{:.3}", rate)));
        }
    }

    chart.draw_series(
        cells
            .iter()
            .map(|(x, y, fill, _)| Rectangle::new([(*x, *y), (*x + 1.0, *y + 1.0)], fill.filled())),
    )?;
    chart.draw_series(
        cells
            .iter()
            .map(|(x, y, _, _)| Rectangle::new([(*x, *y), (*x + 1.0, *y + 1.0)], BLACK.stroke_width(1))),
    )?;
    chart.draw_series(
        cells
            .iter()
            .map(|(x, y, _, text)| Text::new(text.clone(), (*x + 0.5, *y + 0.5), centered(14.0, VPos::Center))),
    )?;
    Ok(())
}
