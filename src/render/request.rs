use std::path::{Path, PathBuf};

use crate::data::model::{or_missing, Dataset, NodeRows, RunInfo, UNKNOWN};
use crate::data::summary::{Statistic, SummarySeries};

/// Bar width of each series in a side-by-side (before/after) chart.
pub const PAIRED_BAR_WIDTH: f64 = 0.4;
/// Bar width of a single-series chart.
pub const SINGLE_BAR_WIDTH: f64 = 0.8;

// ---------------------------------------------------------------------------
// RenderRequest – everything a sink needs to draw one chart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    /// Bars centred on each category; with several series each one is
    /// shifted so the group stays centred (half a bar each way for two).
    Bars { width: f64 },
    /// Values joined by a line with a marker per category.
    Lines,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Legend label; `None` keeps the series out of the legend.
    pub label: Option<String>,
    /// One value per category.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub title: String,
    pub subtitle: Option<String>,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
    pub output: PathBuf,
}

// ---------------------------------------------------------------------------
// Per-dataset requests
// ---------------------------------------------------------------------------

/// The per-node chart of one loaded file.
pub fn dataset_request(dataset: &Dataset, outdir: &Path) -> RenderRequest {
    let categories: Vec<String> = dataset
        .rows
        .node_ids()
        .into_iter()
        .map(str::to_string)
        .collect();

    let (kind, series) = match &dataset.rows {
        NodeRows::Static(rows) => (
            ChartKind::Bars {
                width: SINGLE_BAR_WIDTH,
            },
            vec![Series {
                label: None,
                values: rows.iter().map(|r| r.count as f64).collect(),
            }],
        ),
        NodeRows::Churn(rows) => (
            ChartKind::Bars {
                width: PAIRED_BAR_WIDTH,
            },
            vec![
                Series {
                    label: Some("before".into()),
                    values: rows.iter().map(|r| r.count_before as f64).collect(),
                },
                Series {
                    label: Some("after".into()),
                    values: rows.iter().map(|r| r.count_after as f64).collect(),
                },
            ],
        ),
    };

    let (title, subtitle, name) = match &dataset.info {
        RunInfo::Static(s) => {
            let algo = s.algo.as_deref().unwrap_or(UNKNOWN);
            let nodes = or_missing(&s.nodes);
            let zipf = or_missing(&s.zipf_s);
            (
                "Per-node load distribution".to_string(),
                format!(
                    "algo={algo}, nodes={nodes}, keys={}, zipf_s={zipf}",
                    or_missing(&s.keys)
                ),
                file_name(&["per_node", algo, &format!("nodes{nodes}"), &format!("zipf{zipf}")]),
            )
        }
        RunInfo::Churn(c) => {
            let algo = c.algo.as_deref().unwrap_or(UNKNOWN);
            let op = c.churn_op.as_deref().unwrap_or(UNKNOWN);
            let nb = or_missing(&c.nodes_before);
            let na = or_missing(&c.nodes_after);
            let zipf = or_missing(&c.zipf_s);
            (
                format!("Churn per-node load ({op})"),
                format!("algo={algo}, nodes {nb}\u{2192}{na}, zipf_s={zipf}"),
                file_name(&[
                    "churn_per_node",
                    algo,
                    op,
                    &format!("nb{nb}"),
                    &format!("na{na}"),
                    &format!("zipf{zipf}"),
                ]),
            )
        }
    };

    RenderRequest {
        title,
        subtitle: Some(subtitle),
        kind,
        x_label: "Node".into(),
        y_label: "Count".into(),
        categories,
        series,
        output: outdir.join(name),
    }
}

// ---------------------------------------------------------------------------
// Summary requests
// ---------------------------------------------------------------------------

pub fn summary_file_name(statistic: Statistic) -> &'static str {
    match statistic {
        Statistic::Cv => "summary_cv_vs_algo.png",
        Statistic::MaxOverAvg => "summary_maxoveravg_vs_algo.png",
        Statistic::MovedRatio => "summary_moved_ratio_vs_algo.png",
    }
}

pub fn summary_title(series: &SummarySeries) -> String {
    let mut title = match series.statistic {
        Statistic::MovedRatio => "Fraction of keys moved vs algorithm".to_string(),
        other => format!("{other} vs algorithm"),
    };
    if let Some(op) = &series.churn_op {
        title.push_str(&format!(" (churn_op={op})"));
    }
    title
}

/// The cross-run comparison chart of one statistic.
pub fn summary_request(series: &SummarySeries, outdir: &Path) -> RenderRequest {
    RenderRequest {
        title: summary_title(series),
        subtitle: None,
        kind: ChartKind::Lines,
        x_label: "Algorithm".into(),
        y_label: series.statistic.key().into(),
        categories: series.algos().into_iter().map(str::to_string).collect(),
        series: vec![Series {
            label: None,
            values: series.values(),
        }],
        output: outdir.join(summary_file_name(series.statistic)),
    }
}

/// Join name parts with `_`, keeping path separators out of the result.
fn file_name(parts: &[&str]) -> String {
    let stem = parts
        .iter()
        .map(|p| p.replace(['/', '\\'], "_"))
        .collect::<Vec<_>>()
        .join("_");
    format!("{stem}.png")
}
