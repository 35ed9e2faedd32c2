//! Chart-data documents.
//!
//! Shapes engine output into the `{labels, datasets}` form consumed by
//! the chart renderer. Index `i` of every dataset belongs to label `i`,
//! so documents are emitted with `parsing: false`.

use crate::analysis::{
    DetectionRate, FinishTimeByCondition, GroupKey, ObservedPolicy, SuccessRate,
    TrustDecomposition,
};
use crate::models::{ObservationWindow, TrustField};
use serde::{Deserialize, Serialize};

/// An x-axis label: a group key or a bucket timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartLabel {
    Text(String),
    Millis(u64),
}

impl std::fmt::Display for ChartLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartLabel::Text(s) => write!(f, "{}", s),
            ChartLabel::Millis(ms) => write!(f, "{}", ms),
        }
    }
}

/// Per-dataset rendering hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStyle {
    pub border_color: String,
    pub background_color: String,
    /// Draw lines across `null` gaps.
    pub span_gaps: bool,
}

/// One series of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<Option<f64>>,
    pub style: DatasetStyle,
}

/// Highlighted x-range drawn behind a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxAnnotation {
    pub x_min: u64,
    pub x_max: u64,
    pub background_color: String,
}

/// The kind of chart a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    /// Mission success vs failure per group
    Success,
    /// Malicious robot detection percentage per group
    Detection,
    /// Mean finish time per seed, trust on vs off
    FinishTime,
    /// Trust decomposition of a focal robot
    Trust,
}

/// A chart document ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<ChartLabel>,
    pub datasets: Vec<Dataset>,
    /// Always `false`: data arrays are positionally aligned with labels.
    pub parsing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<BoxAnnotation>,
}

impl ChartData {
    fn new(kind: ChartKind, title: String, labels: Vec<ChartLabel>) -> Self {
        Self {
            kind,
            title,
            labels,
            datasets: Vec::new(),
            parsing: false,
            annotations: Vec::new(),
        }
    }

    /// True when some dataset holds a value. Charts without values render as "No data".
    pub fn has_values(&self) -> bool {
        self.datasets
            .iter()
            .any(|d| d.data.iter().any(Option::is_some))
    }
}

/// Colors assigned to datasets in order.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(
            ["#36a2eb", "#ff6384", "#4bc0c0", "#ff9f40", "#9966ff", "#ffcd56", "#c9cbcf"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}

impl Palette {
    /// Build a palette, falling back to the default colors when `colors` is empty.
    pub fn new(colors: Vec<String>) -> Self {
        if colors.is_empty() {
            return Self::default();
        }
        Self { colors }
    }

    /// Color of dataset `index`, cycling through the palette.
    pub fn color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    fn style(&self, index: usize, span_gaps: bool) -> DatasetStyle {
        let color = self.color(index).to_string();
        DatasetStyle {
            border_color: color.clone(),
            background_color: color,
            span_gaps,
        }
    }

    fn dataset(&self, index: usize, label: impl Into<String>, data: Vec<Option<f64>>, span_gaps: bool) -> Dataset {
        Dataset {
            label: label.into(),
            data,
            style: self.style(index, span_gaps),
        }
    }
}

fn text_labels(labels: &[String]) -> Vec<ChartLabel> {
    labels.iter().cloned().map(ChartLabel::Text).collect()
}

fn counts(values: &[u32]) -> Vec<Option<f64>> {
    values.iter().map(|&v| Some(f64::from(v))).collect()
}

/// "Successful" and "Failed" bars per group.
pub fn success_chart(rate: &SuccessRate, key: GroupKey, palette: &Palette) -> ChartData {
    let mut chart = ChartData::new(
        ChartKind::Success,
        format!("Mission Success by {}", key),
        text_labels(&rate.labels),
    );
    chart.datasets.push(palette.dataset(0, "Successful", counts(&rate.successful), false));
    chart.datasets.push(palette.dataset(1, "Failed", counts(&rate.failed), false));
    chart
}

/// Detection percentage per group.
pub fn detection_chart(rate: &DetectionRate, key: GroupKey, palette: &Palette) -> ChartData {
    let mut chart = ChartData::new(
        ChartKind::Detection,
        format!("Malicious Robot Detection by {}", key),
        text_labels(&rate.labels),
    );
    chart
        .datasets
        .push(palette.dataset(0, "Detection Rate (%)", rate.percentage.clone(), false));
    chart
}

/// Mean finish time per seed, trust on vs off.
pub fn finish_time_chart(result: &FinishTimeByCondition, palette: &Palette) -> ChartData {
    let mut chart = ChartData::new(
        ChartKind::FinishTime,
        "Mean Finish Time by Seed".to_string(),
        text_labels(&result.labels),
    );
    chart.datasets.push(palette.dataset(0, "Trust On", result.trust_on.clone(), false));
    chart.datasets.push(palette.dataset(1, "Trust Off", result.trust_off.clone(), false));
    chart
}

/// One chart per run: direct, indirect and context trust with observation windows.
pub fn trust_charts(
    decomposition: &TrustDecomposition,
    policy: &ObservedPolicy,
    palette: &Palette,
) -> Vec<ChartData> {
    let labels: Vec<ChartLabel> = decomposition
        .labels
        .iter()
        .map(|&ms| ChartLabel::Millis(ms))
        .collect();

    decomposition
        .runs
        .iter()
        .map(|trace| {
            let mut chart = ChartData::new(
                ChartKind::Trust,
                format!(
                    "Trust of {} toward {} ({})",
                    decomposition.focal,
                    policy.describe(),
                    trace.label
                ),
                labels.clone(),
            );
            for (i, field) in TrustField::ALL.iter().enumerate() {
                chart.datasets.push(palette.dataset(
                    i,
                    field.to_string(),
                    trace.series(*field).to_vec(),
                    true,
                ));
            }
            chart.annotations = trace.boxes.iter().map(|w| box_annotation(w, palette)).collect();
            chart
        })
        .collect()
}

fn box_annotation(window: &ObservationWindow, palette: &Palette) -> BoxAnnotation {
    BoxAnnotation {
        x_min: window.start_ms,
        x_max: window.end_ms,
        background_color: format!("{}33", palette.color(TrustField::ALL.len())),
    }
}
