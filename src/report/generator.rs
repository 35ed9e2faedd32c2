//! Chart bundle output.
//!
//! This module renders a bundle of chart documents either as JSON for
//! the chart renderer or as a Markdown summary for humans.

use crate::analysis::RunSummary;
use crate::models::RobotPartition;
use crate::report::chart::{ChartData, ChartLabel};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about a generated bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// When the bundle was generated.
    pub generated_at: DateTime<Utc>,
    /// Version of the tool that generated it.
    pub tool_version: String,
    /// Records available in the store.
    pub records_loaded: usize,
    /// Records taking part in the charts.
    pub records_selected: usize,
    /// Bucket width of time-series charts.
    pub interval_ms: u64,
}

/// Everything produced by one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartBundle {
    pub metadata: BundleMetadata,
    pub summary: RunSummary,
    pub partition: RobotPartition,
    pub charts: Vec<ChartData>,
}

impl ChartBundle {
    /// True when no chart holds any value.
    pub fn is_empty(&self) -> bool {
        !self.charts.iter().any(ChartData::has_values)
    }
}

/// Generate a JSON bundle.
pub fn generate_json_report(bundle: &ChartBundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).map_err(Into::into)
}

/// Generate a Markdown bundle.
pub fn generate_markdown_report(bundle: &ChartBundle) -> String {
    let mut output = String::new();

    output.push_str("# Swarmscope Report\n\n");
    output.push_str(&generate_metadata_section(&bundle.metadata));
    output.push_str(&generate_summary_section(&bundle.summary, &bundle.partition));

    for chart in &bundle.charts {
        output.push_str(&generate_chart_section(chart));
    }

    output.push_str("---\n\n*Report generated by Swarmscope*\n");
    output
}

fn generate_metadata_section(metadata: &BundleMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Version:** {}\n", metadata.tool_version));
    section.push_str(&format!(
        "- **Records:** {} selected of {} loaded\n",
        metadata.records_selected, metadata.records_loaded
    ));
    section.push_str(&format!("- **Interval:** {} ms\n\n", metadata.interval_ms));

    section
}

fn generate_summary_section(summary: &RunSummary, partition: &RobotPartition) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Runs | Successful | Trust Applied | Malicious | Detected | Detection Rate |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        summary.total,
        summary.successful,
        summary.trust_applied,
        summary.malicious_robots,
        summary.detected_malicious_robots,
        format_percent(summary.detection_percentage()),
    ));

    if !partition.malicious.is_empty() || !partition.nonmalicious.is_empty() {
        section.push_str(&format!(
            "- **Malicious robots:** {}\n",
            join_or_none(&partition.malicious)
        ));
        section.push_str(&format!(
            "- **Non-malicious robots:** {}\n\n",
            join_or_none(&partition.nonmalicious)
        ));
    }

    section
}

fn generate_chart_section(chart: &ChartData) -> String {
    let mut section = format!("## {}\n\n", chart.title);

    if !chart.has_values() {
        section.push_str("No data\n\n");
        return section;
    }

    let header: Vec<&str> = chart.datasets.iter().map(|d| d.label.as_str()).collect();
    section.push_str(&format!("| Label | {} |\n", header.join(" | ")));
    section.push_str(&format!("|:---|{}\n", ":---:|".repeat(header.len())));

    for (i, label) in chart.labels.iter().enumerate() {
        let cells: Vec<String> = chart
            .datasets
            .iter()
            .map(|d| format_value(d.data.get(i).copied().flatten()))
            .collect();
        section.push_str(&format!("| {} | {} |\n", format_label(label), cells.join(" | ")));
    }
    section.push('\n');

    if !chart.annotations.is_empty() {
        let windows: Vec<String> = chart
            .annotations
            .iter()
            .map(|a| format!("{}-{} ms", a.x_min, a.x_max))
            .collect();
        section.push_str(&format!("Observation windows: {}\n\n", windows.join(", ")));
    }

    section
}

fn format_label(label: &ChartLabel) -> String {
    match label {
        ChartLabel::Millis(ms) => format!("{} ms", ms),
        ChartLabel::Text(text) => text.clone(),
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}%", v))
}

fn join_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{GroupKey, SuccessRate};
    use crate::report::chart::{success_chart, ChartKind, Palette};

    fn create_test_bundle() -> ChartBundle {
        let rate = SuccessRate {
            labels: vec!["g1".into(), "g2".into()],
            successful: vec![3, 1],
            failed: vec![0, 2],
        };
        ChartBundle {
            metadata: BundleMetadata {
                generated_at: Utc::now(),
                tool_version: "1.0.0".to_string(),
                records_loaded: 10,
                records_selected: 6,
                interval_ms: 1000,
            },
            summary: RunSummary {
                total: 6,
                successful: 4,
                trust_applied: 3,
                malicious_robots: 4,
                detected_malicious_robots: 3,
            },
            partition: RobotPartition {
                malicious: vec!["r2".into()],
                nonmalicious: vec!["r1".into(), "r3".into()],
            },
            charts: vec![success_chart(&rate, GroupKey::AnalyticsGroup, &Palette::default())],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_bundle());

        assert!(markdown.contains("# Swarmscope Report"));
        assert!(markdown.contains("6 selected of 10 loaded"));
        assert!(markdown.contains("75.00%"));
        assert!(markdown.contains("r1, r3"));
        assert!(markdown.contains("## Mission Success by Analytics Group"));
        assert!(markdown.contains("| g2 | 1 | 2 |"));
    }

    #[test]
    fn test_chart_without_values_says_no_data() {
        let mut chart = create_test_bundle().charts.remove(0);
        for dataset in &mut chart.datasets {
            dataset.data = vec![None, None];
        }
        let section = generate_chart_section(&chart);
        assert!(section.contains("No data"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(None), "-");
        assert_eq!(format_value(Some(2.0)), "2");
        assert_eq!(format_value(Some(0.456)), "0.46");
    }

    #[test]
    fn test_generate_json_report() {
        let bundle = create_test_bundle();
        let json = generate_json_report(&bundle).unwrap();

        assert!(json.contains("\"charts\""));
        assert!(json.contains("\"datasets\""));
        assert!(json.contains("\"malicious\""));
        assert_eq!(bundle.charts[0].kind, ChartKind::Success);
        assert!(!bundle.is_empty());
    }
}
