//! Swarmscope - analytics over recorded robot-swarm simulation runs
//!
//! A CLI tool that loads stored simulation runs and turns them into
//! chart-data documents for a chart renderer, or a Markdown summary.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing records, bad config, write failure, etc.)
//!   2 - Every requested chart was empty and --fail-on-empty was set

mod analysis;
mod cli;
mod config;
mod jobs;
mod models;
mod report;
mod store;

use analysis::{GroupKey, ObservedPolicy, RunSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use jobs::{ChartJobs, JobOutcome};
use models::SimulationRecord;
use report::{BundleMetadata, ChartBundle, ChartData, ChartKind, Palette};
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use store::{JsonRecordStore, RecordStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is resolved first so `general.verbose` reaches the subscriber
    let config = match prepare_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.log_level(args.quiet));

    info!("Swarmscope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .swarmscope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Settings shared by every chart build.
#[derive(Debug, Clone)]
struct ChartSettings {
    group_key: GroupKey,
    interval: NonZeroU64,
    palette: Palette,
    robot: Option<String>,
    policy: ObservedPolicy,
}

/// Run the complete workflow. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let store = JsonRecordStore::open(&config.store.records)
        .with_context(|| format!("Cannot open record store {}", config.store.records))?
        .with_progress(!args.quiet);

    if let Some(ref id) = args.delete {
        return handle_delete(&store, id);
    }

    let records = store.load_all().context("Failed to load simulation records")?;

    if args.list {
        return handle_list(&records);
    }

    let group_key = config.chart.group_key;
    let selected_refs = analysis::select_records(&records, &args.include, &args.groups, group_key);
    info!("Selected {} of {} record(s)", selected_refs.len(), records.len());
    if selected_refs.is_empty() {
        warn!("No records match the selection; charts will be empty");
    }

    let settings = ChartSettings {
        group_key,
        interval: NonZeroU64::new(config.chart.interval_ms)
            .context("chart.interval_ms must be at least 1")?,
        palette: Palette::new(config.chart.palette.clone()),
        robot: args.robot.clone(),
        policy: args.observed_policy(),
    };

    let timeout = match config.general.timeout_seconds {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let selected: Vec<SimulationRecord> = selected_refs.iter().map(|r| (*r).clone()).collect();
    let charts = build_charts(&args.effective_charts(), Arc::new(selected), settings.clone(), timeout).await?;

    let bundle = ChartBundle {
        metadata: BundleMetadata {
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            records_loaded: records.len(),
            records_selected: selected_refs.len(),
            interval_ms: settings.interval.get(),
        },
        summary: RunSummary::from_records(selected_refs.iter().copied()),
        partition: analysis::partition_robots(selected_refs.iter().copied()),
        charts,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&bundle)?,
        OutputFormat::Markdown => report::generate_markdown_report(&bundle),
    };

    let output_path = &config.general.output;
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write charts to {}", output_path))?;

    if !args.quiet {
        println!("\n📊 Chart Summary:");
        println!("   Records: {} selected of {}", bundle.metadata.records_selected, records.len());
        for chart in &bundle.charts {
            let state = if chart.has_values() { "✅" } else { "∅ No data" };
            println!("   {} {}", state, chart.title);
        }
        println!("   Duration: {:.2}s", start_time.elapsed().as_secs_f64());
        println!("\n✅ Charts saved to: {}", output_path);
    }

    if args.fail_on_empty && bundle.is_empty() {
        eprintln!("\n⛔ Every requested chart is empty. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Build every requested chart concurrently as one batch.
async fn build_charts(
    kinds: &[ChartKind],
    records: Arc<Vec<SimulationRecord>>,
    settings: ChartSettings,
    timeout: Option<Duration>,
) -> Result<Vec<ChartData>> {
    let jobs = ChartJobs::new(timeout);
    let ticket = jobs.begin_batch();

    let pending = kinds.iter().map(|&kind| {
        let records = Arc::clone(&records);
        let settings = settings.clone();
        let jobs = jobs.clone();
        async move {
            let name = format!("{:?}", kind);
            let outcome = jobs
                .run(ticket, &name, move || build_chart(kind, &records, &settings))
                .await?;
            Ok::<_, anyhow::Error>((name, outcome))
        }
    });

    let mut charts = Vec::new();
    for result in futures::future::join_all(pending).await {
        let (name, outcome) = result?;
        match outcome {
            JobOutcome::Completed(mut built) => charts.append(&mut built),
            JobOutcome::TimedOut => warn!("Chart {} skipped: timed out", name),
            JobOutcome::Superseded => debug!("Chart {} superseded", name),
        }
    }
    Ok(charts)
}

/// Build the chart documents of one kind.
fn build_chart(kind: ChartKind, records: &[SimulationRecord], settings: &ChartSettings) -> Vec<ChartData> {
    match kind {
        ChartKind::Success => {
            let rate = analysis::mission_success_rate(records, settings.group_key);
            vec![report::success_chart(&rate, settings.group_key, &settings.palette)]
        }
        ChartKind::Detection => {
            let rate = analysis::malicious_detection_rate(records, settings.group_key);
            vec![report::detection_chart(&rate, settings.group_key, &settings.palette)]
        }
        ChartKind::FinishTime => {
            let result = analysis::finish_time_by_condition(records);
            vec![report::finish_time_chart(&result, &settings.palette)]
        }
        ChartKind::Trust => {
            let Some(ref robot) = settings.robot else {
                return Vec::new();
            };
            let run_set: Vec<&SimulationRecord> = records.iter().collect();
            let decomposition =
                analysis::decompose_with_policy(robot, &settings.policy, &run_set, settings.interval);
            if decomposition.runs.is_empty() {
                warn!("Robot {} logged no observations in the selected runs", robot);
            } else if !decomposition.has_values() {
                warn!("Robot {} never observed {}", robot, settings.policy.describe());
            }
            report::trust_charts(&decomposition, &settings.policy, &settings.palette)
        }
    }
}

/// Handle --list: print the stored runs.
fn handle_list(records: &[SimulationRecord]) -> Result<i32> {
    if records.is_empty() {
        println!("   No stored runs found.");
        return Ok(0);
    }

    println!("\n   Found {} stored run(s):\n", records.len());
    for record in records {
        println!(
            "     🤖 {} | {} | seed {} | group {} | trust {} | {} | t={}",
            record.id,
            record.display_label(),
            record.seed,
            GroupKey::AnalyticsGroup.key_of(record),
            if record.is_trust_applied { "on" } else { "off" },
            if record.was_mission_successful { "success" } else { "failed" },
            record.time,
        );
    }
    Ok(0)
}

/// Handle --delete: remove one stored run.
fn handle_delete(store: &dyn RecordStore, id: &str) -> Result<i32> {
    if store.delete(id)? {
        println!("🗑️  Deleted run {}", id);
        Ok(0)
    } else {
        eprintln!("⚠️  No stored run with id {}", id);
        Ok(1)
    }
}

/// Load, merge and validate the configuration.
///
/// Runs before logging is installed, so problems go to stderr.
fn prepare_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", config::CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ChartLabel;

    fn sample_records() -> Vec<SimulationRecord> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample_runs.json");
        JsonRecordStore::open(path).unwrap().load_all().unwrap()
    }

    fn settings(robot: Option<&str>, policy: ObservedPolicy) -> ChartSettings {
        ChartSettings {
            group_key: GroupKey::Seed,
            interval: NonZeroU64::new(1000).unwrap(),
            palette: Palette::default(),
            robot: robot.map(String::from),
            policy,
        }
    }

    #[test]
    fn test_grouped_charts_from_sample_runs() {
        let records = sample_records();
        let settings = settings(None, ObservedPolicy::Unfiltered);

        let success = build_chart(ChartKind::Success, &records, &settings);
        assert_eq!(success[0].labels, vec![ChartLabel::Text("11".into()), ChartLabel::Text("12".into())]);
        assert_eq!(success[0].datasets[0].data, vec![Some(1.0), Some(1.0)]);
        assert_eq!(success[0].datasets[1].data, vec![Some(1.0), Some(0.0)]);

        let finish = build_chart(ChartKind::FinishTime, &records, &settings);
        assert_eq!(finish[0].datasets[0].data, vec![Some(4200.0), Some(3700.0)]);
        assert_eq!(finish[0].datasets[1].data, vec![Some(6100.0), None]);

        let detection = build_chart(
            ChartKind::Detection,
            &records,
            &ChartSettings { group_key: GroupKey::AnalyticsGroup, ..settings },
        );
        assert_eq!(detection[0].datasets[0].data, vec![Some(50.0), Some(100.0)]);
    }

    #[test]
    fn test_trust_chart_from_sample_runs() {
        let records = sample_records();
        let charts = build_chart(
            ChartKind::Trust,
            &records,
            &settings(Some("1"), ObservedPolicy::MaliciousOnly),
        );

        // robot 1 logs in every run
        assert_eq!(charts.len(), 3);
        let first = &charts[0];
        assert_eq!(first.labels.len(), 6);
        assert_eq!(
            first.datasets[0].data,
            vec![Some(0.5), Some(0.35), None, Some(0.2), None, None]
        );
        let windows: Vec<(u64, u64)> = first.annotations.iter().map(|a| (a.x_min, a.x_max)).collect();
        assert_eq!(windows, vec![(0, 2000), (3000, 4000)]);
    }

    #[tokio::test]
    async fn test_build_charts_runs_every_kind() {
        let records = Arc::new(sample_records());
        let charts = build_charts(
            &[ChartKind::Success, ChartKind::Trust],
            records,
            settings(Some("3"), ObservedPolicy::Unfiltered),
            None,
        )
        .await
        .unwrap();

        assert_eq!(charts[0].kind, ChartKind::Success);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[1].kind, ChartKind::Trust);
    }
}
