//! CLI entry point for the cyclability rater.
//!
//! Provides subcommands for scoring segments, computing the city index,
//! sweeping weight sensitivity, and planning upgrades under a length budget.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cyclability_rater::config::{
    FeatureSet, Versioned, WeightTree, load_features, load_weights,
};
use cyclability_rater::network::{
    BudgetOptions, NetworkGraph, estimate_improvement, optimize_graph, sample_sources,
};
use cyclability_rater::output::{
    CityReport, OptimizationReport, append_records, print_json, selection_rows, sensitivity_rows,
    write_json,
};
use cyclability_rater::{
    MetricError, Segment, aggregate_city, score_segments, sweep_all_groups, sweep_sensitivity,
};
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "cyclability_rater")]
#[command(about = "Score street networks for bicycle-friendliness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// JSON array of normalized segments
    #[arg(value_name = "SEGMENTS")]
    segments: String,

    /// Feature scoring document (YAML or JSON)
    #[arg(long, env = "CYCLABILITY_FEATURES", default_value = "config/features.yaml")]
    features: String,

    /// Weight hierarchy document (YAML or JSON)
    #[arg(long, env = "CYCLABILITY_WEIGHTS", default_value = "config/weights.yaml")]
    weights: String,

    /// Metric to evaluate
    #[arg(short, long, default_value = "cyclability")]
    metric: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every segment and emit per-feature detail
    Score {
        #[command(flatten)]
        inputs: Inputs,

        /// JSON file to write scored segments to (logged when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compute the length-weighted city index with uncertainty attribution
    City {
        #[command(flatten)]
        inputs: Inputs,

        /// JSON file to write the report to (logged when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Sweep one weight group (or all of them) and estimate local slopes
    Sensitivity {
        #[command(flatten)]
        inputs: Inputs,

        /// Group to perturb, or "all"
        #[arg(short, long, default_value = "all")]
        group: String,

        /// Step between sweep points
        #[arg(short, long, default_value_t = 0.05)]
        epsilon: f64,

        /// Sweep covers [-delta, +delta]
        #[arg(short, long, default_value_t = 0.2)]
        delta: f64,

        /// CSV file to append sweep points to
        #[arg(short, long, default_value = "sensitivity.csv")]
        output: String,
    },
    /// Select segments to upgrade under a length budget
    Optimize {
        #[command(flatten)]
        inputs: Inputs,

        /// Total length that can be upgraded, in kilometres
        #[arg(short, long)]
        budget_km: f64,

        /// Betweenness source sample size
        #[arg(long, default_value_t = 100)]
        samples: usize,

        /// Use every node as a source instead of sampling
        #[arg(long, default_value_t = false)]
        exact: bool,

        /// Seed for source sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Highway classes never proposed for upgrade
        #[arg(long, value_delimiter = ',', default_value = "footway,crossing,service")]
        excluded: Vec<String>,

        /// Shortest segment considered, in kilometres
        #[arg(long, default_value_t = 0.04)]
        min_length_km: f64,

        /// CSV file to append the selection to
        #[arg(short, long, default_value = "upgrades.csv")]
        output: String,

        /// Optional JSON file for the full report
        #[arg(long)]
        report: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<MetricError>() {
            Some(metric_error) => {
                error!(kind = ?metric_error.kind(), error = %metric_error, "Request failed")
            }
            None => error!(error = %e, "Request failed"),
        }
        return Err(e);
    }
    Ok(())
}

/// Colored stderr plus a JSON rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/cyclability_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("cyclability_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Score { inputs, output } => {
            let (segments, features, weights) = load_inputs(&inputs)?;
            let scored =
                score_segments(&segments, &weights.value, &features.value, &inputs.metric)?;

            match output {
                Some(path) => write_json(&path, &scored)?,
                None => print_json(&scored)?,
            }
        }
        Commands::City { inputs, output } => {
            let (segments, features, weights) = load_inputs(&inputs)?;
            let scored =
                score_segments(&segments, &weights.value, &features.value, &inputs.metric)?;
            let index = aggregate_city(&scored, weights.value.metric(&inputs.metric)?)?;

            if index.total_uncertainty > 0.0 {
                warn!(
                    total_uncertainty = index.total_uncertainty,
                    "City index rests partly on fallback values"
                );
            }

            let report =
                CityReport::new(&inputs.metric, &features.version, &weights.version, index);
            match output {
                Some(path) => write_json(&path, &report)?,
                None => print_json(&report)?,
            }
        }
        Commands::Sensitivity {
            inputs,
            group,
            epsilon,
            delta,
            output,
        } => {
            let (segments, features, weights) = load_inputs(&inputs)?;
            let results = if group == "all" {
                sweep_all_groups(
                    &segments,
                    epsilon,
                    delta,
                    &weights.value,
                    &features.value,
                    &inputs.metric,
                )?
            } else {
                vec![sweep_sensitivity(
                    &segments,
                    &group,
                    epsilon,
                    delta,
                    &weights.value,
                    &features.value,
                    &inputs.metric,
                )?]
            };

            for result in &results {
                info!(
                    group = %result.target_group,
                    base_weight = result.base_weight,
                    baseline_score = result.baseline_score,
                    local_slope = result.local_slope,
                    "Sensitivity"
                );
                append_records(&output, &sensitivity_rows(result))?;
            }
            info!(output = %output, groups = results.len(), "Sweep results written");
        }
        Commands::Optimize {
            inputs,
            budget_km,
            samples,
            exact,
            seed,
            excluded,
            min_length_km,
            output,
            report,
        } => {
            let (segments, features, weights) = load_inputs(&inputs)?;
            let scored =
                score_segments(&segments, &weights.value, &features.value, &inputs.metric)?;

            let options = BudgetOptions::new(budget_km)
                .with_excluded_classes(excluded)
                .with_min_length_km(min_length_km)
                .with_samples(if exact { None } else { Some(samples) })
                .with_seed(seed);

            let graph = NetworkGraph::from_segments(&scored);
            let sources = sample_sources(&graph, options.betweenness_samples, options.seed);
            let selection = optimize_graph(&graph, &sources, &options)?;
            let improvement = estimate_improvement(&graph, &selection, &sources)?;

            append_records(&output, &selection_rows(&selection))?;
            info!(output = %output, selected = selection.selected.len(), "Selection written");

            if let Some(path) = report {
                let report = OptimizationReport {
                    generated_at: chrono::Utc::now(),
                    selection,
                    improvement,
                };
                write_json(&path, &report)?;
            }
        }
    }

    Ok(())
}

type Loaded = (Vec<Segment>, Versioned<FeatureSet>, Versioned<WeightTree>);

fn load_inputs(inputs: &Inputs) -> Result<Loaded> {
    let segments = load_segments(&inputs.segments)?;
    let features = load_features(&inputs.features)?;
    let weights = load_weights(&inputs.weights)?;

    info!(
        segments = segments.len(),
        features_version = %features.version,
        weights_version = %weights.version,
        "Inputs loaded"
    );
    Ok((segments, features, weights))
}

/// Reads a JSON array of segments.
#[tracing::instrument]
fn load_segments(path: &str) -> Result<Vec<Segment>> {
    let file = File::open(path).with_context(|| format!("failed to open segments '{path}'"))?;
    let segments = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse segments '{path}'"))?;
    Ok(segments)
}
