//! SensorFlow - streaming observation pipeline
//!
//! Runs the standard pipeline (filter, normalize, anomaly, trend, aggregation)
//! over synthetic data or JSON observations from stdin, logs findings and
//! exports them as JSON on shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic signal with defaults
//! cargo run --release
//!
//! # Reproducible run, no pacing
//! ./sensorflow --seed 42 --count 2000 --interval-ms 0
//!
//! # Observations from the simulation binary
//! ./simulation --count 1000 | ./sensorflow --stdin
//! ```
//!
//! # Environment Variables
//!
//! - `SENSORFLOW_CONFIG`: Path to a pipeline TOML file
//! - `SENSORFLOW_LOG_JSON`: Set to "true" for JSON log lines
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sensorflow::config::{self, PipelineConfig};
use sensorflow::pipeline::{build_pipeline, IterSource, ProcessingLoop, StdinSource};
use sensorflow::simulation::SignalGenerator;
use sensorflow::storage::ResultStore;
use sensorflow::types::{Event, EventKind, TrendDirection};
use sensorflow::Pipeline;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensorflow")]
#[command(about = "Streaming observation pipeline with anomaly and trend detection")]
#[command(version)]
struct CliArgs {
    /// Pipeline config file (overrides SENSORFLOW_CONFIG and ./pipeline_config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read JSON observations from stdin instead of the synthetic generator
    /// Use with: ./simulation | ./sensorflow --stdin
    #[arg(long)]
    stdin: bool,

    /// Number of synthetic observations to generate
    #[arg(long)]
    count: Option<u64>,

    /// Delay between synthetic observations in ms (0 = no delay)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Random seed for the synthetic generator
    #[arg(long)]
    seed: Option<u64>,

    /// Results file (overrides output.results_path)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Do not write results on shutdown
    #[arg(long)]
    no_save: bool,

    /// Emit logs as JSON lines (for log shippers)
    #[arg(long, env = "SENSORFLOW_LOG_JSON")]
    log_json: bool,
}

impl CliArgs {
    /// Apply command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(count) = self.count {
            config.source.count = count;
        }
        if let Some(interval) = self.interval_ms {
            config.source.interval_ms = interval;
        }
        if self.seed.is_some() {
            config.source.seed = self.seed;
        }
        if let Some(ref path) = self.output {
            config.output.results_path = path.display().to_string();
        }
        if self.no_save {
            config.output.save_results = false;
        }
    }
}

// ============================================================================
// Event Wiring
// ============================================================================

/// Subscribe the result store and the console to pipeline findings.
fn wire_events(pipeline: &Pipeline, store: &Arc<Mutex<ResultStore>>) {
    for kind in [
        EventKind::Anomaly,
        EventKind::Trend,
        EventKind::Aggregation,
        EventKind::Error,
    ] {
        let store = Arc::clone(store);
        pipeline.on(kind, move |event| {
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = store.record(event) {
                warn!(kind = %event.kind(), error = %e, "Failed to record result");
            }
        });
    }

    pipeline.on(EventKind::Anomaly, |event| {
        if let Event::Anomaly(report) = event {
            warn!(
                value = report.observation.value,
                z_score = report.z_score,
                mean = report.stats.mean,
                "🚨 Anomaly detected"
            );
        }
    });

    pipeline.on(EventKind::Trend, |event| {
        if let Event::Trend(report) = event {
            if report.direction != TrendDirection::Stable {
                info!(
                    direction = %report.direction,
                    sma = report.sma,
                    diff_percent = report.diff_percent,
                    "📈 Trend"
                );
            }
        }
    });

    pipeline.on(EventKind::Aggregation, |event| {
        if let Event::Aggregation(agg) = event {
            debug!(
                count = agg.count,
                mean = agg.mean,
                std_dev = agg.std_dev,
                "Aggregate"
            );
        }
    });

    pipeline.on(EventKind::Error, |event| {
        if let Event::Error(failure) = event {
            warn!(stage = %failure.stage, error = %failure.error, "Stage error");
        }
    });
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    // Load pipeline configuration
    let mut pipeline_config = match args.config {
        Some(ref path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::load(),
    };
    args.apply(&mut pipeline_config);
    pipeline_config
        .validate()
        .context("Invalid pipeline configuration")?;
    config::init(pipeline_config);
    let cfg = config::get();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  SensorFlow - Streaming Observation Pipeline");
    info!("  Pipeline: {}", cfg.pipeline.name);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let pipeline = build_pipeline(cfg);
    let store = Arc::new(Mutex::new(ResultStore::new(&cfg.output.results_path)));
    wire_events(&pipeline, &store);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut runner = ProcessingLoop::new(pipeline, cancel_token);
    let summary = if args.stdin {
        info!("📥 Input: stdin (JSON observations)");
        let mut source = StdinSource::new();
        let summary = runner.run(&mut source).await;
        if source.skipped() > 0 {
            warn!(skipped = source.skipped(), "Malformed stdin lines skipped");
        }
        summary
    } else {
        info!(
            count = cfg.source.count,
            interval_ms = cfg.source.interval_ms,
            seed = ?cfg.source.seed,
            "📥 Input: synthetic signal"
        );
        let generator = SignalGenerator::from_config(&cfg.source)
            .context("Invalid synthetic source parameters")?;
        let count = usize::try_from(cfg.source.count).unwrap_or(usize::MAX);
        let mut source = IterSource::new(
            "synthetic",
            generator.take(count),
            cfg.source.interval_ms,
        );
        runner.run(&mut source).await
    };

    let mut pipeline = runner.into_pipeline();
    pipeline.stop();

    // Final statistics
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   {}", summary);
    for stage in &summary.stage_stats {
        info!("   {}", stage);
    }

    if cfg.output.save_results {
        let store = store.lock().unwrap_or_else(PoisonError::into_inner);
        let path = store.save().context("Failed to save results")?;
        info!("💾 {} results written to {}", store.len(), path.display());
    }

    info!("✓ SensorFlow shutdown complete");
    Ok(())
}
