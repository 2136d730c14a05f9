//! Synthetic Observation Stream
//!
//! Writes generated observations as JSON lines to stdout for piping into the
//! main binary:
//!
//! ```bash
//! ./simulation --count 1000 --seed 42 | ./sensorflow --stdin
//! ```
//!
//! Invalid (NaN) values have no JSON representation, so injection defaults to
//! off here; `--invalid-probability` writes them as `null` values that the
//! reader rejects as malformed.

use clap::Parser;
use std::io::{self, Write};
use std::time::Duration;

use sensorflow::config::{self, SourceConfig};
use sensorflow::simulation::SignalGenerator;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensorflow-simulation")]
#[command(about = "Synthetic observation stream (JSON lines on stdout)")]
#[command(version)]
struct Args {
    /// Observations to generate (0 = until interrupted)
    #[arg(short, long, default_value_t = config::defaults::DEFAULT_SOURCE_COUNT)]
    count: u64,

    /// Delay between observations in ms (0 = as fast as possible)
    #[arg(short, long, default_value_t = 0)]
    interval_ms: u64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Centre of the signal
    #[arg(long, default_value_t = config::defaults::DEFAULT_SOURCE_BASE_VALUE)]
    base: f64,

    /// Gaussian noise standard deviation
    #[arg(long, default_value_t = config::defaults::DEFAULT_SOURCE_NOISE_STD)]
    noise: f64,

    /// Probability of an injected spike per observation
    #[arg(long, default_value_t = config::defaults::DEFAULT_SOURCE_SPIKE_PROBABILITY,
          value_parser = parse_probability)]
    spike_probability: f64,

    /// Probability of an invalid value per observation
    #[arg(long, default_value_t = 0.0, value_parser = parse_probability)]
    invalid_probability: f64,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{p} is not within [0, 1]"))
    }
}

impl Args {
    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            count: self.count,
            interval_ms: self.interval_ms,
            seed: self.seed,
            base_value: self.base,
            noise_std: self.noise,
            spike_probability: self.spike_probability,
            invalid_probability: self.invalid_probability,
            ..SourceConfig::default()
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let source = args.source_config();

    let generator = SignalGenerator::from_config(&source)?;
    let limit = if args.count == 0 {
        usize::MAX
    } else {
        usize::try_from(args.count).unwrap_or(usize::MAX)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut written = 0u64;
    let mut spikes = 0u64;

    for obs in generator.take(limit) {
        if obs.metadata.get("injected").and_then(|v| v.as_str()) == Some("spike") {
            spikes += 1;
        }
        let json = serde_json::to_string(&obs)?;
        match writeln!(out, "{}", json) {
            Ok(()) => {}
            // Reader went away (e.g. `| head`)
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
            Err(e) => return Err(e.into()),
        }
        written += 1;

        if args.interval_ms > 0 {
            out.flush()?;
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }
    out.flush().ok();

    if !args.quiet {
        eprintln!("[simulation] {} observations written ({} spikes)", written, spikes);
    }
    Ok(())
}
