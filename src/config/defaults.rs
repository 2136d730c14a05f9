//! System-wide default constants.
//!
//! Every stage parameter and driver setting has a named default here.
//! `PipelineConfig` falls back to these when a key is absent from the TOML.

// ============================================================================
// Aggregation
// ============================================================================

/// Observations held by the aggregation window.
pub const DEFAULT_AGGREGATION_WINDOW: usize = 10;

// ============================================================================
// Anomaly Detection
// ============================================================================

/// Z-score (in standard deviations) above which a value is anomalous.
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 3.0;

/// Raw values kept as the anomaly baseline.
pub const DEFAULT_ANOMALY_HISTORY: usize = 50;

/// History length required before values are scored.
pub const DEFAULT_ANOMALY_MIN_HISTORY: usize = 10;

// ============================================================================
// Trend Analysis
// ============================================================================

/// Values held by the trend window.
pub const DEFAULT_TREND_WINDOW: usize = 20;

/// Samples required before a trend is reported.
pub const DEFAULT_TREND_MIN_SAMPLES: usize = 5;

/// Deviation from the moving average (percent) still classified as stable.
pub const DEFAULT_TREND_STABLE_BAND_PERCENT: f64 = 5.0;

// ============================================================================
// Normalization
// ============================================================================

/// Divisor for the `normalized` derived field.
pub const DEFAULT_NORMALIZE_SCALE: f64 = 100.0;

// ============================================================================
// Synthetic Source
// ============================================================================

/// Observations generated per run.
pub const DEFAULT_SOURCE_COUNT: u64 = 500;

/// Delay between generated observations (ms). 0 = as fast as possible.
pub const DEFAULT_SOURCE_INTERVAL_MS: u64 = 10;

/// Centre of the generated signal.
pub const DEFAULT_SOURCE_BASE_VALUE: f64 = 50.0;

/// Gaussian noise standard deviation.
pub const DEFAULT_SOURCE_NOISE_STD: f64 = 2.0;

/// Linear drift added per observation.
pub const DEFAULT_SOURCE_DRIFT_PER_STEP: f64 = 0.01;

/// Amplitude of the periodic component.
pub const DEFAULT_SOURCE_SEASONAL_AMPLITUDE: f64 = 5.0;

/// Period of the periodic component (observations).
pub const DEFAULT_SOURCE_SEASONAL_PERIOD: u64 = 100;

/// Probability that an observation carries an injected spike.
pub const DEFAULT_SOURCE_SPIKE_PROBABILITY: f64 = 0.02;

/// Spike size in multiples of the noise standard deviation.
pub const DEFAULT_SOURCE_SPIKE_MAGNITUDE: f64 = 8.0;

/// Probability that an observation carries an invalid (NaN) value.
pub const DEFAULT_SOURCE_INVALID_PROBABILITY: f64 = 0.01;

// ============================================================================
// Output
// ============================================================================

/// Where collected pipeline events are written.
pub const DEFAULT_RESULTS_PATH: &str = "./data/results.json";

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "SENSORFLOW_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pipeline_config.toml";
