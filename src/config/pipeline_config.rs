//! Pipeline Configuration - stage parameters and driver settings as TOML values
//!
//! Every tunable is a field in this module. Each section implements `Default`
//! with the constants from `defaults`, so a missing or empty config file
//! behaves exactly like the built-in pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::*;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `PipelineConfig::load()` which searches:
/// 1. `$SENSORFLOW_CONFIG` env var
/// 2. `./pipeline_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline identification
    #[serde(default)]
    pub pipeline: PipelineInfo,

    /// Value range accepted by the entry filter
    #[serde(default)]
    pub filter: FilterConfig,

    /// Normalization transform
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Aggregation window
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Z-score anomaly detection
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Moving-average trend analysis
    #[serde(default)]
    pub trend: TrendConfig,

    /// Synthetic data source
    #[serde(default)]
    pub source: SourceConfig,

    /// Result export
    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SENSORFLOW_CONFIG` environment variable
    /// 2. `./pipeline_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), pipeline = %config.pipeline.name, "Loaded pipeline config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./pipeline_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(pipeline = %config.pipeline.name, "Loaded pipeline config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Write the config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Pipeline config saved");
        Ok(())
    }

    /// Validate all settings, collecting every violation.
    ///
    /// Rules:
    /// - Window and history sizes must be > 0
    /// - Warm-up lengths must fit inside their windows
    /// - Thresholds, bands and scales must be finite
    /// - Probabilities must lie in [0, 1]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Filter bounds
        let f = &self.filter;
        for (name, bound) in [("filter.min_value", f.min_value), ("filter.max_value", f.max_value)] {
            if let Some(v) = bound {
                if !v.is_finite() {
                    errors.push(format!("{name} must be finite, got {v}"));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (f.min_value, f.max_value) {
            if lo > hi {
                errors.push(format!(
                    "filter.min_value ({lo:.3}) must be <= filter.max_value ({hi:.3})"
                ));
            }
        }

        // Normalization
        let n = &self.normalize;
        if n.enabled && (!n.scale.is_finite() || n.scale == 0.0) {
            errors.push(format!("normalize.scale must be finite and non-zero, got {}", n.scale));
        }

        // Aggregation
        if self.aggregation.window_size == 0 {
            errors.push("aggregation.window_size must be > 0".to_string());
        }

        // Anomaly
        let a = &self.anomaly;
        if !a.threshold.is_finite() || a.threshold <= 0.0 {
            errors.push(format!("anomaly.threshold must be finite and > 0, got {}", a.threshold));
        }
        if a.history_size == 0 {
            errors.push("anomaly.history_size must be > 0".to_string());
        }
        if a.min_history < 2 {
            errors.push(format!("anomaly.min_history must be >= 2, got {}", a.min_history));
        }
        if a.min_history > a.history_size {
            errors.push(format!(
                "anomaly.min_history ({}) must be <= anomaly.history_size ({})",
                a.min_history, a.history_size
            ));
        }

        // Trend
        let t = &self.trend;
        if t.window_size == 0 {
            errors.push("trend.window_size must be > 0".to_string());
        }
        if t.min_samples == 0 || t.min_samples > t.window_size {
            errors.push(format!(
                "trend.min_samples ({}) must be between 1 and trend.window_size ({})",
                t.min_samples, t.window_size
            ));
        }
        if !t.stable_band_percent.is_finite() || t.stable_band_percent < 0.0 {
            errors.push(format!(
                "trend.stable_band_percent must be finite and >= 0, got {}",
                t.stable_band_percent
            ));
        }

        // Source
        let s = &self.source;
        Self::check_probability(s.spike_probability, "source.spike_probability", &mut errors);
        Self::check_probability(s.invalid_probability, "source.invalid_probability", &mut errors);
        if !s.noise_std.is_finite() || s.noise_std < 0.0 {
            errors.push(format!("source.noise_std must be finite and >= 0, got {}", s.noise_std));
        }
        if s.seasonal_period == 0 {
            errors.push("source.seasonal_period must be > 0".to_string());
        }
        for (name, v) in [
            ("source.base_value", s.base_value),
            ("source.drift_per_step", s.drift_per_step),
            ("source.seasonal_amplitude", s.seasonal_amplitude),
            ("source.spike_magnitude", s.spike_magnitude),
        ] {
            if !v.is_finite() {
                errors.push(format!("{name} must be finite, got {v}"));
            }
        }

        // Output
        if self.output.save_results && self.output.results_path.trim().is_empty() {
            errors.push("output.results_path must not be empty when save_results is set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_probability(p: f64, name: &str, errors: &mut Vec<String>) {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            errors.push(format!("{name} must be within [0, 1], got {p}"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Pipeline Info
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineInfo {
    /// Name used in log lines
    pub name: String,
}

impl Default for PipelineInfo {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
        }
    }
}

// ============================================================================
// Stage Sections
// ============================================================================

/// Entry filter. Non-finite values are always rejected; bounds are optional
/// and inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Attach `normalized = value / scale` to every observation
    pub enabled: bool,
    pub scale: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: DEFAULT_NORMALIZE_SCALE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub window_size: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_AGGREGATION_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Z-score threshold (standard deviations)
    pub threshold: f64,
    /// Raw values kept as baseline
    pub history_size: usize,
    /// Baseline length required before scoring
    pub min_history: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ANOMALY_THRESHOLD,
            history_size: DEFAULT_ANOMALY_HISTORY,
            min_history: DEFAULT_ANOMALY_MIN_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub window_size: usize,
    /// Samples required before reporting
    pub min_samples: usize,
    /// |diff_percent| at or below this is `stable`
    pub stable_band_percent: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_TREND_WINDOW,
            min_samples: DEFAULT_TREND_MIN_SAMPLES,
            stable_band_percent: DEFAULT_TREND_STABLE_BAND_PERCENT,
        }
    }
}

// ============================================================================
// Source & Output
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Observations per run
    pub count: u64,
    /// Delay between observations (ms)
    pub interval_ms: u64,
    /// Fixed RNG seed; random when absent
    pub seed: Option<u64>,
    pub base_value: f64,
    pub noise_std: f64,
    pub drift_per_step: f64,
    pub seasonal_amplitude: f64,
    pub seasonal_period: u64,
    pub spike_probability: f64,
    /// Spike size in noise standard deviations
    pub spike_magnitude: f64,
    pub invalid_probability: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_SOURCE_COUNT,
            interval_ms: DEFAULT_SOURCE_INTERVAL_MS,
            seed: None,
            base_value: DEFAULT_SOURCE_BASE_VALUE,
            noise_std: DEFAULT_SOURCE_NOISE_STD,
            drift_per_step: DEFAULT_SOURCE_DRIFT_PER_STEP,
            seasonal_amplitude: DEFAULT_SOURCE_SEASONAL_AMPLITUDE,
            seasonal_period: DEFAULT_SOURCE_SEASONAL_PERIOD,
            spike_probability: DEFAULT_SOURCE_SPIKE_PROBABILITY,
            spike_magnitude: DEFAULT_SOURCE_SPIKE_MAGNITUDE,
            invalid_probability: DEFAULT_SOURCE_INVALID_PROBABILITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON file receiving collected events
    pub results_path: String,
    pub save_results: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: DEFAULT_RESULTS_PATH.to_string(),
            save_results: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: PipelineConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.aggregation.window_size, 10);
        assert_eq!(config.anomaly.threshold, 3.0);
        assert_eq!(config.anomaly.history_size, 50);
        assert_eq!(config.trend.window_size, 20);
        assert_eq!(config.trend.stable_band_percent, 5.0);
        assert!(config.normalize.enabled);
        assert!(config.filter.min_value.is_none());
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[pipeline]
name = "line-3"

[anomaly]
threshold = 2.5

[filter]
min_value = 0.0
"#;
        let config: PipelineConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        // Overridden values
        assert_eq!(config.pipeline.name, "line-3");
        assert_eq!(config.anomaly.threshold, 2.5);
        assert_eq!(config.filter.min_value, Some(0.0));
        // Non-overridden values retain defaults
        assert_eq!(config.anomaly.history_size, 50);
        assert_eq!(config.anomaly.min_history, 10);
        assert!(config.filter.max_value.is_none());
    }

    #[test]
    fn test_validation_catches_inverted_bounds() {
        let mut config = PipelineConfig::default();
        config.filter.min_value = Some(10.0);
        config.filter.max_value = Some(1.0);
        let result = config.validate();
        assert!(result.is_err(), "Inverted bounds should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("filter.min_value")));
        }
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = PipelineConfig::default();
        config.aggregation.window_size = 0;
        config.anomaly.threshold = f64::NAN;
        config.trend.min_samples = 50;
        config.source.spike_probability = 1.5;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 4, "{errors:?}"),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_min_history_must_fit_history() {
        let mut config = PipelineConfig::default();
        config.anomaly.history_size = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_normalize_skips_scale_check() {
        let mut config = PipelineConfig::default();
        config.normalize.scale = 0.0;
        assert!(config.validate().is_err());
        config.normalize.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut original = PipelineConfig::default();
        original.filter.max_value = Some(250.0);
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: PipelineConfig =
            toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(roundtripped.filter.max_value, Some(250.0));
        assert_eq!(roundtripped.trend.min_samples, original.trend.min_samples);
    }

    #[test]
    fn test_all_sections_serialize() {
        let toml_str = PipelineConfig::default().to_toml().expect("serialization should work");
        for section in ["[pipeline]", "[normalize]", "[aggregation]", "[anomaly]", "[trend]", "[source]", "[output]"] {
            assert!(toml_str.contains(section), "Missing {section} section");
        }
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[aggregation]\nwindow_size = 0\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_from_file(&path),
            Err(ConfigError::Validation(_))
        ));

        std::fs::write(&path, "[aggregation\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_from_file(&path),
            Err(ConfigError::Parse(..))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        let mut config = PipelineConfig::default();
        config.pipeline.name = "saved".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.pipeline.name, "saved");
    }
}
