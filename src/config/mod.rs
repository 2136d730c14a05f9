//! Pipeline Configuration Module
//!
//! Stage parameters and driver settings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `SENSORFLOW_CONFIG` environment variable (path to TOML file)
//! 2. `pipeline_config.toml` in the current working directory
//! 3. Built-in defaults (see `defaults`)
//!
//! ## Usage
//!
//! Binaries call `config::init()` once at startup, then `config::get()`
//! anywhere. Library code takes a `&PipelineConfig` explicitly so it stays
//! testable without global state:
//!
//! ```ignore
//! config::init(PipelineConfig::load());
//! let pipeline = sensorflow::pipeline::build_pipeline(config::get());
//! ```

mod pipeline_config;
pub mod defaults;

pub use pipeline_config::*;

use std::sync::OnceLock;

/// Global pipeline configuration, initialized once at startup.
static PIPELINE_CONFIG: OnceLock<PipelineConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored with a warning.
pub fn init(config: PipelineConfig) {
    if PIPELINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration, or the built-in defaults if `init()` has
/// not run.
pub fn get() -> &'static PipelineConfig {
    if !is_initialized() {
        tracing::debug!("config::get() before init(), using built-in defaults");
    }
    PIPELINE_CONFIG.get_or_init(PipelineConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    PIPELINE_CONFIG.get().is_some()
}
