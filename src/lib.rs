//! SensorFlow: Streaming Observation Pipeline
//!
//! Ordered, event-emitting chains of stages over a stream of numeric
//! observations.
//!
//! ## Architecture
//!
//! - **Stages**: filter, transform, windowed aggregation, z-score anomaly
//!   detection and moving-average trend analysis behind one `Stage` trait
//! - **Pipeline**: threads each observation through its stages, short-circuits
//!   on rejection and bubbles stage findings to its own emitter
//! - **Driver**: config loading, synthetic/stdin sources, a cancellable
//!   processing loop and JSON result export
//!
//! ```ignore
//! use sensorflow::{Observation, Pipeline, EventKind};
//! use sensorflow::stages::{FilterProcessor, AnomalyDetector};
//!
//! let mut pipeline = Pipeline::new("sensors")
//!     .with_stage(FilterProcessor::valid_values())
//!     .with_stage(AnomalyDetector::new(3.0, 50));
//! pipeline.on(EventKind::Anomaly, |e| println!("{e:?}"));
//! pipeline.start();
//! pipeline.push(Observation::new(42.0)).await?;
//! ```

pub mod config;
pub mod pipeline;
pub mod simulation;
pub mod stages;
pub mod stats;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, PipelineConfig};

// Re-export the pipeline surface
pub use pipeline::{build_pipeline, EventEmitter, Pipeline, PipelineError, ProcessingLoop};

// Re-export stage contract
pub use stages::{Stage, StageError, StageFault, StageKind, StageStats};

// Re-export commonly used types
pub use types::{
    AggregateSnapshot, AnomalyReport, Event, EventKind, Observation, PipelineItem, StageFailure,
    TrendDirection, TrendReport,
};

// Re-export statistics helpers
pub use stats::{RollingWindow, WindowStatistics};

// Re-export storage
pub use storage::{ResultStore, StorageError};
