//! Event payloads published through the emitter registry

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AggregateSnapshot, Observation, PipelineItem};
use crate::stats::WindowStatistics;

// ============================================================================
// Event Kinds
// ============================================================================

/// Names under which listeners subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An item passed through a stage
    Data,
    /// A filter rejected an item
    Filtered,
    /// Aggregation window snapshot
    Aggregation,
    /// Z-score anomaly detected
    Anomaly,
    /// Trend classification
    Trend,
    /// A stage fault was absorbed
    Error,
    /// Pipeline finished one push
    Processed,
    /// Pipeline started
    Start,
    /// Pipeline stopped
    Stop,
}

impl EventKind {
    /// Kinds a pipeline re-publishes from each of its stages.
    pub const BUBBLED: [Self; 4] = [Self::Error, Self::Anomaly, Self::Trend, Self::Aggregation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Filtered => "filtered",
            Self::Aggregation => "aggregation",
            Self::Anomaly => "anomaly",
            Self::Trend => "trend",
            Self::Error => "error",
            Self::Processed => "processed",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Published by the anomaly detector when a value's z-score exceeds the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub observation: Observation,
    /// Statistics of the history the value was scored against
    pub stats: WindowStatistics,
    pub z_score: f64,
    pub threshold: f64,
}

/// Direction of the latest value relative to the moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Upward,
    Downward,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upward => write!(f, "upward"),
            Self::Downward => write!(f, "downward"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Published by the trend analyzer once its window holds enough samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    /// Simple moving average over the window
    pub sma: f64,
    pub latest: f64,
    /// `latest - sma`
    pub diff: f64,
    /// `diff / sma * 100`, or 0 when the average is exactly zero
    pub diff_percent: f64,
    pub direction: TrendDirection,
    pub timestamp: DateTime<Utc>,
}

/// A fault absorbed by a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: String,
    pub error: String,
    /// The item the stage was processing when it failed
    pub observation: PipelineItem,
}

// ============================================================================
// Event
// ============================================================================

/// Tagged payload delivered to listeners. Serializes as `{"type", "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    Data(PipelineItem),
    Filtered(Observation),
    Aggregation(AggregateSnapshot),
    Anomaly(AnomalyReport),
    Trend(TrendReport),
    Error(StageFailure),
    Processed(Option<PipelineItem>),
    Start,
    Stop,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::Filtered(_) => EventKind::Filtered,
            Self::Aggregation(_) => EventKind::Aggregation,
            Self::Anomaly(_) => EventKind::Anomaly,
            Self::Trend(_) => EventKind::Trend,
            Self::Error(_) => EventKind::Error,
            Self::Processed(_) => EventKind::Processed,
            Self::Start => EventKind::Start,
            Self::Stop => EventKind::Stop,
        }
    }
}
