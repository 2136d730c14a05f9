//! Processing Stages
//!
//! Every stage implements [`Stage`]. The provided [`Stage::process`] carries
//! the shared contract so individual stages only implement [`Stage::handle`]:
//!
//! ```text
//! None input      -> None, nothing counted
//! Some(item)      -> processed += 1, then handle(item)
//! handle Ok(out)  -> out (None means "drop the item")
//! handle Err(f)   -> errors += 1, `error` event carrying f.item, None
//! ```
//!
//! A single bad observation therefore never aborts the pipeline. Only faults
//! returned as `Err` are absorbed; a panic inside a stage is not.
//!
//! ## Variants
//!
//! - `FilterProcessor`: predicate gate (drops)
//! - `TransformProcessor`: observation mapping, sync or async
//! - `AggregationProcessor`: windowed statistics, turns the item into an aggregate
//! - `AnomalyDetector`: z-score tap
//! - `TrendAnalyzer`: moving-average direction tap

mod aggregation;
mod anomaly;
mod filter;
mod transform;
mod trend;

pub use aggregation::AggregationProcessor;
pub use anomaly::AnomalyDetector;
pub use filter::FilterProcessor;
pub use transform::{TransformFn, TransformProcessor};
pub use trend::TrendAnalyzer;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::pipeline::EventEmitter;
use crate::types::{Event, Observation, PipelineItem, StageFailure};

// ============================================================================
// Error Types
// ============================================================================

/// Faults raised inside a stage. Always absorbed by [`Stage::process`].
#[derive(Debug, Error)]
pub enum StageError {
    #[error("predicate failed: {0}")]
    Predicate(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("transform changed observation id from {expected} to {actual}")]
    IdentityChanged { expected: String, actual: String },

    #[error("transform rewrote value or timestamp of observation {0}")]
    CoreFieldMutated(String),

    #[error("stage expects an observation, received {found}")]
    IncompatibleItem { found: &'static str },

    #[error("non-finite value {value} in observation {id}")]
    InvalidValue { id: String, value: f64 },
}

/// A stage fault together with the item that caused it.
///
/// `handle` hands the item back on failure so the `error` event can carry it
/// without copying every item up front.
#[derive(Debug)]
pub struct StageFault {
    pub error: StageError,
    pub item: PipelineItem,
}

impl StageFault {
    pub fn new(error: StageError, item: impl Into<PipelineItem>) -> Self {
        Self {
            error,
            item: item.into(),
        }
    }

    /// Unwrap an observation or report the item as incompatible.
    pub(crate) fn expect_observation(item: PipelineItem) -> Result<Observation, Self> {
        match item {
            PipelineItem::Observation(obs) => Ok(obs),
            other => Err(Self::new(
                StageError::IncompatibleItem {
                    found: other.kind_name(),
                },
                other,
            )),
        }
    }

    /// Reject NaN/infinite values before they reach a window.
    pub(crate) fn require_finite(obs: Observation) -> Result<Observation, Self> {
        if obs.is_valid() {
            Ok(obs)
        } else {
            let error = StageError::InvalidValue {
                id: obs.id.clone(),
                value: obs.value,
            };
            Err(Self::new(error, obs))
        }
    }
}

// ============================================================================
// Stage Statistics
// ============================================================================

/// Stage variant, reported in statistics snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Filter,
    Transform,
    Aggregation,
    AnomalyDetect,
    TrendAnalyze,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Filter => write!(f, "Filter"),
            StageKind::Transform => write!(f, "Transform"),
            StageKind::Aggregation => write!(f, "Aggregation"),
            StageKind::AnomalyDetect => write!(f, "AnomalyDetect"),
            StageKind::TrendAnalyze => write!(f, "TrendAnalyze"),
        }
    }
}

/// Read-only snapshot of a stage's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStats {
    pub name: String,
    pub kind: StageKind,
    /// Items the stage attempted (counted before work starts)
    pub processed: u64,
    /// Faults absorbed
    pub errors: u64,
    /// Items rejected by a filter predicate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered: Option<u64>,
    /// Anomalies flagged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<u64>,
    /// `anomalies / processed * 100`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_rate: Option<f64>,
}

impl std::fmt::Display for StageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {} processed, {} errors",
            self.name, self.kind, self.processed, self.errors
        )?;
        if let Some(filtered) = self.filtered {
            write!(f, ", {} filtered", filtered)?;
        }
        if let (Some(anomalies), Some(rate)) = (self.anomalies, self.anomaly_rate) {
            write!(f, ", {} anomalies ({:.2}%)", anomalies, rate)?;
        }
        Ok(())
    }
}

// ============================================================================
// Stage Core
// ============================================================================

/// State every stage carries: identity, base counters and its own emitter.
pub struct StageCore {
    name: String,
    kind: StageKind,
    processed: u64,
    errors: u64,
    events: EventEmitter,
}

impl StageCore {
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            kind,
            processed: 0,
            errors: 0,
            events: EventEmitter::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Publish on this stage's emitter.
    pub fn emit(&self, event: &Event) {
        self.events.emit(event);
    }

    /// Base snapshot; variants fill in their extras.
    pub fn snapshot(&self) -> StageStats {
        StageStats {
            name: self.name.clone(),
            kind: self.kind,
            processed: self.processed,
            errors: self.errors,
            filtered: None,
            anomalies: None,
            anomaly_rate: None,
        }
    }

    fn record_attempt(&mut self) {
        self.processed += 1;
    }

    fn record_failure(&mut self, fault: StageFault) {
        self.errors += 1;
        warn!(stage = %self.name, error = %fault.error, "[Stage] Item dropped after fault");
        self.events.emit(&Event::Error(StageFailure {
            stage: self.name.clone(),
            error: fault.error.to_string(),
            observation: fault.item,
        }));
    }
}

// ============================================================================
// Stage Trait
// ============================================================================

/// One link in the processing chain.
#[async_trait]
pub trait Stage: Send {
    fn core(&self) -> &StageCore;

    fn core_mut(&mut self) -> &mut StageCore;

    /// Stage-specific work. `Ok(None)` drops the item; `Err` is absorbed by `process`.
    async fn handle(&mut self, item: PipelineItem) -> Result<Option<PipelineItem>, StageFault>;

    fn name(&self) -> &str {
        self.core().name()
    }

    /// Emitter other components subscribe to.
    fn events(&self) -> &EventEmitter {
        self.core().events()
    }

    /// Counters snapshot. Variants with extra counters override this.
    fn stats(&self) -> StageStats {
        self.core().snapshot()
    }

    /// Run the item through the stage under the shared counting/error policy.
    async fn process(&mut self, item: Option<PipelineItem>) -> Option<PipelineItem> {
        let item = item?;
        self.core_mut().record_attempt();

        match self.handle(item).await {
            Ok(out) => out,
            Err(fault) => {
                self.core_mut().record_failure(fault);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Stage that fails on negative values and passes everything else.
    struct Picky {
        core: StageCore,
    }

    #[async_trait]
    impl Stage for Picky {
        fn core(&self) -> &StageCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut StageCore {
            &mut self.core
        }

        async fn handle(
            &mut self,
            item: PipelineItem,
        ) -> Result<Option<PipelineItem>, StageFault> {
            let obs = StageFault::expect_observation(item)?;
            if obs.value < 0.0 {
                return Err(StageFault::new(
                    StageError::Predicate("negative".to_string()),
                    obs,
                ));
            }
            Ok(Some(obs.into()))
        }
    }

    fn picky() -> Picky {
        Picky {
            core: StageCore::new("picky", StageKind::Filter),
        }
    }

    #[tokio::test]
    async fn test_none_input_is_not_counted() {
        let mut stage = picky();
        assert!(stage.process(None).await.is_none());
        assert_eq!(stage.stats().processed, 0);
    }

    #[tokio::test]
    async fn test_attempt_counted_before_work() {
        let mut stage = picky();
        stage.process(Some(Observation::new(1.0).into())).await;
        stage.process(Some(Observation::new(-1.0).into())).await;
        let stats = stage.stats();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.errors, 1);
    }

    #[tokio::test]
    async fn test_failure_publishes_error_event() {
        let mut stage = picky();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stage.events().on(crate::types::EventKind::Error, move |event| {
            if let Event::Error(failure) = event {
                sink.lock().unwrap().push(failure.clone());
            }
        });

        let obs = Observation::new(-3.0);
        let id = obs.id.clone();
        assert!(stage.process(Some(obs.into())).await.is_none());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stage, "picky");
        assert!(seen[0].error.contains("negative"));
        assert_eq!(seen[0].observation.as_observation().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_aggregate_input_is_incompatible() {
        let mut stage = picky();
        let agg = crate::types::AggregateSnapshot {
            count: 1,
            sum: 1.0,
            mean: 1.0,
            min: 1.0,
            max: 1.0,
            std_dev: 0.0,
            timestamp: chrono::Utc::now(),
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stage.events().on(crate::types::EventKind::Error, move |event| {
            if let Event::Error(failure) = event {
                sink.lock().unwrap().push(failure.observation.clone());
            }
        });

        assert!(stage.process(Some(agg.clone().into())).await.is_none());
        assert_eq!(stage.stats().errors, 1);
        assert_eq!(*seen.lock().unwrap(), vec![PipelineItem::Aggregate(agg)]);
    }

    #[test]
    fn test_stats_display() {
        let mut stats = StageCore::new("detector", StageKind::AnomalyDetect).snapshot();
        stats.processed = 200;
        stats.anomalies = Some(3);
        stats.anomaly_rate = Some(1.5);
        assert_eq!(
            stats.to_string(),
            "detector (AnomalyDetect): 200 processed, 0 errors, 3 anomalies (1.50%)"
        );
    }
}
