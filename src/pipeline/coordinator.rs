//! Pipeline - ordered stage chain with its own event registry
//!
//! ```text
//! push(obs) ─▶ stage 1 ─▶ stage 2 ─▶ ... ─▶ stage N ─▶ `processed` event
//!                 │           │
//!                 └── None ───┴──▶ short-circuit: later stages never see the item
//! ```
//!
//! Stage `error`, `anomaly`, `trend` and `aggregation` events bubble up to the
//! pipeline's own emitter, so observers subscribe once at pipeline level.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::EventEmitter;
use crate::stages::{Stage, StageStats};
use crate::types::{Event, EventKind, Observation, PipelineItem};

// ============================================================================
// Error Types
// ============================================================================

/// Errors the pipeline returns to its caller. Stage faults never appear here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline '{0}' is not running")]
    NotRunning(String),
}

impl PipelineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::NotRunning(_) => "NOT_RUNNING",
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered chain of stages.
///
/// `push` takes `&mut self`: one pipeline serves one logical stream and the
/// compiler rejects concurrent pushes. Use one pipeline per stream.
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
    running: bool,
    events: Arc<EventEmitter>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            running: false,
            events: Arc::new(EventEmitter::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a stage and re-publish its side findings on the pipeline emitter.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        for kind in EventKind::BUBBLED {
            let pipeline_events = Arc::clone(&self.events);
            stage
                .events()
                .on(kind, move |event| {
                    pipeline_events.emit(event);
                });
        }
        debug!(pipeline = %self.name, stage = %stage.name(), "[Pipeline] Stage added");
        self.stages.push(Box::new(stage));
        self
    }

    /// Builder-style `add_stage`.
    #[must_use]
    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.add_stage(stage);
        self
    }

    /// Subscribe to a pipeline-level event.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on(kind, listener);
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        info!(pipeline = %self.name, stages = self.stages.len(), "[Pipeline] Started");
        self.events.emit(&Event::Start);
    }

    /// Refuse further pushes. An in-flight push is never interrupted.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        info!(pipeline = %self.name, "[Pipeline] Stopped");
        self.events.emit(&Event::Stop);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Thread one observation through every stage in order.
    ///
    /// Returns the final item, or `None` if a stage dropped it. Stage faults
    /// are absorbed by the stage; the only error is pushing while stopped.
    pub async fn push(
        &mut self,
        observation: Observation,
    ) -> Result<Option<PipelineItem>, PipelineError> {
        if !self.running {
            return Err(PipelineError::NotRunning(self.name.clone()));
        }

        let mut current = Some(PipelineItem::Observation(observation));
        for stage in &mut self.stages {
            current = stage.process(current).await;
            if current.is_none() {
                break;
            }
        }

        self.events.emit(&Event::Processed(current.clone()));
        Ok(current)
    }

    /// Per-stage statistics in pipeline order.
    pub fn stats(&self) -> Vec<StageStats> {
        self.stages.iter().map(|s| s.stats()).collect()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{AnomalyDetector, FilterProcessor, TransformProcessor, TrendAnalyzer};
    use std::sync::Mutex;

    fn record(pipeline: &Pipeline, kind: EventKind) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pipeline.on(kind, move |e| sink.lock().unwrap().push(e.clone()));
        seen
    }

    #[tokio::test]
    async fn test_push_requires_running() {
        let mut pipeline = Pipeline::new("gate").with_stage(FilterProcessor::valid_values());

        let err = pipeline.push(Observation::new(1.0)).await.unwrap_err();
        assert_eq!(err, PipelineError::NotRunning("gate".to_string()));
        assert_eq!(err.code(), "NOT_RUNNING");

        pipeline.start();
        assert!(pipeline.push(Observation::new(1.0)).await.unwrap().is_some());

        pipeline.stop();
        assert!(pipeline.push(Observation::new(1.0)).await.is_err());
        assert_eq!(pipeline.stats()[0].processed, 1);
    }

    #[tokio::test]
    async fn test_rejected_item_short_circuits() {
        let mut pipeline = Pipeline::new("sc")
            .with_stage(FilterProcessor::new("positive", |o| o.value > 0.0))
            .with_stage(TransformProcessor::normalize(10.0))
            .with_stage(TrendAnalyzer::default());
        pipeline.start();

        assert!(pipeline.push(Observation::new(-1.0)).await.unwrap().is_none());
        assert!(pipeline.push(Observation::new(2.0)).await.unwrap().is_some());

        let stats = pipeline.stats();
        assert_eq!(stats[0].processed, 2);
        assert_eq!(stats[0].filtered, Some(1));
        assert_eq!(stats[1].processed, 1);
        assert_eq!(stats[2].processed, 1);
    }

    #[tokio::test]
    async fn test_stage_events_bubble_unchanged() {
        let mut pipeline = Pipeline::new("bubble")
            .with_stage(TransformProcessor::new("broken", |_| anyhow::bail!("boom")));
        let errors = record(&pipeline, EventKind::Error);
        let data = record(&pipeline, EventKind::Data);
        pipeline.start();

        pipeline.push(Observation::new(1.0)).await.unwrap();

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            Event::Error(failure) => {
                assert_eq!(failure.stage, "broken");
                assert!(failure.error.contains("boom"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        // `data` is stage-local and does not bubble
        assert!(data.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_anomaly_bubbles_to_pipeline() {
        let mut pipeline = Pipeline::new("anom").with_stage(AnomalyDetector::new(3.0, 50));
        let anomalies = record(&pipeline, EventKind::Anomaly);
        pipeline.start();

        for v in [49.0, 51.0, 49.0, 51.0, 49.0, 51.0, 49.0, 51.0, 49.0, 51.0, 60.0] {
            pipeline.push(Observation::new(v)).await.unwrap();
        }
        assert_eq!(anomalies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_processed_event_carries_final_value() {
        let mut pipeline =
            Pipeline::new("proc").with_stage(FilterProcessor::new("positive", |o| o.value > 0.0));
        let processed = record(&pipeline, EventKind::Processed);
        pipeline.start();

        pipeline.push(Observation::new(5.0)).await.unwrap();
        pipeline.push(Observation::new(-5.0)).await.unwrap();

        let processed = processed.lock().unwrap();
        assert_eq!(processed.len(), 2);
        assert!(matches!(&processed[0], Event::Processed(Some(_))));
        assert!(matches!(&processed[1], Event::Processed(None)));
    }

    #[tokio::test]
    async fn test_start_stop_are_idempotent() {
        let mut pipeline = Pipeline::new("toggle");
        let starts = record(&pipeline, EventKind::Start);
        let stops = record(&pipeline, EventKind::Stop);

        pipeline.start();
        pipeline.start();
        pipeline.stop();
        pipeline.stop();

        assert_eq!(starts.lock().unwrap().len(), 1);
        assert_eq!(stops.lock().unwrap().len(), 1);
        assert!(!pipeline.is_running());
    }

    #[tokio::test]
    async fn test_empty_pipeline_returns_input() {
        let mut pipeline = Pipeline::new("empty");
        assert!(pipeline.is_empty());
        pipeline.start();
        let obs = Observation::new(3.0);
        let out = pipeline.push(obs.clone()).await.unwrap();
        assert_eq!(out, Some(PipelineItem::Observation(obs)));
    }
}
