//! Windowed aggregation stage

use async_trait::async_trait;

use super::{Stage, StageCore, StageFault, StageKind};
use crate::config::defaults::DEFAULT_AGGREGATION_WINDOW;
use crate::stats::{RollingWindow, WindowStatistics};
use crate::types::{AggregateSnapshot, Event, Observation, PipelineItem};

/// Keeps the last `window_size` observations and emits population statistics
/// over their values for every item.
///
/// The stage returns the [`AggregateSnapshot`], not the observation, so any
/// stage chained after it receives aggregates.
pub struct AggregationProcessor {
    core: StageCore,
    window: RollingWindow<Observation>,
}

impl AggregationProcessor {
    pub fn new(window_size: usize) -> Self {
        Self {
            core: StageCore::new("aggregation", StageKind::Aggregation),
            window: RollingWindow::new(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    /// Observations currently held, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &Observation> {
        self.window.iter()
    }

    fn snapshot(&self) -> Option<AggregateSnapshot> {
        let stats = WindowStatistics::from_values(self.window.iter().map(|o| o.value))?;
        let timestamp = self.window.latest()?.timestamp;
        Some(AggregateSnapshot {
            count: stats.count,
            sum: stats.sum,
            mean: stats.mean,
            min: stats.min,
            max: stats.max,
            std_dev: stats.std_dev,
            timestamp,
        })
    }
}

impl Default for AggregationProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_AGGREGATION_WINDOW)
    }
}

#[async_trait]
impl Stage for AggregationProcessor {
    fn core(&self) -> &StageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StageCore {
        &mut self.core
    }

    async fn handle(&mut self, item: PipelineItem) -> Result<Option<PipelineItem>, StageFault> {
        let obs = StageFault::expect_observation(item)?;
        let obs = StageFault::require_finite(obs)?;

        self.window.push(obs);
        let Some(snapshot) = self.snapshot() else {
            return Ok(None);
        };

        self.core.emit(&Event::Aggregation(snapshot.clone()));
        Ok(Some(PipelineItem::Aggregate(snapshot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use chrono::{Duration, Utc};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_returns_snapshot_over_window() {
        let mut stage = AggregationProcessor::new(3);
        let mut last = None;
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            last = stage.process(Some(Observation::new(v).into())).await;
        }

        let agg = last.unwrap();
        let agg = agg.as_aggregate().unwrap();
        assert_eq!(agg.count, 3);
        assert_eq!(agg.sum, 12.0);
        assert!((agg.mean - 4.0).abs() < 1e-12);
        assert_eq!(agg.min, 3.0);
        assert_eq!(agg.max, 5.0);
        assert!((agg.std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-9);

        let held: Vec<f64> = stage.window().map(|o| o.value).collect();
        assert_eq!(held, vec![3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_population_std_dev() {
        let mut stage = AggregationProcessor::new(8);
        let mut last = None;
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            last = stage.process(Some(Observation::new(v).into())).await;
        }
        let last = last.unwrap();
        let agg = last.as_aggregate().unwrap();
        assert!((agg.mean - 5.0).abs() < 1e-9);
        assert!((agg.std_dev - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_publishes_aggregation_event_with_latest_timestamp() {
        let mut stage = AggregationProcessor::default();
        assert_eq!(stage.window_size(), DEFAULT_AGGREGATION_WINDOW);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stage.events().on(EventKind::Aggregation, move |e| {
            if let Event::Aggregation(agg) = e {
                sink.lock().unwrap().push(agg.clone());
            }
        });

        let t0 = Utc::now();
        stage.process(Some(Observation::at(1.0, t0).into())).await;
        let t1 = t0 + Duration::seconds(1);
        stage.process(Some(Observation::at(3.0, t1).into())).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].count, 2);
        assert_eq!(seen[1].timestamp, t1);
    }

    #[tokio::test]
    async fn test_non_finite_value_is_rejected() {
        let mut stage = AggregationProcessor::new(4);
        assert!(stage.process(Some(Observation::new(f64::NAN).into())).await.is_none());
        assert_eq!(stage.stats().errors, 1);
        assert_eq!(stage.window().count(), 0);
    }
}
