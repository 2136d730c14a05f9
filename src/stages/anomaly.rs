//! Z-score anomaly detection tap
//!
//! Each value is scored against the history of values seen before it:
//!
//! ```text
//! z = |value - mean(history)| / std_dev(history)
//! anomaly  <=>  history.len() >= min_history && 0 < std_dev < inf && z > threshold
//! ```
//!
//! The value is appended to the history after scoring. A flat history
//! (std_dev == 0) never flags anything. The stage never drops an item on the
//! happy path. Non-finite values are the exception: they are rejected as a
//! stage fault so the history stays clean.

use async_trait::async_trait;
use tracing::debug;

use super::{Stage, StageCore, StageFault, StageKind, StageStats};
use crate::config::defaults::{
    DEFAULT_ANOMALY_HISTORY, DEFAULT_ANOMALY_MIN_HISTORY, DEFAULT_ANOMALY_THRESHOLD,
};
use crate::config::AnomalyConfig;
use crate::stats::RollingWindow;
use crate::types::{AnomalyReport, Event, PipelineItem};

pub struct AnomalyDetector {
    core: StageCore,
    history: RollingWindow<f64>,
    threshold: f64,
    min_history: usize,
    anomalies: u64,
}

impl AnomalyDetector {
    /// Detector with the default warm-up length.
    pub fn new(threshold: f64, history_size: usize) -> Self {
        Self::with_config(&AnomalyConfig {
            threshold,
            history_size,
            min_history: DEFAULT_ANOMALY_MIN_HISTORY.min(history_size),
        })
    }

    pub fn with_config(cfg: &AnomalyConfig) -> Self {
        Self {
            core: StageCore::new("anomaly_detector", StageKind::AnomalyDetect),
            history: RollingWindow::new(cfg.history_size),
            threshold: cfg.threshold,
            min_history: cfg.min_history.max(1),
            anomalies: 0,
        }
    }

    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Anomalies as a percentage of processed items; 0 before any input.
    pub fn anomaly_rate(&self) -> f64 {
        let processed = self.core.processed();
        if processed == 0 {
            0.0
        } else {
            self.anomalies as f64 / processed as f64 * 100.0
        }
    }

    /// Raw history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::with_config(&AnomalyConfig {
            threshold: DEFAULT_ANOMALY_THRESHOLD,
            history_size: DEFAULT_ANOMALY_HISTORY,
            min_history: DEFAULT_ANOMALY_MIN_HISTORY,
        })
    }
}

#[async_trait]
impl Stage for AnomalyDetector {
    fn core(&self) -> &StageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StageCore {
        &mut self.core
    }

    async fn handle(&mut self, item: PipelineItem) -> Result<Option<PipelineItem>, StageFault> {
        let obs = StageFault::expect_observation(item)?;
        let obs = StageFault::require_finite(obs)?;

        let baseline = if self.history.len() >= self.min_history {
            self.history.statistics()
        } else {
            None
        };
        self.history.push(obs.value);

        if let Some(stats) = baseline {
            if stats.std_dev > 0.0 && stats.std_dev.is_finite() {
                let z_score = (obs.value - stats.mean).abs() / stats.std_dev;
                if z_score > self.threshold {
                    self.anomalies += 1;
                    debug!(
                        id = %obs.id,
                        value = obs.value,
                        z_score,
                        mean = stats.mean,
                        std_dev = stats.std_dev,
                        "[AnomalyDetector] Anomaly flagged"
                    );
                    self.core.emit(&Event::Anomaly(AnomalyReport {
                        observation: obs.clone(),
                        stats,
                        z_score,
                        threshold: self.threshold,
                    }));
                }
            }
        }

        let item = PipelineItem::Observation(obs);
        self.core.emit(&Event::Data(item.clone()));
        Ok(Some(item))
    }

    fn stats(&self) -> StageStats {
        StageStats {
            anomalies: Some(self.anomalies),
            anomaly_rate: Some(self.anomaly_rate()),
            ..self.core.snapshot()
        }
    }
}
