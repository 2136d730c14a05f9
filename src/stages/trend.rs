//! Moving-average trend classification tap
//!
//! The stage never drops an item on the happy path. Non-finite values are the
//! exception: they are rejected as a stage fault so the window stays clean.

use async_trait::async_trait;

use super::{Stage, StageCore, StageFault, StageKind};
use crate::config::defaults::{
    DEFAULT_TREND_MIN_SAMPLES, DEFAULT_TREND_STABLE_BAND_PERCENT, DEFAULT_TREND_WINDOW,
};
use crate::config::TrendConfig;
use crate::stats::RollingWindow;
use crate::types::{Event, PipelineItem, TrendDirection, TrendReport};

/// Compares the latest value with the simple moving average of the window.
///
/// `stable` when the deviation is within the band (percent of the SMA),
/// otherwise `upward`/`downward` by the sign of `latest - sma`.
pub struct TrendAnalyzer {
    core: StageCore,
    window: RollingWindow<f64>,
    min_samples: usize,
    stable_band_percent: f64,
}

impl TrendAnalyzer {
    pub fn new(window_size: usize) -> Self {
        Self::with_config(&TrendConfig {
            window_size,
            min_samples: DEFAULT_TREND_MIN_SAMPLES.min(window_size),
            stable_band_percent: DEFAULT_TREND_STABLE_BAND_PERCENT,
        })
    }

    pub fn with_config(cfg: &TrendConfig) -> Self {
        Self {
            core: StageCore::new("trend_analyzer", StageKind::TrendAnalyze),
            window: RollingWindow::new(cfg.window_size),
            min_samples: cfg.min_samples.max(1),
            stable_band_percent: cfg.stable_band_percent,
        }
    }

    /// Values currently held, oldest first.
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    fn classify(&self, sma: f64, latest: f64) -> (f64, f64, TrendDirection) {
        let diff = latest - sma;
        let diff_percent = diff / sma * 100.0;
        // Undefined around a zero average or on overflow; report stable.
        if !diff_percent.is_finite() {
            return (diff, 0.0, TrendDirection::Stable);
        }

        let direction = if diff_percent.abs() <= self.stable_band_percent {
            TrendDirection::Stable
        } else if diff > 0.0 {
            TrendDirection::Upward
        } else {
            TrendDirection::Downward
        };
        (diff, diff_percent, direction)
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_WINDOW)
    }
}

#[async_trait]
impl Stage for TrendAnalyzer {
    fn core(&self) -> &StageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StageCore {
        &mut self.core
    }

    async fn handle(&mut self, item: PipelineItem) -> Result<Option<PipelineItem>, StageFault> {
        let obs = StageFault::expect_observation(item)?;
        let obs = StageFault::require_finite(obs)?;

        self.window.push(obs.value);

        if self.window.len() >= self.min_samples {
            if let Some(stats) = self.window.statistics().filter(|s| s.mean.is_finite()) {
                let latest = obs.value;
                let (diff, diff_percent, direction) = self.classify(stats.mean, latest);
                self.core.emit(&Event::Trend(TrendReport {
                    sma: stats.mean,
                    latest,
                    diff,
                    diff_percent,
                    direction,
                    timestamp: obs.timestamp,
                }));
            }
        }

        let item = PipelineItem::Observation(obs);
        self.core.emit(&Event::Data(item.clone()));
        Ok(Some(item))
    }
}
