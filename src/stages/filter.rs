//! Predicate filter stage

use async_trait::async_trait;

use super::{Stage, StageCore, StageError, StageFault, StageKind, StageStats};
use crate::types::{Event, Observation, PipelineItem};

type Predicate = Box<dyn Fn(&Observation) -> anyhow::Result<bool> + Send + Sync>;

/// Passes observations the predicate accepts, drops the rest.
///
/// Accepted items are published as `data`, rejected ones as `filtered`.
pub struct FilterProcessor {
    core: StageCore,
    predicate: Predicate,
    filtered: u64,
}

impl FilterProcessor {
    /// Filter with an infallible predicate.
    ///
    /// The predicate must not panic: a panic is not absorbed as a stage error
    /// and escapes `Pipeline::push`. Use [`fallible`](Self::fallible) when the
    /// check can fail.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Observation) -> bool + Send + Sync + 'static,
    {
        Self::fallible(name, move |obs| Ok(predicate(obs)))
    }

    /// Filter whose predicate may fail. `Err` results are counted as stage
    /// errors and the item is dropped.
    pub fn fallible<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Observation) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            core: StageCore::new(name, StageKind::Filter),
            predicate: Box::new(predicate),
            filtered: 0,
        }
    }

    /// Drop NaN and infinite values.
    pub fn valid_values() -> Self {
        Self::new("validity_filter", Observation::is_valid)
    }

    /// Drop invalid values and values outside the inclusive bounds.
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new("range_filter", move |obs| {
            obs.is_valid()
                && min.map_or(true, |lo| obs.value >= lo)
                && max.map_or(true, |hi| obs.value <= hi)
        })
    }

    pub fn filtered(&self) -> u64 {
        self.filtered
    }
}

#[async_trait]
impl Stage for FilterProcessor {
    fn core(&self) -> &StageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StageCore {
        &mut self.core
    }

    async fn handle(&mut self, item: PipelineItem) -> Result<Option<PipelineItem>, StageFault> {
        let obs = StageFault::expect_observation(item)?;
        let keep = match (self.predicate)(&obs) {
            Ok(keep) => keep,
            Err(e) => return Err(StageFault::new(StageError::Predicate(format!("{e:#}")), obs)),
        };

        if keep {
            let item = PipelineItem::Observation(obs);
            self.core.emit(&Event::Data(item.clone()));
            Ok(Some(item))
        } else {
            self.filtered += 1;
            self.core.emit(&Event::Filtered(obs));
            Ok(None)
        }
    }

    fn stats(&self) -> StageStats {
        StageStats {
            filtered: Some(self.filtered),
            ..self.core.snapshot()
        }
    }
}
