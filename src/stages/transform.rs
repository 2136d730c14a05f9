//! Mapping stage
//!
//! The mapping may enrich an observation with derived fields. It must hand
//! back the same observation identity: a result with a different `id`, or a
//! rewritten `value`/`timestamp`, is a stage fault and the item is dropped.

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use std::future::Future;

use super::{Stage, StageCore, StageError, StageFault, StageKind};
use crate::types::{Event, Observation, PipelineItem};

/// Boxed mapping function. Synchronous mappings are wrapped in a ready future.
pub type TransformFn =
    Box<dyn Fn(Observation) -> BoxFuture<'static, anyhow::Result<Observation>> + Send + Sync>;

/// Derived field written by [`TransformProcessor::normalize`].
pub const NORMALIZED_FIELD: &str = "normalized";

pub struct TransformProcessor {
    core: StageCore,
    transform: TransformFn,
}

impl TransformProcessor {
    /// Stage with a synchronous mapping.
    ///
    /// Report failures by returning `Err`. A panic inside the mapping is not
    /// absorbed as a stage error and escapes `Pipeline::push`.
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Observation) -> anyhow::Result<Observation> + Send + Sync + 'static,
    {
        Self::from_boxed(
            name,
            Box::new(move |obs| future::ready(transform(obs)).boxed()),
        )
    }

    /// Stage with an asynchronous mapping. The pipeline awaits it before
    /// moving the item to the next stage.
    pub fn new_async<F, Fut>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Observation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Observation>> + Send + 'static,
    {
        Self::from_boxed(name, Box::new(move |obs| transform(obs).boxed()))
    }

    pub fn from_boxed(name: impl Into<String>, transform: TransformFn) -> Self {
        Self {
            core: StageCore::new(name, StageKind::Transform),
            transform,
        }
    }

    /// Attach `normalized = value / scale`.
    pub fn normalize(scale: f64) -> Self {
        Self::new("normalize", move |obs| {
            if scale == 0.0 || !scale.is_finite() {
                anyhow::bail!("normalization scale must be finite and non-zero, got {scale}");
            }
            let normalized = obs.value / scale;
            Ok(obs.with_derived(NORMALIZED_FIELD, normalized))
        })
    }
}

#[async_trait]
impl Stage for TransformProcessor {
    fn core(&self) -> &StageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StageCore {
        &mut self.core
    }

    async fn handle(&mut self, item: PipelineItem) -> Result<Option<PipelineItem>, StageFault> {
        let input = StageFault::expect_observation(item)?;
        // The mapping consumes its input; keep a copy for checks and fault reports.
        let original = input.clone();

        let output = match (self.transform)(input).await {
            Ok(output) => output,
            Err(e) => {
                let error = StageError::Transform(format!("{e:#}"));
                return Err(StageFault::new(error, original));
            }
        };

        if output.id != original.id {
            let error = StageError::IdentityChanged {
                expected: original.id.clone(),
                actual: output.id,
            };
            return Err(StageFault::new(error, original));
        }
        if !original.same_core(&output) {
            let error = StageError::CoreFieldMutated(original.id.clone());
            return Err(StageFault::new(error, original));
        }

        let item = PipelineItem::Observation(output);
        self.core.emit(&Event::Data(item.clone()));
        Ok(Some(item))
    }
}
