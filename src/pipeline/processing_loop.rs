//! Source-driven processing loop shared by every input mode.
//!
//! Reads from an [`ObservationSource`], pushes each observation through a
//! [`Pipeline`], and stops on end of data, source error or cancellation.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::source::{ObservationSource, SourceEvent};
use super::Pipeline;
use crate::stages::StageStats;

/// Progress is logged every this many observations.
const PROGRESS_INTERVAL: u64 = 100;

// ============================================================================
// Loop Summary
// ============================================================================

/// Counters for one run of the loop.
#[derive(Debug, Clone, Default)]
pub struct LoopSummary {
    /// Observations read from the source
    pub items_read: u64,
    /// Pushes that produced a final item
    pub items_emitted: u64,
    /// Pushes dropped by a filter or a stage fault
    pub items_dropped: u64,
    /// Per-stage counters at the end of the run
    pub stage_stats: Vec<StageStats>,
}

impl std::fmt::Display for LoopSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Read: {}, Emitted: {}, Dropped: {}",
            self.items_read, self.items_emitted, self.items_dropped
        )
    }
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Drives a pipeline from a source until exhaustion or cancellation.
///
/// The pipeline is started on entry if it is not already running; stopping it
/// is left to the caller.
pub struct ProcessingLoop {
    pipeline: Pipeline,
    cancel_token: CancellationToken,
}

impl ProcessingLoop {
    pub fn new(pipeline: Pipeline, cancel_token: CancellationToken) -> Self {
        Self {
            pipeline,
            cancel_token,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }

    /// Run until the source is exhausted, fails, or the token is cancelled.
    pub async fn run<S: ObservationSource>(&mut self, source: &mut S) -> LoopSummary {
        let mut summary = LoopSummary::default();
        self.pipeline.start();

        info!(
            pipeline = %self.pipeline.name(),
            source = %source.source_name(),
            "[ProcessingLoop] Reading observations"
        );

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                result = source.next_observation() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!("[ProcessingLoop] Source error: {}", e);
                            break;
                        }
                    }
                }
            };

            let observation = match event {
                SourceEvent::Observation(o) => o,
                SourceEvent::Eof => {
                    info!(
                        "[ProcessingLoop] Source reached end ({} observations read)",
                        summary.items_read
                    );
                    break;
                }
            };

            summary.items_read += 1;

            match self.pipeline.push(observation).await {
                Ok(Some(_)) => summary.items_emitted += 1,
                Ok(None) => summary.items_dropped += 1,
                Err(e) => {
                    warn!("[ProcessingLoop] {} ({})", e, e.code());
                    break;
                }
            }

            if summary.items_read % PROGRESS_INTERVAL == 0 {
                info!(
                    read = summary.items_read,
                    emitted = summary.items_emitted,
                    dropped = summary.items_dropped,
                    "[ProcessingLoop] Progress"
                );
            }
        }

        summary.stage_stats = self.pipeline.stats();
        summary
    }
}
