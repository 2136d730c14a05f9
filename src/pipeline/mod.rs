//! Processing Pipeline Module
//!
//! ```text
//! ObservationSource ─▶ ProcessingLoop ─▶ Pipeline ─▶ [Stage 1 .. Stage N]
//!                                           │
//!                                           └─▶ EventEmitter (error, anomaly,
//!                                                trend, aggregation, processed)
//! ```
//!
//! A `Pipeline` owns its stages and its own emitter. `build_pipeline` wires the
//! standard chain from a `PipelineConfig`; `ProcessingLoop` feeds it from a
//! source until exhaustion or cancellation.

mod builder;
mod coordinator;
mod emitter;
pub mod processing_loop;
pub mod source;

pub use builder::build_pipeline;
pub use coordinator::{Pipeline, PipelineError};
pub use emitter::{EventEmitter, Listener};
pub use processing_loop::{LoopSummary, ProcessingLoop};
pub use source::{IterSource, ObservationSource, SourceEvent, StdinSource};
