//! Core data types shared by stages, the pipeline and its collaborators.

mod event;
mod item;
mod observation;

pub use event::{
    AnomalyReport, Event, EventKind, StageFailure, TrendDirection, TrendReport,
};
pub use item::{AggregateSnapshot, PipelineItem};
pub use observation::{Metadata, Observation};
