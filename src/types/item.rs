//! Items travelling between stages

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Observation;

/// Statistics record produced by the aggregation stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Timestamp of the newest observation in the window
    pub timestamp: DateTime<Utc>,
}

/// Value passed from one stage to the next.
///
/// A pipeline accepts observations, but the aggregation stage turns its input
/// into an [`AggregateSnapshot`]. Stages that need an observation fault on an
/// aggregate, so aggregation belongs at the end of a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineItem {
    Observation(Observation),
    Aggregate(AggregateSnapshot),
}

impl PipelineItem {
    /// Short label used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Observation(_) => "observation",
            Self::Aggregate(_) => "aggregate",
        }
    }

    pub fn as_observation(&self) -> Option<&Observation> {
        match self {
            Self::Observation(obs) => Some(obs),
            Self::Aggregate(_) => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregateSnapshot> {
        match self {
            Self::Aggregate(agg) => Some(agg),
            Self::Observation(_) => None,
        }
    }
}

impl From<Observation> for PipelineItem {
    fn from(obs: Observation) -> Self {
        Self::Observation(obs)
    }
}

impl From<AggregateSnapshot> for PipelineItem {
    fn from(agg: AggregateSnapshot) -> Self {
        Self::Aggregate(agg)
    }
}
