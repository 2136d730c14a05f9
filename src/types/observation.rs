//! Observation - the atomic unit flowing through the pipeline

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Length of the random suffix appended to observation ids.
const ID_SUFFIX_LEN: usize = 9;

/// Free-form provenance attached by the data source. Opaque to the pipeline.
pub type Metadata = HashMap<String, serde_json::Value>;

/// One timestamped numeric measurement.
///
/// `value`, `timestamp` and `id` are fixed at creation. Transform stages may
/// attach entries to `derived` but never rewrite the core fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Correlation id for diagnostics (`<millis>-<suffix>`). Never used for ordering.
    #[serde(default = "generate_id")]
    pub id: String,

    /// Measured quantity
    pub value: f64,

    /// Capture time
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Provenance (source, generation parameters, ...)
    #[serde(default)]
    pub metadata: Metadata,

    /// Fields attached by transform stages (e.g. `normalized`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub derived: BTreeMap<String, f64>,
}

impl Observation {
    /// Create an observation captured now.
    pub fn new(value: f64) -> Self {
        Self::at(value, Utc::now())
    }

    /// Create an observation with an explicit capture time.
    pub fn at(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id_for(timestamp),
            value,
            timestamp,
            metadata: Metadata::new(),
            derived: BTreeMap::new(),
        }
    }

    /// Builder-style metadata attachment.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builder-style derived field attachment.
    #[must_use]
    pub fn with_derived(mut self, key: impl Into<String>, value: f64) -> Self {
        self.derived.insert(key.into(), value);
        self
    }

    /// Valid iff the value is a finite number (not NaN, not infinite).
    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }

    /// Look up a derived field.
    pub fn derived(&self, key: &str) -> Option<f64> {
        self.derived.get(key).copied()
    }

    /// True when `other` carries the same id, value and timestamp.
    ///
    /// NaN values compare by bit pattern so an invalid observation still
    /// matches its own copy.
    pub fn same_core(&self, other: &Self) -> bool {
        self.id == other.id
            && self.timestamp == other.timestamp
            && self.value.to_bits() == other.value.to_bits()
    }
}

fn generate_id() -> String {
    id_for(Utc::now())
}

fn id_for(timestamp: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{}-{}", timestamp.timestamp_millis(), suffix)
}
