//! Result collection and JSON export
//!
//! Collects pipeline findings in arrival order and writes them as a single
//! pretty-printed JSON array:
//!
//! ```json
//! [
//!   { "type": "anomaly", "data": { ... }, "timestamp": "2024-01-01T00:00:00Z" }
//! ]
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::Event;

/// One collected result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    /// Result category (`anomaly`, `trend`, `aggregation`, `error`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    /// Collection time
    pub timestamp: DateTime<Utc>,
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// In-memory result log with a target file for `save`.
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    results: Vec<StoredResult>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            results: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a result of any serializable payload.
    pub fn add_result<T: Serialize>(
        &mut self,
        kind: impl Into<String>,
        data: &T,
    ) -> Result<(), StorageError> {
        self.results.push(StoredResult {
            kind: kind.into(),
            data: serde_json::to_value(data)?,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Append a pipeline event under its kind name.
    pub fn record(&mut self, event: &Event) -> Result<(), StorageError> {
        let data = match serde_json::to_value(event)? {
            serde_json::Value::Object(mut map) => {
                map.remove("data").unwrap_or(serde_json::Value::Null)
            }
            other => other,
        };
        self.results.push(StoredResult {
            kind: event.kind().to_string(),
            data,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub fn results(&self) -> &[StoredResult] {
        &self.results
    }

    /// Number of results of one kind.
    pub fn count_of(&self, kind: &str) -> usize {
        self.results.iter().filter(|r| r.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Write all results to the configured path, creating parent directories.
    pub fn save(&self) -> Result<PathBuf, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.results)?;
        std::fs::write(&self.path, json).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(path = %self.path.display(), results = self.results.len(), "[ResultStore] Results saved");
        Ok(self.path.clone())
    }

    /// Read back a file written by `save`.
    pub fn load(path: &Path) -> Result<Vec<StoredResult>, StorageError> {
        let contents = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregateSnapshot, TrendDirection, TrendReport};

    fn trend() -> Event {
        Event::Trend(TrendReport {
            sma: 100.0,
            latest: 106.0,
            diff: 6.0,
            diff_percent: 6.0,
            direction: TrendDirection::Upward,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn test_record_unwraps_event_payload() {
        let mut store = ResultStore::new("unused.json");
        store.record(&trend()).unwrap();

        let r = &store.results()[0];
        assert_eq!(r.kind, "trend");
        assert_eq!(r.data["direction"], serde_json::json!("upward"));
        assert_eq!(r.data["sma"], serde_json::json!(100.0));
    }

    #[test]
    fn test_unit_events_record_null_payload() {
        let mut store = ResultStore::new("unused.json");
        store.record(&Event::Stop).unwrap();
        assert_eq!(store.results()[0].kind, "stop");
        assert!(store.results()[0].data.is_null());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/results.json");

        let mut store = ResultStore::new(&path);
        store.record(&trend()).unwrap();
        store
            .add_result(
                "aggregation",
                &AggregateSnapshot {
                    count: 2,
                    sum: 3.0,
                    mean: 1.5,
                    min: 1.0,
                    max: 2.0,
                    std_dev: 0.5,
                    timestamp: Utc::now(),
                },
            )
            .unwrap();

        let written = store.save().unwrap();
        assert_eq!(written, path);

        let loaded = ResultStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].kind, "trend");
        assert_eq!(loaded[1].data["mean"], serde_json::json!(1.5));
        assert_eq!(store.count_of("aggregation"), 1);
    }

    #[test]
    fn test_saved_file_uses_type_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let mut store = ResultStore::new(&path);
        store.record(&trend()).unwrap();
        store.save().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["type"], serde_json::json!("trend"));
        assert!(raw[0].get("kind").is_none());
    }

    #[test]
    fn test_empty_store_saves_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let store = ResultStore::new(&path);
        assert!(store.is_empty());
        store.save().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ResultStore::load(Path::new("/nonexistent/results.json")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
