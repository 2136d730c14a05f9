//! Result Storage
//!
//! Pipeline findings collected in memory and exported as JSON at shutdown.

mod results;

pub use results::{ResultStore, StorageError, StoredResult};
