//! # Configuration
//!
//! Runtime settings for the conversion pipeline. The core only defines the
//! shape and defaults; loading from files is done by the application layer.

use crate::primitives::{
    COMMIT_BATCH_SIZE, COMMIT_INTERVAL, DEFAULT_BASE_URI, DEFAULT_ENTITY_MARKER,
    DEFAULT_INITIAL_DISCARD,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration.
///
/// Every field has a default, so partial configuration files are valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GdmConfig {
    /// Root for minted record, schema and provenance URIs.
    pub base_uri: String,
    /// Data model the converted records belong to, if any.
    pub data_model_id: Option<String>,
    /// Path delimiter used by the unflattener.
    pub entity_marker: char,
    /// First path segment dropped by the unflattener.
    pub initial_discard: String,
    /// Statements per writer transaction before a forced commit.
    pub commit_batch_size: u64,
    /// Seconds per writer transaction before a forced commit.
    pub commit_interval_secs: u64,
}

impl Default for GdmConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_BASE_URI.to_string(),
            data_model_id: None,
            entity_marker: DEFAULT_ENTITY_MARKER,
            initial_discard: DEFAULT_INITIAL_DISCARD.to_string(),
            commit_batch_size: COMMIT_BATCH_SIZE,
            commit_interval_secs: COMMIT_INTERVAL.as_secs(),
        }
    }
}

impl GdmConfig {
    #[must_use]
    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs)
    }
}
