//! # Configuration Loading
//!
//! Resolves the effective `GdmConfig` for a run.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Command-line flags
//! 2. The file named by `--config`, or `gdm.toml` in the working directory
//! 3. Built-in defaults
//!
//! A file named explicitly must exist; the implicit `gdm.toml` is optional.

use gdm_core::{GdmConfig, GdmError};
use std::path::Path;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "gdm.toml";

/// Values given on the command line. `None` leaves the file value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub base_uri: Option<String>,
    pub data_model_id: Option<String>,
    pub commit_batch_size: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut GdmConfig) {
        if let Some(base_uri) = &self.base_uri {
            config.base_uri.clone_from(base_uri);
        }
        if let Some(data_model_id) = &self.data_model_id {
            config.data_model_id = Some(data_model_id.clone());
        }
        if let Some(batch_size) = self.commit_batch_size {
            config.commit_batch_size = batch_size;
        }
    }
}

/// Parse a TOML document. Missing keys take their defaults; unknown keys
/// are rejected.
pub fn parse_config(text: &str) -> Result<GdmConfig, GdmError> {
    toml::from_str(text).map_err(|e| GdmError::Serialization(format!("Invalid config: {}", e)))
}

/// Read the configuration file, falling back to defaults when the implicit
/// file is absent.
pub fn load_config(explicit: Option<&Path>) -> Result<GdmConfig, GdmError> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let implicit = Path::new(DEFAULT_CONFIG_FILE);
            if !implicit.exists() {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(GdmConfig::default());
            }
            implicit
        }
    };

    let text = std::fs::read_to_string(path)
        .map_err(|e| GdmError::Io(format!("Read config {}: {}", path.display(), e)))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    parse_config(&text)
}

/// Load the file layer, then apply the command-line layer.
pub fn resolve_config(explicit: Option<&Path>, overrides: &Overrides) -> Result<GdmConfig, GdmError> {
    let mut config = load_config(explicit)?;
    overrides.apply(&mut config);
    Ok(config)
}
