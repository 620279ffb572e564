//! # Interchange Formats
//!
//! Serialisations of GDM models for exchange with other tools.

pub mod gdm_json;

pub use gdm_json::{model_from_json, model_to_json, unit_to_json};
