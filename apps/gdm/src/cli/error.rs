//! Errors surfaced by CLI commands.

use gdm_core::{ConversionError, GdmError, MorphError};
use thiserror::Error;

/// A failed command.
///
/// Pipeline and compiler failures stay typed so `main` can report the failing
/// record and stage as data.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Gdm(#[from] GdmError),

    /// A record failed in the conversion pipeline.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Morph compilation failed: {0}")]
    Morph(#[from] MorphError),
}
