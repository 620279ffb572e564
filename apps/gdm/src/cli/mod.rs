//! # GDM CLI Module
//!
//! This module implements the command-line interface for the converter.
//!
//! ## Available Commands
//!
//! - `convert` - Encode a recorded event stream and write it to the store
//! - `export` - Read records of one type back as GDM JSON
//! - `morph` - Compile mapping definitions into a metamorph script
//! - `status` - Show store counts and labels
//! - `delete` - Remove everything written under one provenance

mod commands;
mod error;

use crate::config::{Overrides, resolve_config};
use clap::{Args, Parser, Subcommand};
use gdm_core::provenance_uri;
use std::path::PathBuf;

pub use commands::*;
pub use error::CliError;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// GDM - record to graph converter
///
/// Turns record event streams into provenance-aware, order-preserving graph
/// data and reads it back.
#[derive(Parser, Debug)]
#[command(name = "gdm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the graph database
    #[arg(short = 'D', long, global = true, default_value = "gdm.redb")]
    pub database: PathBuf,

    /// Configuration file (defaults to ./gdm.toml when present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the base URI
    #[arg(long, global = true)]
    pub base_uri: Option<String>,

    /// Override the data model id
    #[arg(long, global = true)]
    pub data_model: Option<String>,

    /// Override the number of statements per commit
    #[arg(long, global = true)]
    pub batch_size: Option<u64>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            base_uri: self.base_uri.clone(),
            data_model_id: self.data_model.clone(),
            commit_batch_size: self.batch_size,
        }
    }
}

/// Identifies the graph a command reads, writes or deletes.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceArgs {
    /// Data resource id
    #[arg(short, long)]
    pub resource: String,

    /// Configuration id
    #[arg(short = 'c', long)]
    pub configuration: String,
}

impl ProvenanceArgs {
    #[must_use]
    pub fn uri(&self, base_uri: &str) -> String {
        provenance_uri(base_uri, &self.resource, &self.configuration)
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a JSON event stream and write it to the store
    Convert {
        /// Path to the events file (JSON array of events)
        #[arg(short, long)]
        input: PathBuf,

        /// Treat literal names as dotted paths and unflatten them
        #[arg(long)]
        flat: bool,

        #[command(flatten)]
        provenance: ProvenanceArgs,
    },

    /// Export records of one type as GDM JSON
    Export {
        /// Record type URI (the label records were stored under)
        #[arg(short = 't', long)]
        record_type: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        provenance: ProvenanceArgs,
    },

    /// Compile mapping definitions into a metamorph script
    Morph {
        /// Path to the transformations file (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the script on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Show store status
    Status,

    /// Delete everything written under one provenance
    Delete {
        #[command(flatten)]
        provenance: ProvenanceArgs,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(cli.config.as_deref(), &cli.overrides())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Convert {
            input,
            flat,
            provenance,
        }) => cmd_convert(
            &cli.database,
            &config,
            json_mode,
            &input,
            flat,
            &provenance.uri(&config.base_uri),
        ),
        Some(Commands::Export {
            record_type,
            output,
            provenance,
        }) => cmd_export(
            &cli.database,
            &output,
            &record_type,
            &provenance.uri(&config.base_uri),
        ),
        Some(Commands::Morph {
            input,
            output,
            compact,
        }) => cmd_morph(&input, output.as_deref(), compact),
        Some(Commands::Delete { provenance }) => cmd_delete(
            &cli.database,
            json_mode,
            &provenance.uri(&config.base_uri),
        ),
        Some(Commands::Status) | None => cmd_status(&cli.database, json_mode),
    }
}
