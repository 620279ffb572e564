//! # GDM - Record to Graph Converter
//!
//! The binary wrapping `gdm-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 apps/gdm (THE BINARY)                │
//! │                                                      │
//! │   ┌─────────────┐          ┌───────────────────┐     │
//! │   │    CLI      │          │  gdm.toml loader  │     │
//! │   │   (clap)    │          │      (toml)       │     │
//! │   └──────┬──────┘          └─────────┬─────────┘     │
//! │          └──────────────┬────────────┘               │
//! │                         ▼                            │
//! │                 ┌───────────────┐                    │
//! │                 │   gdm-core    │                    │
//! │                 │  (THE LOGIC)  │                    │
//! │                 └───────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! gdm convert -i events.json -r 1 -c 1
//! gdm export -t http://purl.org/ontology/bibo/Book -o books.json -r 1 -c 1
//! gdm morph -i mappings.json -o morph.xml
//! gdm status
//! gdm delete -r 1 -c 1
//! ```

use clap::Parser;
use gdm::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // GDM_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("GDM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_env("GDM_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "gdm=info,gdm_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    match cli::execute(cli) {
        Ok(()) => {}
        Err(cli::CliError::Conversion(e)) => {
            tracing::error!(record = %e.record, stage = %e.stage, "Error: {}", e.source);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
