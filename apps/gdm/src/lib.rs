//! # gdm
//!
//! Library half of the `gdm` binary: command-line parsing, command
//! implementations and `gdm.toml` loading. Kept as a library so the
//! integration tests can drive it without spawning a process.

pub mod cli;
pub mod config;
