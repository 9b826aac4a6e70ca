//! # Merge Robot CLI
//!
//! This is the binary entry point for the `mergerobot` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initializing logging.
//! - Executing the appropriate command and translating failures into a
//!   non-zero exit status.
//!
//! The merge logic lives in the `mergerobot` library crate; the binary is a
//! thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
