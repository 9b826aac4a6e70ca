//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands;

/// Merge Robot - Port commit ranges between git repositories
#[derive(Parser, Debug)]
#[command(name = "mergerobot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every merge item of the configuration file
    Run(commands::run::RunArgs),

    /// Validate a merge configuration file without touching any repository
    Validate(commands::validate::ValidateArgs),

    /// Inspect the repository cache
    Cache(commands::cache::CacheArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(self.debug);

        match self.command {
            Commands::Run(args) => commands::run::execute(args),
            Commands::Validate(args) => commands::validate::execute(args),
            Commands::Cache(args) => commands::cache::execute(args),
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .parse_default_env()
        .init();
}
