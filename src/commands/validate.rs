//! # Validate Command Implementation
//!
//! Parses the merge configuration and resolves every item against the
//! global defaults, reporting missing or malformed options. This is a
//! read-only operation: no repository is contacted.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

use mergerobot::config;

/// Validate a merge configuration file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the merge configuration file to validate.
    #[arg(long, value_name = "FILE", env = "MERGEROBOT_CONFIG")]
    pub config: PathBuf,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs) -> Result<()> {
    let plan = config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    println!("Validating configuration: {}", args.config.display());
    if plan.items.is_empty() {
        println!("No merge items configured.");
        return Ok(());
    }

    let mut invalid = 0;
    for item in &plan.items {
        match config::resolve(&item.name, &item.options, &plan.global) {
            Ok(resolved) => {
                let state = if resolved.enabled { "ok" } else { "ok (disabled)" };
                println!(
                    "  {}: {} [{} {} -> {} {}]",
                    item.name,
                    state,
                    resolved.source.endpoint.display_url(),
                    resolved.source.revision_range,
                    resolved.target.endpoint.display_url(),
                    resolved.target.branch
                );
            }
            Err(e) => {
                invalid += 1;
                println!("  {}: {}", item.name, e);
            }
        }
    }

    if invalid > 0 {
        bail!("{} of {} merge items are invalid", invalid, plan.items.len());
    }
    println!("All {} merge items are valid.", plan.items.len());
    Ok(())
}
