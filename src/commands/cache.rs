//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which inspects the
//! persistent repository cache shared by merge runs.
//!
//! ## Subcommands
//!
//! - **`list`**: Display every cached working copy, grouped by merge item,
//!   with its (redacted) origin URL.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use mergerobot::cache::{CacheEntry, DiskCache};
use mergerobot::config::redact_url;
use mergerobot::defaults::{Timeouts, DEFAULT_CACHE_DIR};
use mergerobot::repository::{DefaultGitOperations, RepositoryManager};

/// Manage repository cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// The root directory for the repository cache.
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "MERGEROBOT_CACHE",
        default_value = DEFAULT_CACHE_DIR
    )]
    pub cache_dir: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List all cached repositories
    List(ListArgs),
}

/// Arguments for the cache list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs) -> Result<()> {
    match args.command {
        CacheSubcommand::List(list_args) => execute_list(args.cache_dir, list_args),
    }
}

/// Execute the `cache list` command.
fn execute_list(cache_dir: PathBuf, args: ListArgs) -> Result<()> {
    if !cache_dir.exists() {
        if args.json {
            println!("[]");
        } else {
            println!("Cache directory does not exist: {}", cache_dir.display());
            println!("No cached repositories found.");
        }
        return Ok(());
    }

    let items = DiskCache::new(cache_dir.clone())
        .items()
        .with_context(|| format!("Failed to scan cache at {}", cache_dir.display()))?;
    let git = Arc::new(DefaultGitOperations::new(Timeouts::default()));
    let repos = RepositoryManager::new(git, cache_dir.clone());

    let mut listing: Vec<(String, Vec<CacheEntry>)> = Vec::new();
    for item in items {
        let entries = repos
            .cache_entries(&item)
            .with_context(|| format!("Failed to read cache entries of '{}'", item))?;
        if !entries.is_empty() {
            listing.push((item, entries));
        }
    }

    if args.json {
        display_json(&listing)?;
    } else if listing.is_empty() {
        println!("No cached repositories found in: {}", cache_dir.display());
    } else {
        display_table(&listing);
    }
    Ok(())
}

fn display_table(listing: &[(String, Vec<CacheEntry>)]) {
    for (item, entries) in listing {
        println!("{}:", item);
        for entry in entries {
            println!("  {}  {}", entry.path.display(), redact_url(&entry.origin));
        }
    }
}

fn display_json(listing: &[(String, Vec<CacheEntry>)]) -> Result<()> {
    let values: Vec<serde_json::Value> = listing
        .iter()
        .flat_map(|(item, entries)| {
            entries.iter().map(move |entry| {
                serde_json::json!({
                    "item": item,
                    "entry": entry,
                })
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}
