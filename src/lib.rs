//! # Merge Robot Library
//!
//! This library ports commit ranges between git repositories. For every
//! configured merge item it extracts the commits of a revision range from a
//! source branch as patches, rewrites their author to the robot identity,
//! applies them onto a target branch, and pushes the result. It is designed
//! to be used by the `mergerobot` command-line tool.
//!
//! ## Quick Example
//!
//! ```
//! use mergerobot::config;
//!
//! let plan = config::parse(r#"
//! [global_config]
//! src_user =
//! src_token =
//! tgt_user = robot
//! tgt_token = secret
//!
//! [kernel]
//! src = https://git.example.com/upstream/kernel.git
//! src_branch = main
//! src_rev = 1a2b3c...4d5e6f
//! tgt = https://git.example.com/vendor/kernel.git
//! tgt_branch = vendor
//! "#).unwrap();
//!
//! let item = &plan.items[0];
//! let resolved = config::resolve(&item.name, &item.options, &plan.global).unwrap();
//! assert_eq!(resolved.target.endpoint.username.as_deref(), Some("robot"));
//! assert!(resolved.enabled);
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: Reads the INI merge plan and resolves each
//!   item against the `global_config` defaults.
//! - **Repository Management (`repository`, `git`, `cache`)**: Obtains working
//!   copies of remote branches, reusing a persistent cache of earlier clones.
//! - **Patches (`patches`)**: Extracts a revision range as patch files and
//!   anonymizes their author.
//! - **Publishing (`publish`)**: Applies a patch series atomically and pushes.
//! - **Orchestration (`orchestrator`, `run`)**: Drives each item through its
//!   states and manages the run-scoped scratch directory.
//!
//! ## Execution Flow
//!
//! For each merge item, in configuration order:
//!
//! 1.  **Resolve**: Merge item options over the defaults and validate them.
//! 2.  **Acquire**: Obtain source and target working copies (cache or clone).
//! 3.  **Extract**: Generate one patch per commit of the revision range.
//! 4.  **Filter**: Rewrite every patch author to the robot identity.
//! 5.  **Apply**: Apply the series onto the target branch, all or nothing.
//! 6.  **Push**: Publish the target branch.
//!
//! A failing item never stops the next one from being attempted.

pub mod cache;
pub mod config;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod git;
pub mod orchestrator;
pub mod patches;
pub mod publish;
pub mod repository;
pub mod run;

#[cfg(test)]
mod test_support;
