//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `mergerobot` command-line tool, one file per subcommand.
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and calls into the
//!   `mergerobot` library to perform the command's logic.

pub mod cache;
pub mod run;
pub mod validate;
