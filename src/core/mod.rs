//! Core engine plumbing for tag-rail
//!
//! - **args**: `--args` string parsing
//! - **config**: rail.toml parsing, the config builder and validation
//! - **context**: repository context shared by all commands
//! - **error**: error types with contextual help messages
//! - **vcs**: git operations abstraction (SystemGit)

pub mod args;
pub mod config;
pub mod context;
pub mod error;
pub mod vcs;
