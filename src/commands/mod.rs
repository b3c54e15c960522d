//! CLI commands for tag-rail
//!
//! ## Versions
//! - **version**: bumped and published versions per app and environment
//! - **bump**: record the next version (`-bump` tag)
//! - **release**: re-queue a pending release (`-queue` tag)
//!
//! ## Entries
//! - **entries**: run test/build/publish entries locally
//!
//! ## Pipeline
//! - **pipeline**: stage entry points for generated CI definitions
//!
//! All commands accept `&RepoContext` to avoid redundant config loads.

pub mod bump;
pub mod entries;
pub mod pipeline;
pub mod release;
pub mod version;

pub use bump::run_bump;
pub use entries::run_entries;
pub use pipeline::{run_local, run_matrix, run_post_setup, run_pre_setup, run_stage};
pub use release::run_release;
pub use version::run_version;

use crate::core::args::ArgMap;
use crate::core::config::{AppEntry, ResolvedConfig};
use crate::core::context::RepoContext;
use crate::core::error::{ConfigError, RailError, RailResult};
use crate::ledger::{Environment, VersionLedger};
use crate::tags::TagSource;

/// Fold the remote tag listing into a ledger
pub(crate) fn load_ledger(tags: &dyn TagSource, config: &ResolvedConfig) -> RailResult<VersionLedger> {
  Ok(VersionLedger::fold(&tags.list_tags()?, &config.scope()))
}

/// Apps named by `app=` (all apps when absent)
pub(crate) fn selected_apps<'a>(config: &'a ResolvedConfig, args: &ArgMap) -> RailResult<Vec<&'a AppEntry>> {
  let requested = args.list("app");
  if requested.is_empty() {
    return Ok(config.apps.iter().collect());
  }
  requested.iter().map(|id| config.require_app(id)).collect()
}

/// The single app a command acts on: `app=`, else the main-release app
pub(crate) fn target_app<'a>(config: &'a ResolvedConfig, args: &ArgMap) -> RailResult<&'a AppEntry> {
  match args.get("app") {
    Some(id) => config.require_app(id),
    None => config.main_app().ok_or_else(|| {
      RailError::Config(ConfigError::MissingField {
        field: "app (in --args)".to_string(),
      })
    }),
  }
}

/// `env=` if given, else the environment of the current trigger
pub(crate) fn target_environment(ctx: &RepoContext, args: &ArgMap) -> RailResult<Environment> {
  match args.get("env") {
    Some(key) if key == "main" || key == ctx.config.main_branch => Ok(Environment::main()),
    Some(key) => Ok(Environment::named(key)),
    None => Ok(ctx.config.environment_for_branch(&ctx.trigger()?.branch)),
  }
}
