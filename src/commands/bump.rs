//! `tag-rail bump` - record the next version of an app
//!
//! `--args "app=web;version=1.2.0"` records an explicit version,
//! `--args "app=web;bump=minor"` computes it. `env=<key>` picks the
//! environment (default: the one of the explicit version, else the current
//! branch). `dry-run` only prints the tag.

use crate::commands::{load_ledger, target_app, target_environment};
use crate::core::args::ArgMap;
use crate::core::context::RepoContext;
use crate::core::error::{ConfigError, RailError, RailResult, ValidationError};
use crate::ledger::tag::version_tag;
use crate::ledger::{Environment, Marker};
use crate::release::{BumpKind, BumpRequest, apply_bump, plan_bump};
use semver::Version;

/// Run the bump command
pub fn run_bump(ctx: &RepoContext, args: &ArgMap) -> RailResult<()> {
  let app = target_app(&ctx.config, args)?;

  let request = match (args.get("version"), args.get("bump")) {
    (Some(raw), _) => {
      let raw = raw.strip_prefix('v').unwrap_or(raw);
      let version = Version::parse(raw).map_err(|e| {
        RailError::Validation(ValidationError::InvalidVersion {
          version: raw.to_string(),
          reason: e.to_string(),
        })
      })?;
      BumpRequest::Explicit(version)
    }
    (None, Some(kind)) => BumpRequest::Kind(BumpKind::parse(kind).ok_or_else(|| {
      RailError::with_help(
        format!("Unknown bump kind '{}'", kind),
        "Use one of: major, minor, patch, prerelease",
      )
    })?),
    (None, None) => {
      return Err(RailError::Config(ConfigError::MissingField {
        field: "version or bump (in --args)".to_string(),
      }));
    }
  };

  let env = match (&request, args.has("env")) {
    (BumpRequest::Explicit(version), false) => Environment::of_version(version),
    _ => target_environment(ctx, args)?,
  };

  let tags = ctx.tags()?;
  let ledger = load_ledger(&tags, &ctx.config)?;
  let version = plan_bump(&ledger, &app.id, &env, &request)?;
  let scope = ctx.config.scope();

  if args.has("dry-run") {
    println!(
      "DRY RUN: would tag HEAD with {}",
      version_tag(&scope, &app.id, &version, Some(Marker::Bump))
    );
    return Ok(());
  }

  let name = apply_bump(&tags, &scope, &app.id, &version)?;
  println!("✅ {} {} ({}) -> {}", app.name, version, env, name);
  Ok(())
}
