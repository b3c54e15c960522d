//! Version bumps: recording the next version of an app in an environment
//!
//! A bump writes `[app/]v<version>-bump` at HEAD. It never publishes anything
//! itself; the tag push it causes is what triggers the release pipeline.

use crate::core::error::{RailError, RailResult, ValidationError};
use crate::ledger::tag::version_tag;
use crate::ledger::{Environment, LedgerScope, Marker, VersionLedger, VersionResolver};
use crate::tags::TagStore;
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Version bump type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
  /// Major version bump (breaking changes)
  Major,
  /// Minor version bump (new features)
  Minor,
  /// Patch version bump (bug fixes)
  Patch,
  /// Next prerelease number on a prerelease channel
  Prerelease,
}

impl BumpKind {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "major" => Some(Self::Major),
      "minor" => Some(Self::Minor),
      "patch" => Some(Self::Patch),
      "prerelease" | "pre" => Some(Self::Prerelease),
      _ => None,
    }
  }

  /// Apply bump to the release part of a version
  fn apply_core(&self, version: &Version) -> RailResult<Version> {
    match self {
      BumpKind::Major => increment(version, version.major).map(|major| Version::new(major, 0, 0)),
      BumpKind::Minor => increment(version, version.minor).map(|minor| Version::new(version.major, minor, 0)),
      BumpKind::Patch | BumpKind::Prerelease => {
        increment(version, version.patch).map(|patch| Version::new(version.major, version.minor, patch))
      }
    }
  }
}

fn increment(version: &Version, component: u64) -> RailResult<u64> {
  component.checked_add(1).ok_or_else(|| {
    RailError::Validation(ValidationError::InvalidVersion {
      version: version.to_string(),
      reason: "version component overflow".to_string(),
    })
  })
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpRequest {
  Explicit(Version),
  Kind(BumpKind),
}

/// Compute and validate the version a bump would record
pub fn plan_bump(ledger: &VersionLedger, app_id: &str, env: &Environment, request: &BumpRequest) -> RailResult<Version> {
  let resolver = VersionResolver::new(ledger);
  let current = resolver
    .bumped_version(app_id, env)
    .ok_or_else(|| RailError::message(format!("Environment '{}' has no usable baseline", env)))?;

  let next = match request {
    BumpRequest::Explicit(version) => version.clone(),
    BumpRequest::Kind(kind) => {
      let main_current = resolver
        .bumped_version(app_id, &Environment::main())
        .filter(|v| resolver.is_tagged(app_id, v));
      next_version(
        *kind,
        env,
        &current,
        resolver.is_tagged(app_id, &current),
        main_current.as_ref(),
      )?
    }
  };

  if &Environment::of_version(&next) != env {
    return Err(RailError::Validation(ValidationError::InvalidVersion {
      version: next.to_string(),
      reason: if env.is_main() {
        "main releases must not carry a prerelease".to_string()
      } else {
        format!("prerelease must start with '{}'", env.key())
      },
    }));
  }

  if next.cmp_precedence(&current).is_le() {
    return Err(RailError::Validation(ValidationError::OutOfOrderBump {
      app: app_id.to_string(),
      env: env.key().to_string(),
      requested: next.to_string(),
      current: current.to_string(),
    }));
  }

  Ok(next)
}

fn next_version(
  kind: BumpKind,
  env: &Environment,
  current: &Version,
  tagged: bool,
  main: Option<&Version>,
) -> RailResult<Version> {
  if env.is_main() {
    if kind == BumpKind::Prerelease {
      return Err(RailError::Validation(ValidationError::InvalidVersion {
        version: current.to_string(),
        reason: "prerelease bumps need a prerelease environment".to_string(),
      }));
    }
    return kind.apply_core(current);
  }

  let current_core = Version::new(current.major, current.minor, current.patch);

  if kind == BumpKind::Prerelease && tagged {
    let counter = current
      .pre
      .as_str()
      .rsplit('.')
      .next()
      .and_then(|n| n.parse::<u64>().ok())
      .map_or(Ok(1), |n| increment(current, n))?;
    return with_prerelease(&current_core, env, counter);
  }

  // A new prerelease line starts above both this channel and the main channel.
  let base = match main {
    Some(main) if main > &current_core => main.clone(),
    _ => current_core,
  };
  with_prerelease(&kind.apply_core(&base)?, env, 1)
}

fn with_prerelease(core: &Version, env: &Environment, counter: u64) -> RailResult<Version> {
  Ok(Version {
    major: core.major,
    minor: core.minor,
    patch: core.patch,
    pre: Prerelease::new(&format!("{}.{}", env.key(), counter))?,
    build: BuildMetadata::EMPTY,
  })
}

/// Record a bump: tag HEAD with the bump marker and push it
pub fn apply_bump(tags: &dyn TagStore, scope: &LedgerScope, app_id: &str, version: &Version) -> RailResult<String> {
  let name = version_tag(scope, app_id, version, Some(Marker::Bump));
  let head = tags.head_commit()?;
  tags.force_tag(&name, &head)?;
  tags.push_tags(std::slice::from_ref(&name))?;
  info!(tag = %name, commit = %head, "recorded bump");
  Ok(name)
}
