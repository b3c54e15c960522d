//! Per-environment version resolution
//!
//! Answers two questions for an (app, environment) pair: what is the highest
//! version ever recorded (the bumped version), and what is currently published
//! (the version under the `latest` pointer plus the build that shipped it).

use super::environment::{Environment, sort_environments};
use super::parser::{AppLedger, VersionLedger};
use super::tag::BuildOutcome;
use semver::Version;
use serde::Serialize;
use tracing::warn;

/// Version currently under an environment's latest pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedVersion {
  pub version: Version,
  pub build_id: Option<u64>,
  pub commit: String,
}

/// Read-only view over a ledger
pub struct VersionResolver<'a> {
  ledger: &'a VersionLedger,
}

impl<'a> VersionResolver<'a> {
  pub fn new(ledger: &'a VersionLedger) -> Self {
    Self { ledger }
  }

  fn app(&self, app_id: &str) -> Option<&'a AppLedger> {
    self.ledger.app(app_id)
  }

  /// Environments known for an app: configured ones plus any seen in its tags
  pub fn environments(&self, app_id: &str, configured: &[Environment]) -> Vec<Environment> {
    let mut envs: Vec<Environment> = configured.to_vec();
    envs.push(Environment::main());
    if let Some(app) = self.app(app_id) {
      envs.extend(app.versions.values().map(Environment::of_version));
      envs.extend(app.latest_markers.iter().map(|(env, _)| env.clone()));
    }
    sort_environments(envs)
  }

  /// All versions of an environment in precedence order, baseline included
  pub fn sorted_versions(&self, app_id: &str, env: &Environment) -> Vec<Version> {
    let mut versions: Vec<Version> = self
      .app(app_id)
      .map(|app| {
        app
          .versions
          .values()
          .filter(|v| &Environment::of_version(v) == env)
          .cloned()
          .collect()
      })
      .unwrap_or_default();
    versions.extend(env.baseline());

    versions.sort_by(|a, b| a.cmp_precedence(b));
    versions.dedup_by(|a, b| a.cmp_precedence(b).is_eq());
    versions
  }

  /// Highest-precedence version recorded for the environment
  pub fn bumped_version(&self, app_id: &str, env: &Environment) -> Option<Version> {
    self.sorted_versions(app_id, env).pop()
  }

  /// Whether a version is backed by a real tag (not the synthetic baseline)
  pub fn is_tagged(&self, app_id: &str, version: &Version) -> bool {
    self.app(app_id).is_some_and(|app| app.has_version(version))
  }

  /// Version under the environment's latest pointer, paired with its build id
  ///
  /// When several commits carry the pointer the last one in listing order wins.
  pub fn published_version(&self, app_id: &str, env: &Environment) -> Option<PublishedVersion> {
    let app = self.app(app_id)?;
    let markers: Vec<&String> = app
      .latest_markers
      .iter()
      .filter(|(e, _)| e == env)
      .map(|(_, commit)| commit)
      .collect();

    if markers.len() > 1 {
      warn!(app = app_id, env = %env, count = markers.len(), "multiple commits claim latest; using the last one");
    }

    let mut published = None;
    for commit in markers {
      let best = app
        .versions_on(commit, env)
        .into_iter()
        .max_by(|a, b| a.cmp_precedence(b));
      if let Some(version) = best {
        published = Some(PublishedVersion {
          version: version.clone(),
          build_id: self.published_build_id(commit, env),
          commit: commit.clone(),
        });
      }
    }
    published
  }

  /// Build that shipped a commit: highest passed build for the environment,
  /// otherwise the highest build recorded for it.
  fn published_build_id(&self, commit: &str, env: &Environment) -> Option<u64> {
    let ids = self.ledger.commit_env_build_ids.get(commit)?.get(env)?;
    ids
      .iter()
      .rev()
      .find(|id| self.ledger.build_outcome(**id, env) == Some(BuildOutcome::Passed))
      .or_else(|| ids.iter().next_back())
      .copied()
  }
}
