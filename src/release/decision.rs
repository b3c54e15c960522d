//! Release decisions for one trigger
//!
//! An app releases on a run iff the run was started by a tag push and the
//! highest recorded version of its environment differs from what the
//! environment's latest pointer publishes.

use crate::core::config::{AppEntry, ResolvedConfig};
use crate::ledger::{Environment, PublishedVersion, VersionLedger, VersionResolver};
use crate::pipeline::trigger::{Trigger, TriggerKind};
use semver::Version;
use serde::Serialize;
use tracing::debug;

/// An app selected for release this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseCandidate {
  pub app: AppEntry,
  pub environment: Environment,
  pub version: Version,
  /// What the environment published before this run
  pub previous: Option<PublishedVersion>,
}

/// Per-app view used by the decision and by `tag-rail version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppState {
  pub app_id: String,
  pub environment: Environment,
  pub bumped: Option<Version>,
  pub published: Option<PublishedVersion>,
}

impl AppState {
  /// Bumped version differs from the published one
  pub fn is_pending(&self) -> bool {
    match (&self.bumped, &self.published) {
      (Some(bumped), Some(published)) => bumped.cmp_precedence(&published.version).is_ne(),
      (Some(_), None) => true,
      (None, _) => false,
    }
  }
}

/// Outcome of the decision step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDecision {
  pub environment: Environment,
  pub candidates: Vec<ReleaseCandidate>,
}

impl ReleaseDecision {
  pub fn has_release(&self) -> bool {
    !self.candidates.is_empty()
  }

  pub fn candidate(&self, app_id: &str) -> Option<&ReleaseCandidate> {
    self.candidates.iter().find(|c| c.app.id == app_id)
  }
}

/// Bumped and published state of an app in an environment
///
/// An environment without tags still has its baseline as bumped version, so a
/// never-published app is pending until its first release lands.
pub fn app_state(ledger: &VersionLedger, app_id: &str, env: &Environment) -> AppState {
  let resolver = VersionResolver::new(ledger);
  AppState {
    app_id: app_id.to_string(),
    environment: env.clone(),
    bumped: resolver.bumped_version(app_id, env),
    published: resolver.published_version(app_id, env),
  }
}

/// Decide which enabled apps release for this trigger
pub fn decide(config: &ResolvedConfig, ledger: &VersionLedger, trigger: &Trigger) -> ReleaseDecision {
  let environment = config.environment_for_branch(&trigger.branch);
  let mut candidates = Vec::new();

  for app in config.enabled_apps() {
    let state = app_state(ledger, &app.id, &environment);
    let pending = trigger.kind == TriggerKind::Tag && state.is_pending();
    debug!(
      app = %app.id,
      env = %environment,
      bumped = ?state.bumped.as_ref().map(ToString::to_string),
      published = ?state.published.as_ref().map(|p| p.version.to_string()),
      pending,
      "release decision"
    );

    if let (true, Some(version)) = (pending, state.bumped) {
      candidates.push(ReleaseCandidate {
        app: app.clone(),
        environment: environment.clone(),
        version,
        previous: state.published,
      });
    }
  }

  ReleaseDecision {
    environment,
    candidates,
  }
}
