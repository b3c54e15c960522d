//! Ledger folding: raw tag listing → structured release state
//!
//! The ledger is a pure, best-effort fold over an ordered list of
//! [`TagEvent`]s. Malformed tags are skipped, later duplicates of a canonical
//! version overwrite earlier ones (force-push), and the first commit seen for
//! a build id keeps it.

use super::environment::Environment;
use super::tag::{self, BuildOutcome, LedgerScope, TagKind, VersionFlags};
use crate::tags::TagEvent;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

const TAG_REF_PREFIX: &str = "refs/tags/";
const PEEL_SUFFIX: &str = "^{}";

/// Versions and published pointers of one app
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppLedger {
  /// commit → versions tagged on it
  pub commit_versions: BTreeMap<String, BTreeSet<Version>>,
  /// commit → environments whose latest pointer sits on it
  pub commit_latest: BTreeMap<String, BTreeSet<Environment>>,
  /// latest pointers in listing order
  pub latest_markers: Vec<(Environment, String)>,
  /// canonical version → commit (last write wins)
  pub version_commits: BTreeMap<String, String>,
  /// canonical version → parsed version
  pub versions: BTreeMap<String, Version>,
  /// canonical version → accumulated markers
  pub flags: BTreeMap<String, VersionFlags>,
}

impl AppLedger {
  pub fn has_version(&self, version: &Version) -> bool {
    self.versions.contains_key(&version.to_string())
  }

  pub fn flags_of(&self, version: &Version) -> VersionFlags {
    self.flags.get(&version.to_string()).copied().unwrap_or_default()
  }

  /// Versions on a commit that belong to an environment
  pub fn versions_on(&self, commit: &str, env: &Environment) -> Vec<&Version> {
    self
      .commit_versions
      .get(commit)
      .map(|set| set.iter().filter(|v| &Environment::of_version(v) == env).collect())
      .unwrap_or_default()
  }
}

/// Release state reconstructed from the tag namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLedger {
  /// commit → every build id marked on it
  pub commit_build_ids: BTreeMap<String, BTreeSet<u64>>,
  /// commit → environment → build ids scoped to that environment
  pub commit_env_build_ids: BTreeMap<String, BTreeMap<Environment, BTreeSet<u64>>>,
  /// build id → commit (first seen wins)
  pub build_id_commits: BTreeMap<u64, String>,
  /// (build id, environment) → recorded outcome
  pub build_outcomes: BTreeMap<(u64, Environment), BuildOutcome>,
  /// app id → app-scoped state
  pub apps: BTreeMap<String, AppLedger>,
}

impl VersionLedger {
  /// Fold an ordered tag listing into a ledger
  pub fn fold(events: &[TagEvent], scope: &LedgerScope) -> Self {
    let mut ledger = Self::default();
    for app in &scope.app_ids {
      ledger.apps.entry(app.clone()).or_default();
    }

    // Annotated tags are listed twice; the peeled line names the real commit.
    let peeled: HashMap<&str, &str> = events
      .iter()
      .filter_map(|e| {
        let name = e.ref_name.strip_prefix(TAG_REF_PREFIX)?.strip_suffix(PEEL_SUFFIX)?;
        Some((name, e.commit.as_str()))
      })
      .collect();

    for event in events {
      let Some(name) = event.ref_name.strip_prefix(TAG_REF_PREFIX) else {
        debug!(ref_name = %event.ref_name, "skipping non-tag ref");
        continue;
      };
      if name.ends_with(PEEL_SUFFIX) {
        continue;
      }
      let commit = peeled.get(name).copied().unwrap_or(event.commit.as_str());
      ledger.apply(name, commit, scope);
    }

    ledger
  }

  fn apply(&mut self, name: &str, commit: &str, scope: &LedgerScope) {
    match tag::classify(name, scope) {
      TagKind::Build { id, env, outcome } => {
        self.commit_build_ids.entry(commit.to_string()).or_default().insert(id);
        self.build_id_commits.entry(id).or_insert_with(|| commit.to_string());
        if let Some(env) = env {
          if let Some(outcome) = outcome {
            self.build_outcomes.insert((id, env.clone()), outcome);
          }
          self
            .commit_env_build_ids
            .entry(commit.to_string())
            .or_default()
            .entry(env)
            .or_default()
            .insert(id);
        }
      }
      TagKind::Latest { app, env } => {
        let app = self.apps.entry(app).or_default();
        app.commit_latest.entry(commit.to_string()).or_default().insert(env.clone());
        app.latest_markers.push((env, commit.to_string()));
      }
      TagKind::Version { app, version, flags } => {
        let canonical = version.to_string();
        let app = self.apps.entry(app).or_default();
        app
          .commit_versions
          .entry(commit.to_string())
          .or_default()
          .insert(version.clone());
        app.version_commits.insert(canonical.clone(), commit.to_string());
        app.versions.insert(canonical.clone(), version);
        app.flags.entry(canonical).or_default().merge(flags);
      }
      TagKind::Unrecognized => {
        debug!(tag = name, "skipping unrecognized tag");
      }
    }
  }

  pub fn app(&self, app_id: &str) -> Option<&AppLedger> {
    self.apps.get(app_id)
  }

  /// Highest build id on a commit scoped to an environment
  pub fn max_env_build_id(&self, commit: &str, env: &Environment) -> Option<u64> {
    self
      .commit_env_build_ids
      .get(commit)
      .and_then(|envs| envs.get(env))
      .and_then(|ids| ids.iter().next_back().copied())
  }

  /// Highest build id observed anywhere
  pub fn max_build_id(&self) -> Option<u64> {
    self.build_id_commits.keys().next_back().copied()
  }

  pub fn commit_of_build(&self, id: u64) -> Option<&str> {
    self.build_id_commits.get(&id).map(String::as_str)
  }

  pub fn build_outcome(&self, id: u64, env: &Environment) -> Option<BuildOutcome> {
    self.build_outcomes.get(&(id, env.clone())).copied()
  }
}
