//! Tag grammar: classification of raw tag names and formatting of new ones
//!
//! ```text
//! build.<uint>                     build marker
//! build.<uint>-<env>               environment-scoped build marker
//! build.<uint>-<env>-passed        stage outcome marker (also -failed)
//! [<appId>/]v<semver>[-<marker>]   version tag, marker in bump|queue|failed|passed
//! [<appId>/]latest[-<env>]         published pointer
//! ```
//!
//! The main release app owns every unprefixed version and latest tag. Inside
//! build tags the main environment is spelled with the main branch name.

use super::environment::Environment;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

const BUILD_PREFIX: &str = "build.";
const LATEST: &str = "latest";

/// Per-version marker carried as a tag suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
  Bump,
  Queue,
  Failed,
  Passed,
}

impl Marker {
  pub const ALL: [Marker; 4] = [Marker::Bump, Marker::Queue, Marker::Failed, Marker::Passed];

  pub fn suffix(&self) -> &'static str {
    match self {
      Marker::Bump => "-bump",
      Marker::Queue => "-queue",
      Marker::Failed => "-failed",
      Marker::Passed => "-passed",
    }
  }
}

/// Outcome recorded on an environment-scoped build marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildOutcome {
  Passed,
  Failed,
}

impl BuildOutcome {
  pub fn suffix(&self) -> &'static str {
    match self {
      BuildOutcome::Passed => "-passed",
      BuildOutcome::Failed => "-failed",
    }
  }
}

impl fmt::Display for BuildOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildOutcome::Passed => write!(f, "passed"),
      BuildOutcome::Failed => write!(f, "failed"),
    }
  }
}

/// Boolean markers observed for one canonical version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFlags {
  pub is_bump: bool,
  pub is_queue: bool,
  pub is_failed: bool,
  pub is_passed: bool,
}

impl VersionFlags {
  pub fn set(&mut self, marker: Marker) {
    match marker {
      Marker::Bump => self.is_bump = true,
      Marker::Queue => self.is_queue = true,
      Marker::Failed => self.is_failed = true,
      Marker::Passed => self.is_passed = true,
    }
  }

  pub fn merge(&mut self, other: VersionFlags) {
    self.is_bump |= other.is_bump;
    self.is_queue |= other.is_queue;
    self.is_failed |= other.is_failed;
    self.is_passed |= other.is_passed;
  }
}

/// Which apps and which main branch the tag namespace is read against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerScope {
  pub app_ids: Vec<String>,
  pub main_app: Option<String>,
  pub main_branch: String,
}

impl LedgerScope {
  pub fn new(app_ids: Vec<String>, main_app: Option<String>, main_branch: impl Into<String>) -> Self {
    Self {
      app_ids,
      main_app,
      main_branch: main_branch.into(),
    }
  }

  fn is_app(&self, id: &str) -> bool {
    self.app_ids.iter().any(|a| a == id)
  }

  fn is_main_app(&self, id: &str) -> bool {
    self.main_app.as_deref() == Some(id)
  }

  /// Environment named by a build tag label
  pub fn env_from_label(&self, label: &str) -> Environment {
    if label == self.main_branch {
      Environment::main()
    } else {
      Environment::named(label)
    }
  }

  /// Split an app prefix off a tag, falling back to the main release app
  fn owner<'t>(&self, tag: &'t str) -> Option<(String, &'t str)> {
    if let Some((prefix, rest)) = tag.split_once('/')
      && self.is_app(prefix)
    {
      return Some((prefix.to_string(), rest));
    }
    self.main_app.as_ref().map(|main| (main.clone(), tag))
  }
}

/// Classification of one tag name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
  Build {
    id: u64,
    env: Option<Environment>,
    outcome: Option<BuildOutcome>,
  },
  Latest {
    app: String,
    env: Environment,
  },
  Version {
    app: String,
    version: Version,
    flags: VersionFlags,
  },
  Unrecognized,
}

/// Classify a tag name (without the `refs/tags/` prefix)
pub fn classify(tag: &str, scope: &LedgerScope) -> TagKind {
  if let Some(kind) = classify_build(tag, scope) {
    return kind;
  }
  if let Some(kind) = classify_latest(tag, scope) {
    return kind;
  }
  classify_version(tag, scope).unwrap_or(TagKind::Unrecognized)
}

fn classify_build(tag: &str, scope: &LedgerScope) -> Option<TagKind> {
  let rest = tag.strip_prefix(BUILD_PREFIX)?;
  let (digits, tail) = match rest.split_once('-') {
    Some((digits, tail)) => (digits, Some(tail)),
    None => (rest, None),
  };
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  let id = digits.parse::<u64>().ok()?;

  let Some(tail) = tail else {
    return Some(TagKind::Build {
      id,
      env: None,
      outcome: None,
    });
  };

  let (label, outcome) = [BuildOutcome::Passed, BuildOutcome::Failed]
    .into_iter()
    .find_map(|o| tail.strip_suffix(o.suffix()).map(|label| (label, Some(o))))
    .unwrap_or((tail, None));

  if label.is_empty() {
    return None;
  }

  Some(TagKind::Build {
    id,
    env: Some(scope.env_from_label(label)),
    outcome,
  })
}

fn classify_latest(tag: &str, scope: &LedgerScope) -> Option<TagKind> {
  let (app, rest) = match tag.split_once('/') {
    Some((prefix, rest)) if scope.is_app(prefix) => (prefix.to_string(), rest),
    Some(_) => return None,
    None => (scope.main_app.clone()?, tag),
  };

  let suffix = rest.strip_prefix(LATEST)?;
  let env = if suffix.is_empty() {
    Environment::main()
  } else {
    let key = suffix.strip_prefix('-')?;
    if key.is_empty() {
      return None;
    }
    Environment::named(key)
  };

  Some(TagKind::Latest { app, env })
}

fn classify_version(tag: &str, scope: &LedgerScope) -> Option<TagKind> {
  let (app, rest) = scope.owner(tag)?;

  let mut canonical = rest;
  let mut flags = VersionFlags::default();
  for marker in Marker::ALL {
    if let Some(stripped) = canonical.strip_suffix(marker.suffix()) {
      canonical = stripped;
      flags.set(marker);
    }
  }

  let canonical = canonical
    .strip_prefix('v')
    .or_else(|| canonical.strip_prefix('V'))
    .unwrap_or(canonical);
  let version = Version::parse(canonical).ok()?;

  Some(TagKind::Version { app, version, flags })
}

fn app_prefix(scope: &LedgerScope, app: &str) -> String {
  if scope.is_main_app(app) {
    String::new()
  } else {
    format!("{}/", app)
  }
}

/// `build.<id>`
pub fn build_tag(id: u64) -> String {
  format!("{}{}", BUILD_PREFIX, id)
}

/// `build.<id>-<env>`
pub fn build_env_tag(id: u64, env: &Environment, scope: &LedgerScope) -> String {
  format!("{}{}-{}", BUILD_PREFIX, id, env.build_label(&scope.main_branch))
}

/// `build.<id>-<env>-passed` / `-failed`
pub fn build_outcome_tag(id: u64, env: &Environment, outcome: BuildOutcome, scope: &LedgerScope) -> String {
  format!("{}{}", build_env_tag(id, env, scope), outcome.suffix())
}

/// `[<app>/]v<version>[-<marker>]`
pub fn version_tag(scope: &LedgerScope, app: &str, version: &Version, marker: Option<Marker>) -> String {
  format!(
    "{}v{}{}",
    app_prefix(scope, app),
    version,
    marker.map(|m| m.suffix()).unwrap_or_default()
  )
}

/// `[<app>/]latest[-<env>]`
pub fn latest_tag(scope: &LedgerScope, app: &str, env: &Environment) -> String {
  format!("{}{}{}", app_prefix(scope, app), LATEST, env.latest_suffix())
}
