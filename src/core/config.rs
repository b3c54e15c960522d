//! Repository configuration (rail.toml)
//!
//! The file is deserialized into [`RailConfigFile`], whose fields are all
//! optional. A [`ConfigBuilder`] accumulates the file plus any overrides and
//! `resolve()` validates everything up front and produces an immutable
//! [`ResolvedConfig`]. Every configuration error surfaces there, before any
//! tag is read or written.
//!
//! # Example rail.toml
//!
//! ```toml
//! [repository]
//! main_branch = "main"
//! environments = ["beta"]
//!
//! [[apps]]
//! id = "core"
//! main_release = true
//!
//! [[apps]]
//! id = "web"
//! name = "Web Frontend"
//!
//! [[tests]]
//! id = "unit"
//! apps = ["core", "web"]
//! policy = "always"
//! run = "cargo test --workspace"
//!
//! [[builds]]
//! id = "web-dist"
//! app = "web"
//! run = "npm run build"
//!
//! [[publishes]]
//! id = "web-cdn"
//! app = "web"
//! run = "./scripts/publish.sh"
//! ```

use crate::core::error::{ConfigError, RailError, RailResult, ResultExt};
use crate::ledger::{Environment, LedgerScope};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const RESERVED_APP_IDS: [&str; 2] = ["build", "latest"];

/// Raw configuration as written in rail.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RailConfigFile {
  #[serde(default)]
  pub repository: RepositoryConfig,
  #[serde(default)]
  pub apps: Vec<AppConfig>,
  #[serde(default)]
  pub tests: Vec<TestConfig>,
  #[serde(default)]
  pub builds: Vec<StageEntryConfig>,
  #[serde(default)]
  pub publishes: Vec<StageEntryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
  /// Branch whose releases form the main channel (default: "main")
  #[serde(default)]
  pub main_branch: Option<String>,
  /// Remote whose tags are the ledger (default: "origin")
  #[serde(default)]
  pub remote: Option<String>,
  /// Prerelease channels that always appear, even without tags
  #[serde(default)]
  pub environments: Vec<String>,
  /// Where build outputs and release archives live (default: ".rail/output")
  #[serde(default)]
  pub output_dir: Option<PathBuf>,
  /// Draft release backend (default: none)
  #[serde(default)]
  pub release_host: Option<ReleaseHostKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub main_release: bool,
  #[serde(default)]
  pub enabled: Option<bool>,
}

impl AppConfig {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: None,
      main_release: false,
      enabled: None,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn main_release(mut self) -> Self {
    self.main_release = true;
    self
  }

  pub fn disabled(mut self) -> Self {
    self.enabled = Some(false);
    self
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
  pub id: String,
  #[serde(default)]
  pub apps: Vec<String>,
  #[serde(default)]
  pub policy: Option<TestPolicy>,
  pub run: String,
}

impl TestConfig {
  pub fn new(id: impl Into<String>, apps: &[&str], run: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      apps: apps.iter().map(|a| a.to_string()).collect(),
      policy: None,
      run: run.into(),
    }
  }

  pub fn always(mut self) -> Self {
    self.policy = Some(TestPolicy::Always);
    self
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEntryConfig {
  pub id: String,
  pub app: String,
  pub run: String,
}

impl StageEntryConfig {
  pub fn new(id: impl Into<String>, app: impl Into<String>, run: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      app: app.into(),
      run: run.into(),
    }
  }
}

/// When a test entry joins the test matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPolicy {
  /// Only when one of its apps has a pending release
  #[default]
  OnRelease,
  /// Also on runs without any pending release
  Always,
}

/// Draft release backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseHostKind {
  /// Log only
  #[default]
  None,
  /// GitHub releases through the `gh` CLI
  Github,
}

/// One configured releasable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
  pub id: String,
  pub name: String,
  pub main_release: bool,
  pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEntry {
  pub id: String,
  pub app_ids: Vec<String>,
  pub policy: TestPolicy,
  pub run: String,
}

/// Build or publish entry bound to one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
  pub id: String,
  pub app_id: String,
  pub run: String,
}

/// Validated, immutable configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
  pub main_branch: String,
  pub remote: String,
  pub environments: Vec<Environment>,
  pub output_dir: PathBuf,
  pub release_host: ReleaseHostKind,
  pub apps: Vec<AppEntry>,
  pub tests: Vec<TestEntry>,
  pub builds: Vec<StageEntry>,
  pub publishes: Vec<StageEntry>,
}

impl ResolvedConfig {
  /// Scope for reading the tag namespace
  pub fn scope(&self) -> LedgerScope {
    LedgerScope::new(
      self.apps.iter().map(|a| a.id.clone()).collect(),
      self.main_app().map(|a| a.id.clone()),
      self.main_branch.clone(),
    )
  }

  pub fn main_app(&self) -> Option<&AppEntry> {
    self.apps.iter().find(|a| a.main_release)
  }

  pub fn app(&self, id: &str) -> Option<&AppEntry> {
    self.apps.iter().find(|a| a.id == id)
  }

  /// App by id, or `ConfigError::AppNotFound`
  pub fn require_app(&self, id: &str) -> RailResult<&AppEntry> {
    self
      .app(id)
      .ok_or_else(|| RailError::Config(ConfigError::AppNotFound { id: id.to_string() }))
  }

  pub fn enabled_apps(&self) -> impl Iterator<Item = &AppEntry> {
    self.apps.iter().filter(|a| a.enabled)
  }

  pub fn environment_for_branch(&self, branch: &str) -> Environment {
    Environment::from_branch(branch, &self.main_branch)
  }
}

/// Accumulates optional settings; `resolve()` validates and freezes them
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
  main_branch: Option<String>,
  remote: Option<String>,
  environments: Vec<String>,
  output_dir: Option<PathBuf>,
  release_host: Option<ReleaseHostKind>,
  apps: Vec<AppConfig>,
  tests: Vec<TestConfig>,
  builds: Vec<StageEntryConfig>,
  publishes: Vec<StageEntryConfig>,
}

impl ConfigBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Find config file in search order: rail.toml, .rail.toml, .cargo/rail.toml, .config/rail.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("rail.toml"),
      path.join(".rail.toml"),
      path.join(".cargo").join("rail.toml"),
      path.join(".config").join("rail.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load rail.toml (searches multiple locations) into a builder
  pub fn load(path: &Path) -> RailResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      RailError::Config(ConfigError::NotFound {
        workspace_root: path.to_path_buf(),
      })
    })?;

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    Self::parse(&content).with_context(|| format!("Failed to parse config from {}", config_path.display()))
  }

  /// Parse rail.toml content into a builder
  pub fn parse(content: &str) -> RailResult<Self> {
    let file: RailConfigFile = toml_edit::de::from_str(content)?;
    Ok(Self::from_file(file))
  }

  pub fn from_file(file: RailConfigFile) -> Self {
    Self {
      main_branch: file.repository.main_branch,
      remote: file.repository.remote,
      environments: file.repository.environments,
      output_dir: file.repository.output_dir,
      release_host: file.repository.release_host,
      apps: file.apps,
      tests: file.tests,
      builds: file.builds,
      publishes: file.publishes,
    }
  }

  pub fn main_branch(mut self, branch: impl Into<String>) -> Self {
    self.main_branch = Some(branch.into());
    self
  }

  pub fn remote(mut self, remote: impl Into<String>) -> Self {
    self.remote = Some(remote.into());
    self
  }

  pub fn environment(mut self, key: impl Into<String>) -> Self {
    self.environments.push(key.into());
    self
  }

  pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.output_dir = Some(dir.into());
    self
  }

  pub fn release_host(mut self, host: ReleaseHostKind) -> Self {
    self.release_host = Some(host);
    self
  }

  pub fn app(mut self, app: AppConfig) -> Self {
    self.apps.push(app);
    self
  }

  pub fn test(mut self, test: TestConfig) -> Self {
    self.tests.push(test);
    self
  }

  pub fn build(mut self, entry: StageEntryConfig) -> Self {
    self.builds.push(entry);
    self
  }

  pub fn publish(mut self, entry: StageEntryConfig) -> Self {
    self.publishes.push(entry);
    self
  }

  /// Apply defaults, validate, and freeze
  pub fn resolve(self) -> RailResult<ResolvedConfig> {
    let apps = resolve_apps(self.apps)?;
    let known: HashSet<&str> = apps.iter().map(|a| a.id.as_str()).collect();

    let mut test_ids = HashSet::new();
    let mut tests = Vec::with_capacity(self.tests.len());
    for test in self.tests {
      if !test_ids.insert(test.id.clone()) {
        return Err(duplicate_entry("test", &test.id));
      }
      if let Some(missing) = test.apps.iter().find(|a| !known.contains(a.as_str())) {
        return Err(unknown_app(&test.id, missing));
      }
      tests.push(TestEntry {
        id: test.id,
        app_ids: test.apps,
        policy: test.policy.unwrap_or_default(),
        run: test.run,
      });
    }

    let builds = resolve_stage_entries("build", self.builds, &known)?;
    let publishes = resolve_stage_entries("publish", self.publishes, &known)?;

    let mut environments = Vec::with_capacity(self.environments.len());
    for key in self.environments {
      let env = Environment::named(&key);
      if env.is_main() || !env.is_valid() {
        return Err(RailError::Config(ConfigError::InvalidEnvironment { key }));
      }
      environments.push(env);
    }

    Ok(ResolvedConfig {
      main_branch: self.main_branch.unwrap_or_else(|| "main".to_string()),
      remote: self.remote.unwrap_or_else(|| "origin".to_string()),
      environments,
      output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".rail/output")),
      release_host: self.release_host.unwrap_or_default(),
      apps,
      tests,
      builds,
      publishes,
    })
  }
}

fn resolve_apps(apps: Vec<AppConfig>) -> RailResult<Vec<AppEntry>> {
  let main_ids: Vec<String> = apps.iter().filter(|a| a.main_release).map(|a| a.id.clone()).collect();
  if main_ids.len() > 1 {
    return Err(RailError::Config(ConfigError::MultipleMainRelease { app_ids: main_ids }));
  }

  let mut seen = HashSet::new();
  let mut entries = Vec::with_capacity(apps.len());
  for (index, app) in apps.into_iter().enumerate() {
    let id = app.id.trim().to_string();
    if id.is_empty() {
      return Err(RailError::Config(ConfigError::EmptyAppId { index }));
    }
    if id.contains('/') || RESERVED_APP_IDS.contains(&id.as_str()) {
      return Err(RailError::Config(ConfigError::ReservedAppId { id }));
    }
    if !seen.insert(id.clone()) {
      return Err(RailError::Config(ConfigError::DuplicateAppId { id }));
    }
    entries.push(AppEntry {
      name: app.name.unwrap_or_else(|| id.clone()),
      id,
      main_release: app.main_release,
      enabled: app.enabled.unwrap_or(true),
    });
  }
  Ok(entries)
}

fn resolve_stage_entries(
  stage: &str,
  entries: Vec<StageEntryConfig>,
  known: &HashSet<&str>,
) -> RailResult<Vec<StageEntry>> {
  let mut ids = HashSet::new();
  let mut resolved = Vec::with_capacity(entries.len());
  for entry in entries {
    if !ids.insert(entry.id.clone()) {
      return Err(duplicate_entry(stage, &entry.id));
    }
    if !known.contains(entry.app.as_str()) {
      return Err(unknown_app(&entry.id, &entry.app));
    }
    resolved.push(StageEntry {
      id: entry.id,
      app_id: entry.app,
      run: entry.run,
    });
  }
  Ok(resolved)
}

fn unknown_app(entry: &str, app_id: &str) -> RailError {
  RailError::Config(ConfigError::UnknownAppReference {
    entry: entry.to_string(),
    app_id: app_id.to_string(),
  })
}

fn duplicate_entry(stage: &str, id: &str) -> RailError {
  RailError::Config(ConfigError::DuplicateEntryId {
    stage: stage.to_string(),
    id: id.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config_error(result: RailResult<ResolvedConfig>) -> ConfigError {
    match result {
      Err(RailError::Config(e)) => e,
      other => panic!("expected config error, got {:?}", other),
    }
  }

  #[test]
  fn test_defaults_applied() {
    let config = ConfigBuilder::new().app(AppConfig::new("core")).resolve().unwrap();
    assert_eq!(config.main_branch, "main");
    assert_eq!(config.remote, "origin");
    assert_eq!(config.output_dir, PathBuf::from(".rail/output"));
    assert_eq!(config.release_host, ReleaseHostKind::None);
    assert_eq!(config.apps[0].name, "core");
    assert!(config.apps[0].enabled);
    assert!(config.main_app().is_none());
  }

  #[test]
  fn test_two_main_release_apps_rejected() {
    let err = config_error(
      ConfigBuilder::new()
        .app(AppConfig::new("a").main_release())
        .app(AppConfig::new("b").main_release())
        .resolve(),
    );
    assert_eq!(
      err,
      ConfigError::MultipleMainRelease {
        app_ids: vec!["a".into(), "b".into()]
      }
    );
  }

  #[test]
  fn test_empty_and_duplicate_ids_rejected() {
    let err = config_error(ConfigBuilder::new().app(AppConfig::new("  ")).resolve());
    assert_eq!(err, ConfigError::EmptyAppId { index: 0 });

    let err = config_error(
      ConfigBuilder::new()
        .app(AppConfig::new("core"))
        .app(AppConfig::new("core"))
        .resolve(),
    );
    assert_eq!(err, ConfigError::DuplicateAppId { id: "core".into() });
  }

  #[test]
  fn test_reserved_ids_rejected() {
    let err = config_error(ConfigBuilder::new().app(AppConfig::new("latest")).resolve());
    assert_eq!(err, ConfigError::ReservedAppId { id: "latest".into() });
    let err = config_error(ConfigBuilder::new().app(AppConfig::new("a/b")).resolve());
    assert_eq!(err, ConfigError::ReservedAppId { id: "a/b".into() });
  }

  #[test]
  fn test_dangling_test_reference_rejected() {
    let err = config_error(
      ConfigBuilder::new()
        .app(AppConfig::new("core"))
        .test(TestConfig::new("unit", &["core", "ghost"], "true"))
        .resolve(),
    );
    assert_eq!(
      err,
      ConfigError::UnknownAppReference {
        entry: "unit".into(),
        app_id: "ghost".into()
      }
    );
  }

  #[test]
  fn test_invalid_environment_rejected() {
    let err = config_error(
      ConfigBuilder::new()
        .app(AppConfig::new("core"))
        .environment("01")
        .resolve(),
    );
    assert_eq!(err, ConfigError::InvalidEnvironment { key: "01".into() });
  }

  #[test]
  fn test_parse_toml() {
    let content = r#"
[repository]
main_branch = "master"
environments = ["Beta"]
release_host = "github"

[[apps]]
id = "core"
main_release = true

[[apps]]
id = "web"
name = "Web"
enabled = false

[[tests]]
id = "unit"
apps = ["core"]
policy = "always"
run = "cargo test"

[[builds]]
id = "web-dist"
app = "web"
run = "make dist"
"#;
    let config = ConfigBuilder::parse(content).unwrap().resolve().unwrap();
    assert_eq!(config.main_branch, "master");
    assert_eq!(config.environments, vec![Environment::named("beta")]);
    assert_eq!(config.release_host, ReleaseHostKind::Github);
    assert_eq!(config.main_app().unwrap().id, "core");
    assert!(!config.app("web").unwrap().enabled);
    assert_eq!(config.tests[0].policy, TestPolicy::Always);
    assert_eq!(config.builds[0].app_id, "web");
    assert_eq!(config.scope().main_branch, "master");
  }

  #[test]
  fn test_overrides_win_over_file() {
    let file = RailConfigFile {
      repository: RepositoryConfig {
        main_branch: Some("master".into()),
        ..Default::default()
      },
      apps: vec![AppConfig::new("core")],
      ..Default::default()
    };
    let config = ConfigBuilder::from_file(file).main_branch("trunk").resolve().unwrap();
    assert_eq!(config.main_branch, "trunk");
  }
}
