//! Release channel keys
//!
//! An environment is either the main release channel (empty key) or a named
//! prerelease track whose key doubles as the first prerelease identifier of
//! every version released on it (`1.2.0-beta.3` lives on `beta`).

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Release channel key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment(String);

impl Environment {
  /// The main release channel
  pub fn main() -> Self {
    Self(String::new())
  }

  /// A named channel (key is lowercased)
  pub fn named(key: &str) -> Self {
    Self(key.to_lowercase())
  }

  /// Map a branch to its channel: the main branch is the main channel,
  /// any other branch is keyed by its sanitized name.
  pub fn from_branch(branch: &str, main_branch: &str) -> Self {
    if branch == main_branch {
      return Self::main();
    }
    let key: String = branch
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
      .collect();
    Self::named(&key)
  }

  /// Channel a version belongs to, from its first prerelease identifier
  pub fn of_version(version: &Version) -> Self {
    if version.pre.is_empty() {
      return Self::main();
    }
    Self::named(version.pre.as_str().split('.').next().unwrap_or_default())
  }

  pub fn key(&self) -> &str {
    &self.0
  }

  pub fn is_main(&self) -> bool {
    self.0.is_empty()
  }

  /// Synthetic lowest version so every channel has an entry before any tag exists
  ///
  /// `None` when the key cannot form a prerelease identifier.
  pub fn baseline(&self) -> Option<Version> {
    if self.is_main() {
      return Some(Version::new(0, 0, 0));
    }
    let pre = Prerelease::new(&format!("{}.0", self.0)).ok()?;
    Some(Version {
      major: 0,
      minor: 0,
      patch: 0,
      pre,
      build: BuildMetadata::EMPTY,
    })
  }

  /// Label used inside build tags (`build.7-main`)
  pub fn build_label<'a>(&'a self, main_branch: &'a str) -> &'a str {
    if self.is_main() { main_branch } else { &self.0 }
  }

  /// Suffix used by latest pointers (`latest`, `latest-beta`)
  pub fn latest_suffix(&self) -> String {
    if self.is_main() {
      String::new()
    } else {
      format!("-{}", self.0)
    }
  }

  /// Whether the key is a usable semver prerelease identifier
  pub fn is_valid(&self) -> bool {
    self.is_main() || self.baseline().is_some()
  }
}

impl fmt::Display for Environment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_main() {
      write!(f, "main")
    } else {
      write!(f, "{}", self.0)
    }
  }
}

/// Order channels for display and iteration: ascending by key, main last
pub fn sort_environments(mut envs: Vec<Environment>) -> Vec<Environment> {
  envs.sort();
  envs.dedup();
  if let Some(pos) = envs.iter().position(Environment::is_main) {
    let main = envs.remove(pos);
    envs.push(main);
  }
  envs
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sort_moves_main_last() {
    let sorted = sort_environments(vec![Environment::named("beta"), Environment::main(), Environment::named("alpha")]);
    let keys: Vec<&str> = sorted.iter().map(Environment::key).collect();
    assert_eq!(keys, vec!["alpha", "beta", ""]);
  }

  #[test]
  fn test_from_branch() {
    assert!(Environment::from_branch("main", "main").is_main());
    assert_eq!(Environment::from_branch("Beta", "main").key(), "beta");
    assert_eq!(Environment::from_branch("feature/login", "main").key(), "feature-login");
  }

  #[test]
  fn test_of_version() {
    let v = Version::parse("1.2.0-Beta.3").unwrap();
    assert_eq!(Environment::of_version(&v).key(), "beta");
    assert!(Environment::of_version(&Version::new(1, 0, 0)).is_main());
  }

  #[test]
  fn test_baseline() {
    assert_eq!(Environment::main().baseline().unwrap().to_string(), "0.0.0");
    assert_eq!(Environment::named("beta").baseline().unwrap().to_string(), "0.0.0-beta.0");
    assert!(Environment::named("01").baseline().is_none());
  }

  #[test]
  fn test_labels() {
    assert_eq!(Environment::main().build_label("main"), "main");
    assert_eq!(Environment::named("beta").build_label("main"), "beta");
    assert_eq!(Environment::main().latest_suffix(), "");
    assert_eq!(Environment::named("beta").latest_suffix(), "-beta");
  }
}
