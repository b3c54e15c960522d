//! Trigger metadata supplied by the invoking CI vendor
//!
//! The trigger decides which environment a run belongs to and whether it may
//! release at all (only tag pushes release). Detection reads environment
//! variables through a lookup function so vendors can be simulated in tests.

use crate::ledger::{Environment, Marker};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What started the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
  Commit,
  Tag,
  PullRequest,
}

impl TriggerKind {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "commit" | "push" => Some(Self::Commit),
      "tag" => Some(Self::Tag),
      "pull_request" | "pullrequest" | "pr" => Some(Self::PullRequest),
      _ => None,
    }
  }
}

impl fmt::Display for TriggerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TriggerKind::Commit => write!(f, "commit"),
      TriggerKind::Tag => write!(f, "tag"),
      TriggerKind::PullRequest => write!(f, "pull_request"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
  pub branch: String,
  pub kind: TriggerKind,
  pub pr_number: Option<u64>,
}

impl Trigger {
  pub fn new(branch: impl Into<String>, kind: TriggerKind) -> Self {
    Self {
      branch: branch.into(),
      kind,
      pr_number: None,
    }
  }

  /// Detect the trigger from CI variables; `None` when no vendor is recognized
  ///
  /// `RAIL_BRANCH` / `RAIL_TRIGGER` override whatever the vendor reports.
  pub fn detect(lookup: impl Fn(&str) -> Option<String>, main_branch: &str) -> Option<Self> {
    let detected = detect_github(&lookup, main_branch).or_else(|| detect_azure(&lookup, main_branch));

    let branch_override = lookup("RAIL_BRANCH").filter(|b| !b.is_empty());
    let kind_override = lookup("RAIL_TRIGGER").and_then(|k| TriggerKind::parse(&k));

    match (detected, branch_override, kind_override) {
      (Some(mut trigger), branch, kind) => {
        if let Some(branch) = branch {
          trigger.branch = branch;
        }
        if let Some(kind) = kind {
          trigger.kind = kind;
        }
        Some(trigger)
      }
      (None, Some(branch), kind) => Some(Self::new(branch, kind.unwrap_or(TriggerKind::Commit))),
      (None, None, _) => None,
    }
  }
}

fn detect_github(lookup: &impl Fn(&str) -> Option<String>, main_branch: &str) -> Option<Trigger> {
  let git_ref = lookup("GITHUB_REF")?;
  let event = lookup("GITHUB_EVENT_NAME").unwrap_or_default();

  if event.starts_with("pull_request") {
    let branch = lookup("GITHUB_BASE_REF")
      .or_else(|| lookup("GITHUB_HEAD_REF"))
      .unwrap_or_else(|| main_branch.to_string());
    let pr_number = git_ref
      .strip_prefix("refs/pull/")
      .and_then(|rest| rest.split('/').next())
      .and_then(|n| n.parse().ok());
    return Some(Trigger {
      branch,
      kind: TriggerKind::PullRequest,
      pr_number,
    });
  }

  let is_tag = lookup("GITHUB_REF_TYPE").is_some_and(|t| t == "tag") || git_ref.starts_with("refs/tags/");
  let name = lookup("GITHUB_REF_NAME").unwrap_or_else(|| short_ref(&git_ref).to_string());
  if is_tag {
    return Some(Trigger::new(branch_for_tag(&name, main_branch), TriggerKind::Tag));
  }
  Some(Trigger::new(name, TriggerKind::Commit))
}

fn detect_azure(lookup: &impl Fn(&str) -> Option<String>, main_branch: &str) -> Option<Trigger> {
  let source = lookup("BUILD_SOURCEBRANCH")?;

  if lookup("BUILD_REASON").is_some_and(|r| r == "PullRequest") {
    let branch = lookup("SYSTEM_PULLREQUEST_TARGETBRANCH")
      .map(|b| short_ref(&b).to_string())
      .unwrap_or_else(|| main_branch.to_string());
    return Some(Trigger {
      branch,
      kind: TriggerKind::PullRequest,
      pr_number: lookup("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER").and_then(|n| n.parse().ok()),
    });
  }

  if let Some(tag) = source.strip_prefix("refs/tags/") {
    return Some(Trigger::new(branch_for_tag(tag, main_branch), TriggerKind::Tag));
  }
  Some(Trigger::new(short_ref(&source), TriggerKind::Commit))
}

fn short_ref(git_ref: &str) -> &str {
  git_ref
    .strip_prefix("refs/heads/")
    .or_else(|| git_ref.strip_prefix("refs/tags/"))
    .unwrap_or(git_ref)
}

/// Branch a pushed tag releases on
///
/// A tag push carries no branch, so the channel is read from the tag's version:
/// a prerelease identifier names the branch, anything else is the main branch.
pub fn branch_for_tag(tag: &str, main_branch: &str) -> String {
  let name = tag.rsplit('/').next().unwrap_or(tag);
  let mut canonical = name;
  for marker in Marker::ALL {
    if let Some(stripped) = canonical.strip_suffix(marker.suffix()) {
      canonical = stripped;
    }
  }
  let canonical = canonical.strip_prefix('v').unwrap_or(canonical);

  match Version::parse(canonical) {
    Ok(version) => {
      let env = Environment::of_version(&version);
      if env.is_main() {
        main_branch.to_string()
      } else {
        env.key().to_string()
      }
    }
    Err(_) => main_branch.to_string(),
  }
}
