//! Release notes from conventional commits
//!
//! Notes are generated once in PreSetup, frozen into the pre-setup output and
//! used verbatim as the draft release body. Commits that don't follow the
//! conventional format still show up, under "Other".

use crate::core::vcs::CommitInfo;
use crate::release::decision::ReleaseCandidate;
use std::collections::BTreeMap;
use std::fmt;

/// A parsed conventional commit
///
/// Format: `<type>(<scope>): <description>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConventionalCommit {
  pub commit_type: CommitType,
  pub scope: Option<String>,
  pub description: String,
  pub body: Option<String>,
  /// `BREAKING CHANGE:` footer, empty when only `!` was used
  pub breaking_change: Option<String>,
}

/// Conventional commit types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitType {
  Feat,
  Fix,
  Perf,
  Docs,
  Refactor,
  Test,
  Build,
  Ci,
  Chore,
  Style,
  Revert,
  Other,
}

impl CommitType {
  pub fn parse(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "feat" | "feature" => Self::Feat,
      "fix" => Self::Fix,
      "perf" | "performance" => Self::Perf,
      "docs" | "doc" => Self::Docs,
      "refactor" => Self::Refactor,
      "test" | "tests" => Self::Test,
      "build" => Self::Build,
      "ci" => Self::Ci,
      "chore" => Self::Chore,
      "style" => Self::Style,
      "revert" => Self::Revert,
      _ => Self::Other,
    }
  }

  pub fn display_name(&self) -> &'static str {
    match self {
      Self::Feat => "Features",
      Self::Fix => "Bug Fixes",
      Self::Perf => "Performance",
      Self::Docs => "Documentation",
      Self::Refactor => "Refactoring",
      Self::Test => "Tests",
      Self::Build => "Build",
      Self::Ci => "CI",
      Self::Chore => "Chores",
      Self::Style => "Style",
      Self::Revert => "Reverts",
      Self::Other => "Other",
    }
  }
}

impl fmt::Display for CommitType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.display_name())
  }
}

impl ConventionalCommit {
  pub fn is_breaking(&self) -> bool {
    self.breaking_change.is_some()
  }

  /// Parse a commit message; `None` if the subject isn't conventional
  pub fn parse(message: &str) -> Option<Self> {
    use winnow::ascii::{alphanumeric1, space0};
    use winnow::combinator::{opt, preceded, terminated};
    use winnow::prelude::*;
    use winnow::token::take_till;

    let (subject, rest) = message.split_once('\n').unwrap_or((message, ""));

    let mut parser = (
      alphanumeric1::<_, ()>.map(CommitType::parse),
      opt(preceded('(', terminated(take_till(1.., ')'), ')'))),
      opt('!'),
      ':',
      space0,
      take_till(0.., ['\n', '\r']),
    );

    let Ok((commit_type, scope, bang, _, _, description)) = parser.parse(subject.trim_end()) else {
      return None;
    };

    let mut body_lines = Vec::new();
    let mut breaking_change = None;
    let mut seen_empty_line = false;

    for line in rest.lines() {
      let trimmed = line.trim();
      if trimmed.is_empty() {
        seen_empty_line = true;
        continue;
      }

      // Footers only follow a blank line
      if seen_empty_line && let Some((key, value)) = trimmed.split_once(':') {
        let key = key.trim();
        if key.eq_ignore_ascii_case("BREAKING CHANGE") || key.eq_ignore_ascii_case("BREAKING-CHANGE") {
          breaking_change = Some(value.trim().to_string());
          continue;
        }
        if key.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
          continue;
        }
      }

      if breaking_change.is_none() {
        body_lines.push(line);
        seen_empty_line = false;
      }
    }

    if breaking_change.is_none() && bang.is_some() {
      breaking_change = Some(String::new());
    }

    Some(Self {
      commit_type,
      scope: scope.map(|s: &str| s.to_string()),
      description: description.trim().to_string(),
      body: (!body_lines.is_empty()).then(|| body_lines.join("\n")),
      breaking_change,
    })
  }

  /// Parse, falling back to an `Other` entry with the subject as description
  fn parse_lenient(message: &str) -> Option<Self> {
    Self::parse(message).or_else(|| {
      let subject = message.lines().next().unwrap_or_default().trim();
      (!subject.is_empty()).then(|| Self {
        commit_type: CommitType::Other,
        scope: None,
        description: subject.to_string(),
        body: None,
        breaking_change: None,
      })
    })
  }
}

/// Heading line for one released app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseHeading {
  pub app_name: String,
  pub version: String,
  pub environment: String,
}

/// Release notes covering every app released in one run
#[derive(Debug, Clone)]
pub struct ReleaseNotes {
  pub date: String,
  pub is_first_release: bool,
  pub headings: Vec<ReleaseHeading>,
  pub commits_by_type: BTreeMap<CommitType, Vec<ConventionalCommit>>,
  pub commit_count: usize,
}

impl ReleaseNotes {
  /// Group `commits` (oldest first) under a heading per release
  pub fn generate(commits: &[CommitInfo], releases: &[ReleaseCandidate], is_first_release: bool) -> Self {
    let mut commits_by_type: BTreeMap<CommitType, Vec<ConventionalCommit>> = BTreeMap::new();
    for commit in commits.iter().rev() {
      if let Some(parsed) = ConventionalCommit::parse_lenient(&commit.message) {
        commits_by_type.entry(parsed.commit_type).or_default().push(parsed);
      }
    }

    let headings = releases
      .iter()
      .map(|c| ReleaseHeading {
        app_name: c.app.name.clone(),
        version: c.version.to_string(),
        environment: c.environment.to_string(),
      })
      .collect();

    Self {
      date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
      is_first_release,
      headings,
      commits_by_type,
      commit_count: commits.len(),
    }
  }

  /// At least one feat/fix/perf or breaking commit
  pub fn has_user_facing_changes(&self) -> bool {
    self.commits_by_type.iter().any(|(t, commits)| {
      matches!(t, CommitType::Feat | CommitType::Fix | CommitType::Perf) || commits.iter().any(|c| c.is_breaking())
    })
  }

  pub fn to_markdown(&self) -> String {
    let mut output = String::new();

    for heading in &self.headings {
      output.push_str(&format!(
        "## {} {} ({}) - {}\n",
        heading.app_name, heading.version, heading.environment, self.date
      ));
    }
    if !self.headings.is_empty() {
      output.push('\n');
    }

    if self.is_first_release {
      output.push_str("### Initial release\n\n");
    }

    // BTreeMap order follows the enum: features first, other last
    for (commit_type, commits) in &self.commits_by_type {
      output.push_str(&format!("### {}\n\n", commit_type.display_name()));
      for commit in commits {
        let scope = commit.scope.as_ref().map(|s| format!("**{}**: ", s)).unwrap_or_default();
        output.push_str(&format!("- {}{}\n", scope, commit.description));
        match commit.breaking_change.as_deref() {
          Some("") => output.push_str("  - **BREAKING CHANGE**\n"),
          Some(breaking) => output.push_str(&format!("  - **BREAKING**: {}\n", breaking)),
          None => {}
        }
      }
      output.push('\n');
    }

    if self.commits_by_type.is_empty() && !self.is_first_release {
      output.push_str("No notable changes.\n");
    }

    output
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::AppEntry;
  use crate::ledger::Environment;
  use semver::Version;

  fn commit(sha: &str, message: &str) -> CommitInfo {
    CommitInfo {
      sha: sha.to_string(),
      message: message.to_string(),
    }
  }

  fn candidate(name: &str, version: &str) -> ReleaseCandidate {
    ReleaseCandidate {
      app: AppEntry {
        id: name.to_lowercase(),
        name: name.to_string(),
        main_release: false,
        enabled: true,
      },
      environment: Environment::main(),
      version: Version::parse(version).unwrap(),
      previous: None,
    }
  }

  #[test]
  fn test_parse_simple_commit() {
    let commit = ConventionalCommit::parse("feat: add new feature").unwrap();
    assert_eq!(commit.commit_type, CommitType::Feat);
    assert_eq!(commit.scope, None);
    assert_eq!(commit.description, "add new feature");
    assert!(!commit.is_breaking());
  }

  #[test]
  fn test_parse_commit_with_scope_and_body() {
    let commit = ConventionalCommit::parse("fix(auth): resolve login issue\n\nSession tokens expired early.").unwrap();
    assert_eq!(commit.commit_type, CommitType::Fix);
    assert_eq!(commit.scope.as_deref(), Some("auth"));
    assert_eq!(commit.body.as_deref(), Some("Session tokens expired early."));
  }

  #[test]
  fn test_parse_breaking_change() {
    let footer = ConventionalCommit::parse("feat: redesign\n\nBREAKING CHANGE: API redesigned").unwrap();
    assert_eq!(footer.breaking_change.as_deref(), Some("API redesigned"));

    let bang = ConventionalCommit::parse("refactor(core)!: drop v1 tags").unwrap();
    assert_eq!(bang.breaking_change.as_deref(), Some(""));
  }

  #[test]
  fn test_parse_non_conventional() {
    assert_eq!(ConventionalCommit::parse("This is not conventional"), None);
    assert_eq!(ConventionalCommit::parse("feat missing colon"), None);
  }

  #[test]
  fn test_notes_group_by_type_under_release_heading() {
    let commits = vec![
      commit("a", "feat(web): dark mode"),
      commit("b", "fix: crash on start"),
      commit("c", "Merge something odd"),
      commit("d", "feat: export csv"),
    ];
    let notes = ReleaseNotes::generate(&commits, &[candidate("Core", "1.1.0")], false);
    let md = notes.to_markdown();

    assert!(md.starts_with("## Core 1.1.0 (main) - "));
    let features = md.find("### Features").unwrap();
    let fixes = md.find("### Bug Fixes").unwrap();
    let other = md.find("### Other").unwrap();
    assert!(features < fixes && fixes < other);
    // Newest first within a section
    assert!(md.find("export csv").unwrap() < md.find("**web**: dark mode").unwrap());
    assert!(!md.contains("Initial release"));
    assert!(notes.has_user_facing_changes());
    assert_eq!(notes.commit_count, 4);
  }

  #[test]
  fn test_first_release_heading() {
    let notes = ReleaseNotes::generate(&[commit("a", "chore: init")], &[candidate("Core", "0.1.0")], true);
    let md = notes.to_markdown();
    assert!(md.contains("### Initial release"));
    assert!(md.contains("### Chores"));
    assert!(!notes.has_user_facing_changes());
  }

  #[test]
  fn test_empty_range() {
    let md = ReleaseNotes::generate(&[], &[], false).to_markdown();
    assert_eq!(md, "No notable changes.\n");
  }
}
