//! Additional operations for SystemGit (tags, remotes, commit walking)

use super::system_git::SystemGit;
use super::{CommitInfo, History};
use crate::core::error::{GitError, RailError, RailResult, ResultExt};

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

impl SystemGit {
  /// List tags on a remote as `(commit, ref name)` pairs, in listing order
  ///
  /// Annotated tags appear twice; the `^{}` line carries the peeled commit.
  pub fn list_remote_tags(&self, remote: &str) -> RailResult<Vec<(String, String)>> {
    let stdout = self.run(&["ls-remote", "--tags", remote], "git ls-remote --tags")?;
    Ok(parse_ls_remote(&stdout))
  }

  /// Create or move a lightweight tag
  pub fn force_tag(&self, name: &str, commit: &str) -> RailResult<()> {
    self.run(&["tag", "--force", name, commit], "git tag --force")?;
    Ok(())
  }

  /// Force-push the named tags to a remote
  pub fn push_tags(&self, remote: &str, names: &[String]) -> RailResult<()> {
    if names.is_empty() {
      return Ok(());
    }

    let refspecs: Vec<String> = names.iter().map(|n| format!("refs/tags/{0}:refs/tags/{0}", n)).collect();

    let output = self
      .git_cmd()
      .args(["push", "--force", remote])
      .args(&refspecs)
      .output()
      .context("Failed to push tags")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RailError::Git(GitError::PushFailed {
        remote: remote.to_string(),
        reason: stderr.to_string(),
      }));
    }

    Ok(())
  }

  /// Get commits in `from..to` (or all of `to`), oldest first
  pub fn log_between(&self, from: Option<&str>, to: &str) -> RailResult<Vec<CommitInfo>> {
    let range = match from {
      Some(from) => format!("{}..{}", from, to),
      None => to.to_string(),
    };
    let format = format!("--format=%H{}%B{}", FIELD_SEP, RECORD_SEP);
    let stdout = self.run(&["log", "--reverse", "--no-merges", &format, &range], "git log")?;
    Ok(parse_log(&stdout))
  }
}

impl History for SystemGit {
  fn commits_between(&self, from: Option<&str>, to: &str) -> RailResult<Vec<CommitInfo>> {
    self.log_between(from, to)
  }
}

/// Parse `git ls-remote` output: `<sha>\t<ref>` per line
fn parse_ls_remote(output: &str) -> Vec<(String, String)> {
  output
    .lines()
    .filter_map(|line| {
      let (sha, name) = line.split_once(char::is_whitespace)?;
      let name = name.trim();
      if sha.is_empty() || name.is_empty() {
        return None;
      }
      Some((sha.to_string(), name.to_string()))
    })
    .collect()
}

/// Parse `git log` records separated by RS, fields by US
fn parse_log(output: &str) -> Vec<CommitInfo> {
  output
    .split(RECORD_SEP)
    .filter_map(|record| {
      let (sha, message) = record.split_once(FIELD_SEP)?;
      let sha = sha.trim();
      if sha.is_empty() {
        return None;
      }
      Some(CommitInfo {
        sha: sha.to_string(),
        message: message.trim().to_string(),
      })
    })
    .collect()
}
