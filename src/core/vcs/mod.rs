pub mod system_git;
mod system_git_ops;

use crate::core::error::RailResult;

pub use system_git::SystemGit;

/// Information about a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
  pub sha: String,
  pub message: String,
}

/// Commit history used to scope release notes
pub trait History {
  /// Commits reachable from `to` but not from `from`, oldest first
  ///
  /// `from = None` means the whole history up to `to`.
  fn commits_between(&self, from: Option<&str>, to: &str) -> RailResult<Vec<CommitInfo>>;
}
