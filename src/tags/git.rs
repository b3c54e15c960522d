//! Tag store backed by a local clone and its remote

use super::{TagEvent, TagSource, TagWriter};
use crate::core::error::RailResult;
use crate::core::vcs::{CommitInfo, History, SystemGit};
use tracing::info;

/// Reads the remote listing, writes local tags and force-pushes them
pub struct GitTags {
  git: SystemGit,
  remote: String,
}

impl GitTags {
  pub fn new(git: SystemGit, remote: impl Into<String>) -> Self {
    Self {
      git,
      remote: remote.into(),
    }
  }

  pub fn git(&self) -> &SystemGit {
    &self.git
  }
}

impl TagSource for GitTags {
  fn list_tags(&self) -> RailResult<Vec<TagEvent>> {
    let pairs = self.git.list_remote_tags(&self.remote)?;
    Ok(pairs.into_iter().map(|(commit, name)| TagEvent::new(commit, name)).collect())
  }
}

impl TagWriter for GitTags {
  fn head_commit(&self) -> RailResult<String> {
    self.git.head_commit()
  }

  fn force_tag(&self, name: &str, commit: &str) -> RailResult<()> {
    info!(tag = name, commit, "tagging");
    self.git.force_tag(name, commit)
  }

  fn push_tags(&self, names: &[String]) -> RailResult<()> {
    info!(remote = %self.remote, count = names.len(), "force-pushing tags");
    self.git.push_tags(&self.remote, names)
  }
}

impl History for GitTags {
  fn commits_between(&self, from: Option<&str>, to: &str) -> RailResult<Vec<CommitInfo>> {
    self.git.commits_between(from, to)
  }
}
