//! Repository context - build once, pass everywhere
//!
//! `RepoContext::build` locates the repository root, loads rail.toml and
//! resolves it. Commands receive the context by reference and open the tag and
//! release-host ports from it, so a configuration error always stops a command
//! before any port exists.

use crate::core::config::{ConfigBuilder, ResolvedConfig};
use crate::core::error::RailResult;
use crate::core::vcs::SystemGit;
use crate::pipeline::trigger::{Trigger, TriggerKind};
use crate::release::{ReleaseHost, host_for};
use crate::tags::GitTags;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct RepoContext {
  /// Working tree root (absolute)
  pub root: PathBuf,

  /// Resolved configuration; `output_dir` is absolute
  pub config: Arc<ResolvedConfig>,
}

impl RepoContext {
  /// Build the context for the repository containing `start`
  pub fn build(start: &Path) -> RailResult<Self> {
    let git = SystemGit::open(start)?;
    let root = git.work_tree().to_path_buf();
    let mut config = ConfigBuilder::load(&root)?.resolve()?;
    config.output_dir = root.join(&config.output_dir);
    debug!(root = %root.display(), apps = config.apps.len(), "loaded configuration");

    Ok(Self {
      root,
      config: Arc::new(config),
    })
  }

  /// Tag store over the configured remote
  pub fn tags(&self) -> RailResult<GitTags> {
    Ok(GitTags::new(SystemGit::open(&self.root)?, self.config.remote.clone()))
  }

  pub fn host(&self) -> Box<dyn ReleaseHost> {
    host_for(self.config.release_host, &self.root)
  }

  /// Trigger from CI variables, falling back to a commit on the current branch
  pub fn trigger(&self) -> RailResult<Trigger> {
    if let Some(trigger) = Trigger::detect(|key| std::env::var(key).ok(), &self.config.main_branch) {
      debug!(branch = %trigger.branch, kind = %trigger.kind, "detected trigger");
      return Ok(trigger);
    }
    let branch = SystemGit::open(&self.root)?.current_branch()?;
    Ok(Trigger::new(branch, TriggerKind::Commit))
  }
}
