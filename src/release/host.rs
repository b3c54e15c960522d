//! Draft release containers
//!
//! PreSetup opens a draft keyed by the run's `build.<id>` tag. PostSetup either
//! publishes it or deletes it, depending on the publish outcome.

use crate::core::config::ReleaseHostKind;
use crate::core::error::{RailError, RailResult, ResultExt};
use crate::ledger::tag::build_tag;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// External host for draft releases
pub trait ReleaseHost {
  fn create_draft(&self, build_id: u64, title: &str, notes: &str) -> RailResult<()>;
  fn delete_draft(&self, build_id: u64) -> RailResult<()>;
  fn publish_draft(&self, build_id: u64) -> RailResult<()>;
}

/// Host used when no release host is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl ReleaseHost for NoopHost {
  fn create_draft(&self, build_id: u64, title: &str, _notes: &str) -> RailResult<()> {
    info!(build_id, title, "no release host configured, skipping draft");
    Ok(())
  }

  fn delete_draft(&self, build_id: u64) -> RailResult<()> {
    info!(build_id, "no release host configured, nothing to delete");
    Ok(())
  }

  fn publish_draft(&self, build_id: u64) -> RailResult<()> {
    info!(build_id, "no release host configured, nothing to publish");
    Ok(())
  }
}

/// GitHub releases through the `gh` CLI
///
/// Authentication is whatever `gh` is already configured with (`GH_TOKEN` in CI).
#[derive(Debug, Clone)]
pub struct GhCliHost {
  work_dir: PathBuf,
}

impl GhCliHost {
  pub fn new(work_dir: &Path) -> Self {
    Self {
      work_dir: work_dir.to_path_buf(),
    }
  }

  fn gh(&self, args: &[&str]) -> RailResult<()> {
    let output = Command::new("gh")
      .current_dir(&self.work_dir)
      .args(args)
      .output()
      .context("Failed to execute gh; is the GitHub CLI installed?")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RailError::with_help(
        format!("gh {} failed: {}", args.first().copied().unwrap_or_default(), stderr.trim()),
        "Check that GH_TOKEN is set and has permission to manage releases.",
      ));
    }
    Ok(())
  }
}

impl ReleaseHost for GhCliHost {
  fn create_draft(&self, build_id: u64, title: &str, notes: &str) -> RailResult<()> {
    let tag = build_tag(build_id);
    info!(%tag, title, "creating draft release");
    self.gh(&[
      "release", "create", &tag, "--draft", "--verify-tag", "--title", title, "--notes", notes,
    ])
  }

  fn delete_draft(&self, build_id: u64) -> RailResult<()> {
    let tag = build_tag(build_id);
    info!(%tag, "deleting draft release");
    // Keep the tag: it is part of the ledger
    self.gh(&["release", "delete", &tag, "--yes"])
  }

  fn publish_draft(&self, build_id: u64) -> RailResult<()> {
    let tag = build_tag(build_id);
    info!(%tag, "publishing draft release");
    self.gh(&["release", "edit", &tag, "--draft=false"])
  }
}

/// Host for a configured kind
pub fn host_for(kind: ReleaseHostKind, work_dir: &Path) -> Box<dyn ReleaseHost> {
  match kind {
    ReleaseHostKind::None => Box::new(NoopHost),
    ReleaseHostKind::Github => Box::new(GhCliHost::new(work_dir)),
  }
}
