//! The pre-setup output
//!
//! PreSetup decides everything a run needs and freezes it into this JSON
//! payload. Every later stage reads the payload instead of the ledger, so all
//! stages of a run agree even if other runs move tags in between.

use crate::core::error::{PipelineError, RailError, RailResult, ResultExt};
use crate::ledger::Environment;
use crate::pipeline::trigger::TriggerKind;
use crate::release::ReleaseCandidate;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One app released by the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
  pub app_id: String,
  pub app_name: String,
  pub environment: Environment,
  pub version: Version,
}

impl From<&ReleaseCandidate> for ReleaseInfo {
  fn from(candidate: &ReleaseCandidate) -> Self {
    Self {
      app_id: candidate.app.id.clone(),
      app_name: candidate.app.name.clone(),
      environment: candidate.environment.clone(),
      version: candidate.version.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreSetupOutput {
  pub branch: String,
  pub trigger_type: TriggerKind,
  pub environment: Environment,
  pub has_release: bool,
  pub release_notes: String,
  pub is_first_release: bool,
  /// Build id allocated for this run
  pub build_id: u64,
  /// Comparison build id the release notes start from (0 on first release)
  pub last_build_id: u64,
  /// Keyed by app id
  pub releases: BTreeMap<String, ReleaseInfo>,
}

impl PreSetupOutput {
  pub fn release(&self, app_id: &str) -> Option<&ReleaseInfo> {
    self.releases.get(app_id)
  }

  pub fn to_json(&self) -> RailResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn from_json(content: &str) -> RailResult<Self> {
    serde_json::from_str(content).context("Invalid pre-setup output")
  }

  pub fn save(&self, path: &Path) -> RailResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, self.to_json()?).with_context(|| format!("Failed to write {}", path.display()))
  }

  pub fn load(path: &Path) -> RailResult<Self> {
    if !path.exists() {
      return Err(RailError::Pipeline(PipelineError::MissingPreSetupOutput {
        path: path.to_path_buf(),
      }));
    }
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Self::from_json(&content)
  }
}
