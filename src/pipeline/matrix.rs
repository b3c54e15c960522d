//! Stage matrices
//!
//! A matrix is the set of entries one stage fans out to. Matrices are pure
//! functions of the resolved config and the pre-setup output, so CI renderers
//! and the stage jobs themselves always compute the same membership.

use crate::core::config::{ResolvedConfig, StageEntry, TestPolicy};
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::output::PreSetupOutput;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Matrix stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Test,
  Build,
  Publish,
}

impl Stage {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_lowercase().as_str() {
      "test" => Some(Self::Test),
      "build" => Some(Self::Build),
      "publish" => Some(Self::Publish),
      _ => None,
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Test => write!(f, "test"),
      Stage::Build => write!(f, "build"),
      Stage::Publish => write!(f, "publish"),
    }
  }
}

/// One job of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
  pub id: String,
  pub app_ids: Vec<String>,
  pub run: String,
}

fn is_enabled(config: &ResolvedConfig, app_id: &str) -> bool {
  config.app(app_id).is_some_and(|a| a.enabled)
}

/// Tests relevant to the releasing apps, or the always-run tests when nothing releases
pub fn test_matrix(config: &ResolvedConfig, output: &PreSetupOutput) -> Vec<MatrixEntry> {
  config
    .tests
    .iter()
    .filter_map(|test| {
      let app_ids: Vec<String> = test
        .app_ids
        .iter()
        .filter(|id| is_enabled(config, id))
        .cloned()
        .collect();
      if app_ids.is_empty() {
        return None;
      }

      let selected = if output.has_release {
        app_ids.iter().any(|id| output.releases.contains_key(id))
      } else {
        test.policy == TestPolicy::Always
      };

      selected.then(|| MatrixEntry {
        id: test.id.clone(),
        app_ids,
        run: test.run.clone(),
      })
    })
    .collect()
}

fn release_entries(config: &ResolvedConfig, entries: &[StageEntry], output: &PreSetupOutput) -> Vec<MatrixEntry> {
  entries
    .iter()
    .filter(|e| is_enabled(config, &e.app_id) && output.releases.contains_key(&e.app_id))
    .map(|e| MatrixEntry {
      id: e.id.clone(),
      app_ids: vec![e.app_id.clone()],
      run: e.run.clone(),
    })
    .collect()
}

/// Build entries of the releasing apps
pub fn build_matrix(config: &ResolvedConfig, output: &PreSetupOutput) -> Vec<MatrixEntry> {
  release_entries(config, &config.builds, output)
}

/// Publish entries of the releasing apps; empty once test or build failed
pub fn publish_matrix(
  config: &ResolvedConfig,
  output: &PreSetupOutput,
  test_outcome: StageOutcome,
  build_outcome: StageOutcome,
) -> Vec<MatrixEntry> {
  if !test_outcome.is_ok() || !build_outcome.is_ok() {
    return Vec::new();
  }
  release_entries(config, &config.publishes, output)
}

/// Matrix of a stage, assuming earlier stages succeeded
pub fn matrix_for(stage: Stage, config: &ResolvedConfig, output: &PreSetupOutput) -> Vec<MatrixEntry> {
  match stage {
    Stage::Test => test_matrix(config, output),
    Stage::Build => build_matrix(config, output),
    Stage::Publish => publish_matrix(config, output, StageOutcome::Ok, StageOutcome::Ok),
  }
}
