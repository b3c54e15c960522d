//! Stage outcome normalization
//!
//! CI vendors spell job results differently (`success`, `Succeeded`,
//! `failure`, `cancelled`, `SucceededWithIssues`, ...). Everything is folded
//! into [`StageOutcome`] at the boundary; only an exact success spelling is Ok.

use crate::ledger::BuildOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
  Ok,
  Error,
}

impl StageOutcome {
  /// Map a vendor result string; anything but success is an error
  pub fn normalize(raw: &str) -> Self {
    match raw.trim().to_lowercase().as_str() {
      "success" | "succeeded" => StageOutcome::Ok,
      _ => StageOutcome::Error,
    }
  }

  /// Ok iff every member is Ok (an empty matrix succeeds)
  pub fn all(outcomes: impl IntoIterator<Item = StageOutcome>) -> Self {
    if outcomes.into_iter().all(|o| o == StageOutcome::Ok) {
      StageOutcome::Ok
    } else {
      StageOutcome::Error
    }
  }

  pub fn is_ok(&self) -> bool {
    *self == StageOutcome::Ok
  }

  /// Spelling written back to CI (`success` / `failure`)
  pub fn as_result(&self) -> &'static str {
    match self {
      StageOutcome::Ok => "success",
      StageOutcome::Error => "failure",
    }
  }
}

impl From<StageOutcome> for BuildOutcome {
  fn from(outcome: StageOutcome) -> Self {
    match outcome {
      StageOutcome::Ok => BuildOutcome::Passed,
      StageOutcome::Error => BuildOutcome::Failed,
    }
  }
}

impl fmt::Display for StageOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageOutcome::Ok => write!(f, "ok"),
      StageOutcome::Error => write!(f, "error"),
    }
  }
}
