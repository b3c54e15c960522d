//! Build id allocation
//!
//! Build ids are global across apps and environments. A new run always takes
//! one more than the highest id ever observed, so ids are never reused even
//! when earlier runs failed.

use super::parser::VersionLedger;
use crate::core::error::{PipelineError, RailResult};
use serde::{Deserialize, Serialize};

/// Lower bound used to scope release notes for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonBuild {
  /// Smallest previously published build id among releasing apps, 0 if none
  pub build_id: u64,
  /// No releasing app has been published before
  pub is_first_release: bool,
}

/// `1 + max(observed build ids)`, or 1 on an empty ledger
pub fn next_build_id(ledger: &VersionLedger) -> RailResult<u64> {
  match ledger.max_build_id() {
    None => Ok(1),
    Some(max) => max
      .checked_add(1)
      .ok_or_else(|| PipelineError::BuildIdExhausted { max }.into()),
  }
}

/// Minimum previously published build id across the apps releasing this run
///
/// Apps without a published build are ignored; if none has one the run counts
/// as a first release and the comparison id is 0.
pub fn comparison_build_id(previous: impl IntoIterator<Item = Option<u64>>) -> ComparisonBuild {
  match previous.into_iter().flatten().min() {
    Some(build_id) => ComparisonBuild {
      build_id,
      is_first_release: false,
    },
    None => ComparisonBuild {
      build_id: 0,
      is_first_release: true,
    },
  }
}
