//! Ports for reading and mutating the tag namespace
//!
//! All tag mutations of a run go through [`TagWriter`]. Reads go through
//! [`TagSource`], which returns the remote listing as an ordered event log.
//!
//! - **git**: system git backed store (`ls-remote`, `tag -f`, `push --force`)
//! - **memory**: in-memory store with a recorded call log, used by tests

pub mod git;
pub mod memory;

use crate::core::error::RailResult;
use serde::{Deserialize, Serialize};

pub use git::GitTags;
pub use memory::{MemoryTags, WriteCall};

/// One line of a remote tag listing: `<commit> refs/tags/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEvent {
  pub commit: String,
  pub ref_name: String,
}

impl TagEvent {
  pub fn new(commit: impl Into<String>, ref_name: impl Into<String>) -> Self {
    Self {
      commit: commit.into(),
      ref_name: ref_name.into(),
    }
  }

  /// Event for a tag name without the `refs/tags/` prefix
  pub fn tag(commit: impl Into<String>, name: &str) -> Self {
    Self::new(commit, format!("refs/tags/{}", name))
  }

  pub fn tag_name(&self) -> &str {
    self.ref_name.strip_prefix("refs/tags/").unwrap_or(&self.ref_name)
  }
}

/// Source of the remote tag listing
pub trait TagSource {
  fn list_tags(&self) -> RailResult<Vec<TagEvent>>;
}

/// The single mutation port for the tag namespace
pub trait TagWriter {
  /// Commit the current run is operating on
  fn head_commit(&self) -> RailResult<String>;

  /// Create or move a tag locally
  fn force_tag(&self, name: &str, commit: &str) -> RailResult<()>;

  /// Force-push the named tags to the remote
  fn push_tags(&self, names: &[String]) -> RailResult<()>;
}

/// Combined read/write access to one tag namespace
pub trait TagStore: TagSource + TagWriter {}

impl<T: TagSource + TagWriter> TagStore for T {}
