//! In-memory tag namespace
//!
//! Models a local clone plus its remote: `force_tag` changes the local tag
//! set, `push_tags` copies named local tags to the remote listing. The remote
//! listing is an ordered event log where moving a tag removes its old line and
//! appends a new one, which is what a real `ls-remote` shows after a force-push.

use super::{TagEvent, TagSource, TagWriter};
use crate::core::error::{RailError, RailResult};
use crate::core::vcs::{CommitInfo, History};
use std::sync::{Mutex, MutexGuard};

/// A recorded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
  Tag { name: String, commit: String },
  Push { names: Vec<String> },
}

#[derive(Debug, Default)]
struct State {
  remote: Vec<TagEvent>,
  local: Vec<TagEvent>,
  calls: Vec<WriteCall>,
}

/// In-memory [`TagSource`] + [`TagWriter`] + [`History`]
#[derive(Debug)]
pub struct MemoryTags {
  head: String,
  commits: Vec<CommitInfo>,
  state: Mutex<State>,
}

impl MemoryTags {
  pub fn new(head: impl Into<String>) -> Self {
    Self {
      head: head.into(),
      commits: Vec::new(),
      state: Mutex::new(State::default()),
    }
  }

  /// Seed the remote with existing tags (`(commit, tag name)`)
  pub fn with_tags(self, tags: &[(&str, &str)]) -> Self {
    {
      let mut state = self.lock();
      for (commit, name) in tags {
        let event = TagEvent::tag(*commit, name);
        state.remote.push(event.clone());
        state.local.push(event);
      }
    }
    self
  }

  /// Seed the commit history (oldest first)
  pub fn with_commits(mut self, commits: Vec<CommitInfo>) -> Self {
    self.commits = commits;
    self
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Every mutation made so far, in order
  pub fn write_calls(&self) -> Vec<WriteCall> {
    self.lock().calls.clone()
  }

  /// Names currently on the remote
  pub fn remote_tag_names(&self) -> Vec<String> {
    self.lock().remote.iter().map(|e| e.tag_name().to_string()).collect()
  }

  /// Commit a remote tag points at
  pub fn remote_commit(&self, name: &str) -> Option<String> {
    self
      .lock()
      .remote
      .iter()
      .find(|e| e.tag_name() == name)
      .map(|e| e.commit.clone())
  }
}

fn upsert(events: &mut Vec<TagEvent>, event: TagEvent) {
  events.retain(|e| e.ref_name != event.ref_name);
  events.push(event);
}

impl TagSource for MemoryTags {
  fn list_tags(&self) -> RailResult<Vec<TagEvent>> {
    Ok(self.lock().remote.clone())
  }
}

impl TagWriter for MemoryTags {
  fn head_commit(&self) -> RailResult<String> {
    Ok(self.head.clone())
  }

  fn force_tag(&self, name: &str, commit: &str) -> RailResult<()> {
    let mut state = self.lock();
    state.calls.push(WriteCall::Tag {
      name: name.to_string(),
      commit: commit.to_string(),
    });
    upsert(&mut state.local, TagEvent::tag(commit, name));
    Ok(())
  }

  fn push_tags(&self, names: &[String]) -> RailResult<()> {
    let mut state = self.lock();
    state.calls.push(WriteCall::Push { names: names.to_vec() });
    for name in names {
      let event = state
        .local
        .iter()
        .find(|e| e.tag_name() == name)
        .cloned()
        .ok_or_else(|| RailError::message(format!("Tag '{}' does not exist locally", name)))?;
      upsert(&mut state.remote, event);
    }
    Ok(())
  }
}

impl History for MemoryTags {
  fn commits_between(&self, from: Option<&str>, to: &str) -> RailResult<Vec<CommitInfo>> {
    let end = self
      .commits
      .iter()
      .position(|c| c.sha == to)
      .map_or(self.commits.len(), |i| i + 1);
    let start = from
      .and_then(|sha| self.commits.iter().position(|c| c.sha == sha))
      .map_or(0, |i| i + 1);
    Ok(self.commits.get(start..end).map(<[CommitInfo]>::to_vec).unwrap_or_default())
  }
}
