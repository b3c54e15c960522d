//! Pipeline stage coordinator
//!
//! Drives `PreSetup -> Test -> Build -> Publish -> PostSetup` for one run.
//! PreSetup is the only stage that reads the ledger; it freezes its decisions
//! into [`PreSetupOutput`]. PostSetup records the run's outcome back into the
//! tag namespace: a passed release moves version and latest tags, every other
//! run only marks its build as passed or failed.

use crate::core::config::ResolvedConfig;
use crate::core::error::{PipelineError, RailError, RailResult};
use crate::core::vcs::History;
use crate::ledger::tag::{build_env_tag, build_outcome_tag, build_tag, latest_tag, version_tag};
use crate::ledger::{BuildOutcome, VersionLedger, comparison_build_id, next_build_id};
use crate::pipeline::matrix::{self, MatrixEntry, Stage};
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::output::{PreSetupOutput, ReleaseInfo};
use crate::pipeline::runner::StageRunner;
use crate::pipeline::trigger::Trigger;
use crate::release::archive::archive_release;
use crate::release::{ReleaseHost, ReleaseNotes, decide};
use crate::tags::TagStore;
use rayon::prelude::*;
use std::fmt;
use tracing::{info, warn};

/// Where a run is in the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  PreSetup,
  Test,
  Build,
  Publish,
  PostSetup,
  Completed,
  Failed,
}

impl PipelineState {
  /// Move past the current stage given its outcome
  ///
  /// Test and Build failures still lead on to Publish and PostSetup so the run
  /// can clean up. Only PreSetup aborts the run outright.
  pub fn advance(self, outcome: StageOutcome) -> RailResult<Self> {
    let next = match (self, outcome) {
      (PipelineState::PreSetup, StageOutcome::Ok) => PipelineState::Test,
      (PipelineState::PreSetup, StageOutcome::Error) => PipelineState::Failed,
      (PipelineState::Test, _) => PipelineState::Build,
      (PipelineState::Build, _) => PipelineState::Publish,
      (PipelineState::Publish, _) => PipelineState::PostSetup,
      (PipelineState::PostSetup, StageOutcome::Ok) => PipelineState::Completed,
      (PipelineState::PostSetup, StageOutcome::Error) => PipelineState::Failed,
      (PipelineState::Completed | PipelineState::Failed, _) => {
        return Err(RailError::Pipeline(PipelineError::InvalidTransition {
          from: self.to_string(),
          to: "next stage".to_string(),
        }));
      }
    };
    info!(from = %self, to = %next, %outcome, "pipeline transition");
    Ok(next)
  }
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PipelineState::PreSetup => "pre-setup",
      PipelineState::Test => "test",
      PipelineState::Build => "build",
      PipelineState::Publish => "publish",
      PipelineState::PostSetup => "post-setup",
      PipelineState::Completed => "completed",
      PipelineState::Failed => "failed",
    };
    write!(f, "{}", name)
  }
}

/// Normalized results of the matrix stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageResults {
  pub test: StageOutcome,
  pub build: StageOutcome,
  pub publish: StageOutcome,
}

impl StageResults {
  /// Parse vendor result strings
  pub fn from_vendor(test: &str, build: &str, publish: &str) -> Self {
    Self {
      test: StageOutcome::normalize(test),
      build: StageOutcome::normalize(build),
      publish: StageOutcome::normalize(publish),
    }
  }

  /// Outcome PostSetup branches on; a skipped publish never counts as passed
  pub fn release_outcome(&self) -> StageOutcome {
    StageOutcome::all([self.test, self.build, self.publish])
  }

  /// Outcome of a run that releases nothing
  pub fn verification_outcome(&self) -> StageOutcome {
    StageOutcome::all([self.test, self.build])
  }
}

/// Summary of an in-process run
#[derive(Debug, Clone)]
pub struct PipelineRun {
  pub output: PreSetupOutput,
  pub results: StageResults,
  pub state: PipelineState,
  /// Tags written by PostSetup
  pub tags: Vec<String>,
}

/// Coordinates one run over the tag and release-host ports
pub struct Coordinator<'a> {
  config: &'a ResolvedConfig,
  tags: &'a dyn TagStore,
  history: &'a dyn History,
  host: &'a dyn ReleaseHost,
}

impl<'a> Coordinator<'a> {
  pub fn new(
    config: &'a ResolvedConfig,
    tags: &'a dyn TagStore,
    history: &'a dyn History,
    host: &'a dyn ReleaseHost,
  ) -> Self {
    Self {
      config,
      tags,
      history,
      host,
    }
  }

  pub fn config(&self) -> &ResolvedConfig {
    self.config
  }

  fn ledger(&self) -> RailResult<VersionLedger> {
    let events = self.tags.list_tags()?;
    Ok(VersionLedger::fold(&events, &self.config.scope()))
  }

  /// Decide the run, claim its build id and, if anything releases, open a draft
  pub fn pre_setup(&self, trigger: &Trigger) -> RailResult<PreSetupOutput> {
    let ledger = self.ledger()?;
    let decision = decide(self.config, &ledger, trigger);
    let build_id = next_build_id(&ledger)?;
    let comparison = comparison_build_id(
      decision
        .candidates
        .iter()
        .map(|c| c.previous.as_ref().and_then(|p| p.build_id)),
    );

    info!(
      branch = %trigger.branch,
      trigger = %trigger.kind,
      env = %decision.environment,
      build_id,
      releases = decision.candidates.len(),
      "pre-setup"
    );

    let head = self.tags.head_commit()?;
    let mut release_notes = String::new();
    if decision.has_release() {
      let from = if comparison.is_first_release {
        None
      } else {
        let commit = ledger.commit_of_build(comparison.build_id);
        if commit.is_none() {
          warn!(build_id = comparison.build_id, "comparison build has no commit; using full history");
        }
        commit
      };
      let commits = self.history.commits_between(from, &head)?;
      release_notes =
        ReleaseNotes::generate(&commits, &decision.candidates, comparison.is_first_release).to_markdown();
    }

    // Build markers go on every run, released or not
    let scope = self.config.scope();
    self.record(
      &[
        build_tag(build_id),
        build_env_tag(build_id, &decision.environment, &scope),
      ],
      &head,
    )?;

    if decision.has_release() {
      let title = decision
        .candidates
        .iter()
        .map(|c| format!("{} {}", c.app.name, c.version))
        .collect::<Vec<_>>()
        .join(", ");
      self.host.create_draft(build_id, &title, &release_notes)?;
    }

    Ok(PreSetupOutput {
      branch: trigger.branch.clone(),
      trigger_type: trigger.kind,
      environment: decision.environment.clone(),
      has_release: decision.has_release(),
      release_notes,
      is_first_release: comparison.is_first_release,
      build_id,
      last_build_id: comparison.build_id,
      releases: decision
        .candidates
        .iter()
        .map(|c| (c.app.id.clone(), ReleaseInfo::from(c)))
        .collect(),
    })
  }

  /// Members of a stage's matrix, assuming earlier stages passed
  pub fn matrix(&self, stage: Stage, output: &PreSetupOutput) -> Vec<MatrixEntry> {
    matrix::matrix_for(stage, self.config, output)
  }

  /// Run matrix entries in parallel; Ok iff every entry succeeded
  pub fn run_entries(
    &self,
    stage: Stage,
    entries: &[MatrixEntry],
    output: &PreSetupOutput,
    runner: &dyn StageRunner,
  ) -> StageOutcome {
    let outcomes: Vec<StageOutcome> = entries
      .par_iter()
      .map(|entry| StageOutcome::normalize(&runner.run(stage, entry, output)))
      .collect();
    let outcome = StageOutcome::all(outcomes);
    info!(%stage, entries = entries.len(), %outcome, "stage finished");
    outcome
  }

  /// Record the run's outcome; returns the terminal state and the tags written
  ///
  /// Runs without a release have nothing to publish, so only Test and Build
  /// decide their outcome and only their build marker is written.
  pub fn post_setup(&self, output: &PreSetupOutput, results: StageResults) -> RailResult<(PipelineState, Vec<String>)> {
    let scope = self.config.scope();
    let head = self.tags.head_commit()?;
    let mut names = Vec::new();

    if !output.has_release {
      let outcome = results.verification_outcome();
      info!(build_id = output.build_id, %outcome, "nothing released; recording build outcome");
      names.push(build_outcome_tag(
        output.build_id,
        &output.environment,
        BuildOutcome::from(outcome),
        &scope,
      ));
      self.record(&names, &head)?;
      return Ok((PipelineState::PostSetup.advance(outcome)?, names));
    }

    let outcome = results.release_outcome();
    match outcome {
      StageOutcome::Ok => {
        for release in output.releases.values() {
          archive_release(&self.config.output_dir, &release.app_id, &release.version)?;
          names.push(version_tag(&scope, &release.app_id, &release.version, None));
          names.push(latest_tag(&scope, &release.app_id, &release.environment));
        }
        names.push(build_outcome_tag(
          output.build_id,
          &output.environment,
          BuildOutcome::Passed,
          &scope,
        ));
        for name in &names {
          self.tags.force_tag(name, &head)?;
        }
        self.host.publish_draft(output.build_id)?;
        self.tags.push_tags(&names)?;
      }
      StageOutcome::Error => {
        self.host.delete_draft(output.build_id)?;
        names.push(build_outcome_tag(
          output.build_id,
          &output.environment,
          BuildOutcome::Failed,
          &scope,
        ));
        self.record(&names, &head)?;
      }
    }

    Ok((PipelineState::PostSetup.advance(outcome)?, names))
  }

  /// Force-create tags at `commit`, then force-push them together
  fn record(&self, names: &[String], commit: &str) -> RailResult<()> {
    for name in names {
      self.tags.force_tag(name, commit)?;
    }
    self.tags.push_tags(names)
  }

  /// Drive every stage in-process
  pub fn run_local(&self, trigger: &Trigger, runner: &dyn StageRunner) -> RailResult<PipelineRun> {
    let mut state = PipelineState::PreSetup;
    let output = self.pre_setup(trigger)?;
    state = state.advance(StageOutcome::Ok)?;

    let test = self.run_entries(Stage::Test, &matrix::test_matrix(self.config, &output), &output, runner);
    state = state.advance(test)?;

    let build = self.run_entries(Stage::Build, &matrix::build_matrix(self.config, &output), &output, runner);
    state = state.advance(build)?;

    let publish = if test.is_ok() && build.is_ok() {
      let entries = matrix::publish_matrix(self.config, &output, test, build);
      self.run_entries(Stage::Publish, &entries, &output, runner)
    } else {
      info!("publish skipped after earlier failure");
      StageOutcome::Error
    };
    state = state.advance(publish)?;
    debug_assert_eq!(state, PipelineState::PostSetup);

    let results = StageResults { test, build, publish };
    let (state, tags) = self.post_setup(&output, results)?;
    Ok(PipelineRun {
      output,
      results,
      state,
      tags,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::{AppConfig, ConfigBuilder, StageEntryConfig, TestConfig};
  use crate::core::error::ConfigError;
  use crate::core::vcs::CommitInfo;
  use crate::ledger::{Environment, VersionResolver};
  use crate::pipeline::trigger::TriggerKind;
  use crate::release::NoopHost;
  use crate::tags::{MemoryTags, TagSource, WriteCall};
  use std::collections::HashMap;
  use std::sync::Mutex;
  use tempfile::TempDir;

  /// Runner with canned results per entry id (default success)
  #[derive(Default)]
  struct ScriptedRunner {
    results: HashMap<String, String>,
    ran: Mutex<Vec<String>>,
  }

  impl ScriptedRunner {
    fn failing(id: &str, result: &str) -> Self {
      let mut runner = Self::default();
      runner.results.insert(id.to_string(), result.to_string());
      runner
    }

    fn ran(&self) -> Vec<String> {
      let mut ran = self.ran.lock().unwrap().clone();
      ran.sort();
      ran
    }
  }

  impl StageRunner for ScriptedRunner {
    fn run(&self, stage: Stage, entry: &MatrixEntry, _output: &PreSetupOutput) -> String {
      self.ran.lock().unwrap().push(format!("{}:{}", stage, entry.id));
      self.results.get(&entry.id).cloned().unwrap_or_else(|| "success".to_string())
    }
  }

  #[derive(Default)]
  struct RecordingHost {
    calls: Mutex<Vec<String>>,
  }

  impl RecordingHost {
    fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
    }
  }

  impl ReleaseHost for RecordingHost {
    fn create_draft(&self, build_id: u64, title: &str, _notes: &str) -> RailResult<()> {
      self.calls.lock().unwrap().push(format!("create {} {}", build_id, title));
      Ok(())
    }

    fn delete_draft(&self, build_id: u64) -> RailResult<()> {
      self.calls.lock().unwrap().push(format!("delete {}", build_id));
      Ok(())
    }

    fn publish_draft(&self, build_id: u64) -> RailResult<()> {
      self.calls.lock().unwrap().push(format!("publish {}", build_id));
      Ok(())
    }
  }

  fn builder(output_dir: &std::path::Path) -> ConfigBuilder {
    ConfigBuilder::new()
      .output_dir(output_dir)
      .app(AppConfig::new("core").named("Core").main_release())
      .app(AppConfig::new("web"))
      .environment("beta")
      .test(TestConfig::new("unit", &["core"], "true"))
      .test(TestConfig::new("smoke", &["web"], "true").always())
      .build(StageEntryConfig::new("core-bin", "core", "true"))
      .publish(StageEntryConfig::new("core-push", "core", "true"))
  }

  fn store() -> MemoryTags {
    MemoryTags::new("c3")
      .with_tags(&[
        ("c1", "v1.0.0"),
        ("c1", "build.6"),
        ("c1", "build.6-main"),
        ("c1", "build.6-main-passed"),
        ("c1", "latest"),
        ("c1", "web/v0.4.0"),
        ("c1", "web/latest"),
        ("c3", "v1.1.0-bump"),
      ])
      .with_commits(vec![
        CommitInfo {
          sha: "c1".into(),
          message: "feat: first".into(),
        },
        CommitInfo {
          sha: "c2".into(),
          message: "fix: parser crash".into(),
        },
        CommitInfo {
          sha: "c3".into(),
          message: "feat(core): tag ledger".into(),
        },
      ])
  }

  fn tag_trigger() -> Trigger {
    Trigger::new("main", TriggerKind::Tag)
  }

  #[test]
  fn test_state_machine_transitions() {
    let s = PipelineState::PreSetup.advance(StageOutcome::Ok).unwrap();
    assert_eq!(s, PipelineState::Test);
    let s = s.advance(StageOutcome::Error).unwrap();
    assert_eq!(s, PipelineState::Build);
    let s = s.advance(StageOutcome::Ok).unwrap().advance(StageOutcome::Error).unwrap();
    assert_eq!(s, PipelineState::PostSetup);
    assert_eq!(s.advance(StageOutcome::Error).unwrap(), PipelineState::Failed);
    assert_eq!(
      PipelineState::PreSetup.advance(StageOutcome::Error).unwrap(),
      PipelineState::Failed
    );
    assert!(PipelineState::Completed.advance(StageOutcome::Ok).is_err());
  }

  #[test]
  fn test_pre_setup_claims_build_and_opens_draft() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let host = RecordingHost::default();
    let output = Coordinator::new(&config, &tags, &tags, &host).pre_setup(&tag_trigger()).unwrap();

    assert!(output.has_release);
    assert_eq!(output.build_id, 7);
    assert_eq!(output.last_build_id, 6);
    assert!(!output.is_first_release);
    assert_eq!(output.releases["core"].version.to_string(), "1.1.0");
    // Notes cover commits after build.6's commit
    assert!(output.release_notes.contains("parser crash"));
    assert!(!output.release_notes.contains("first"));

    assert_eq!(tags.remote_commit("build.7").as_deref(), Some("c3"));
    assert_eq!(tags.remote_commit("build.7-main").as_deref(), Some("c3"));
    assert_eq!(host.calls(), vec!["create 7 Core 1.1.0"]);
  }

  #[test]
  fn test_successful_release_moves_pointers() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let host = RecordingHost::default();
    let runner = ScriptedRunner::default();
    let run = Coordinator::new(&config, &tags, &tags, &host)
      .run_local(&tag_trigger(), &runner)
      .unwrap();

    assert_eq!(run.state, PipelineState::Completed);
    assert_eq!(run.tags, vec!["v1.1.0", "latest", "build.7-main-passed"]);
    assert_eq!(tags.remote_commit("latest").as_deref(), Some("c3"));
    assert_eq!(host.calls(), vec!["create 7 Core 1.1.0", "publish 7"]);
    assert_eq!(runner.ran(), vec!["build:core-bin", "publish:core-push", "test:unit"]);

    let ledger = VersionLedger::fold(&tags.list_tags().unwrap(), &config.scope());
    let published = VersionResolver::new(&ledger)
      .published_version("core", &Environment::main())
      .unwrap();
    assert_eq!(published.version.to_string(), "1.1.0");
    assert_eq!(published.build_id, Some(7));
  }

  #[test]
  fn test_failed_publish_records_failure_only() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let before = tags.remote_tag_names();
    let host = RecordingHost::default();
    let runner = ScriptedRunner::failing("core-push", "Canceled");

    let run = Coordinator::new(&config, &tags, &tags, &host)
      .run_local(&tag_trigger(), &runner)
      .unwrap();
    assert_eq!(run.state, PipelineState::Failed);

    let after = tags.remote_tag_names();
    assert!(after.contains(&"build.7-main-failed".to_string()));
    let added: Vec<&String> = after.iter().filter(|t| !before.contains(t)).collect();
    assert!(added.iter().all(|t| t.starts_with("build.7")), "{added:?}");
    assert_eq!(tags.remote_commit("latest").as_deref(), Some("c1"));
    assert_eq!(host.calls(), vec!["create 7 Core 1.1.0", "delete 7"]);
  }

  #[test]
  fn test_failed_test_skips_publish() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let runner = ScriptedRunner::failing("unit", "failure");
    let run = Coordinator::new(&config, &tags, &tags, &NoopHost)
      .run_local(&tag_trigger(), &runner)
      .unwrap();

    assert_eq!(run.state, PipelineState::Failed);
    assert_eq!(run.results.publish, StageOutcome::Error);
    assert!(!runner.ran().iter().any(|r| r.starts_with("publish:")));
  }

  #[test]
  fn test_commit_trigger_records_build_only() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let before = tags.remote_tag_names();
    let host = RecordingHost::default();
    let runner = ScriptedRunner::default();
    let run = Coordinator::new(&config, &tags, &tags, &host)
      .run_local(&Trigger::new("main", TriggerKind::Commit), &runner)
      .unwrap();

    assert!(!run.output.has_release);
    assert_eq!(run.output.build_id, 7);
    assert_eq!(run.state, PipelineState::Completed);
    assert_eq!(run.tags, vec!["build.7-main-passed"]);
    assert!(host.calls().is_empty());
    assert_eq!(runner.ran(), vec!["test:smoke"]);

    let added: Vec<String> = tags
      .remote_tag_names()
      .into_iter()
      .filter(|t| !before.contains(t))
      .collect();
    assert_eq!(added, vec!["build.7", "build.7-main", "build.7-main-passed"]);
    assert_eq!(tags.remote_commit("latest").as_deref(), Some("c1"));
  }

  #[test]
  fn test_consecutive_runs_never_share_a_build_id() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let coordinator = Coordinator::new(&config, &tags, &tags, &NoopHost);
    let trigger = Trigger::new("main", TriggerKind::Commit);

    let first = coordinator.pre_setup(&trigger).unwrap();
    let second = coordinator.pre_setup(&trigger).unwrap();

    assert_eq!(first.build_id, 7);
    assert_eq!(second.build_id, 8);
    assert_eq!(tags.remote_commit("build.7").as_deref(), Some("c3"));
    assert_eq!(tags.remote_commit("build.8-main").as_deref(), Some("c3"));
  }

  #[test]
  fn test_post_setup_without_release_marks_build_only() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let tags = store();
    let before = tags.remote_tag_names();
    let host = RecordingHost::default();
    let coordinator = Coordinator::new(&config, &tags, &tags, &host);
    let output = coordinator.pre_setup(&Trigger::new("beta", TriggerKind::Commit)).unwrap();

    // Publish has nothing to run, so a vendor "skipped" does not fail the run
    let (state, written) = coordinator
      .post_setup(&output, StageResults::from_vendor("success", "success", "skipped"))
      .unwrap();
    assert_eq!(state, PipelineState::Completed);
    assert_eq!(written, vec!["build.7-beta-passed"]);

    let (state, written) = coordinator
      .post_setup(&output, StageResults::from_vendor("failure", "success", "skipped"))
      .unwrap();
    assert_eq!(state, PipelineState::Failed);
    assert_eq!(written, vec!["build.7-beta-failed"]);

    let mut added: Vec<String> = tags
      .remote_tag_names()
      .into_iter()
      .filter(|t| !before.contains(t))
      .collect();
    added.sort();
    assert_eq!(
      added,
      vec!["build.7", "build.7-beta", "build.7-beta-failed", "build.7-beta-passed"]
    );
    assert!(host.calls().is_empty());
  }

  #[test]
  fn test_exhausted_build_ids_abort_before_writing() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    let max = format!("build.{}", u64::MAX);
    let tags = MemoryTags::new("c1").with_tags(&[("c1", max.as_str()), ("c1", "v1.1.0-bump")]);
    let host = RecordingHost::default();

    let result = Coordinator::new(&config, &tags, &tags, &host).pre_setup(&tag_trigger());
    assert!(matches!(
      result,
      Err(RailError::Pipeline(PipelineError::BuildIdExhausted { .. }))
    ));
    assert!(tags.write_calls().is_empty());
    assert!(host.calls().is_empty());
  }

  #[test]
  fn test_two_main_release_apps_write_nothing() {
    let temp = TempDir::new().unwrap();
    let tags = store();
    let runner = ScriptedRunner::default();
    let result = builder(temp.path())
      .app(AppConfig::new("other").main_release())
      .resolve()
      .and_then(|config| Coordinator::new(&config, &tags, &tags, &NoopHost).run_local(&tag_trigger(), &runner));

    assert!(matches!(
      result,
      Err(RailError::Config(ConfigError::MultipleMainRelease { .. }))
    ));
    assert!(tags.write_calls().is_empty());
    assert!(runner.ran().is_empty());
  }

  #[test]
  fn test_post_setup_archives_build_output() {
    let temp = TempDir::new().unwrap();
    let config = builder(temp.path()).resolve().unwrap();
    std::fs::create_dir_all(temp.path().join("build/core")).unwrap();
    std::fs::write(temp.path().join("build/core/core.tar.gz"), b"artifact").unwrap();

    let tags = store();
    let coordinator = Coordinator::new(&config, &tags, &tags, &NoopHost);
    let output = coordinator.pre_setup(&tag_trigger()).unwrap();
    let results = StageResults::from_vendor("success", "Succeeded", "success");
    let (state, _) = coordinator.post_setup(&output, results).unwrap();

    assert_eq!(state, PipelineState::Completed);
    assert!(temp.path().join("release/core/1.1.0/core.tar.gz").exists());
    assert!(temp.path().join("release/core/1.1.0/SHA256SUMS").exists());
    assert!(tags.write_calls().iter().any(|c| matches!(c, WriteCall::Push { .. })));
  }
}
