//! `tag-rail test|build|publish` - run configured entries locally
//!
//! Runs outside the pipeline: nothing is tagged and no release is claimed.
//! `--args "app=web"` limits the run to entries covering those apps,
//! `entry=<id>` to a single entry.

use crate::commands::{load_ledger, target_environment};
use crate::core::args::ArgMap;
use crate::core::context::RepoContext;
use crate::core::error::{PipelineError, RailError, RailResult};
use crate::ledger::next_build_id;
use crate::pipeline::matrix::{MatrixEntry, Stage};
use crate::pipeline::output::PreSetupOutput;
use crate::pipeline::runner::{ShellRunner, StageRunner};
use crate::pipeline::{StageOutcome, TriggerKind};
use std::collections::BTreeMap;

/// Run the entries of one stage
pub fn run_entries(ctx: &RepoContext, stage: Stage, args: &ArgMap) -> RailResult<()> {
  let apps = args.list("app");
  for id in &apps {
    ctx.config.require_app(id)?;
  }

  let mut entries = configured_entries(ctx, stage);
  entries.retain(|e| apps.is_empty() || e.app_ids.iter().any(|id| apps.contains(id)));
  if let Some(id) = args.get("entry") {
    entries.retain(|e| e.id == id);
    if entries.is_empty() {
      return Err(RailError::Pipeline(PipelineError::UnknownMatrixEntry {
        stage: stage.to_string(),
        id: id.to_string(),
      }));
    }
  }

  if entries.is_empty() {
    println!("⚠️  No {} entries to run", stage);
    return Ok(());
  }

  let env = target_environment(ctx, args)?;
  let ledger = load_ledger(&ctx.tags()?, &ctx.config)?;
  let output = PreSetupOutput {
    branch: env.build_label(&ctx.config.main_branch).to_string(),
    trigger_type: TriggerKind::Commit,
    environment: env,
    has_release: false,
    release_notes: String::new(),
    is_first_release: false,
    build_id: next_build_id(&ledger)?,
    last_build_id: 0,
    releases: BTreeMap::new(),
  };

  let runner = ShellRunner::new(&ctx.root, &ctx.config.output_dir);
  let mut outcomes = Vec::new();
  for entry in &entries {
    println!("▶️  {} {}", stage, entry.id);
    let outcome = StageOutcome::normalize(&runner.run(stage, entry, &output));
    let marker = if outcome.is_ok() { "✅" } else { "❌" };
    println!("{} {} {}", marker, stage, entry.id);
    outcomes.push(outcome);
  }

  if StageOutcome::all(outcomes).is_ok() {
    Ok(())
  } else {
    Err(RailError::message(format!("{} failed", stage)))
  }
}

/// Every enabled entry of a stage, regardless of release state
fn configured_entries(ctx: &RepoContext, stage: Stage) -> Vec<MatrixEntry> {
  let enabled = |id: &str| ctx.config.app(id).is_some_and(|a| a.enabled);
  match stage {
    Stage::Test => ctx
      .config
      .tests
      .iter()
      .filter(|t| t.app_ids.iter().any(|id| enabled(id.as_str())))
      .map(|t| MatrixEntry {
        id: t.id.clone(),
        app_ids: t.app_ids.clone(),
        run: t.run.clone(),
      })
      .collect(),
    Stage::Build | Stage::Publish => {
      let entries = if stage == Stage::Build {
        &ctx.config.builds
      } else {
        &ctx.config.publishes
      };
      entries
        .iter()
        .filter(|e| enabled(e.app_id.as_str()))
        .map(|e| MatrixEntry {
          id: e.id.clone(),
          app_ids: vec![e.app_id.clone()],
          run: e.run.clone(),
        })
        .collect()
    }
  }
}
