//! `tag-rail pipeline ...` - stage entry points for generated CI definitions
//!
//! CI runs `pre-setup` once, fans out `test`/`build`/`publish` jobs from
//! `matrix`, then runs `post-setup` with the three job results. Every stage
//! after pre-setup reads the pre-setup output file and never the ledger.
//! `run` drives the same state machine in-process.

use crate::core::context::RepoContext;
use crate::core::error::{PipelineError, RailError, RailResult};
use crate::pipeline::matrix::Stage;
use crate::pipeline::output::PreSetupOutput;
use crate::pipeline::runner::ShellRunner;
use crate::pipeline::{Coordinator, PipelineState, StageResults};
use std::path::Path;

/// PreSetup: decide, claim the build id, emit the output payload
pub fn run_pre_setup(ctx: &RepoContext, output_path: Option<&Path>) -> RailResult<()> {
  let trigger = ctx.trigger()?;
  let tags = ctx.tags()?;
  let host = ctx.host();
  let coordinator = Coordinator::new(&ctx.config, &tags, &tags, host.as_ref());
  let output = coordinator.pre_setup(&trigger)?;

  match output_path {
    Some(path) => {
      output.save(path)?;
      if output.has_release {
        println!("📦 build.{}: releasing {} app(s)", output.build_id, output.releases.len());
        for release in output.releases.values() {
          println!("   {} {} ({})", release.app_name, release.version, release.environment);
        }
      } else {
        println!("📦 build.{}: nothing to release", output.build_id);
      }
      println!("✅ Wrote {}", path.display());
    }
    None => println!("{}", output.to_json()?),
  }
  Ok(())
}

/// Print a stage's matrix as JSON
pub fn run_matrix(ctx: &RepoContext, stage: Stage, input: &Path) -> RailResult<()> {
  let output = PreSetupOutput::load(input)?;
  let entries = crate::pipeline::matrix::matrix_for(stage, &ctx.config, &output);
  println!("{}", serde_json::to_string_pretty(&entries)?);
  Ok(())
}

/// Run one stage's matrix (or a single entry of it)
pub fn run_stage(ctx: &RepoContext, stage: Stage, input: &Path, entry: Option<&str>) -> RailResult<()> {
  let output = PreSetupOutput::load(input)?;
  let tags = ctx.tags()?;
  let host = ctx.host();
  let coordinator = Coordinator::new(&ctx.config, &tags, &tags, host.as_ref());

  let mut entries = coordinator.matrix(stage, &output);
  if let Some(id) = entry {
    entries.retain(|e| e.id == id);
    if entries.is_empty() {
      return Err(RailError::Pipeline(PipelineError::UnknownMatrixEntry {
        stage: stage.to_string(),
        id: id.to_string(),
      }));
    }
  }

  let runner = ShellRunner::new(&ctx.root, &ctx.config.output_dir);
  let outcome = coordinator.run_entries(stage, &entries, &output, &runner);
  if outcome.is_ok() {
    println!("✅ {} passed ({} entries)", stage, entries.len());
    Ok(())
  } else {
    Err(RailError::message(format!("{} failed", stage)))
  }
}

/// PostSetup: record the run's outcome in the tag namespace
pub fn run_post_setup(
  ctx: &RepoContext,
  input: &Path,
  test_result: &str,
  build_result: &str,
  publish_result: &str,
) -> RailResult<()> {
  let output = PreSetupOutput::load(input)?;
  let tags = ctx.tags()?;
  let host = ctx.host();
  let coordinator = Coordinator::new(&ctx.config, &tags, &tags, host.as_ref());

  let results = StageResults::from_vendor(test_result, build_result, publish_result);
  let (state, written) = coordinator.post_setup(&output, results)?;
  report(state, &output, &written);
  Ok(())
}

/// Whole pipeline in-process
pub fn run_local(ctx: &RepoContext) -> RailResult<()> {
  let trigger = ctx.trigger()?;
  let tags = ctx.tags()?;
  let host = ctx.host();
  let coordinator = Coordinator::new(&ctx.config, &tags, &tags, host.as_ref());
  let runner = ShellRunner::new(&ctx.root, &ctx.config.output_dir);

  let run = coordinator.run_local(&trigger, &runner)?;
  // Same spelling CI passes back to post-setup
  println!(
    "📋 test: {}, build: {}, publish: {}",
    run.results.test.as_result(),
    run.results.build.as_result(),
    run.results.publish.as_result()
  );
  report(run.state, &run.output, &run.tags);

  if run.state == PipelineState::Failed {
    return Err(RailError::message(format!("Pipeline build.{} failed", run.output.build_id)));
  }
  Ok(())
}

fn report(state: PipelineState, output: &PreSetupOutput, written: &[String]) {
  let build_id = output.build_id;
  match (state, output.has_release, written.is_empty()) {
    (_, _, true) => println!("✅ build.{} {}: no tags recorded", build_id, state),
    (PipelineState::Completed, true, false) => println!("✅ build.{} released: {}", build_id, written.join(", ")),
    (PipelineState::Completed, false, false) => println!("✅ build.{} passed: {}", build_id, written.join(", ")),
    _ => println!("⚠️  build.{} {}: {}", build_id, state, written.join(", ")),
  }
}
